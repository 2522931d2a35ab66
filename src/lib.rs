//! pmemkit: flush and bulk-transfer primitives for byte-addressable
//! persistent memory.
//!
//! This crate answers three questions for code that `mmap`s a DAX device
//! or a file on a PMEM-aware filesystem:
//!
//! - *Is this mapping really persistent memory?* ([`is_pmem`])
//! - *How do I make writes to it durable?* ([`flush`], [`drain`],
//!   [`persist`], [`deep_flush`], [`msync`])
//! - *How do I write to it efficiently, bypassing the cache for large
//!   transfers?* ([`memmove_persist`] and friends)
//!
//! Callers are responsible for creating and registering mappings
//! themselves (this crate has no opinion on `open`/`mmap` flags or DAX
//! detection heuristics beyond what [`map_range_register`] is told).
//!
//! # Capability detection
//!
//! The CPU's cache-flush instruction support (`CLFLUSH`/`CLFLUSHOPT`/
//! `CLWB`) is probed once, lazily, on first use of any durability
//! primitive, and honours the `PMEM_NO_CLFLUSHOPT`/`PMEM_NO_CLWB`/
//! `PMEM_NO_FLUSH`/`PMEM_NO_MOVNT`/`PMEM_MOVNT_THRESHOLD` environment
//! variables. `PMEM_IS_PMEM_FORCE` is read separately and even more
//! lazily, on first call to [`is_pmem`].

mod arch;
mod capability;
mod config;
mod deep_flush;
mod error;
mod flush;
mod is_pmem;
mod registry;
mod transfer;
mod unmap;
mod valgrind;

#[cfg(test)]
mod test_util;

pub use error::{PmemError, PmemResult};
pub use flush::{drain, flush, has_hw_drain, msync, persist};
pub use transfer::{
    memcpy_nodrain, memcpy_persist, memmove_nodrain, memmove_persist, memset_nodrain,
    memset_persist,
};

pub use deep_flush::deep_flush;
pub use is_pmem::is_pmem;
pub use registry::{map_range_register, map_range_unregister};
pub use unmap::unmap;

static_assertions::const_assert_eq!(std::mem::size_of::<usize>(), std::mem::size_of::<*const u8>());
