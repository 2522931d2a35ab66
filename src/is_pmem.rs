//! Lazy `is_pmem` query (§4.5): whether a mapping is genuine persistent
//! memory, answered once `PMEM_IS_PMEM_FORCE` has been consulted the first
//! time anyone asks.
//!
//! The override is read lazily rather than folded into the eager
//! capability probe because it answers a different question ("does the
//! caller want to force a process-wide answer?") on a different cell: a
//! three-state `AtomicU8` CAS (`UNSTARTED -> IN_PROGRESS -> DONE`), mirroring
//! the state machine the capability probe's `spin::Once` already gives us
//! for free, written out by hand here because the cached value itself is an
//! `Option<bool>` (no override is a legitimate third state, not just "not
//! computed yet").

use std::sync::atomic::{AtomicU8, Ordering};

use crate::capability::{self, IsPmemKind};
use crate::config;
use crate::registry;

const UNSTARTED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

static FORCE_STATE: AtomicU8 = AtomicU8::new(UNSTARTED);

/// Guarded by `FORCE_STATE`: only ever written by the single thread that
/// wins the `UNSTARTED -> IN_PROGRESS` transition, and only ever read after
/// observing `DONE`, which happens-after that write via the `Release`/
/// `Acquire` pair below.
static mut FORCE_VALUE: Option<bool> = None;

fn force_override() -> Option<bool> {
    loop {
        match FORCE_STATE.compare_exchange(
            UNSTARTED,
            IN_PROGRESS,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                let value = config::is_pmem_force();
                // SAFETY: this thread just won the CAS out of UNSTARTED, so
                // it is the only writer; the Release store below publishes
                // the write to any thread that subsequently observes DONE.
                unsafe {
                    FORCE_VALUE = value;
                }
                FORCE_STATE.store(DONE, Ordering::Release);
                return value;
            }
            Err(DONE) => {
                // SAFETY: DONE was observed with Acquire ordering, which
                // synchronises with the Release store above.
                return unsafe { FORCE_VALUE };
            }
            Err(_) => {
                std::hint::spin_loop();
            }
        }
    }
}

/// Whether `[addr, addr + len)` is backed by genuine persistent memory
/// (§4.5). A zero-length range is vacuously `true`, matching
/// `is_pmem_detect`'s empty-range convention.
///
/// Consults `PMEM_IS_PMEM_FORCE` first (cached after the first call, for
/// the life of the process); absent an override, answers `false` if the
/// CPU lacks even `CLFLUSH`, otherwise walks the mapping registry for
/// complete `DIRECT_MAPPED` coverage.
pub fn is_pmem(addr: *const u8, len: usize) -> bool {
    if let Some(forced) = force_override() {
        return forced;
    }

    match capability::capabilities().is_pmem_kind {
        IsPmemKind::Never => false,
        IsPmemKind::RegistryProbe => {
            let base = addr as usize;
            let end = base.wrapping_add(len);
            registry::with_read(|r| r.is_pmem_detect(base, end))
        }
    }
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    FORCE_STATE.store(UNSTARTED, Ordering::Release);
}
