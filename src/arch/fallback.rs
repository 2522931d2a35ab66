//! Conservative stand-ins for architectures with no hand-tuned cache-flush
//! or streaming-store support.
//!
//! Every capability query returns `false`, which drives `capability::probe`
//! to its most pessimistic defaults: `is_pmem_fn` stays at `never`, flush
//! stays a no-op past `drain`'s fence, and bulk transfers never take the
//! streaming-store path regardless of `movnt_threshold`. This is a direct
//! consequence of the "no emulation on systems lacking byte-addressable
//! mappings" non-goal: the fast paths are an optimization, not a
//! correctness requirement.

pub(crate) const CACHE_LINE_SIZE: usize = 64;
pub(crate) const STREAM_CHUNK: usize = 128;

pub(crate) fn has_clflush() -> bool {
    false
}

pub(crate) fn has_clflushopt() -> bool {
    false
}

pub(crate) fn has_clwb() -> bool {
    false
}

/// # Safety
/// Never called: `capability::probe` never selects a flush kind that
/// routes here when no CPU support was detected.
pub(crate) unsafe fn clflush(_addr: *const u8) {
    unreachable!("clflush dispatched without CPU support")
}

/// # Safety
/// See [`clflush`].
pub(crate) unsafe fn clflushopt(_addr: *const u8) {
    unreachable!("clflushopt dispatched without CPU support")
}

/// # Safety
/// See [`clflush`].
pub(crate) unsafe fn clwb(_addr: *const u8) {
    unreachable!("clwb dispatched without CPU support")
}

pub(crate) fn sfence() {}

/// # Safety
/// Never called: the streaming-store transfer path is unreachable when
/// `has_clflush()` (and therefore every finer capability) is `false`.
pub(crate) unsafe fn stream_store_16(_dst: *mut u8, _src: *const u8) {
    unreachable!("streaming store dispatched without CPU support")
}

/// # Safety
/// See [`stream_store_16`].
pub(crate) unsafe fn stream_fill_16(_dst: *mut u8, _byte: u8) {
    unreachable!("streaming store dispatched without CPU support")
}

/// # Safety
/// See [`stream_store_16`].
pub(crate) unsafe fn stream_store_4(_dst: *mut u8, _value: [u8; 4]) {
    unreachable!("streaming store dispatched without CPU support")
}

pub(crate) fn align_down_cache_line(addr: usize) -> usize {
    addr & !(CACHE_LINE_SIZE - 1)
}
