//! Cache-line flush and non-temporal store primitives for x86_64.
//!
//! Cache line = 64 bytes. Streaming-store chunk = 128 bytes (eight 16-byte
//! sub-stores). See `crate::flush` and `crate::transfer` for the dispatch
//! and alignment logic built on top of these.

use std::arch::x86_64::{
    __m128i, _mm_loadu_si128, _mm_set1_epi8, _mm_sfence, _mm_stream_si128, _mm_stream_si32,
};

/// Cache-line size assumed throughout this crate.
pub(crate) const CACHE_LINE_SIZE: usize = 64;

/// Size of one streaming-store body iteration (eight 16-byte stores).
pub(crate) const STREAM_CHUNK: usize = 128;

/// Flush cache line containing address (CLFLUSH).
///
/// # Safety
/// `addr` must point into a mapping that is still valid.
#[inline]
pub(crate) unsafe fn clflush(addr: *const u8) {
    unsafe {
        std::arch::asm!("clflush [{}]", in(reg) addr, options(nostack, preserves_flags));
    }
}

/// Cache line flush with relaxed ordering (CLFLUSHOPT). Requires `sfence`
/// to order against later stores; callers are expected to call `sfence()`
/// once after a run of these, not per line.
///
/// # Safety
/// `addr` must point into a mapping that is still valid. Caller must have
/// verified CPU support via [`super::has_clflushopt`].
#[inline]
pub(crate) unsafe fn clflushopt(addr: *const u8) {
    unsafe {
        std::arch::asm!("clflushopt [{}]", in(reg) addr, options(nostack, preserves_flags));
    }
}

/// Cache line write-back, leaving the line resident (CLWB). Like
/// `clflushopt`, requires a trailing `sfence`.
///
/// # Safety
/// `addr` must point into a mapping that is still valid. Caller must have
/// verified CPU support via [`super::has_clwb`].
#[inline]
pub(crate) unsafe fn clwb(addr: *const u8) {
    unsafe {
        std::arch::asm!("clwb [{}]", in(reg) addr, options(nostack, preserves_flags));
    }
}

/// Store fence: every store issued before this point is globally visible
/// before any store issued after it.
#[inline]
pub(crate) fn sfence() {
    unsafe { _mm_sfence() };
}

/// Copy one 16-byte lane from `src` to `dst` with a non-temporal store.
///
/// # Safety
/// `src` must be readable for 16 bytes (any alignment); `dst` must be
/// writable for 16 bytes and 16-byte aligned (required by `MOVNTDQ`).
#[inline]
pub(crate) unsafe fn stream_store_16(dst: *mut u8, src: *const u8) {
    unsafe {
        let v = _mm_loadu_si128(src as *const __m128i);
        _mm_stream_si128(dst as *mut __m128i, v);
    }
}

/// Non-temporal store of a broadcast fill byte into one 16-byte lane.
///
/// # Safety
/// `dst` must be writable for 16 bytes and 16-byte aligned.
#[inline]
pub(crate) unsafe fn stream_fill_16(dst: *mut u8, byte: u8) {
    unsafe {
        let v = _mm_set1_epi8(byte as i8);
        _mm_stream_si128(dst as *mut __m128i, v);
    }
}

/// Non-temporal store of 4 bytes.
///
/// # Safety
/// `dst` must be writable for 4 bytes and 4-byte aligned.
#[inline]
pub(crate) unsafe fn stream_store_4(dst: *mut u8, value: [u8; 4]) {
    unsafe {
        _mm_stream_si32(dst as *mut i32, i32::from_ne_bytes(value));
    }
}

/// Align `addr` down to the start of its containing cache line.
#[inline]
pub(crate) fn align_down_cache_line(addr: usize) -> usize {
    addr & !(CACHE_LINE_SIZE - 1)
}
