//! Bulk-transfer primitives (§4.3): `memmove`/`memcpy`/`memset` variants,
//! each with a `_nodrain` (flush only, no fence) and `_persist` (flush and
//! fence) form.
//!
//! Below the streaming-store threshold, a transfer is an ordinary libc-style
//! scalar operation followed by `flush()` over the touched range. At or
//! above threshold, with streaming stores enabled, the bulk of the range is
//! written with non-temporal stores that bypass the cache, and only the
//! unaligned head/tail fragments go through the scalar-store-plus-flush
//! path. Streaming-store completion always ends with an `sfence`
//! regardless of `_nodrain` vs `_persist`: the stores are weakly ordered
//! with respect to *any* subsequent load, not just a future `flush`, so the
//! fence is part of making the write visible at all, not part of the
//! durability contract `drain()` provides.

use crate::arch;
use crate::capability;
use crate::flush;

fn use_streaming(len: usize) -> bool {
    let caps = capability::capabilities();
    caps.movnt_enabled && len >= caps.movnt_threshold
}

/// Copy `len` bytes from `src` to `dst`, which may overlap, flushing the
/// destination range but not fencing.
///
/// # Safety
/// `[dst, dst + len)` and `[src, src + len)` must each be valid,
/// currently-mapped ranges, with `dst` writable.
pub unsafe fn memmove_nodrain(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    if len == 0 || dst as *const u8 == src {
        return dst;
    }
    unsafe {
        if use_streaming(len) {
            let dst_addr = dst as usize;
            let src_addr = src as usize;
            let backward = dst_addr > src_addr && dst_addr - src_addr < len;
            if backward {
                streaming_copy_backward(dst, src, len);
            } else {
                streaming_copy_forward(dst, src, len);
            }
        } else {
            std::ptr::copy(src, dst, len);
            flush::flush(dst, len);
        }
    }
    dst
}

/// `memmove_nodrain` followed by `drain()`.
///
/// # Safety
/// Same contract as [`memmove_nodrain`].
pub unsafe fn memmove_persist(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    let ret = unsafe { memmove_nodrain(dst, src, len) };
    flush::drain();
    ret
}

/// Copy `len` non-overlapping bytes from `src` to `dst`. Shares
/// `memmove`'s direction-selection dispatch, which is safe even when the
/// ranges happen to overlap; callers must still not rely on that, matching
/// libc `memcpy`'s contract.
///
/// # Safety
/// Same contract as [`memmove_nodrain`], plus `src`/`dst` must not overlap.
pub unsafe fn memcpy_nodrain(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { memmove_nodrain(dst, src, len) }
}

/// `memcpy_nodrain` followed by `drain()`.
///
/// # Safety
/// Same contract as [`memcpy_nodrain`].
pub unsafe fn memcpy_persist(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { memmove_persist(dst, src, len) }
}

/// Fill `len` bytes starting at `dst` with `byte`, flushing the touched
/// range but not fencing.
///
/// # Safety
/// `[dst, dst + len)` must be a valid, currently-mapped, writable range.
pub unsafe fn memset_nodrain(dst: *mut u8, byte: u8, len: usize) -> *mut u8 {
    if len == 0 {
        return dst;
    }
    unsafe {
        if use_streaming(len) {
            streaming_fill(dst, byte, len);
        } else {
            std::ptr::write_bytes(dst, byte, len);
            flush::flush(dst, len);
        }
    }
    dst
}

/// `memset_nodrain` followed by `drain()`.
///
/// # Safety
/// Same contract as [`memset_nodrain`].
pub unsafe fn memset_persist(dst: *mut u8, byte: u8, len: usize) -> *mut u8 {
    let ret = unsafe { memset_nodrain(dst, byte, len) };
    flush::drain();
    ret
}

const CACHE_LINE: usize = arch::CACHE_LINE_SIZE;
const CHUNK: usize = arch::STREAM_CHUNK;

/// Streaming-store copy, front to back: scalar-and-flush head up to the
/// next cache-line boundary, 128-byte streaming body, 16- then 4-byte
/// streaming tail, scalar-and-flush remainder.
unsafe fn streaming_copy_forward(dst: *mut u8, src: *const u8, len: usize) {
    let mut d = dst;
    let mut s = src;
    let mut remaining = len;

    let misalign = (d as usize) & (CACHE_LINE - 1);
    if misalign != 0 {
        let head = (CACHE_LINE - misalign).min(remaining);
        unsafe {
            std::ptr::copy_nonoverlapping(s, d, head);
            flush::flush(d, head);
            d = d.add(head);
            s = s.add(head);
        }
        remaining -= head;
    }

    while remaining >= CHUNK {
        unsafe {
            for i in 0..(CHUNK / 16) {
                arch::stream_store_16(d.add(i * 16), s.add(i * 16));
            }
            d = d.add(CHUNK);
            s = s.add(CHUNK);
        }
        remaining -= CHUNK;
    }

    while remaining >= 16 {
        unsafe {
            arch::stream_store_16(d, s);
            d = d.add(16);
            s = s.add(16);
        }
        remaining -= 16;
    }

    while remaining >= 4 {
        unsafe {
            let mut word = [0u8; 4];
            std::ptr::copy_nonoverlapping(s, word.as_mut_ptr(), 4);
            arch::stream_store_4(d, word);
            d = d.add(4);
            s = s.add(4);
        }
        remaining -= 4;
    }

    if remaining > 0 {
        unsafe {
            std::ptr::copy_nonoverlapping(s, d, remaining);
            flush::flush(d, remaining);
        }
    }

    arch::sfence();
}

/// Mirror of `streaming_copy_forward` working from the high end down, used
/// when `dst` overlaps `src` from above (the classic `memmove`-must-copy-
/// backward case).
unsafe fn streaming_copy_backward(dst: *mut u8, src: *const u8, len: usize) {
    let mut d_end = unsafe { dst.add(len) };
    let mut s_end = unsafe { src.add(len) };
    let mut remaining = len;

    let misalign = (d_end as usize) & (CACHE_LINE - 1);
    if misalign != 0 {
        let tail = misalign.min(remaining);
        unsafe {
            d_end = d_end.sub(tail);
            s_end = s_end.sub(tail);
            std::ptr::copy_nonoverlapping(s_end, d_end, tail);
            flush::flush(d_end, tail);
        }
        remaining -= tail;
    }

    while remaining >= CHUNK {
        unsafe {
            d_end = d_end.sub(CHUNK);
            s_end = s_end.sub(CHUNK);
            for i in 0..(CHUNK / 16) {
                arch::stream_store_16(d_end.add(i * 16), s_end.add(i * 16));
            }
        }
        remaining -= CHUNK;
    }

    while remaining >= 16 {
        unsafe {
            d_end = d_end.sub(16);
            s_end = s_end.sub(16);
            arch::stream_store_16(d_end, s_end);
        }
        remaining -= 16;
    }

    while remaining >= 4 {
        unsafe {
            d_end = d_end.sub(4);
            s_end = s_end.sub(4);
            let mut word = [0u8; 4];
            std::ptr::copy_nonoverlapping(s_end, word.as_mut_ptr(), 4);
            arch::stream_store_4(d_end, word);
        }
        remaining -= 4;
    }

    if remaining > 0 {
        unsafe {
            d_end = d_end.sub(remaining);
            s_end = s_end.sub(remaining);
            std::ptr::copy_nonoverlapping(s_end, d_end, remaining);
            flush::flush(d_end, remaining);
        }
    }

    arch::sfence();
}

/// Streaming-store fill, analogous to `streaming_copy_forward` but
/// broadcasting a single byte instead of copying from a source.
unsafe fn streaming_fill(dst: *mut u8, byte: u8, len: usize) {
    let mut d = dst;
    let mut remaining = len;

    let misalign = (d as usize) & (CACHE_LINE - 1);
    if misalign != 0 {
        let head = (CACHE_LINE - misalign).min(remaining);
        unsafe {
            std::ptr::write_bytes(d, byte, head);
            flush::flush(d, head);
            d = d.add(head);
        }
        remaining -= head;
    }

    while remaining >= CHUNK {
        unsafe {
            for i in 0..(CHUNK / 16) {
                arch::stream_fill_16(d.add(i * 16), byte);
            }
            d = d.add(CHUNK);
        }
        remaining -= CHUNK;
    }

    while remaining >= 16 {
        unsafe {
            arch::stream_fill_16(d, byte);
            d = d.add(16);
        }
        remaining -= 16;
    }

    while remaining >= 4 {
        unsafe {
            arch::stream_store_4(d, [byte; 4]);
            d = d.add(4);
        }
        remaining -= 4;
    }

    if remaining > 0 {
        unsafe {
            std::ptr::write_bytes(d, byte, remaining);
            flush::flush(d, remaining);
        }
    }

    arch::sfence();
}
