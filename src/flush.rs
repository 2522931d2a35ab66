//! Public durability primitives: `flush`, `drain`, `persist`, `msync`,
//! `has_hw_drain` (§4.2). Each dereferences the capability record chosen
//! once by the probe; none of them ever touch the registry lock.

use crate::arch;
use crate::capability::{self, FenceKind, FlushKind};
use crate::error::PmemResult;

/// Flush every cache line intersecting `[addr, addr + len)` using the
/// cheapest instruction the CPU supports (§4.1), without fencing.
///
/// A `len` of zero is a no-op. Safe to call repeatedly on overlapping
/// ranges.
///
/// # Safety
/// `[addr, addr + len)` must be a currently-valid, writable mapping.
pub unsafe fn flush(addr: *const u8, len: usize) {
    if len == 0 {
        return;
    }
    let caps = capability::capabilities();
    let start = arch::align_down_cache_line(addr as usize);
    let end = (addr as usize).wrapping_add(len);
    let mut cur = start;
    while cur < end {
        let line = cur as *const u8;
        unsafe {
            match caps.flush_kind {
                FlushKind::NoOp => {}
                FlushKind::Clflush => arch::clflush(line),
                FlushKind::Clflushopt => arch::clflushopt(line),
                FlushKind::Clwb => arch::clwb(line),
            }
        }
        cur += arch::CACHE_LINE_SIZE;
    }
    crate::valgrind::do_flush(addr, len);
}

/// Issue the fence required to order prior flushes/streaming-stores
/// against later stores (§4.2). Always safe, never blocks on anything but
/// the CPU pipeline.
pub fn drain() {
    let caps = capability::capabilities();
    match caps.fence_kind {
        FenceKind::Empty => {}
        FenceKind::Sfence => arch::sfence(),
    }
}

/// `flush(addr, len); drain()`. On return, `[addr, addr + len)` is durable
/// with respect to the CPU persistence domain (but see `deep_flush` for a
/// stronger guarantee on DAX hardware).
///
/// # Safety
/// Same contract as [`flush`].
pub unsafe fn persist(addr: *const u8, len: usize) {
    unsafe { flush(addr, len) };
    drain();
    crate::valgrind::do_persist(addr, len);
}

/// Whether the platform's flush instruction is itself a drain barrier.
/// Always `false` on x86_64: even `CLFLUSH`, which is locally serialising,
/// does not order flushes of *different* lines against each other, so
/// `drain()` is still required after a multi-line `flush()`.
pub fn has_hw_drain() -> bool {
    false
}

/// Page-align `addr` down and extend `len` up to page granularity, then
/// invoke the OS page-cache sync primitive with full-sync semantics.
///
/// # Safety
/// `[addr, addr + len)` must fall within a mapping created by `mmap` (or
/// equivalent); this is required by the underlying `msync(2)` call.
pub unsafe fn msync(addr: *const u8, len: usize) -> PmemResult<()> {
    if len == 0 {
        return Ok(());
    }
    let page = page_size();
    let start = (addr as usize) & !(page - 1);
    let end = (addr as usize).wrapping_add(len);
    let aligned_len = end - start;

    let ret = unsafe { libc::msync(start as *mut libc::c_void, aligned_len, libc::MS_SYNC) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        log::warn!("msync({start:#x}, {aligned_len}) failed: {err}");
        return Err(err.into());
    }
    Ok(())
}

fn page_size() -> usize {
    let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ret <= 0 {
        4096
    } else {
        ret as usize
    }
}
