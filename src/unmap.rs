//! Unmap (§4.7): tear down a mapping created through this crate's mapping
//! helpers. Registry removal happens before the OS call, so a concurrent
//! `is_pmem` or `deep_flush` can never observe an address range that's
//! still marked tracked after the underlying memory has been handed back
//! to the kernel.

use std::os::raw::c_void;

use crate::error::PmemResult;
use crate::registry;

/// Unregister `[addr, addr + len)` (a no-op if it was never tracked) and
/// `munmap` it.
///
/// # Safety
/// `[addr, addr + len)` must be exactly a mapping previously created by
/// `mmap` (whole mapping, not a sub-range) and not already unmapped;
/// `addr` must be page-aligned, per `munmap(2)`.
pub unsafe fn unmap(addr: *mut u8, len: usize) -> PmemResult<()> {
    registry::map_range_unregister(addr, len)?;

    let ret = unsafe { libc::munmap(addr as *mut c_void, len) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        log::warn!("munmap({:#x}, {len}) failed: {err}", addr as usize);
        return Err(err.into());
    }
    Ok(())
}
