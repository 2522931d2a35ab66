//! Shared test-only helpers: a RAII anonymous mapping so unit tests across
//! modules can exercise `msync`/`flush`/transfer code against a real
//! `mmap`-backed range instead of ordinary heap memory (msync's behaviour
//! on non-mmap'd memory is unspecified by POSIX).

#![cfg(test)]

use std::ptr::NonNull;

pub(crate) struct AnonMap {
    ptr: NonNull<u8>,
    len: usize,
}

impl AnonMap {
    /// Map `len` bytes (rounded up to a whole page) of zeroed, anonymous,
    /// read-write memory.
    pub(crate) fn new(len: usize) -> Self {
        let len = len.max(1);
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(addr, libc::MAP_FAILED, "mmap failed in test helper");
        Self {
            ptr: NonNull::new(addr as *mut u8).unwrap(),
            len,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AnonMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}
