//! Error types and result handling for pmemkit.
//!
//! Every fallible public operation returns `PmemResult<T>`; there are no
//! hidden integer return codes and no internal retries.

use std::fmt;
use std::io;

/// Result type alias for pmemkit operations.
pub type PmemResult<T> = Result<T, PmemError>;

/// Failure modes surfaced by pmemkit's public operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum PmemError {
    /// A caller-contract violation: most commonly, registering a range
    /// that overlaps an already-tracked mapping.
    InvalidArgument(&'static str),

    /// The registry lock could not be acquired. This should be
    /// unreachable on a healthy system; it exists so a poisoned lock
    /// surfaces as a normal error instead of a panic mid-operation.
    LockContention,

    /// Splitting a tracked entry during `unregister` could not allocate
    /// the remainder(s). The registry is left unchanged.
    AllocationFailure,

    /// An OS-level I/O failure during `msync` or a deep-flush
    /// sysfs write. Wraps the underlying error unchanged.
    OsIoFailure(io::Error),
}

impl PmemError {
    /// Convert to an errno-compatible value, for callers handing an
    /// error back across an FFI boundary.
    pub const fn to_errno(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => 22, // EINVAL
            Self::LockContention => 16,     // EBUSY
            Self::AllocationFailure => 12,  // ENOMEM
            Self::OsIoFailure(_) => 5,      // EIO
        }
    }
}

impl fmt::Display for PmemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::LockContention => write!(f, "registry lock busy"),
            Self::AllocationFailure => write!(f, "allocation failure splitting tracked region"),
            Self::OsIoFailure(e) => write!(f, "OS I/O failure: {e}"),
        }
    }
}

impl std::error::Error for PmemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OsIoFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PmemError {
    fn from(e: io::Error) -> Self {
        Self::OsIoFailure(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_is_stable() {
        assert_eq!(PmemError::InvalidArgument("x").to_errno(), 22);
        assert_eq!(PmemError::LockContention.to_errno(), 16);
        assert_eq!(PmemError::AllocationFailure.to_errno(), 12);
        assert_eq!(
            PmemError::OsIoFailure(io::Error::from(io::ErrorKind::Other)).to_errno(),
            5
        );
    }

    #[test]
    fn display_includes_variant_detail() {
        let err = PmemError::InvalidArgument("overlapping range");
        assert!(err.to_string().contains("overlapping range"));
    }
}
