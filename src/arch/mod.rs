//! Architecture dispatch for the handful of CPU-specific primitives this
//! crate needs: CLFLUSH-family cache control and non-temporal stores.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub(crate) use self::x86_64::*;

#[cfg(not(target_arch = "x86_64"))]
mod fallback;
#[cfg(not(target_arch = "x86_64"))]
pub(crate) use fallback::*;
