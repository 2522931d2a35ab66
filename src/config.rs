//! Runtime configuration read once from the environment (§6 of the design).
//!
//! All six `PMEM_*` variables are centralised here rather than scattered
//! through the dispatch logic, so the capability probe has a single place
//! to read from and tests have a single place to override.

/// Default streaming-store threshold in bytes.
pub(crate) const DEFAULT_MOVNT_THRESHOLD: usize = 256;

/// Environment-derived overrides consulted once during capability probing.
///
/// `is_pmem_force` is deliberately *not* a field here: it is read lazily,
/// on first call to `is_pmem`, not at probe time (§4.1 step 7). See
/// [`is_pmem_force`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnvConfig {
    pub(crate) no_clflushopt: bool,
    pub(crate) no_clwb: bool,
    pub(crate) no_flush: bool,
    pub(crate) no_movnt: bool,
    pub(crate) movnt_threshold: usize,
}

impl EnvConfig {
    /// Read every env var this crate recognises, applying the spec's
    /// defaults for anything unset or malformed.
    pub(crate) fn read() -> Self {
        Self {
            no_clflushopt: env_flag("PMEM_NO_CLFLUSHOPT"),
            no_clwb: env_flag("PMEM_NO_CLWB"),
            no_flush: env_flag("PMEM_NO_FLUSH"),
            no_movnt: env_flag("PMEM_NO_MOVNT"),
            movnt_threshold: read_movnt_threshold(),
        }
    }
}

/// An env flag is "set" only when its value is exactly `"1"`, matching the
/// spec's `PMEM_NO_FLUSH == "1"`-style conditions.
fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

fn read_movnt_threshold() -> usize {
    match std::env::var("PMEM_MOVNT_THRESHOLD") {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "PMEM_MOVNT_THRESHOLD={raw:?} is not a valid non-negative integer; \
                     keeping default of {DEFAULT_MOVNT_THRESHOLD}"
                );
                DEFAULT_MOVNT_THRESHOLD
            }
        },
        Err(_) => DEFAULT_MOVNT_THRESHOLD,
    }
}

/// Lazily-read `PMEM_IS_PMEM_FORCE` override. `Some(true)` forces
/// `is_pmem` to always answer true, `Some(false)` to always answer false,
/// `None` leaves the registry-probe path in effect. Any value other than
/// `"0"`/`"1"` is ignored.
pub(crate) fn is_pmem_force() -> Option<bool> {
    match std::env::var("PMEM_IS_PMEM_FORCE").as_deref() {
        Ok("0") => Some(false),
        Ok("1") => Some(true),
        _ => None,
    }
}
