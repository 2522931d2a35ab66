//! Capability probe (§4.1): at first use, detect which cache-line
//! writeback/invalidate instructions and streaming-store instructions the
//! CPU provides, honour environment overrides, and publish a single
//! immutable `Capabilities` record exactly once.
//!
//! This replaces the original's mutable static function pointers with a
//! tagged record (`FlushKind`, `FenceKind`, `IsPmemKind`) published through
//! a one-shot cell. Dispatch sites match on the tag instead of calling
//! through a pointer — same "no per-call branching on CPU support" intent,
//! no global mutable state.

use crate::arch;
use crate::config::EnvConfig;
use spin::Once;

/// Which cache-line flush instruction `flush()` should issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushKind {
    NoOp,
    Clflush,
    Clflushopt,
    Clwb,
}

/// Which fence `drain()` should issue before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FenceKind {
    Empty,
    Sfence,
}

/// The strategy `is_pmem()` uses absent a lazy `PMEM_IS_PMEM_FORCE`
/// override (§4.5). The force override itself is read lazily and is not
/// part of this eagerly-published record — see `crate::is_pmem::is_pmem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IsPmemKind {
    Never,
    RegistryProbe,
}

/// The process-wide dispatch record, fixed for the process lifetime once
/// published (§3 "Dispatch state").
#[derive(Debug)]
pub(crate) struct Capabilities {
    pub(crate) flush_kind: FlushKind,
    pub(crate) fence_kind: FenceKind,
    pub(crate) is_pmem_kind: IsPmemKind,
    pub(crate) movnt_enabled: bool,
    pub(crate) movnt_threshold: usize,
}

static CAPABILITIES: Once<Capabilities> = Once::new();

/// Returns the process-wide capability record, running the one-shot probe
/// on first call. Concurrent callers observing an in-progress probe block
/// until it publishes (`spin::Once` guarantees this).
pub(crate) fn capabilities() -> &'static Capabilities {
    CAPABILITIES.call_once(probe)
}

fn probe() -> Capabilities {
    let cfg = EnvConfig::read();

    // Most pessimistic defaults first (§4.1).
    let mut flush_kind = FlushKind::Clflush;
    let mut fence_kind = FenceKind::Empty;
    let mut is_pmem_kind = IsPmemKind::Never;

    if arch::has_clflush() {
        is_pmem_kind = IsPmemKind::RegistryProbe;
    } else {
        // No cache-flush instruction at all (e.g. a non-x86_64 target):
        // `arch::clflush` is unreachable there, so the flush path must
        // degrade to a no-op rather than stay at the `Clflush` default.
        flush_kind = FlushKind::NoOp;
        fence_kind = FenceKind::Sfence;
    }
    if arch::has_clflushopt() && !cfg.no_clflushopt {
        flush_kind = FlushKind::Clflushopt;
        fence_kind = FenceKind::Sfence;
    }
    if arch::has_clwb() && !cfg.no_clwb {
        flush_kind = FlushKind::Clwb;
        fence_kind = FenceKind::Sfence;
    }
    if cfg.no_flush {
        flush_kind = FlushKind::NoOp;
        fence_kind = FenceKind::Sfence;
    }

    log::info!(
        "pmemkit capability probe: flush={:?} fence={:?} is_pmem={:?} movnt={} \
         movnt_threshold={}",
        flush_kind,
        fence_kind,
        is_pmem_kind,
        !cfg.no_movnt,
        cfg.movnt_threshold
    );

    Capabilities {
        flush_kind,
        fence_kind,
        is_pmem_kind,
        movnt_enabled: !cfg.no_movnt,
        movnt_threshold: cfg.movnt_threshold,
    }
}
