//! x86_64 capability queries and cache/streaming-store primitives.

mod cpuid;
mod intrinsics;

pub(crate) use cpuid::{has_clflush, has_clflushopt, has_clwb};
pub(crate) use intrinsics::{
    align_down_cache_line, clflush, clflushopt, clwb, sfence, stream_fill_16, stream_store_16,
    stream_store_4, CACHE_LINE_SIZE, STREAM_CHUNK,
};
