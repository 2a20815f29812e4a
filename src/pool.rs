//! Process-wide deflater reuse.
//!
//! A deflater carries a sizeable allocation (window, hash chains, scratch
//! buffer), so builders return theirs on a clean finish and later builders
//! at the same level pick it up instead of allocating a new one. One free
//! list per level keeps reacquisition lock-light.

use std::sync::Mutex;

use crate::deflate::Deflater;
use crate::level::CompressionLevel;

const LEVEL_COUNT: usize =
    (CompressionLevel::BEST_COMPRESSION.get() - CompressionLevel::HUFFMAN_ONLY.get() + 1) as usize;

/// Free lists kept per level beyond this size drop returned deflaters.
const MAX_IDLE_PER_LEVEL: usize = 16;

static POOLS: [Mutex<Vec<Deflater>>; LEVEL_COUNT] =
    [const { Mutex::new(Vec::new()) }; LEVEL_COUNT];

fn pool_for(level: CompressionLevel) -> &'static Mutex<Vec<Deflater>> {
    &POOLS[(level.get() - CompressionLevel::HUFFMAN_ONLY.get()) as usize]
}

/// Takes a deflater for `level`, reusing a pooled one when available.
///
/// `level` must have passed validation; builders only reach the compressor
/// once their sticky error slot is clear.
pub(crate) fn acquire(level: CompressionLevel) -> Deflater {
    let pooled = pool_for(level).lock().ok().and_then(|mut pool| pool.pop());
    match pooled {
        Some(mut deflater) => {
            tracing::trace!(level = level.get(), "reusing pooled deflater");
            deflater.reset();
            deflater
        }
        None => Deflater::new(level),
    }
}

/// Returns a deflater to its level's free list.
pub(crate) fn release(level: CompressionLevel, deflater: Deflater) {
    if let Ok(mut pool) = pool_for(level).lock() {
        if pool.len() < MAX_IDLE_PER_LEVEL {
            pool.push(deflater);
        }
    }
}
