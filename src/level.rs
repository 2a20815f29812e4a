//! Compression levels shared by the builder, the precompressed writer and
//! the template engine.
//!
//! Levels mirror zlib's numeric range: `-2` selects Huffman-only encoding,
//! `-1` the library default, `0` disables compression entirely and `1..=9`
//! trade speed for ratio. Constructors throughout the crate accept the raw
//! numeric level so an out-of-range value can be recorded as a sticky
//! [`BuildError::InvalidCompressionLevel`](crate::BuildError) instead of
//! forcing every call site through a fallible conversion first.

use std::fmt;

use flate2::Compression;

use crate::error::BuildError;

/// Numeric level for Huffman-only encoding (no LZ77 matching).
pub const HUFFMAN_ONLY: i32 = CompressionLevel::HUFFMAN_ONLY.get();

/// Numeric level selecting zlib's default speed/ratio trade-off.
pub const DEFAULT_COMPRESSION: i32 = CompressionLevel::DEFAULT.get();

/// Numeric level that emits stored blocks only.
pub const NO_COMPRESSION: i32 = CompressionLevel::NO_COMPRESSION.get();

/// Numeric level favouring throughput.
pub const BEST_SPEED: i32 = CompressionLevel::BEST_SPEED.get();

/// Numeric level favouring ratio.
pub const BEST_COMPRESSION: i32 = CompressionLevel::BEST_COMPRESSION.get();

/// Validated DEFLATE compression level in the closed range `[-2, 9]`.
///
/// Obtained through [`CompressionLevel::from_numeric`]; segments produced by
/// [`PrecompressedWriter`](crate::PrecompressedWriter) carry their level so a
/// builder can refuse segments compressed with different parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CompressionLevel(i32);

impl CompressionLevel {
    /// Huffman-only encoding.
    pub const HUFFMAN_ONLY: Self = Self(-2);
    /// zlib's default trade-off.
    pub const DEFAULT: Self = Self(-1);
    /// Stored blocks only.
    pub const NO_COMPRESSION: Self = Self(0);
    /// Fastest LZ77 matching.
    pub const BEST_SPEED: Self = Self(1);
    /// Densest output.
    pub const BEST_COMPRESSION: Self = Self(9);

    /// Validates a numeric level.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidCompressionLevel`] when `level` falls
    /// outside the inclusive range `[-2, 9]`.
    pub fn from_numeric(level: i32) -> Result<Self, BuildError> {
        if (Self::HUFFMAN_ONLY.0..=Self::BEST_COMPRESSION.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(BuildError::InvalidCompressionLevel(level))
        }
    }

    /// Returns the numeric level.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Wraps a level that has not been range-checked.
    ///
    /// Builders store the requested level verbatim alongside the sticky
    /// validation error, so equality checks against segment levels keep
    /// working even for rejected values.
    pub(crate) const fn new_unchecked(level: i32) -> Self {
        Self(level)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        match level.0 {
            -1 => Compression::default(),
            // flate2 exposes no Huffman-only strategy; the fastest LZ77
            // level is the closest primitive.
            -2 => Compression::fast(),
            n => Compression::new(n as u32),
        }
    }
}
