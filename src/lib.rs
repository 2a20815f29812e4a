#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `gzipbuilder` incrementally assembles a single GZIP (RFC 1952) byte
//! stream, or optionally a bare DEFLATE (RFC 1951) stream, from three
//! kinds of input segments: data compressed on the fly, data embedded
//! verbatim in stored blocks, and data compressed ahead of time that is
//! spliced in without touching the compressor again.
//!
//! Mixing the three kinds serves two purposes. Uncompressed segments keep
//! secrets (session cookies, CSRF tokens) out of the compressor so their
//! content cannot be probed through compression-ratio side channels such as
//! BREACH. Precompressed segments amortise the compression of static
//! content across every response that includes it.
//!
//! # Design
//!
//! [`Builder`] owns the output sink and a state machine over the last
//! segment kind; it flushes, resets and closes the DEFLATE primitive at
//! exactly the transitions that keep the concatenated bitstream valid, and
//! maintains the footer CRC32/length incrementally; spliced segments are
//! folded in with an `O(log n)` checksum combiner rather than rescanned.
//! [`PrecompressedWriter`] produces the splice-ready segments; its output
//! always ends on a byte-aligned non-final block. [`Template`] builds on
//! the same machinery for placeholder substitution into precompressed page
//! shells.
//!
//! Compressors are pooled per level across the process; a builder acquires
//! one on its first compressed append and returns it when the stream
//! finishes cleanly.
//!
//! # Invariants
//!
//! - Finalised non-raw output is exactly one GZIP member whose footer
//!   matches the concatenated payload.
//! - The emitted DEFLATE stream contains exactly one final block.
//! - Consecutive uncompressed appends produce byte-identical output to one
//!   combined append when the sink supports in-place rewriting.
//! - Errors are sticky: after the first failure every operation is a no-op
//!   and the error is reported from [`Builder::error`] and
//!   [`Builder::bytes`].
//!
//! # Errors
//!
//! Fallible operations return [`BuildError`]; builders additionally latch
//! the first error instead of surfacing it from every append. Underlying
//! sink and compressor failures are wrapped as [`std::io::Error`] values
//! and propagated unchanged.
//!
//! # Examples
//!
//! Assemble a response around a secret that must not be compressed:
//!
//! ```
//! use gzipbuilder::{precompress, Builder, DEFAULT_COMPRESSION};
//!
//! # fn main() -> Result<(), gzipbuilder::BuildError> {
//! let shell = precompress(b"<html><body>", DEFAULT_COMPRESSION)?;
//!
//! let mut builder = Builder::new(DEFAULT_COMPRESSION);
//! builder.append_precompressed(&shell);
//! builder.append_uncompressed(b"session=7f3a...");
//! builder.append_compressed(b"</body></html>");
//! let gzip = builder.bytes()?.to_vec();
//! # let _ = gzip;
//! # Ok(())
//! # }
//! ```
//!
//! Stream into any writer instead of an internal buffer:
//!
//! ```
//! use gzipbuilder::{StreamBuilder, BEST_SPEED};
//!
//! # fn main() -> Result<(), gzipbuilder::BuildError> {
//! let mut out = Vec::new();
//! let mut builder = StreamBuilder::from_writer(&mut out, BEST_SPEED);
//! builder.append_compressed(b"bulk payload");
//! builder.close()?;
//! drop(builder);
//! assert_eq!(out[..2], [0x1F, 0x8B]);
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod crc32;
mod deflate;
pub mod error;
pub mod level;
mod pool;
pub mod precompressed;
pub mod sink;
mod stored;
pub mod template;

pub use builder::{Builder, CompressedWriter, StreamBuilder, UncompressedWriter};
pub use error::BuildError;
pub use level::{
    CompressionLevel, BEST_COMPRESSION, BEST_SPEED, DEFAULT_COMPRESSION, HUFFMAN_ONLY,
    NO_COMPRESSION,
};
pub use precompressed::{precompress, PrecompressedData, PrecompressedWriter};
pub use sink::{Sink, WriterSink};
pub use template::{Template, TemplateError};
