//! Precompressed segment production.
//!
//! Static content that is transmitted many times can be compressed once and
//! spliced verbatim into any number of streams, amortising the compression
//! cost across transmissions. The producer keeps its output sync-flushed on
//! byte-aligned non-final blocks, so segments concatenate into a valid
//! DEFLATE stream, and records the CRC32 and uncompressed length that a
//! [`Builder`](crate::Builder) folds into the GZIP footer without rescanning
//! the payload.

use std::sync::Arc;

use crate::crc32;
use crate::deflate::Deflater;
use crate::error::BuildError;
use crate::level::CompressionLevel;

/// Immutable DEFLATE segment ready for splicing.
///
/// A segment never contains a final block, so any number of segments can be
/// stitched together before the stream is terminated. Cloning is cheap; the
/// compressed bytes are shared.
#[derive(Clone, Debug)]
pub struct PrecompressedData {
    level: CompressionLevel,
    bytes: Arc<[u8]>,
    size: u64,
    crc: u32,
}

impl PrecompressedData {
    /// Compression level the segment was produced at.
    #[must_use]
    pub const fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Number of payload bytes the segment decodes to.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// CRC32 of the decoded payload.
    #[must_use]
    pub const fn crc(&self) -> u32 {
        self.crc
    }

    /// The segment's raw DEFLATE bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Incrementally compresses data into splice-ready segments.
///
/// Writes feed a private compressor; [`PrecompressedWriter::data`] flushes
/// it and snapshots the output. The writer can be [`reset`](Self::reset) to
/// its post-construction state for pooled reuse.
pub struct PrecompressedWriter {
    level: CompressionLevel,
    buf: Vec<u8>,
    deflater: Option<Deflater>,
    size: u64,
    crc: u32,
    flushed: bool,
    error: Option<BuildError>,
}

impl PrecompressedWriter {
    /// Creates a writer compressing at `level`.
    ///
    /// An out-of-range level is recorded as the sticky error; every later
    /// call surfaces it.
    #[must_use]
    pub fn new(level: i32) -> Self {
        match CompressionLevel::from_numeric(level) {
            Ok(level) => Self {
                level,
                buf: Vec::new(),
                deflater: Some(Deflater::new(level)),
                size: 0,
                crc: 0,
                flushed: false,
                error: None,
            },
            Err(error) => Self {
                level: CompressionLevel::new_unchecked(level),
                buf: Vec::new(),
                deflater: None,
                size: 0,
                crc: 0,
                flushed: false,
                error: Some(error),
            },
        }
    }

    /// Compresses `data` into the pending segment.
    ///
    /// # Errors
    ///
    /// Returns the sticky error, either pre-existing or raised by the
    /// compressor during this write.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BuildError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        self.flushed = false;
        self.size += data.len() as u64;
        self.crc = crc32::update(self.crc, data);

        if let Some(deflater) = self.deflater.as_mut() {
            if let Err(e) = deflater.write(&mut self.buf, data) {
                let error = BuildError::from(e);
                self.error = Some(error.clone());
                return Err(error);
            }
        }
        Ok(())
    }

    /// Returns a segment capturing everything written so far.
    ///
    /// The first call after a write sync-flushes the compressor; repeated
    /// calls are idempotent until the next write re-arms the flush.
    ///
    /// # Errors
    ///
    /// Returns the sticky error, either pre-existing or raised by the
    /// flush.
    pub fn data(&mut self) -> Result<PrecompressedData, BuildError> {
        if self.error.is_none() && !self.flushed {
            if let Some(deflater) = self.deflater.as_mut() {
                if let Err(e) = deflater.flush(&mut self.buf) {
                    self.error = Some(BuildError::from(e));
                }
            }
            self.flushed = true;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        Ok(PrecompressedData {
            level: self.level,
            bytes: Arc::from(self.buf.as_slice()),
            size: self.size,
            crc: self.crc,
        })
    }

    /// Restores the writer to its freshly constructed state for reuse.
    ///
    /// A writer whose construction failed on an invalid level keeps its
    /// sticky error; reset is a no-op there.
    pub fn reset(&mut self) {
        let Some(deflater) = self.deflater.as_mut() else {
            return;
        };
        deflater.reset();
        self.buf.clear();
        self.size = 0;
        self.crc = 0;
        self.flushed = false;
        self.error = None;
    }
}

/// Compresses `data` at `level` into a splice-ready segment.
///
/// # Errors
///
/// Returns [`BuildError::InvalidCompressionLevel`] for an out-of-range
/// level, or any compressor failure.
pub fn precompress(data: &[u8], level: i32) -> Result<PrecompressedData, BuildError> {
    let mut writer = PrecompressedWriter::new(level);
    writer.write(data)?;
    writer.data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::DeflateDecoder;

    use crate::level::DEFAULT_COMPRESSION;
    use crate::stored::FINAL_EMPTY_BLOCK;

    fn inflate_terminated(segment: &PrecompressedData) -> Vec<u8> {
        let mut stream = segment.bytes().to_vec();
        stream.extend_from_slice(&FINAL_EMPTY_BLOCK);
        let mut decoded = Vec::new();
        DeflateDecoder::new(stream.as_slice())
            .read_to_end(&mut decoded)
            .expect("valid spliceable stream");
        decoded
    }

    #[test]
    fn segment_records_crc_and_size() {
        let segment = precompress(b"hello world ", DEFAULT_COMPRESSION).expect("precompress");
        assert_eq!(segment.size(), 12);
        assert_eq!(segment.crc(), crc32fast::hash(b"hello world "));
        assert_eq!(inflate_terminated(&segment), b"hello world ");
    }

    #[test]
    fn data_is_idempotent_between_writes() {
        let mut writer = PrecompressedWriter::new(DEFAULT_COMPRESSION);
        writer.write(b"stable").expect("write");
        let first = writer.data().expect("first snapshot");
        let second = writer.data().expect("second snapshot");
        assert_eq!(first.bytes(), second.bytes());

        writer.write(b" grows").expect("write more");
        let third = writer.data().expect("third snapshot");
        assert!(third.bytes().len() > first.bytes().len());
        assert_eq!(inflate_terminated(&third), b"stable grows");
    }

    #[test]
    fn reset_matches_a_fresh_writer() {
        let mut reused = PrecompressedWriter::new(DEFAULT_COMPRESSION);
        reused.write(b"first use").expect("write");
        reused.data().expect("snapshot");
        reused.reset();
        reused.write(b"second use").expect("write");
        let recycled = reused.data().expect("snapshot");

        let fresh = precompress(b"second use", DEFAULT_COMPRESSION).expect("precompress");
        assert_eq!(recycled.bytes(), fresh.bytes());
        assert_eq!(recycled.crc(), fresh.crc());
        assert_eq!(recycled.size(), fresh.size());
    }

    #[test]
    fn invalid_level_is_sticky_across_reset() {
        let mut writer = PrecompressedWriter::new(99);
        assert!(matches!(
            writer.write(b"ignored"),
            Err(BuildError::InvalidCompressionLevel(99))
        ));
        writer.reset();
        assert!(matches!(
            writer.data(),
            Err(BuildError::InvalidCompressionLevel(99))
        ));
    }

    #[test]
    fn empty_segment_still_carries_its_level() {
        let segment = precompress(b"", crate::level::BEST_COMPRESSION).expect("precompress");
        assert_eq!(segment.size(), 0);
        assert_eq!(segment.level(), CompressionLevel::BEST_COMPRESSION);
    }
}
