//! Incremental GZIP/DEFLATE stream assembly.
//!
//! # Overview
//!
//! [`Builder`] assembles a single RFC 1952 member (or, in raw mode, a bare
//! RFC 1951 stream) from any interleaving of three segment kinds:
//! compressed appends fed through the DEFLATE primitive, uncompressed
//! appends framed as stored blocks, and precompressed segments spliced in
//! verbatim. The builder tracks the running CRC32 and uncompressed length
//! for the GZIP footer across all three, folding spliced segments in with
//! the checksum combiner instead of rescanning them.
//!
//! # Design
//!
//! The builder is a small state machine keyed on the kind of the last
//! segment written. Transitions decide when the compressor is flushed
//! (before anything that must land on a byte-aligned block boundary),
//! reset (re-entering a compressed run after foreign bytes, so the LZ77
//! window cannot reference data the decoder never saw from this stream)
//! and closed (at finalisation). Errors are sticky: the first failure is
//! latched and every later operation becomes a no-op, so callers check
//! once at the end rather than after every append.
//!
//! # Examples
//!
//! ```
//! use gzipbuilder::{precompress, Builder, DEFAULT_COMPRESSION};
//!
//! # fn main() -> Result<(), gzipbuilder::BuildError> {
//! let banner = precompress(b"hello ", DEFAULT_COMPRESSION)?;
//!
//! let mut builder = Builder::new(DEFAULT_COMPRESSION);
//! builder.append_precompressed(&banner);
//! builder.append_uncompressed(b"secret");
//! builder.append_compressed(b" and the rest of the page");
//! let gzip = builder.bytes()?;
//! assert_eq!(gzip[..2], [0x1F, 0x8B]);
//! # Ok(())
//! # }
//! ```

use std::io::{self, BufWriter, Write};

use crate::crc32;
use crate::deflate::Deflater;
use crate::error::BuildError;
use crate::level::CompressionLevel;
use crate::pool;
use crate::precompressed::PrecompressedData;
use crate::sink::{Sink, WriterSink};
use crate::stored;

/// Kind of the segment most recently written to the sink.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Segment {
    Start,
    Header,
    Precompressed,
    Compressed,
    Uncompressed,
    Finished,
}

/// Incrementally assembles a single GZIP (or raw DEFLATE) byte stream.
///
/// Compressed, uncompressed and precompressed appends may be interleaved
/// freely; the builder keeps the emitted DEFLATE bitstream valid across
/// every transition. `Builder::new` accumulates into an internal buffer
/// that supports stored-block packing; [`Builder::over_sink`] accepts any
/// [`Sink`], and [`StreamBuilder`] adapts a plain [`io::Write`].
pub struct Builder<S: Sink = Vec<u8>> {
    level: CompressionLevel,
    raw_deflate: bool,
    last: Segment,
    sink: S,
    deflate: Option<Deflater>,
    crc: u32,
    size: u32,
    uncomp_header_pos: u64,
    uncomp_block_len: u16,
    error: Option<BuildError>,
}

impl Builder<Vec<u8>> {
    /// Creates a builder accumulating into an internal buffer.
    ///
    /// The buffer supports rewriting emitted bytes, so consecutive
    /// uncompressed appends are packed into shared stored blocks. An
    /// out-of-range `level` is recorded as the sticky error.
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self::over_sink(Vec::new(), level)
    }

    /// Finalises the stream (once) and returns the accumulated bytes.
    ///
    /// Repeated calls return the identical byte sequence.
    ///
    /// # Errors
    ///
    /// Returns the sticky error if one was recorded at any point while
    /// building; no bytes are returned in that case.
    pub fn bytes(&mut self) -> Result<&[u8], BuildError> {
        self.finish()?;
        Ok(&self.sink)
    }

    /// Finalises the stream and returns the accumulated bytes.
    ///
    /// # Panics
    ///
    /// Panics with the sticky error if one was recorded while building.
    pub fn bytes_or_panic(&mut self) -> &[u8] {
        match self.finish() {
            Ok(()) => &self.sink,
            Err(error) => panic!("{error}"),
        }
    }
}

impl<S: Sink> Builder<S> {
    /// Creates a builder writing to `sink`.
    ///
    /// Stored-block packing is enabled exactly when the sink reports a
    /// patch position. An out-of-range `level` is recorded as the sticky
    /// error.
    pub fn over_sink(sink: S, level: i32) -> Self {
        let error = CompressionLevel::from_numeric(level).err();
        Self {
            level: CompressionLevel::new_unchecked(level),
            raw_deflate: false,
            last: Segment::Start,
            sink,
            deflate: None,
            crc: 0,
            size: 0,
            uncomp_header_pos: 0,
            uncomp_block_len: 0,
            error,
        }
    }

    /// Switches the builder to emit a bare RFC 1951 stream: no GZIP
    /// header, footer, CRC32 or length accounting.
    ///
    /// Legal only before anything has been written; afterwards the sticky
    /// [`BuildError::OptionAfterWrite`] error is recorded.
    pub fn raw_deflate(&mut self) {
        if !self.can_set_option() {
            return;
        }
        self.raw_deflate = true;
    }

    /// Returns the first error recorded while building, if any.
    #[must_use]
    pub fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    /// Compresses `data` and appends it to the stream.
    ///
    /// Compressed appends leak payload redundancy through the output
    /// length, so they are vulnerable to compression-ratio side channels
    /// such as BREACH when they carry secrets; route secrets through
    /// [`append_uncompressed`](Self::append_uncompressed) instead.
    pub fn append_compressed(&mut self, data: &[u8]) {
        self.write_header();
        if !self.can_write() || data.is_empty() {
            return;
        }

        if self.deflate.is_none() {
            self.deflate = Some(pool::acquire(self.level));
        } else if self.last != Segment::Compressed {
            if let Some(deflater) = self.deflate.as_mut() {
                deflater.reset();
            }
        }
        self.last = Segment::Compressed;

        if !self.raw_deflate {
            self.size = self.size.wrapping_add(data.len() as u32);
            self.crc = crc32::update(self.crc, data);
        }

        if let Some(deflater) = self.deflate.as_mut() {
            if let Err(e) = deflater.write(&mut self.sink, data) {
                self.error = Some(e.into());
            }
        }
    }

    /// Appends `data` verbatim as stored blocks, bypassing the compressor.
    ///
    /// Stored blocks keep the output length independent of any redundancy
    /// between the payload and the rest of the stream, making this the
    /// channel for secrets such as session cookies that must not be exposed
    /// to attacks like BREACH.
    pub fn append_uncompressed(&mut self, data: &[u8]) {
        self.write_header();
        if !self.can_write() || data.is_empty() || !self.flush_compressed() {
            return;
        }

        if !self.raw_deflate {
            self.size = self.size.wrapping_add(data.len() as u32);
            self.crc = crc32::update(self.crc, data);
        }

        let mut data = data;
        if self.last == Segment::Uncompressed {
            data = self.pack_uncompressed(data);
            if data.is_empty() {
                return;
            }
        }
        self.last = Segment::Uncompressed;

        while data.len() > stored::MAX_STORED {
            self.write_stored_block(&data[..stored::MAX_STORED]);
            if self.error.is_some() {
                return;
            }
            data = &data[stored::MAX_STORED..];
        }

        if let Some(position) = self.sink.patch_position() {
            self.uncomp_header_pos = position;
            self.uncomp_block_len = data.len() as u16;
        }
        self.write_stored_block(data);
    }

    /// Splices a segment produced by
    /// [`PrecompressedWriter`](crate::PrecompressedWriter) into the stream
    /// without recompressing it.
    ///
    /// The segment must have been produced at the builder's compression
    /// level; a mismatch records the sticky
    /// [`BuildError::LevelMismatch`] error even for empty segments.
    pub fn append_precompressed(&mut self, data: &PrecompressedData) {
        self.write_header();
        if !self.can_write() {
            return;
        }
        if self.level != data.level() {
            self.error = Some(BuildError::LevelMismatch);
            return;
        }
        // Size is checked after the level so a mismatch surfaces no matter
        // how small the segment is.
        if data.size() == 0 || !self.flush_compressed() {
            return;
        }
        self.last = Segment::Precompressed;

        if !self.raw_deflate {
            self.size = self.size.wrapping_add(data.size() as u32);
            self.crc = crc32::combine(self.crc, data.crc(), data.size());
        }

        if let Err(e) = self.sink.write_all(data.bytes()) {
            self.error = Some(e.into());
        }
    }

    /// Returns an [`io::Write`] adapter forwarding every chunk to
    /// [`append_compressed`](Self::append_compressed).
    pub fn compressed_writer(&mut self) -> CompressedWriter<'_, S> {
        CompressedWriter { builder: self }
    }

    /// Returns an [`io::Write`] adapter forwarding every chunk to
    /// [`append_uncompressed`](Self::append_uncompressed).
    pub fn uncompressed_writer(&mut self) -> UncompressedWriter<'_, S> {
        UncompressedWriter { builder: self }
    }

    /// Terminates the DEFLATE stream and, outside raw mode, writes the
    /// GZIP footer.
    ///
    /// A builder that has written nothing still produces a valid empty
    /// stream: header, empty final block, footer. Finishing is idempotent;
    /// once the builder is finished further calls only report the sticky
    /// state.
    ///
    /// # Errors
    ///
    /// Returns the sticky error. The builder reaches its finished state
    /// only on a clean close; after a failure it stays unfinished with the
    /// error latched.
    pub fn finish(&mut self) -> Result<(), BuildError> {
        if self.last == Segment::Finished {
            return self.sticky_state();
        }
        if self.error.is_some() {
            return self.sticky_state();
        }

        match self.last {
            Segment::Compressed => {
                if let Some(deflater) = self.deflate.as_mut() {
                    if let Err(e) = deflater.finish(&mut self.sink) {
                        self.error = Some(e.into());
                    }
                }
            }
            Segment::Start => {
                self.write_header();
                self.write_terminator();
            }
            _ => self.write_terminator(),
        }

        if self.error.is_none() && !self.raw_deflate {
            let mut footer = [0u8; 8];
            footer[..4].copy_from_slice(&self.crc.to_le_bytes());
            footer[4..].copy_from_slice(&self.size.to_le_bytes());
            if let Err(e) = self.sink.write_all(&footer) {
                self.error = Some(e.into());
            }
        }

        if self.error.is_some() {
            // The compressor state is unusable after a failed close; it is
            // dropped rather than pooled.
            self.deflate = None;
            return self.sticky_state();
        }

        self.last = Segment::Finished;
        if let Some(deflater) = self.deflate.take() {
            pool::release(self.level, deflater);
        }
        tracing::trace!(
            isize = self.size,
            crc = self.crc,
            raw = self.raw_deflate,
            "stream finished"
        );
        Ok(())
    }

    fn sticky_state(&self) -> Result<(), BuildError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn can_set_option(&mut self) -> bool {
        if self.last != Segment::Start && self.error.is_none() {
            self.error = Some(BuildError::OptionAfterWrite);
        }
        self.error.is_none()
    }

    fn can_write(&mut self) -> bool {
        if self.last == Segment::Finished && self.error.is_none() {
            self.error = Some(BuildError::ModifyAfterFinish);
        }
        self.error.is_none()
    }

    fn write_header(&mut self) {
        if self.error.is_some() || self.last != Segment::Start {
            return;
        }
        self.last = Segment::Header;
        if self.raw_deflate {
            return;
        }

        let mut header = [0u8; 10];
        header[0] = 0x1F;
        header[1] = 0x8B;
        header[2] = 8; // CM: deflate
        header[8] = match self.level {
            CompressionLevel::BEST_COMPRESSION => 2,
            CompressionLevel::BEST_SPEED => 4,
            _ => 0,
        };
        header[9] = 255; // unknown OS

        if let Err(e) = self.sink.write_all(&header) {
            self.error = Some(e.into());
        }
    }

    /// Byte-aligns a live compressed run so foreign blocks can follow.
    fn flush_compressed(&mut self) -> bool {
        if self.last == Segment::Compressed {
            if let Some(deflater) = self.deflate.as_mut() {
                if let Err(e) = deflater.flush(&mut self.sink) {
                    self.error = Some(e.into());
                }
            }
        }
        self.error.is_none()
    }

    /// Extends the trailing stored block in place, returning whatever part
    /// of `data` did not fit.
    fn pack_uncompressed<'d>(&mut self, data: &'d [u8]) -> &'d [u8] {
        if self.sink.patch_position().is_none() || self.uncomp_block_len == u16::MAX {
            return data;
        }

        let room = usize::from(u16::MAX - self.uncomp_block_len);
        let take = room.min(data.len());
        self.uncomp_block_len += take as u16;

        let header = stored::header(self.uncomp_block_len);
        let result = self
            .sink
            .patch(self.uncomp_header_pos, &header)
            .and_then(|()| self.sink.write_all(&data[..take]));
        if let Err(e) = result {
            self.error = Some(e.into());
            return &[];
        }
        &data[take..]
    }

    fn write_stored_block(&mut self, payload: &[u8]) {
        let header = stored::header(payload.len() as u16);
        let result = self
            .sink
            .write_all(&header)
            .and_then(|()| self.sink.write_all(payload));
        if let Err(e) = result {
            self.error = Some(e.into());
        }
    }

    fn write_terminator(&mut self) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.sink.write_all(&stored::FINAL_EMPTY_BLOCK) {
            self.error = Some(e.into());
        }
    }
}

/// Builder variant that streams into a buffered [`io::Write`] destination.
///
/// Streaming sinks cannot be rewritten in place, so stored-block packing is
/// disabled; each uncompressed append emits its own block or blocks. The
/// decoded payload is identical either way.
pub type StreamBuilder<W> = Builder<WriterSink<BufWriter<W>>>;

impl<W: Write> Builder<WriterSink<BufWriter<W>>> {
    /// Creates a builder streaming into `writer` through an internal
    /// buffer.
    pub fn from_writer(writer: W, level: i32) -> Self {
        Builder::over_sink(WriterSink::new(BufWriter::new(writer)), level)
    }

    /// Finishes the stream and flushes buffered output to the underlying
    /// writer, which is left open.
    ///
    /// Idempotent: repeated calls report the sticky state.
    ///
    /// # Errors
    ///
    /// Returns the sticky error if one was recorded while building or
    /// while flushing.
    pub fn close(&mut self) -> Result<(), BuildError> {
        self.finish()?;
        if let Err(e) = self.sink.flush() {
            let error = BuildError::from(e);
            self.error = Some(error.clone());
            return Err(error);
        }
        Ok(())
    }

    /// Consumes the builder and returns the underlying writer.
    ///
    /// Buffered output that was never flushed by [`close`](Self::close) is
    /// discarded.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.sink.into_inner().into_parts().0
    }
}

/// Adapter streaming chunks into [`Builder::append_compressed`].
///
/// Every chunk reports its full length as consumed; failures land in the
/// builder's sticky error slot and surface from
/// [`Builder::error`] or [`Builder::bytes`].
pub struct CompressedWriter<'a, S: Sink> {
    builder: &'a mut Builder<S>,
}

impl<S: Sink> Write for CompressedWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.builder.append_compressed(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapter streaming chunks into [`Builder::append_uncompressed`].
///
/// Every chunk reports its full length as consumed; failures land in the
/// builder's sticky error slot and surface from
/// [`Builder::error`] or [`Builder::bytes`].
pub struct UncompressedWriter<'a, S: Sink> {
    builder: &'a mut Builder<S>,
}

impl<S: Sink> Write for UncompressedWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.builder.append_uncompressed(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
