//! Output destinations for stream assembly.
//!
//! A [`Builder`](crate::Builder) writes through the [`Sink`] trait rather
//! than [`std::io::Write`] so destinations can advertise one extra
//! capability: rewriting bytes that were already emitted. The builder uses
//! that capability to extend the header of the trailing stored block in
//! place when consecutive uncompressed appends arrive, instead of paying a
//! fresh five-byte header per append. Destinations without the capability
//! still produce a correct stream; each append simply opens its own block.

use std::io::{self, Write};

/// Byte destination written by a [`Builder`](crate::Builder).
pub trait Sink {
    /// Appends `data` to the stream.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the underlying destination.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Returns the current stream length when the sink supports rewriting
    /// previously written bytes in place, `None` otherwise.
    ///
    /// A `Some` return enables stored-block packing; the builder records
    /// the offset before emitting a block header it may later extend.
    fn patch_position(&self) -> Option<u64> {
        None
    }

    /// Overwrites previously written bytes starting at `offset`.
    ///
    /// Called only with offsets obtained from [`Sink::patch_position`];
    /// sinks that return `None` there never see this call.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::Unsupported`] unless the sink overrides it.
    fn patch(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let _ = (offset, data);
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    /// Flushes buffered bytes through to the underlying destination.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the underlying destination.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for Vec<u8> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn patch_position(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn patch(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let start = offset as usize;
        self[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Adapter exposing any [`io::Write`] as a streaming, non-patchable [`Sink`].
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
}

impl<W: Write> WriterSink<W> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub(crate) struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_supports_patching() {
        let mut sink = vec![0xAAu8; 4];
        assert_eq!(sink.patch_position(), Some(4));
        Sink::write_all(&mut sink, &[0xBB, 0xCC]).expect("append");
        sink.patch(1, &[0x11, 0x22]).expect("patch");
        assert_eq!(sink, [0xAA, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn writer_sink_rejects_patching() {
        let mut sink = WriterSink::new(Vec::new());
        assert_eq!(sink.patch_position(), None);
        let err = sink.patch(0, &[0]).expect_err("unsupported");
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn counting_writer_tracks_bytes() {
        let mut writer = CountingWriter::new(Vec::new());
        writer.write_all(b"abcdef").expect("write");
        assert_eq!(writer.bytes(), 6);
    }
}
