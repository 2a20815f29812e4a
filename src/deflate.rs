//! Drive loop around the raw DEFLATE primitive.

use std::io;

use flate2::{Compress, FlushCompress, Status};

use crate::level::CompressionLevel;
use crate::sink::Sink;

/// Scratch output capacity for each compressor pass.
const OUT_CHUNK: usize = 8 * 1024;

/// Raw-deflate compressor decoupled from any particular destination.
///
/// Output produced by each pass is forwarded to the sink the caller passes
/// in, so one compressor can serve a builder whose sink it does not own.
/// The compressor keeps its LZ77 window between calls; [`Deflater::reset`]
/// clears it so a re-entered compressed run cannot back-reference bytes
/// that are not part of its own output.
pub(crate) struct Deflater {
    compress: Compress,
    buf: Vec<u8>,
}

impl Deflater {
    pub(crate) fn new(level: CompressionLevel) -> Self {
        Self {
            // false: raw deflate, no zlib header or checksum.
            compress: Compress::new(level.into(), false),
            buf: vec![0u8; OUT_CHUNK],
        }
    }

    /// Feeds `input` to the compressor without flushing.
    pub(crate) fn write<S: Sink>(&mut self, sink: &mut S, mut input: &[u8]) -> io::Result<()> {
        while !input.is_empty() {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();

            self.compress
                .compress(input, &mut self.buf, FlushCompress::None)
                .map_err(|e| io::Error::other(e.to_string()))?;

            let consumed = (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;

            sink.write_all(&self.buf[..produced])?;
            input = &input[consumed..];

            if consumed == 0 && produced < self.buf.len() {
                break;
            }
        }
        Ok(())
    }

    /// Byte-aligns the stream with an empty non-final stored block, leaving
    /// it open for further input or for spliced-in blocks.
    pub(crate) fn flush<S: Sink>(&mut self, sink: &mut S) -> io::Result<()> {
        loop {
            let before_out = self.compress.total_out();

            let status = self
                .compress
                .compress(&[], &mut self.buf, FlushCompress::Sync)
                .map_err(|e| io::Error::other(e.to_string()))?;

            let produced = (self.compress.total_out() - before_out) as usize;
            sink.write_all(&self.buf[..produced])?;

            match status {
                Status::Ok if produced == self.buf.len() => {}
                _ => return Ok(()),
            }
        }
    }

    /// Terminates the stream with a final block.
    pub(crate) fn finish<S: Sink>(&mut self, sink: &mut S) -> io::Result<()> {
        loop {
            let before_out = self.compress.total_out();

            let status = self
                .compress
                .compress(&[], &mut self.buf, FlushCompress::Finish)
                .map_err(|e| io::Error::other(e.to_string()))?;

            let produced = (self.compress.total_out() - before_out) as usize;
            sink.write_all(&self.buf[..produced])?;

            match status {
                Status::StreamEnd => return Ok(()),
                Status::BufError if produced == 0 => {
                    return Err(io::Error::other("deflate stream stalled before completion"));
                }
                _ => {}
            }
        }
    }

    /// Clears the compressor's window and dictionary for a fresh stream.
    pub(crate) fn reset(&mut self) {
        self.compress.reset();
    }
}
