//! DEFLATE stored-block framing.
//!
//! Stored (type-0) blocks carry literal bytes behind a five-byte header:
//! one flag byte (`BFINAL` in bit 0, `BTYPE=00`), then `LEN` and `!LEN` as
//! little-endian 16-bit words. They are the vehicle for payload that must
//! not pass through the compressor.

use std::io::{self, Write};

/// Largest payload a single stored block can carry.
pub(crate) const MAX_STORED: usize = u16::MAX as usize;

/// Zero-length stored block with the final-block flag set.
///
/// Terminates a stream whose last block did not come from the compressor's
/// own `finish`.
pub(crate) const FINAL_EMPTY_BLOCK: [u8; 5] = [0x01, 0x00, 0x00, 0xFF, 0xFF];

/// Header for a non-final stored block of `len` payload bytes.
pub(crate) fn header(len: u16) -> [u8; 5] {
    let nlen = !len;
    [
        0x00,
        len as u8,
        (len >> 8) as u8,
        nlen as u8,
        (nlen >> 8) as u8,
    ]
}

/// Writer that frames every chunk it receives as stored blocks, splitting
/// chunks larger than [`MAX_STORED`].
pub(crate) struct StoredBlockWriter<'a, W: Write> {
    inner: &'a mut W,
}

impl<'a, W: Write> StoredBlockWriter<'a, W> {
    pub(crate) fn new(inner: &'a mut W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for StoredBlockWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.chunks(MAX_STORED) {
            self.inner.write_all(&header(chunk.len() as u16))?;
            self.inner.write_all(chunk)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
