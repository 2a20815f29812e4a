//! Stored-block packing and chunking-invariance tests.
//!
//! A builder over a rewritable sink must produce byte-identical output no
//! matter how callers slice their uncompressed appends, because each append
//! extends the trailing stored block in place instead of opening a new one.
//! Streaming sinks cannot be rewritten, so there every append opens its own
//! block; the decoded payload is identical either way.

use std::io::Read;

use flate2::read::GzDecoder;
use gzipbuilder::{Builder, StreamBuilder, DEFAULT_COMPRESSION};
use proptest::prelude::*;

fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .expect("valid gzip stream");
    decoded
}

/// Payload lengths of the stored blocks in a stream that never touched the
/// compressor.
fn stored_block_lens(gzip: &[u8]) -> Vec<usize> {
    let mut lens = Vec::new();
    let mut pos = 10;
    loop {
        let flag = gzip[pos];
        assert_eq!(flag & 0x06, 0, "expected a stored block at offset {pos}");
        let len = usize::from(u16::from_le_bytes([gzip[pos + 1], gzip[pos + 2]]));
        pos += 5 + len;
        if flag & 1 == 1 {
            break;
        }
        lens.push(len);
    }
    lens
}

fn one_shot(payload: &[u8]) -> Vec<u8> {
    let mut builder = Builder::new(DEFAULT_COMPRESSION);
    builder.append_uncompressed(payload);
    builder.bytes().expect("finish").to_vec()
}

#[test]
fn chunked_appends_match_one_shot_append() {
    let payload = vec![b'a'; 128 * 1024];
    let expected = one_shot(&payload);

    let mut builder = Builder::new(DEFAULT_COMPRESSION);
    let mut rest = payload.as_slice();
    let mut state = 0x9E37_79B9u32;
    while !rest.is_empty() {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let take = (usize::try_from(state >> 18).unwrap() % 9000 + 1).min(rest.len());
        builder.append_uncompressed(&rest[..take]);
        rest = &rest[take..];
    }

    assert_eq!(builder.bytes().expect("finish"), expected);
}

#[test]
fn byte_at_a_time_appends_pack_into_one_block() {
    let payload = b"tiny secret payload";
    let expected = one_shot(payload);

    let mut builder = Builder::new(DEFAULT_COMPRESSION);
    for byte in payload {
        builder.append_uncompressed(std::slice::from_ref(byte));
    }
    let bytes = builder.bytes().expect("finish").to_vec();

    assert_eq!(bytes, expected);
    assert_eq!(stored_block_lens(&bytes), [payload.len()]);
}

#[test]
fn packing_respects_the_block_limit() {
    let payload = vec![0x5Au8; 70_000];
    let expected = one_shot(&payload);

    let mut builder = Builder::new(DEFAULT_COMPRESSION);
    builder.append_uncompressed(&payload[..40_000]);
    builder.append_uncompressed(&payload[40_000..]);
    let bytes = builder.bytes().expect("finish").to_vec();

    assert_eq!(bytes, expected);
    assert_eq!(stored_block_lens(&bytes), [65_535, 4_465]);
    assert_eq!(gunzip(&bytes), payload);
}

#[test]
fn appends_after_other_segment_kinds_open_fresh_blocks() {
    // A compressed run in between means the trailing block is no longer
    // extendable; the next uncompressed append must open its own block.
    let mut builder = Builder::new(DEFAULT_COMPRESSION);
    builder.append_uncompressed(b"first");
    builder.append_compressed(b"middle");
    builder.append_uncompressed(b"last");
    assert_eq!(
        gunzip(builder.bytes().expect("finish")),
        b"firstmiddlelast".as_slice()
    );
}

#[test]
fn streaming_sink_emits_one_block_per_append() {
    let mut out = Vec::new();
    let mut builder = StreamBuilder::from_writer(&mut out, DEFAULT_COMPRESSION);
    builder.append_uncompressed(b"abc");
    builder.append_uncompressed(b"def");
    builder.close().expect("close");
    drop(builder);

    assert_eq!(stored_block_lens(&out), [3, 3]);
    assert_eq!(gunzip(&out), b"abcdef".as_slice());
}

proptest! {
    /// Any partition of a payload into consecutive uncompressed appends
    /// produces byte-identical output to appending it whole.
    #[test]
    fn any_partition_matches_one_shot(
        payload in proptest::collection::vec(any::<u8>(), 1..4096),
        cuts in proptest::collection::vec(any::<proptest::sample::Index>(), 0..8),
    ) {
        let mut points: Vec<usize> = cuts.iter().map(|cut| cut.index(payload.len())).collect();
        points.push(0);
        points.push(payload.len());
        points.sort_unstable();
        points.dedup();

        let mut builder = Builder::new(DEFAULT_COMPRESSION);
        for window in points.windows(2) {
            builder.append_uncompressed(&payload[window[0]..window[1]]);
        }

        prop_assert_eq!(builder.bytes().expect("finish"), one_shot(&payload));
    }
}
