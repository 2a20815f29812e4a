//! CRC32 maintenance across spliced segments.
//!
//! Splicing a precompressed segment into a stream must fold the segment's
//! recorded checksum into the running footer CRC without rescanning the
//! segment's payload. [`combine`] does this with the polynomial-matrix
//! construction over GF(2): advancing a CRC over `n` zero bytes is a linear
//! operator, so it can be represented as a 32×32 bit matrix and raised to
//! the `n`-th power by square-and-multiply in `O(log n)` matrix products.
//! The power tables are built in `const` context from the reflected IEEE
//! polynomial, matching the values [`crc32fast`] produces.

/// Reflected IEEE CRC32 polynomial.
const POLY: u32 = 0xEDB8_8320;

/// 32×32 bit matrix over GF(2); `mat[i]` is the column selected by bit `i`
/// of the input vector.
type Matrix = [u32; 32];

const fn matrix_times(mat: &Matrix, mut vec: u32) -> u32 {
    let mut sum = 0;
    let mut i = 0;
    while vec != 0 {
        if vec & 1 != 0 {
            sum ^= mat[i];
        }
        vec >>= 1;
        i += 1;
    }
    sum
}

const fn matrix_square(mat: &Matrix) -> Matrix {
    let mut squared = [0u32; 32];
    let mut i = 0;
    while i < 32 {
        squared[i] = matrix_times(mat, mat[i]);
        i += 1;
    }
    squared
}

const fn shift_table() -> [Matrix; 64] {
    // Operator for a single zero bit.
    let mut one_bit = [0u32; 32];
    one_bit[0] = POLY;
    let mut row = 1u32;
    let mut i = 1;
    while i < 32 {
        one_bit[i] = row;
        row <<= 1;
        i += 1;
    }

    let two_bits = matrix_square(&one_bit);
    let four_bits = matrix_square(&two_bits);

    let mut table = [[0u32; 32]; 64];
    // table[k] advances a CRC over 2^k zero bytes.
    table[0] = matrix_square(&four_bits);
    let mut k = 1;
    while k < 64 {
        table[k] = matrix_square(&table[k - 1]);
        k += 1;
    }
    table
}

static SHIFT_BY_POW2_BYTES: [Matrix; 64] = shift_table();

/// Computes `CRC32(A ‖ B)` from `crc_a = CRC32(A)`, `crc_b = CRC32(B)` and
/// `len_b = |B|` without touching either payload.
pub(crate) fn combine(crc_a: u32, crc_b: u32, len_b: u64) -> u32 {
    if len_b == 0 {
        return crc_a;
    }

    let mut crc = crc_a;
    let mut len = len_b;
    let mut k = 0;
    while len != 0 {
        if len & 1 != 0 {
            crc = matrix_times(&SHIFT_BY_POW2_BYTES[k], crc);
        }
        len >>= 1;
        k += 1;
    }
    crc ^ crc_b
}

/// Continues a running CRC32 over `data`.
pub(crate) fn update(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::{combine, update};

    fn split_matches(data: &[u8], at: usize) {
        let (a, b) = data.split_at(at);
        let combined = combine(crc32fast::hash(a), crc32fast::hash(b), b.len() as u64);
        assert_eq!(combined, crc32fast::hash(data), "split at {at}");
    }

    #[test]
    fn combine_matches_direct_hash() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        for at in [0, 1, 13, 255, 256, 300, 65_535, 65_536, 99_999, 100_000] {
            split_matches(&data, at);
        }
    }

    #[test]
    fn combine_with_empty_tail_is_identity() {
        let crc = crc32fast::hash(b"payload");
        assert_eq!(combine(crc, 0, 0), crc);
    }

    #[test]
    fn update_continues_a_running_crc() {
        let mut crc = 0;
        for chunk in b"incremental checksum".chunks(3) {
            crc = update(crc, chunk);
        }
        assert_eq!(crc, crc32fast::hash(b"incremental checksum"));
    }

    #[test]
    fn combine_is_associative_over_three_parts() {
        let (a, b, c) = (b"first ".as_slice(), b"second ".as_slice(), b"third".as_slice());
        let ab = combine(crc32fast::hash(a), crc32fast::hash(b), b.len() as u64);
        let abc = combine(ab, crc32fast::hash(c), c.len() as u64);
        let whole: Vec<u8> = [a, b, c].concat();
        assert_eq!(abc, crc32fast::hash(&whole));
    }
}
