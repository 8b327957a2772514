//! This module contains the kernels for the byte-oriented run-length codec used
//! by boolean and present streams, and the bit packing that feeds it.
//!
//! Booleans are packed LSB-first into bytes, then the bytes are compressed with
//! ORC-style byte RLE. Each group starts with a control byte:
//! - `control < 0x80`: a run of `control + 3` copies of the single byte that follows.
//! - `control >= 0x80`: `256 - control` literal bytes follow.

use bitvec::prelude::*;
use std::io::Cursor;

use crate::error::VtileError;
use crate::utils::{read_u8, take_bytes};

const MIN_REPEAT: usize = 3;
const MAX_REPEAT: usize = 127 + MIN_REPEAT;
const MAX_LITERALS: usize = 128;

//==================================================================================
// 1. Byte RLE
//==================================================================================

/// Length of the run of identical bytes starting at `pos`, capped at `cap`.
fn run_length_at(data: &[u8], pos: usize, cap: usize) -> usize {
    let value = data[pos];
    data[pos..]
        .iter()
        .take(cap)
        .take_while(|&&b| b == value)
        .count()
}

pub fn encode(data: &[u8], output_buf: &mut Vec<u8>) {
    let mut pos = 0;
    while pos < data.len() {
        let repeat = run_length_at(data, pos, MAX_REPEAT);
        if repeat >= MIN_REPEAT {
            output_buf.push((repeat - MIN_REPEAT) as u8);
            output_buf.push(data[pos]);
            pos += repeat;
            continue;
        }

        // Collect literals until a repeat worth encoding starts.
        let start = pos;
        while pos < data.len()
            && pos - start < MAX_LITERALS
            && run_length_at(data, pos, MIN_REPEAT) < MIN_REPEAT
        {
            pos += 1;
        }
        let literal_count = pos - start;
        output_buf.push((256 - literal_count) as u8);
        output_buf.extend_from_slice(&data[start..pos]);
    }
}

/// Decodes exactly `num_bytes` bytes, reading control groups from the cursor.
pub fn decode(cursor: &mut Cursor<&[u8]>, num_bytes: usize) -> Result<Vec<u8>, VtileError> {
    let mut values = Vec::with_capacity(num_bytes.min(crate::utils::MAX_DECODED_VALUES));
    while values.len() < num_bytes {
        let control = read_u8(cursor)?;
        if control < 0x80 {
            let count = control as usize + MIN_REPEAT;
            let value = read_u8(cursor)?;
            values.extend(std::iter::repeat(value).take(count));
        } else {
            let count = 256 - control as usize;
            values.extend_from_slice(take_bytes(cursor, count)?);
        }
    }
    if values.len() != num_bytes {
        return Err(VtileError::RleDecodeError(format!(
            "byte RLE group overruns the declared {} bytes",
            num_bytes
        )));
    }
    Ok(values)
}

//==================================================================================
// 2. Boolean Bit Packing
//==================================================================================

/// Packs booleans LSB-first into `ceil(n / 8)` bytes.
pub fn pack_bools(values: &[bool]) -> Vec<u8> {
    let mut bits: BitVec<u8, Lsb0> = BitVec::repeat(false, values.len());
    for (i, &value) in values.iter().enumerate() {
        bits.set(i, value);
    }
    bits.into_vec()
}

/// Unpacks the first `num_values` bits of `bytes`.
pub fn unpack_bools(bytes: &[u8], num_values: usize) -> Result<BitVec<u8, Lsb0>, VtileError> {
    let bits = bytes.view_bits::<Lsb0>();
    if bits.len() < num_values {
        return Err(VtileError::RleDecodeError(format!(
            "bitmap holds {} bits, {} required",
            bits.len(),
            num_values
        )));
    }
    Ok(bits[..num_values].to_bitvec())
}

/// Packs and byte-RLE encodes a boolean sequence.
pub fn encode_bools(values: &[bool]) -> Vec<u8> {
    let mut out = Vec::new();
    encode(&pack_bools(values), &mut out);
    out
}

/// Reads a boolean sequence of `num_values` bits from the cursor.
pub fn decode_bools(
    cursor: &mut Cursor<&[u8]>,
    num_values: usize,
) -> Result<BitVec<u8, Lsb0>, VtileError> {
    let bytes = decode(cursor, num_values.div_ceil(8))?;
    unpack_bools(&bytes, num_values)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::new();
        encode(data, &mut encoded);
        let mut cursor = Cursor::new(encoded.as_slice());
        let decoded = decode(&mut cursor, data.len()).unwrap();
        assert_eq!(cursor.position() as usize, encoded.len());
        decoded
    }

    #[test]
    fn test_known_layout() {
        let mut encoded = Vec::new();
        encode(b"AAAA BBB", &mut encoded);
        assert_eq!(encoded, vec![0x01, b'A', 0xFF, b' ', 0x00, b'B']);
    }

    #[test]
    fn test_byte_rle_roundtrips() {
        assert_eq!(roundtrip(&[]), Vec::<u8>::new());
        assert_eq!(roundtrip(&[7]), vec![7]);
        let long_run = vec![0xAAu8; 1000];
        assert_eq!(roundtrip(&long_run), long_run);
        let literals: Vec<u8> = (0..=255).collect();
        assert_eq!(roundtrip(&literals), literals);
        let mixed: Vec<u8> = [1, 2, 2, 3, 3, 3, 3, 4, 5, 5].to_vec();
        assert_eq!(roundtrip(&mixed), mixed);
    }

    #[test]
    fn test_byte_rle_random_roundtrip() {
        use rand::Rng;
        let mut rng = rand::rng();
        let data: Vec<u8> = (0..5000).map(|_| rng.random_range(0..3)).collect();
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_truncated_input() {
        let mut cursor = Cursor::new(&[0xFCu8, 1, 2][..]);
        assert!(matches!(decode(&mut cursor, 4), Err(VtileError::Truncated { .. })));
    }

    #[test]
    fn test_bools_lsb_first() {
        let bools = [true, false, true, true, false, false, false, false, true];
        assert_eq!(pack_bools(&bools), vec![0b0000_1101, 0b0000_0001]);

        let encoded = encode_bools(&bools);
        let mut cursor = Cursor::new(encoded.as_slice());
        let decoded = decode_bools(&mut cursor, bools.len()).unwrap();
        assert_eq!(decoded.iter().by_vals().collect::<Vec<_>>(), bools.to_vec());
        assert_eq!(decoded.count_ones(), 4);
    }
}
