//! This module contains the kernels for the FAST_PFOR physical technique: a
//! patched frame-of-reference block codec over 32-bit words, composed with a
//! variable-byte codec for the tail that does not fill a whole block.
//!
//! Layout of the word stream:
//! - Word 0: the number of values covered by the block codec (a multiple of 256).
//! - One page per run of up to 65 536 values. A page is a `where_meta` word
//!   (offset from itself to the page metadata), the bit-packed blocks, then the
//!   metadata: the byte container length, the byte container itself (per block:
//!   bit width, exception count and, with exceptions, the exception bit width
//!   followed by one position byte per exception) packed little-endian into
//!   words, a bitmap of used exception widths, and for each width `k` in 2..=32
//!   its exception count followed by the exceptions packed with `k` bits.
//! - The variable-byte tail: 7 payload bits per byte, the last byte of each value
//!   flagged with `0x80`, padded with zero bytes to a word boundary.
//!
//! Bit packing is continuous and LSB-first across words. On the wire the words
//! are serialized big-endian.

use bitvec::prelude::*;

use crate::error::VtileError;

pub const BLOCK_SIZE: usize = 256;
pub const PAGE_SIZE: usize = 65536;
const EXCEPTION_OVERHEAD_BITS: usize = 8;

//==================================================================================
// 1. Bit Packing Helpers
//==================================================================================

fn bits_of(value: u32) -> usize {
    (32 - value.leading_zeros()) as usize
}

/// Packs `values` with `bit_width` bits each and appends `ceil(n * bit_width / 32)` words.
fn pack_into(values: &[u32], bit_width: usize, out: &mut Vec<u32>) {
    if bit_width == 0 || values.is_empty() {
        return;
    }
    let mut bits = BitVec::<u32, Lsb0>::repeat(false, values.len() * bit_width);
    for (chunk, &val) in bits.chunks_mut(bit_width).zip(values) {
        chunk.store_le(val);
    }
    out.extend_from_slice(bits.as_raw_slice());
}

fn unpack(words: &[u32], bit_width: usize, count: usize) -> Result<Vec<u32>, VtileError> {
    if bit_width == 0 {
        return Ok(vec![0; count]);
    }
    if bit_width > 32 {
        return Err(VtileError::FastPforError(format!("invalid bit width {}", bit_width)));
    }
    let bits = words.view_bits::<Lsb0>();
    if bits.len() < count * bit_width {
        return Err(VtileError::FastPforError(format!(
            "packed data holds {} bits, {} required",
            bits.len(),
            count * bit_width
        )));
    }
    Ok(bits
        .chunks(bit_width)
        .take(count)
        .map(|chunk| chunk.load_le::<u32>())
        .collect())
}

/// Bounds-checked reader over the word stream.
struct WordReader<'a> {
    words: &'a [u32],
}

impl<'a> WordReader<'a> {
    fn word(&self, pos: usize) -> Result<u32, VtileError> {
        self.words.get(pos).copied().ok_or_else(|| {
            VtileError::FastPforError(format!(
                "read past the end of {} words at {}",
                self.words.len(),
                pos
            ))
        })
    }

    fn slice(&self, pos: usize, len: usize) -> Result<&'a [u32], VtileError> {
        pos.checked_add(len)
            .and_then(|end| self.words.get(pos..end))
            .ok_or_else(|| {
                VtileError::FastPforError(format!(
                    "read of {} words at {} exceeds {} words",
                    len,
                    pos,
                    self.words.len()
                ))
            })
    }
}

//==================================================================================
// 2. Block Codec
//==================================================================================

/// Picks the bit width of a block by the exception cost model. Returns
/// `(bit_width, exception_count, max_bits)`.
fn best_bit_width(block: &[u32]) -> (usize, usize, usize) {
    let mut freqs = [0usize; 33];
    for &v in block {
        freqs[bits_of(v)] += 1;
    }
    let mut best_b = 32;
    while best_b > 0 && freqs[best_b] == 0 {
        best_b -= 1;
    }
    let max_bits = best_b;
    let mut best_cost = best_b * BLOCK_SIZE;
    let mut exceptions = 0;
    let mut best_exceptions = 0;

    for b in (0..max_bits).rev() {
        exceptions += freqs[b + 1];
        if exceptions == BLOCK_SIZE {
            break;
        }
        let mut cost = exceptions * EXCEPTION_OVERHEAD_BITS
            + exceptions * (max_bits - b)
            + b * BLOCK_SIZE
            + 8;
        if max_bits - b == 1 {
            cost -= exceptions;
        }
        if cost < best_cost {
            best_cost = cost;
            best_b = b;
            best_exceptions = exceptions;
        }
    }
    (best_b, best_exceptions, max_bits)
}

fn encode_page(page: &[u32], out: &mut Vec<u32>) {
    let header_pos = out.len();
    out.push(0);

    let mut byte_container: Vec<u8> = Vec::with_capacity(3 * page.len() / BLOCK_SIZE);
    let mut exceptions: Vec<Vec<u32>> = vec![Vec::new(); 33];

    for block in page.chunks_exact(BLOCK_SIZE) {
        let (b, exception_count, max_bits) = best_bit_width(block);
        byte_container.push(b as u8);
        byte_container.push(exception_count as u8);
        if exception_count > 0 {
            byte_container.push(max_bits as u8);
            let index = max_bits - b;
            for (k, &v) in block.iter().enumerate() {
                if (v >> b) != 0 {
                    byte_container.push(k as u8);
                    exceptions[index].push(v >> b);
                }
            }
        }
        if b == 32 {
            out.extend_from_slice(block);
        } else {
            let mask = (1u32 << b).wrapping_sub(1);
            let low: Vec<u32> = block.iter().map(|&v| v & mask).collect();
            pack_into(&low, b, out);
        }
    }

    out[header_pos] = (out.len() - header_pos) as u32;
    out.push(byte_container.len() as u32);
    while byte_container.len() % 4 != 0 {
        byte_container.push(0);
    }
    out.extend(
        byte_container
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    );

    let mut bitmap = 0u32;
    for (k, values) in exceptions.iter().enumerate().skip(2) {
        if !values.is_empty() {
            bitmap |= 1 << (k - 1);
        }
    }
    out.push(bitmap);
    for (k, values) in exceptions.iter().enumerate().skip(2) {
        if !values.is_empty() {
            out.push(values.len() as u32);
            pack_into(values, k, out);
        }
    }
}

fn decode_page(
    reader: &WordReader<'_>,
    pos: &mut usize,
    out: &mut Vec<u32>,
    this_size: usize,
) -> Result<(), VtileError> {
    let init_pos = *pos;
    let where_meta = reader.word(*pos)? as usize;
    *pos += 1;

    let blocks_end = init_pos
        .checked_add(where_meta)
        .ok_or_else(|| VtileError::FastPforError("page metadata offset overflows".to_string()))?;
    let mut meta = blocks_end;
    let byte_size = reader.word(meta)? as usize;
    meta += 1;
    let container_words = reader.slice(meta, byte_size.div_ceil(4))?;
    meta += container_words.len();
    let byte_container: Vec<u8> = container_words
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .take(byte_size)
        .collect();

    let bitmap = reader.word(meta)?;
    meta += 1;
    let mut exceptions: Vec<Vec<u32>> = vec![Vec::new(); 33];
    for (k, slot) in exceptions.iter_mut().enumerate().skip(2) {
        if bitmap & (1 << (k - 1)) != 0 {
            let size = reader.word(meta)? as usize;
            meta += 1;
            let num_words = size
                .checked_mul(k)
                .map(|bits| bits.div_ceil(32))
                .ok_or_else(|| VtileError::FastPforError("exception count overflows".to_string()))?;
            let packed = reader.slice(meta, num_words)?;
            meta += num_words;
            *slot = unpack(packed, k, size)?;
        }
    }

    let mut pointers = [0usize; 33];
    let mut container = byte_container.iter().copied();
    let mut next_byte = || {
        container
            .next()
            .ok_or_else(|| VtileError::FastPforError("byte container exhausted".to_string()))
    };

    for _ in 0..(this_size / BLOCK_SIZE) {
        let b = next_byte()? as usize;
        let exception_count = next_byte()? as usize;
        if b > 32 {
            return Err(VtileError::FastPforError(format!("invalid bit width {}", b)));
        }

        let packed = reader.slice(*pos, b * BLOCK_SIZE / 32)?;
        *pos += packed.len();
        let start = out.len();
        out.extend(unpack(packed, b, BLOCK_SIZE)?);

        if exception_count > 0 {
            let max_bits = next_byte()? as usize;
            if max_bits <= b || max_bits > 32 {
                return Err(VtileError::FastPforError(format!(
                    "exception width {} is invalid for bit width {}",
                    max_bits, b
                )));
            }
            let index = max_bits - b;
            for _ in 0..exception_count {
                let position = next_byte()? as usize;
                if index == 1 {
                    out[start + position] |= 1 << b;
                } else {
                    let value = exceptions[index].get(pointers[index]).copied().ok_or_else(|| {
                        VtileError::FastPforError(format!("missing {}-bit exception", index))
                    })?;
                    pointers[index] += 1;
                    out[start + position] |= value << b;
                }
            }
        }
    }

    if *pos != blocks_end {
        return Err(VtileError::FastPforError(format!(
            "packed blocks end at word {}, page metadata starts at {}",
            *pos, blocks_end
        )));
    }
    *pos = meta;
    Ok(())
}

//==================================================================================
// 3. Variable-Byte Tail
//==================================================================================

fn encode_vbyte(values: &[u32], out: &mut Vec<u32>) {
    let mut bytes = Vec::with_capacity(values.len() * 2);
    for &v in values {
        let mut current = v;
        while current >= 0x80 {
            bytes.push((current & 0x7F) as u8);
            current >>= 7;
        }
        bytes.push(current as u8 | 0x80);
    }
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    );
}

fn decode_vbyte(words: &[u32], count: usize, out: &mut Vec<u32>) -> Result<(), VtileError> {
    let mut decoded = 0;
    let mut value: u32 = 0;
    let mut shift = 0u32;
    for byte in words.iter().flat_map(|w| w.to_le_bytes()) {
        if decoded == count {
            break;
        }
        if shift > 28 || (shift == 28 && (byte & 0x7F) > 0x0F) {
            return Err(VtileError::FastPforError(
                "variable-byte value overflows 32 bits".to_string(),
            ));
        }
        value |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 != 0 {
            out.push(value);
            decoded += 1;
            value = 0;
            shift = 0;
        } else {
            shift += 7;
        }
    }
    if decoded != count {
        return Err(VtileError::FastPforError(format!(
            "variable-byte tail holds {} values, {} expected",
            decoded, count
        )));
    }
    Ok(())
}

//==================================================================================
// 4. Public API
//==================================================================================

/// Encodes 32-bit values into the composed block + variable-byte word stream.
pub fn encode(input: &[u32]) -> Vec<u32> {
    let aligned = input.len() - input.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(input.len() / 2 + 4);
    out.push(aligned as u32);
    for page in input[..aligned].chunks(PAGE_SIZE) {
        encode_page(page, &mut out);
    }
    encode_vbyte(&input[aligned..], &mut out);
    out
}

/// Decodes exactly `num_values` values from a word stream.
pub fn decode(words: &[u32], num_values: usize) -> Result<Vec<u32>, VtileError> {
    if num_values > crate::utils::MAX_DECODED_VALUES {
        return Err(VtileError::FastPforError(format!(
            "value count {} exceeds the maximum of {}",
            num_values,
            crate::utils::MAX_DECODED_VALUES
        )));
    }
    let reader = WordReader { words };
    let aligned = reader.word(0)? as usize;
    if aligned % BLOCK_SIZE != 0 || aligned > num_values {
        return Err(VtileError::FastPforError(format!(
            "block codec length {} is invalid for {} values",
            aligned, num_values
        )));
    }

    // Capacity only; zero-width blocks may still expand past this.
    let mut out = Vec::with_capacity(num_values.min(words.len().saturating_mul(32)));
    let mut pos = 1;
    while out.len() < aligned {
        let this_size = PAGE_SIZE.min(aligned - out.len());
        decode_page(&reader, &mut pos, &mut out, this_size)?;
    }
    let tail = words.get(pos..).unwrap_or(&[]);
    decode_vbyte(tail, num_values - aligned, &mut out)?;
    Ok(out)
}

/// Encodes and serializes the words big-endian.
pub fn encode_to_bytes(input: &[u32], output_buf: &mut Vec<u8>) {
    let words = encode(input);
    output_buf.reserve(words.len() * 4);
    for w in words {
        output_buf.extend_from_slice(&w.to_be_bytes());
    }
}

/// Decodes `num_values` values from big-endian serialized words.
pub fn decode_from_bytes(input_bytes: &[u8], num_values: usize) -> Result<Vec<u32>, VtileError> {
    if input_bytes.len() % 4 != 0 {
        return Err(VtileError::FastPforError(format!(
            "byte length {} is not a multiple of 4",
            input_bytes.len()
        )));
    }
    let words: Vec<u32> = input_bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    decode(&words, num_values)
}

//==================================================================================
// 5. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn roundtrip(input: &[u32]) {
        let mut bytes = Vec::new();
        encode_to_bytes(input, &mut bytes);
        let decoded = decode_from_bytes(&bytes, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_small_input_uses_only_the_tail() {
        let words = encode(&[1, 2, 300]);
        assert_eq!(words[0], 0);
        // 0x81, 0x82, then 300 = 0x2C | (0x02 | 0x80), padded to one word.
        assert_eq!(words[1], u32::from_le_bytes([0x81, 0x82, 0x2C, 0x82]));
        assert_eq!(words.len(), 2);
        assert_eq!(decode(&words, 3).unwrap(), vec![1, 2, 300]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode(&[]), vec![0]);
        roundtrip(&[]);
    }

    #[test]
    fn test_full_blocks_with_exceptions() {
        let mut input: Vec<u32> = (0..1000).map(|i| (i % 16) as u32).collect();
        input[3] = 1 << 20;
        input[700] = u32::MAX;
        input[701] = 1 << 5;
        roundtrip(&input);
    }

    #[test]
    fn test_zero_and_full_width_blocks() {
        roundtrip(&vec![0u32; 512]);
        roundtrip(&vec![u32::MAX; 300]);
    }

    #[test]
    fn test_multiple_pages_random() {
        let mut rng = rand::rng();
        let input: Vec<u32> = (0..PAGE_SIZE + 1000)
            .map(|_| {
                if rng.random_range(0..100) == 0 {
                    rng.random::<u32>()
                } else {
                    rng.random_range(0..1000)
                }
            })
            .collect();
        roundtrip(&input);
    }

    #[test]
    fn test_cost_model_prefers_exceptions_for_outliers() {
        let mut block = vec![3u32; BLOCK_SIZE];
        block[10] = 1 << 30;
        let (b, exceptions, max_bits) = best_bit_width(&block);
        assert_eq!(b, 2);
        assert_eq!(exceptions, 1);
        assert_eq!(max_bits, 31);
    }

    #[test]
    fn test_oversized_value_count_is_rejected() {
        assert!(matches!(decode(&[0], u32::MAX as usize), Err(VtileError::FastPforError(_))));
        assert!(matches!(
            decode_from_bytes(&[0, 0, 0, 0], 1 << 20),
            Err(VtileError::FastPforError(_))
        ));
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let input: Vec<u32> = (0..600).collect();
        let mut bytes = Vec::new();
        encode_to_bytes(&input, &mut bytes);
        bytes.truncate(bytes.len() - 8);
        assert!(decode_from_bytes(&bytes, input.len()).is_err());
        assert!(decode_from_bytes(&bytes[..5], input.len()).is_err());
    }
}
