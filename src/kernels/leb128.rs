//! This module contains the pure, stateless kernels for LEB128 (Little-Endian
//! Base 128) variable-length integer encoding and decoding, the VARINT physical
//! technique of the stream format.
//!
//! Each byte carries 7 payload bits, least significant group first, with the high
//! bit set on every byte except the last. Values are never padded. Decoding a value
//! that does not fit the target lane is a malformed-header error.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::VtileError;
use crate::utils::read_u8;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    let mut current = value.to_u64().unwrap_or(0);
    loop {
        let byte = (current & 0x7F) as u8;
        current >>= 7;
        if current == 0 {
            buffer.push(byte);
            break;
        }
        buffer.push(byte | 0x80);
    }
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T, VtileError>
where
    T: PrimInt + Unsigned,
{
    let total_bits = std::mem::size_of::<T>() * 8;
    let mut result: u64 = 0;
    let mut shift = 0usize;

    loop {
        let byte = read_u8(cursor)?;
        let payload = (byte & 0x7F) as u64;

        if shift >= total_bits {
            return Err(VtileError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }
        // The last group may only use the bits that are left in the lane.
        if shift + 7 > total_bits && (payload >> (total_bits - shift)) != 0 {
            return Err(VtileError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }
        result |= payload << shift;

        if byte & 0x80 == 0 {
            return T::from(result).ok_or_else(|| {
                VtileError::Leb128DecodeError("Integer overflow during decoding".to_string())
            });
        }
        shift += 7;
    }
}

//==================================================================================
// 2. Public API for Slice Operations
//==================================================================================

/// Appends every value of `input_slice` to `output_buf` as LEB128.
pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    output_buf.reserve(input_slice.len());
    for &val in input_slice {
        encode_one(val, output_buf);
    }
}

/// Decodes exactly `num_values` integers starting at the cursor.
pub fn decode<T>(cursor: &mut Cursor<&[u8]>, num_values: usize) -> Result<Vec<T>, VtileError>
where
    T: PrimInt + Unsigned,
{
    // Every value needs at least one byte, which bounds the allocation.
    let capacity = num_values.min(crate::utils::remaining(cursor));
    let mut values = Vec::with_capacity(capacity);
    for _ in 0..num_values {
        values.push(decode_one::<T>(cursor)?);
    }
    Ok(values)
}

/// Decodes `num_values` integers from a standalone byte slice that must be
/// consumed completely.
pub fn decode_exact<T>(input_bytes: &[u8], num_values: usize) -> Result<Vec<T>, VtileError>
where
    T: PrimInt + Unsigned,
{
    let mut cursor = Cursor::new(input_bytes);
    let values = decode::<T>(&mut cursor, num_values)?;
    if (cursor.position() as usize) != input_bytes.len() {
        return Err(VtileError::Leb128DecodeError(
            "Did not consume entire input buffer. Trailing bytes detected.".to_string(),
        ));
    }
    Ok(values)
}
