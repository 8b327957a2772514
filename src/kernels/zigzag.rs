//! This module contains the pure, stateless kernels for Zig-zag encoding and
//! decoding.
//!
//! Zig-zag is a bit-width reduction transform: it maps signed integers onto
//! unsigned ones so that values of small magnitude, positive or negative, end up
//! with small unsigned codes (0, -1, 1, -2, ... become 0, 1, 2, 3, ...). Both
//! directions work on the unsigned lane type; the signed interpretation comes
//! from `StreamInt::to_signed`.

use crate::traits::StreamInt;

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

/// Encodes a single value, given as a two's complement bit pattern.
#[inline]
pub fn encode_val<U: StreamInt>(n: U) -> U {
    let signed = n.to_signed();
    // The right shift must be arithmetic, so it is done on the signed type.
    let mask = U::from_signed(signed >> (U::BITS - 1));
    (n << 1) ^ mask
}

/// Decodes a single zig-zag code back to its two's complement bit pattern.
#[inline]
pub fn decode_val<U: StreamInt>(n: U) -> U {
    let lsb = n & U::one();
    (n >> 1) ^ U::zero().wrapping_sub(&lsb)
}

//==================================================================================
// 2. Public API
//==================================================================================

pub fn encode<U: StreamInt>(input_slice: &[U]) -> Vec<U> {
    input_slice.iter().map(|&v| encode_val(v)).collect()
}

/// Decodes every value of the slice in place.
pub fn decode_in_place<U: StreamInt>(values: &mut [U]) {
    for v in values.iter_mut() {
        *v = decode_val(*v);
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag_small_magnitudes() {
        let input: Vec<u32> = [0i32, -1, 1, -2, 2].iter().map(|&v| v as u32).collect();
        assert_eq!(encode(&input), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zigzag_extremes_roundtrip() {
        let input: Vec<u32> = [i32::MIN, i32::MAX, -1, 0].iter().map(|&v| v as u32).collect();
        let mut encoded = encode(&input);
        assert_eq!(encoded[0], u32::MAX);
        assert_eq!(encoded[1], u32::MAX - 1);
        decode_in_place(&mut encoded);
        assert_eq!(encoded, input);

        let input64: Vec<u64> = [i64::MIN, i64::MAX, -7].iter().map(|&v| v as u64).collect();
        let mut encoded64 = encode(&input64);
        decode_in_place(&mut encoded64);
        assert_eq!(encoded64, input64);
    }

    #[test]
    fn test_zigzag_random_roundtrip() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<u64> = (0..1000).map(|_| rng.random::<u64>()).collect();
        let mut encoded = encode(&input);
        decode_in_place(&mut encoded);
        assert_eq!(encoded, input);
    }
}
