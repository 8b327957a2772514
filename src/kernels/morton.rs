//! This module contains the kernels for Morton (Z-order) codes.
//!
//! A vertex `(x, y)` is shifted into the non-negative range by the coordinate
//! shift and its bits are interleaved: bit `i` of `x` becomes bit `2i` of the
//! code, bit `i` of `y` becomes bit `2i + 1`. With at most 16 bits per
//! component a code always fits a `u32`.

use crate::error::VtileError;

pub const MAX_BITS: u32 = 16;

/// The coordinate domain of a set of Morton codes, as carried in the Morton
/// stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MortonSettings {
    pub num_bits: u32,
    pub coordinate_shift: u32,
}

impl MortonSettings {
    /// Derives the smallest domain covering every component of `vertices`
    /// (interleaved `x, y`).
    pub fn for_vertices(vertices: &[i32]) -> Result<Self, VtileError> {
        let min = vertices.iter().copied().min().unwrap_or(0);
        let max = vertices.iter().copied().max().unwrap_or(0);
        let shift = (min.min(0) as i64).unsigned_abs();
        let span = max as i64 + shift as i64;
        let num_bits = (64 - (span as u64).leading_zeros()).max(1);
        if num_bits > MAX_BITS {
            return Err(VtileError::MortonError(format!(
                "coordinate range [{}, {}] needs {} bits, at most {} supported",
                min, max, num_bits, MAX_BITS
            )));
        }
        Ok(Self {
            num_bits,
            coordinate_shift: shift as u32,
        })
    }

    fn validate(&self) -> Result<(), VtileError> {
        if self.num_bits == 0 || self.num_bits > MAX_BITS {
            return Err(VtileError::MortonError(format!(
                "unsupported Morton bit width {}",
                self.num_bits
            )));
        }
        Ok(())
    }
}

fn spread_bits(value: u32) -> u32 {
    let mut x = value & 0x0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    (x | (x << 1)) & 0x5555_5555
}

fn compact_bits(code: u32) -> u32 {
    let mut x = code & 0x5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF;
    (x | (x >> 8)) & 0x0000_FFFF
}

/// Interleaves one vertex into a Morton code.
pub fn encode(x: i32, y: i32, settings: &MortonSettings) -> Result<u32, VtileError> {
    settings.validate()?;
    let shift = settings.coordinate_shift as i64;
    let limit = 1i64 << settings.num_bits;
    let (sx, sy) = (x as i64 + shift, y as i64 + shift);
    if !(0..limit).contains(&sx) || !(0..limit).contains(&sy) {
        return Err(VtileError::MortonError(format!(
            "vertex ({}, {}) is outside the {}-bit domain",
            x, y, settings.num_bits
        )));
    }
    Ok(spread_bits(sx as u32) | (spread_bits(sy as u32) << 1))
}

/// De-interleaves a Morton code back into a vertex.
pub fn decode(code: u32, settings: &MortonSettings) -> Result<(i32, i32), VtileError> {
    settings.validate()?;
    if settings.num_bits < MAX_BITS && (code >> (2 * settings.num_bits)) != 0 {
        return Err(VtileError::MortonError(format!(
            "code {} exceeds the {}-bit domain",
            code, settings.num_bits
        )));
    }
    let shift = settings.coordinate_shift as i64;
    let x = compact_bits(code) as i64 - shift;
    let y = compact_bits(code >> 1) as i64 - shift;
    Ok((x as i32, y as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaving_bit_positions() {
        let settings = MortonSettings { num_bits: 4, coordinate_shift: 0 };
        assert_eq!(encode(1, 0, &settings).unwrap(), 0b01);
        assert_eq!(encode(0, 1, &settings).unwrap(), 0b10);
        assert_eq!(encode(3, 5, &settings).unwrap(), 0b100111);
        assert_eq!(decode(0b100111, &settings).unwrap(), (3, 5));
    }

    #[test]
    fn test_settings_with_negative_coordinates() {
        let vertices = [-5, 10, 4096, -1];
        let settings = MortonSettings::for_vertices(&vertices).unwrap();
        assert_eq!(settings.coordinate_shift, 5);
        assert_eq!(settings.num_bits, 13);
        for pair in vertices.chunks(2) {
            let code = encode(pair[0], pair[1], &settings).unwrap();
            assert_eq!(decode(code, &settings).unwrap(), (pair[0], pair[1]));
        }
    }

    #[test]
    fn test_domain_limits() {
        assert!(MortonSettings::for_vertices(&[0, 70_000]).is_err());
        let settings = MortonSettings::for_vertices(&[0, 0]).unwrap();
        assert_eq!(settings.num_bits, 1);
        assert!(encode(2, 0, &settings).is_err());
        assert!(decode(0b100, &settings).is_err());
        assert!(decode(0, &MortonSettings { num_bits: 17, coordinate_shift: 0 }).is_err());
    }
}
