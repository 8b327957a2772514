//! This module contains the pure, stateless kernels for delta encoding and its
//! inverse, the prefix sum.
//!
//! The first value is stored unchanged (its predecessor is taken as zero) and
//! every later value is replaced by its difference from the previous one. All
//! arithmetic wraps, so the transform is lossless for the full lane range.
//! Componentwise delta applies the same idea to interleaved `x, y` pairs, each
//! component against the previous vertex's same component.

use crate::error::VtileError;
use crate::traits::StreamInt;

//==================================================================================
// 1. Public API
//==================================================================================

pub fn encode<U: StreamInt>(input_slice: &[U]) -> Vec<U> {
    let mut prev = U::zero();
    input_slice
        .iter()
        .map(|&v| {
            let delta = v.wrapping_sub(&prev);
            prev = v;
            delta
        })
        .collect()
}

/// Reverses `encode` in place with a running prefix sum.
pub fn decode_in_place<U: StreamInt>(values: &mut [U]) {
    let mut acc = U::zero();
    for v in values.iter_mut() {
        acc = acc.wrapping_add(v);
        *v = acc;
    }
}

/// Delta encodes interleaved `x, y` pairs per component.
pub fn encode_componentwise<U: StreamInt>(input_slice: &[U]) -> Result<Vec<U>, VtileError> {
    if input_slice.len() % 2 != 0 {
        return Err(VtileError::GeometryError(format!(
            "componentwise delta needs an even number of values, got {}",
            input_slice.len()
        )));
    }
    let mut prev = [U::zero(); 2];
    Ok(input_slice
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let lane = i & 1;
            let delta = v.wrapping_sub(&prev[lane]);
            prev[lane] = v;
            delta
        })
        .collect())
}

pub fn decode_componentwise_in_place<U: StreamInt>(values: &mut [U]) -> Result<(), VtileError> {
    if values.len() % 2 != 0 {
        return Err(VtileError::GeometryError(format!(
            "componentwise delta stream has odd length {}",
            values.len()
        )));
    }
    let mut acc = [U::zero(); 2];
    for (i, v) in values.iter_mut().enumerate() {
        let lane = i & 1;
        acc[lane] = acc[lane].wrapping_add(v);
        *v = acc[lane];
    }
    Ok(())
}
