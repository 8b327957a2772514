//! This module contains the pure, stateless kernels for integer Run-Length
//! Encoding (RLE) and decoding.
//!
//! RLE is a sparsity transform: it is highly effective for columns with long,
//! contiguous runs of identical values. A sequence is split into runs wherever
//! the value changes, and stored as two equal-length arrays, run lengths and run
//! values. On the wire both arrays are concatenated (all lengths, then all
//! values) and physically encoded as a single stream.

use crate::error::VtileError;
use crate::traits::StreamInt;

//==================================================================================
// 1. Public API
//==================================================================================

/// Runs of a sequence as two parallel arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runs<U> {
    pub lengths: Vec<U>,
    pub values: Vec<U>,
}

impl<U: StreamInt> Runs<U> {
    pub fn num_runs(&self) -> usize {
        self.lengths.len()
    }

    /// Concatenates lengths and values into the wire order.
    pub fn into_flat(self) -> Vec<U> {
        let mut flat = self.lengths;
        flat.extend(self.values);
        flat
    }
}

/// Splits `input_slice` into runs. The final run is always flushed, so a
/// non-empty input yields at least one run.
pub fn encode<U: StreamInt>(input_slice: &[U]) -> Runs<U> {
    let mut runs = Runs {
        lengths: Vec::new(),
        values: Vec::new(),
    };
    let Some((&first, rest)) = input_slice.split_first() else {
        return runs;
    };

    let mut current_val = first;
    let mut run_count: u64 = 1;
    for &val in rest {
        if val == current_val {
            run_count += 1;
        } else {
            runs.lengths.push(U::from_u64_lossy(run_count));
            runs.values.push(current_val);
            current_val = val;
            run_count = 1;
        }
    }
    runs.lengths.push(U::from_u64_lossy(run_count));
    runs.values.push(current_val);
    runs
}

/// Counts the runs without materialising them.
pub fn count_runs<U: PartialEq>(input_slice: &[U]) -> usize {
    if input_slice.is_empty() {
        return 0;
    }
    1 + input_slice.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Expands a flat `lengths ++ values` buffer into `num_values` elements.
pub fn decode<U: StreamInt>(
    flat: &[U],
    num_runs: usize,
    num_values: usize,
) -> Result<Vec<U>, VtileError> {
    if flat.len() != num_runs * 2 {
        return Err(VtileError::RleDecodeError(format!(
            "expected {} run entries, found {}",
            num_runs * 2,
            flat.len()
        )));
    }
    let (lengths, values) = flat.split_at(num_runs);

    let mut output = Vec::with_capacity(num_values.min(crate::utils::MAX_DECODED_VALUES));
    for (&len, &val) in lengths.iter().zip(values) {
        let len = len.as_u64() as usize;
        if len > num_values - output.len() {
            return Err(VtileError::RleDecodeError(format!(
                "runs expand beyond the declared {} values",
                num_values
            )));
        }
        output.extend(std::iter::repeat(val).take(len));
    }

    if output.len() != num_values {
        return Err(VtileError::RleDecodeError(format!(
            "runs expand to {} values, declared {}",
            output.len(),
            num_values
        )));
    }
    Ok(output)
}
