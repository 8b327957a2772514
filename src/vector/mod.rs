//! Lazy, random-access views over decoded columns.
//!
//! Every vector answers the same three questions: how many rows it has, the
//! value (or null) at a row, and the values in row order. How the values are
//! stored differs per variant:
//!
//! - `Flat`: a materialized array plus an optional null bitmap
//! - `Constant`: one value repeated
//! - `Sequence`: `base + i * stride`
//! - `Dictionary`: per-row indices into a string dictionary resolved on access
//!
//! Geometries and strings are only reconstructed when a row is read.

pub mod geometry;
pub mod numeric;
pub mod property;
pub mod string;

pub use geometry::GeometryVector;
pub use numeric::{Vector, VectorValue};
pub use property::{IdVector, PropertyVector, Value};
pub use string::StringVector;

use bitvec::prelude::*;

use crate::error::VtileError;

/// The read contract shared by every vector.
pub trait ColumnVector {
    type Item<'a>
    where
        Self: 'a;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `index`, `None` for a null row. `index` must be below `len`.
    fn value_at(&self, index: usize) -> Result<Option<Self::Item<'_>>, VtileError>;

    /// Bounds-checked access.
    fn get(&self, index: usize) -> Result<Option<Self::Item<'_>>, VtileError> {
        if index >= self.len() {
            return Err(VtileError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        self.value_at(index)
    }

    /// Values in row order. Each call starts from the first row.
    fn iter(&self) -> VectorIter<'_, Self>
    where
        Self: Sized,
    {
        VectorIter {
            vector: self,
            index: 0,
        }
    }
}

pub struct VectorIter<'a, V> {
    vector: &'a V,
    index: usize,
}

impl<'a, V: ColumnVector> Iterator for VectorIter<'a, V> {
    type Item = Result<Option<V::Item<'a>>, VtileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.vector.len() {
            return None;
        }
        let item = self.vector.value_at(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.vector.len().saturating_sub(self.index);
        (left, Some(left))
    }
}

/// A null bitmap, `None` when every row is present.
pub type Validity = Option<BitVec<u8, Lsb0>>;

pub(crate) fn is_present(validity: &Validity, index: usize) -> bool {
    match validity {
        Some(bits) => bits.get(index).map_or(false, |b| *b),
        None => true,
    }
}

/// Spreads the values of present rows over all rows of the bitmap, filling
/// null rows with `fill`.
pub(crate) fn scatter<T: Copy>(
    present: &BitSlice<u8, Lsb0>,
    values: &[T],
    fill: T,
) -> Result<Vec<T>, VtileError> {
    let num_present = present.count_ones();
    if num_present != values.len() {
        return Err(VtileError::CountMismatch {
            context: "present bits and column values".to_string(),
            expected: num_present,
            actual: values.len(),
        });
    }
    let mut source = values.iter();
    Ok(present
        .iter()
        .map(|bit| if *bit { source.next().copied().unwrap_or(fill) } else { fill })
        .collect())
}
