//! Fixed-width vectors: booleans, integers and floats.

use std::fmt::Debug;

use super::{is_present, scatter, ColumnVector, Validity};
use crate::codec::integer;
use crate::error::VtileError;
use crate::kernels::zigzag;
use crate::metadata::{LogicalTechnique, Stream, StreamVariant};
use crate::traits::StreamInt;

/// A value type a vector can hold.
pub trait VectorValue: Copy + Default + PartialEq + Debug {
    /// The `index`-th element of the progression `base, base + stride, ...`.
    fn step(base: Self, stride: Self, index: usize) -> Self;
}

macro_rules! impl_wrapping_value {
    ($($t:ty),+) => {
        $(impl VectorValue for $t {
            #[inline]
            fn step(base: Self, stride: Self, index: usize) -> Self {
                base.wrapping_add(stride.wrapping_mul(index as $t))
            }
        })+
    };
}

impl_wrapping_value!(i32, i64, u32, u64);

impl VectorValue for f32 {
    fn step(base: Self, stride: Self, index: usize) -> Self {
        base + stride * index as f32
    }
}

impl VectorValue for f64 {
    fn step(base: Self, stride: Self, index: usize) -> Self {
        base + stride * index as f64
    }
}

impl VectorValue for bool {
    // Boolean columns are never decoded into sequences.
    fn step(base: Self, _stride: Self, _index: usize) -> Self {
        base
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vector<T> {
    /// One slot per row; null rows hold `T::default()`.
    Flat { values: Vec<T>, validity: Validity },
    Constant {
        value: T,
        len: usize,
        validity: Validity,
    },
    Sequence { base: T, stride: T, len: usize },
}

impl<T: VectorValue> Vector<T> {
    /// Wraps the values of the present rows.
    pub fn from_values(values: Vec<T>, validity: Validity, num_rows: usize) -> Result<Self, VtileError> {
        match validity {
            Some(present) => {
                let values = scatter(&present, &values, T::default())?;
                Ok(Vector::Flat {
                    values,
                    validity: Some(present),
                })
            }
            None => {
                if values.len() != num_rows {
                    return Err(VtileError::CountMismatch {
                        context: "column values".to_string(),
                        expected: num_rows,
                        actual: values.len(),
                    });
                }
                Ok(Vector::Flat {
                    values,
                    validity: None,
                })
            }
        }
    }

    /// Builds the cheapest vector for an integer stream.
    ///
    /// A single-run RLE stream becomes `Constant`. A non-nullable delta+RLE
    /// stream whose deltas are one run, or a first delta followed by one run,
    /// becomes `Sequence`. Everything else is decoded into `Flat`.
    pub fn from_int_stream<U: StreamInt>(
        stream: &Stream<'_>,
        signed: bool,
        validity: Validity,
        num_rows: usize,
        convert: impl Fn(U) -> T,
    ) -> Result<Self, VtileError> {
        let meta = &stream.metadata;
        let expected = validity.as_ref().map_or(num_rows, |v| v.count_ones());

        if let StreamVariant::Rle { runs, num_rle_values } = meta.variant {
            let total = num_rle_values as usize;
            match (meta.logical1, meta.logical2) {
                (LogicalTechnique::Rle, LogicalTechnique::None) if runs == 1 && total == expected => {
                    let raw = integer::decode_physical::<U>(stream)?;
                    if let &[len, value] = raw.as_slice() {
                        if len.as_u64() == total as u64 {
                            let value = if signed { zigzag::decode_val(value) } else { value };
                            return Ok(Vector::Constant {
                                value: convert(value),
                                len: num_rows,
                                validity,
                            });
                        }
                    }
                }
                (LogicalTechnique::Delta, LogicalTechnique::Rle)
                    if validity.is_none() && total == num_rows && (runs == 1 || runs == 2) =>
                {
                    let raw = integer::decode_physical::<U>(stream)?;
                    let sequence = match *raw.as_slice() {
                        [len, delta] if len.as_u64() == total as u64 => {
                            let delta = convert(zigzag::decode_val(delta));
                            Some((delta, delta))
                        }
                        [first_len, rest_len, first, delta]
                            if first_len.as_u64() == 1 && rest_len.as_u64() + 1 == total as u64 =>
                        {
                            Some((convert(zigzag::decode_val(first)), convert(zigzag::decode_val(delta))))
                        }
                        _ => None,
                    };
                    if let Some((base, stride)) = sequence {
                        return Ok(Vector::Sequence {
                            base,
                            stride,
                            len: num_rows,
                        });
                    }
                }
                _ => {}
            }
        }

        let values = integer::decode_stream::<U>(stream, signed)?;
        Self::from_values(values.into_iter().map(convert).collect(), validity, num_rows)
    }
}

impl<T: VectorValue> ColumnVector for Vector<T> {
    type Item<'a> = T where Self: 'a;

    fn len(&self) -> usize {
        match self {
            Vector::Flat { values, .. } => values.len(),
            Vector::Constant { len, .. } | Vector::Sequence { len, .. } => *len,
        }
    }

    fn value_at(&self, index: usize) -> Result<Option<T>, VtileError> {
        Ok(match self {
            Vector::Flat { values, validity } => {
                if is_present(validity, index) {
                    values.get(index).copied()
                } else {
                    None
                }
            }
            Vector::Constant { value, validity, .. } => {
                is_present(validity, index).then_some(*value)
            }
            Vector::Sequence { base, stride, .. } => Some(T::step(*base, *stride, index)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::integer::IntegerEncoder;
    use crate::config::IntegerEncodingOption;
    use crate::metadata::{DictionaryType, PhysicalStreamType};
    use bitvec::prelude::*;
    use std::io::Cursor;

    const DATA: PhysicalStreamType = PhysicalStreamType::Data(DictionaryType::None);

    fn vector_of(values: &[i32], option: IntegerEncodingOption, validity: Validity, rows: usize) -> Vector<i32> {
        let lanes: Vec<u32> = values.iter().map(|&v| v as u32).collect();
        let mut buf = Vec::new();
        let encoder = IntegerEncoder::default().with_option(option);
        integer::encode_stream(&lanes, true, DATA, &encoder, &mut buf).unwrap();
        let stream = Stream::read(&mut Cursor::new(buf.as_slice())).unwrap();
        Vector::from_int_stream::<u32>(&stream, true, validity, rows, |v| v as i32).unwrap()
    }

    fn collect(vector: &Vector<i32>) -> Vec<Option<i32>> {
        vector.iter().map(|v| v.unwrap()).collect()
    }

    #[test]
    fn test_single_run_becomes_constant() {
        let vector = vector_of(&[-7; 50], IntegerEncodingOption::Auto, None, 50);
        assert!(matches!(vector, Vector::Constant { value: -7, len: 50, .. }));
        assert_eq!(vector.get(49).unwrap(), Some(-7));
    }

    #[test]
    fn test_nullable_constant_keeps_its_bitmap() {
        let present = bitvec![u8, Lsb0; 1, 0, 1, 1];
        let vector = vector_of(&[4, 4, 4], IntegerEncodingOption::Auto, Some(present), 4);
        assert!(matches!(vector, Vector::Constant { .. }));
        assert_eq!(collect(&vector), [Some(4), None, Some(4), Some(4)]);
    }

    #[test]
    fn test_progressions_become_sequences() {
        let ids: Vec<i32> = (1..=100).collect();
        let vector = vector_of(&ids, IntegerEncodingOption::DeltaRle, None, 100);
        assert!(matches!(vector, Vector::Sequence { base: 1, stride: 1, len: 100 }));

        let offset: Vec<i32> = (0..100).map(|i| 1000 - 3 * i).collect();
        let vector = vector_of(&offset, IntegerEncodingOption::DeltaRle, None, 100);
        assert!(matches!(vector, Vector::Sequence { base: 1000, stride: -3, .. }));
        assert_eq!(collect(&vector), offset.iter().map(|&v| Some(v)).collect::<Vec<_>>());
    }

    #[test]
    fn test_irregular_values_stay_flat() {
        let values = [5, -2, 9, 9, 0, 13];
        let vector = vector_of(&values, IntegerEncodingOption::DeltaRle, None, 6);
        assert!(matches!(vector, Vector::Flat { .. }));
        assert_eq!(collect(&vector), values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
    }

    #[test]
    fn test_flat_with_nulls_and_count_mismatch() {
        let present = bitvec![u8, Lsb0; 0, 1, 1];
        let vector = Vector::from_values(vec![2.5f64, -1.0], Some(present), 3).unwrap();
        assert_eq!(vector.get(0).unwrap(), None);
        assert_eq!(vector.get(2).unwrap(), Some(-1.0));
        assert!(matches!(
            Vector::from_values(vec![true], None, 2),
            Err(VtileError::CountMismatch { .. })
        ));
    }
}
