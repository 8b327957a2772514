//! Typed wrappers that give every column of a feature table one vector type.

use super::{ColumnVector, StringVector, Vector};
use crate::error::VtileError;
use crate::schema::ScalarType;
use crate::tile::PropertyValue;

/// A property value borrowed from its vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(&'a str),
}

impl Value<'_> {
    pub fn to_property(&self) -> PropertyValue {
        match *self {
            Value::Bool(v) => PropertyValue::Bool(v),
            Value::I32(v) => PropertyValue::I32(v),
            Value::I64(v) => PropertyValue::I64(v),
            Value::U32(v) => PropertyValue::U32(v),
            Value::U64(v) => PropertyValue::U64(v),
            Value::F32(v) => PropertyValue::F32(v),
            Value::F64(v) => PropertyValue::F64(v),
            Value::String(v) => PropertyValue::String(v.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyVector {
    Bool(Vector<bool>),
    I32(Vector<i32>),
    I64(Vector<i64>),
    U32(Vector<u32>),
    U64(Vector<u64>),
    F32(Vector<f32>),
    F64(Vector<f64>),
    String(StringVector),
}

impl PropertyVector {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            PropertyVector::Bool(_) => ScalarType::Boolean,
            PropertyVector::I32(_) => ScalarType::Int32,
            PropertyVector::I64(_) => ScalarType::Int64,
            PropertyVector::U32(_) => ScalarType::Uint32,
            PropertyVector::U64(_) => ScalarType::Uint64,
            PropertyVector::F32(_) => ScalarType::Float,
            PropertyVector::F64(_) => ScalarType::Double,
            PropertyVector::String(_) => ScalarType::String,
        }
    }
}

impl ColumnVector for PropertyVector {
    type Item<'a> = Value<'a>;

    fn len(&self) -> usize {
        match self {
            PropertyVector::Bool(v) => v.len(),
            PropertyVector::I32(v) => v.len(),
            PropertyVector::I64(v) => v.len(),
            PropertyVector::U32(v) => v.len(),
            PropertyVector::U64(v) => v.len(),
            PropertyVector::F32(v) => v.len(),
            PropertyVector::F64(v) => v.len(),
            PropertyVector::String(v) => v.len(),
        }
    }

    fn value_at(&self, index: usize) -> Result<Option<Value<'_>>, VtileError> {
        Ok(match self {
            PropertyVector::Bool(v) => v.value_at(index)?.map(Value::Bool),
            PropertyVector::I32(v) => v.value_at(index)?.map(Value::I32),
            PropertyVector::I64(v) => v.value_at(index)?.map(Value::I64),
            PropertyVector::U32(v) => v.value_at(index)?.map(Value::U32),
            PropertyVector::U64(v) => v.value_at(index)?.map(Value::U64),
            PropertyVector::F32(v) => v.value_at(index)?.map(Value::F32),
            PropertyVector::F64(v) => v.value_at(index)?.map(Value::F64),
            PropertyVector::String(v) => v.value_at(index)?.map(Value::String),
        })
    }
}

/// Feature ids, kept in the lane width they were stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum IdVector {
    U32(Vector<u32>),
    U64(Vector<u64>),
}

impl ColumnVector for IdVector {
    type Item<'a> = u64;

    fn len(&self) -> usize {
        match self {
            IdVector::U32(v) => v.len(),
            IdVector::U64(v) => v.len(),
        }
    }

    fn value_at(&self, index: usize) -> Result<Option<u64>, VtileError> {
        Ok(match self {
            IdVector::U32(v) => v.value_at(index)?.map(u64::from),
            IdVector::U64(v) => v.value_at(index)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_convert_to_properties() {
        let vector = PropertyVector::F64(Vector::Constant {
            value: 0.5,
            len: 2,
            validity: None,
        });
        assert_eq!(vector.scalar_type(), ScalarType::Double);
        assert_eq!(vector.get(1).unwrap().map(|v| v.to_property()), Some(PropertyValue::F64(0.5)));
        assert_eq!(Value::String("x").to_property(), PropertyValue::String("x".to_string()));
    }

    #[test]
    fn test_ids_widen_to_u64() {
        let ids = IdVector::U32(Vector::Sequence {
            base: u32::MAX - 1,
            stride: 1,
            len: 2,
        });
        let all: Vec<Option<u64>> = ids.iter().map(|v| v.unwrap()).collect();
        assert_eq!(all, [Some(u32::MAX as u64 - 1), Some(u32::MAX as u64)]);
    }
}
