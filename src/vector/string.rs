//! String vectors. Values stay in their corpus and are sliced out per access.

use bitvec::prelude::*;
use std::sync::Arc;

use super::{is_present, scatter, ColumnVector, Validity};
use crate::codec::string::{SharedChild, StringDictionary, StringValues};
use crate::error::VtileError;

#[derive(Debug, Clone, PartialEq)]
pub enum StringVector {
    /// Plain strings. `rows` maps each row to its entry when the column has
    /// nulls; otherwise row `i` is entry `i`.
    Flat {
        values: StringDictionary,
        rows: Option<Vec<u32>>,
        validity: Validity,
    },
    /// Per-row indices into a dictionary, possibly shared with other columns.
    Dictionary {
        dictionary: Arc<StringDictionary>,
        indices: Vec<u32>,
        validity: Validity,
    },
}

impl StringVector {
    /// Wraps the decoded values of a string column with `num_rows` rows.
    pub fn from_values(values: StringValues, validity: Validity, num_rows: usize) -> Result<Self, VtileError> {
        let expected = validity.as_ref().map_or(num_rows, |v| v.count_ones());
        if values.len() != expected {
            return Err(VtileError::CountMismatch {
                context: "string column values".to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(match values {
            StringValues::Plain(values) => {
                let rows = match &validity {
                    Some(present) => {
                        let entries: Vec<u32> = (0..values.len() as u32).collect();
                        Some(scatter(present, &entries, 0)?)
                    }
                    None => None,
                };
                StringVector::Flat {
                    values,
                    rows,
                    validity,
                }
            }
            StringValues::Dictionary { dictionary, indices } => {
                let indices = match &validity {
                    Some(present) => scatter(present, &indices, 0)?,
                    None => indices,
                };
                StringVector::Dictionary {
                    dictionary,
                    indices,
                    validity,
                }
            }
        })
    }

    /// One child of a shared dictionary column. A child without streams is
    /// null in every row.
    pub fn from_shared_child(
        dictionary: Arc<StringDictionary>,
        child: Option<SharedChild>,
        num_rows: usize,
    ) -> Result<Self, VtileError> {
        let (present, indices) = match child {
            Some(child) => (child.present, child.indices),
            None => (BitVec::<u8, Lsb0>::repeat(false, num_rows), Vec::new()),
        };
        if present.len() != num_rows {
            return Err(VtileError::CountMismatch {
                context: "shared dictionary child rows".to_string(),
                expected: num_rows,
                actual: present.len(),
            });
        }
        let indices = scatter(&present, &indices, 0)?;
        Ok(StringVector::Dictionary {
            dictionary,
            indices,
            validity: Some(present),
        })
    }
}

impl ColumnVector for StringVector {
    type Item<'a> = &'a str;

    fn len(&self) -> usize {
        match self {
            StringVector::Flat { rows: Some(rows), .. } => rows.len(),
            StringVector::Flat { values, rows: None, .. } => values.len(),
            StringVector::Dictionary { indices, .. } => indices.len(),
        }
    }

    fn value_at(&self, index: usize) -> Result<Option<&str>, VtileError> {
        let (validity, entry, values): (&Validity, Option<usize>, &StringDictionary) = match self {
            StringVector::Flat {
                values,
                rows,
                validity,
            } => {
                let entry = match rows {
                    Some(rows) => rows.get(index).map(|&e| e as usize),
                    None => Some(index),
                };
                (validity, entry, values)
            }
            StringVector::Dictionary {
                dictionary,
                indices,
                validity,
            } => (validity, indices.get(index).map(|&i| i as usize), dictionary.as_ref()),
        };
        if !is_present(validity, index) {
            return Ok(None);
        }
        Ok(entry.and_then(|e| values.get(e)))
    }
}
