//! Geometry vectors: the decoded topology arrays plus one cursor per feature.

use super::ColumnVector;
use crate::codec::geometry::{GeometryColumn, TopologyCursor};
use crate::error::VtileError;
use crate::tile::{Geometry, GeometryType};

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryVector {
    column: GeometryColumn,
    cursors: Vec<TopologyCursor>,
}

impl GeometryVector {
    /// Validates the column in one pass and records where each feature starts.
    pub fn new(column: GeometryColumn) -> Result<Self, VtileError> {
        let cursors = column.feature_cursors()?;
        Ok(Self { column, cursors })
    }

    pub fn geometry_type(&self, index: usize) -> Option<GeometryType> {
        self.column.geometry_types.get(index).copied()
    }
}

impl ColumnVector for GeometryVector {
    type Item<'a> = Geometry;

    fn len(&self) -> usize {
        self.cursors.len()
    }

    fn value_at(&self, index: usize) -> Result<Option<Geometry>, VtileError> {
        let (Some(&geometry_type), Some(&start)) =
            (self.column.geometry_types.get(index), self.cursors.get(index))
        else {
            return Ok(None);
        };
        let mut cursor = start;
        self.column.read_geometry(geometry_type, &mut cursor).map(Some)
    }
}
