//! The vectorized decoder: tile bytes in, one `FeatureTable` of column
//! vectors per feature table block out.
//!
//! Nothing is materialized beyond what the streams require. Integer columns
//! may collapse to constants or sequences, strings stay in their dictionaries
//! and geometries are rebuilt only when a row is read.

use std::collections::BTreeMap;
use std::io::Cursor;

use crate::codec::geometry::GeometryColumn;
use crate::codec::{boolean, float, string};
use crate::error::VtileError;
use crate::kernels::leb128;
use crate::metadata::Stream;
use crate::schema::{Column, ColumnType, FeatureTableSchema, ScalarType, TilesetSchema};
use crate::tile::{Feature, Layer, TableHeader};
use crate::utils::{checked_count, remaining};
use crate::vector::{ColumnVector, GeometryVector, IdVector, PropertyVector, StringVector, Validity, Vector};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub name: String,
    pub extent: u32,
    pub geometry_extent: u32,
    /// `None` when the table has no id column or it was written without ids.
    pub ids: Option<IdVector>,
    pub geometries: GeometryVector,
    /// Keyed by property name. Struct children appear under their own names.
    pub properties: BTreeMap<String, PropertyVector>,
    num_features: usize,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.num_features
    }

    pub fn is_empty(&self) -> bool {
        self.num_features == 0
    }

    pub fn property(&self, name: &str) -> Option<&PropertyVector> {
        self.properties.get(name)
    }

    /// Materializes the feature at `index`.
    pub fn feature(&self, index: usize) -> Result<Feature, VtileError> {
        let id = match &self.ids {
            Some(ids) => ids.get(index)?,
            None => None,
        };
        let geometry = self.geometries.get(index)?.ok_or_else(|| {
            VtileError::InternalError(format!("feature {} of '{}' has no geometry", index, self.name))
        })?;
        let mut properties = BTreeMap::new();
        for (name, vector) in &self.properties {
            if let Some(value) = vector.get(index)? {
                properties.insert(name.clone(), value.to_property());
            }
        }
        Ok(Feature {
            id,
            geometry,
            properties,
        })
    }

    /// Materializes every feature in row order.
    pub fn to_layer(&self) -> Result<Layer, VtileError> {
        let features = (0..self.num_features)
            .map(|i| self.feature(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Layer {
            name: self.name.clone(),
            extent: self.extent,
            features,
        })
    }
}

/// Decodes every feature table block of a tile.
pub fn decode_vectorized(data: &[u8], schema: &TilesetSchema) -> Result<Vec<FeatureTable>, VtileError> {
    schema.validate()?;
    let mut cursor = Cursor::new(data);
    let mut tables = Vec::new();
    while remaining(&cursor) > 0 {
        tables.push(decode_table(&mut cursor, schema)?);
    }
    log::debug!("decoded {} feature tables from {} bytes", tables.len(), data.len());
    Ok(tables)
}

/// Decodes one feature table block.
pub fn decode_table(cursor: &mut Cursor<&[u8]>, schema: &TilesetSchema) -> Result<FeatureTable, VtileError> {
    let header = TableHeader::read(cursor)?;
    let table = schema.table(header.table_id)?;
    let num_features = checked_count(header.num_features, "feature")?;

    let mut ids = None;
    let mut geometries = None;
    let mut properties = BTreeMap::new();
    for column in &table.columns {
        let stream_count: u32 = leb128::decode_one(cursor)?;
        decode_column(
            cursor,
            column,
            stream_count,
            num_features,
            &mut ids,
            &mut geometries,
            &mut properties,
        )
        .map_err(|e| e.in_column(&column.name))?;
    }

    let geometries = geometries.ok_or_else(|| missing_geometry(table))?;
    check_count("geometry column", num_features, geometries.len())?;
    if let Some(ids) = &ids {
        check_count("id column", num_features, ids.len())?;
    }
    for vector in properties.values() {
        check_count("property column", num_features, vector.len())?;
    }

    Ok(FeatureTable {
        name: table.name.clone(),
        extent: header.extent,
        geometry_extent: header.geometry_extent,
        ids,
        geometries,
        properties,
        num_features,
    })
}

fn missing_geometry(table: &FeatureTableSchema) -> VtileError {
    VtileError::InvalidSchema(format!("table '{}' has no geometry column", table.name))
}

fn check_count(context: &str, expected: usize, actual: usize) -> Result<(), VtileError> {
    if expected != actual {
        return Err(VtileError::CountMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn decode_column(
    cursor: &mut Cursor<&[u8]>,
    column: &Column,
    stream_count: u32,
    num_rows: usize,
    ids: &mut Option<IdVector>,
    geometries: &mut Option<GeometryVector>,
    properties: &mut BTreeMap<String, PropertyVector>,
) -> Result<(), VtileError> {
    match &column.column_type {
        ColumnType::Id(_) if stream_count == 0 => {}
        ColumnType::Id(id_type) => {
            let (validity, streams) = read_validity(cursor, column.nullable, stream_count, num_rows)?;
            let stream = single_stream(cursor, streams)?;
            *ids = Some(match id_type {
                ScalarType::Uint32 => IdVector::U32(Vector::from_int_stream::<u32>(
                    &stream,
                    false,
                    validity,
                    num_rows,
                    |v| v,
                )?),
                ScalarType::Uint64 => IdVector::U64(Vector::from_int_stream::<u64>(
                    &stream,
                    false,
                    validity,
                    num_rows,
                    |v| v,
                )?),
                other => return Err(VtileError::InvalidSchema(format!("id column of type {:?}", other))),
            });
        }
        ColumnType::Geometry => {
            *geometries = Some(GeometryVector::new(GeometryColumn::decode(cursor, stream_count)?)?);
        }
        ColumnType::Scalar(scalar_type) => {
            let (validity, streams) = read_validity(cursor, column.nullable, stream_count, num_rows)?;
            let vector = decode_scalar(cursor, *scalar_type, validity, streams, num_rows)?;
            properties.insert(column.name.clone(), vector);
        }
        ColumnType::Struct(children) => {
            let shared = string::decode_shared(cursor, stream_count, children.len())?;
            for (name, child) in column.child_names().into_iter().zip(shared.children) {
                let vector = StringVector::from_shared_child(shared.dictionary.clone(), child, num_rows)?;
                properties.insert(name, PropertyVector::String(vector));
            }
        }
    }
    Ok(())
}

/// Reads the present stream of a nullable column. Returns the bitmap and the
/// number of streams left for the values.
fn read_validity(
    cursor: &mut Cursor<&[u8]>,
    nullable: bool,
    stream_count: u32,
    num_rows: usize,
) -> Result<(Validity, u32), VtileError> {
    if !nullable {
        return Ok((None, stream_count));
    }
    if stream_count == 0 {
        return Err(VtileError::InvalidSchema(
            "nullable column without a present stream".to_string(),
        ));
    }
    let present = boolean::read_present(cursor)?;
    check_count("present stream", num_rows, present.len())?;
    Ok((Some(present), stream_count - 1))
}

fn single_stream<'a>(cursor: &mut Cursor<&'a [u8]>, streams: u32) -> Result<Stream<'a>, VtileError> {
    if streams != 1 {
        return Err(VtileError::CountMismatch {
            context: "value streams".to_string(),
            expected: 1,
            actual: streams as usize,
        });
    }
    Stream::read(cursor)
}

fn decode_scalar(
    cursor: &mut Cursor<&[u8]>,
    scalar_type: ScalarType,
    validity: Validity,
    streams: u32,
    num_rows: usize,
) -> Result<PropertyVector, VtileError> {
    if scalar_type == ScalarType::String {
        let values = string::decode_column(cursor, streams)?;
        return Ok(PropertyVector::String(StringVector::from_values(values, validity, num_rows)?));
    }

    let stream = single_stream(cursor, streams)?;
    Ok(match scalar_type {
        ScalarType::Boolean => {
            let bits = boolean::decode_stream(&stream)?;
            PropertyVector::Bool(Vector::from_values(bits.iter().by_vals().collect(), validity, num_rows)?)
        }
        ScalarType::Int32 => {
            PropertyVector::I32(Vector::from_int_stream::<u32>(&stream, true, validity, num_rows, |v| v as i32)?)
        }
        ScalarType::Int64 => {
            PropertyVector::I64(Vector::from_int_stream::<u64>(&stream, true, validity, num_rows, |v| v as i64)?)
        }
        ScalarType::Uint32 => {
            PropertyVector::U32(Vector::from_int_stream::<u32>(&stream, false, validity, num_rows, |v| v)?)
        }
        ScalarType::Uint64 => {
            PropertyVector::U64(Vector::from_int_stream::<u64>(&stream, false, validity, num_rows, |v| v)?)
        }
        ScalarType::Float => PropertyVector::F32(Vector::from_values(float::decode_f32s(&stream)?, validity, num_rows)?),
        ScalarType::Double => PropertyVector::F64(Vector::from_values(float::decode_f64s(&stream)?, validity, num_rows)?),
        ScalarType::String => {
            return Err(VtileError::InternalError("string column reached the scalar decoder".to_string()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegerEncodingOption, VtileConfig};
    use crate::tile::{encode_tile, Coord, Geometry, PropertyValue, Tile};

    fn numbered_tile(num_features: usize) -> Tile {
        let features = (0..num_features)
            .map(|i| {
                let mut properties = BTreeMap::new();
                properties.insert("class".to_string(), PropertyValue::String("residential".to_string()));
                properties.insert("rank".to_string(), PropertyValue::I32(3));
                if i % 3 == 0 {
                    properties.insert("height".to_string(), PropertyValue::F64(i as f64 * 1.5));
                }
                Feature {
                    id: Some(i as u64 + 1),
                    geometry: Geometry::Point(Coord::new(i as i32 * 8, 64)),
                    properties,
                }
            })
            .collect();
        Tile {
            layers: vec![Layer {
                name: "buildings".to_string(),
                extent: 4096,
                features,
            }],
        }
    }

    #[test]
    fn test_columns_pick_lazy_representations() {
        let tile = numbered_tile(40);
        let config = VtileConfig {
            integer_encoding: IntegerEncodingOption::Auto,
            ..VtileConfig::default()
        };
        let schema = TilesetSchema::infer(&tile, &config).unwrap();
        let bytes = encode_tile(&tile, &schema, &config).unwrap();
        let tables = decode_vectorized(&bytes, &schema).unwrap();
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.len(), 40);
        assert_eq!(table.geometry_extent, 39 * 8);

        assert!(matches!(table.ids, Some(IdVector::U32(Vector::Sequence { base: 1, stride: 1, .. }))));
        assert!(matches!(table.property("rank"), Some(PropertyVector::I32(Vector::Constant { value: 3, .. }))));
        assert!(matches!(
            table.property("class"),
            Some(PropertyVector::String(StringVector::Dictionary { .. }))
        ));

        let heights = table.property("height").unwrap();
        assert_eq!(heights.get(3).unwrap().map(|v| v.to_property()), Some(PropertyValue::F64(4.5)));
        assert_eq!(heights.get(4).unwrap(), None);
        assert_eq!(table.feature(7).unwrap(), tile.layers[0].features[7]);
    }

    #[test]
    fn test_table_ids_must_be_known() {
        let tile = numbered_tile(2);
        let config = VtileConfig::default();
        let schema = TilesetSchema::infer(&tile, &config).unwrap();
        let bytes = encode_tile(&tile, &schema, &config).unwrap();
        let empty = TilesetSchema::default();
        assert!(matches!(decode_vectorized(&bytes, &empty), Err(VtileError::InvalidSchema(_))));
    }

    #[test]
    fn test_feature_count_must_match_columns() {
        let tile = numbered_tile(5);
        let config = VtileConfig::default();
        let schema = TilesetSchema::infer(&tile, &config).unwrap();
        let mut bytes = encode_tile(&tile, &schema, &config).unwrap();
        // Header: version, table id, extent (2 bytes), geometry extent, feature count.
        assert_eq!(bytes[5], 5);
        bytes[5] = 6;
        let err = decode_vectorized(&bytes, &schema).unwrap_err();
        assert!(matches!(
            err,
            VtileError::CountMismatch { .. } | VtileError::ColumnError { .. }
        ));
    }

    #[test]
    fn test_truncated_tile_fails() {
        let tile = numbered_tile(10);
        let config = VtileConfig::default();
        let schema = TilesetSchema::infer(&tile, &config).unwrap();
        let bytes = encode_tile(&tile, &schema, &config).unwrap();
        assert!(decode_vectorized(&bytes[..bytes.len() - 1], &schema).is_err());
    }
}
