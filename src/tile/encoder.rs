//! The tile encoder: materialized layers in, tile bytes out.

use crate::codec::integer::{self, IntegerEncoder};
use crate::codec::{boolean, float, geometry, string};
use crate::config::VtileConfig;
use crate::error::VtileError;
use crate::kernels::leb128;
use crate::metadata::{DictionaryType, PhysicalStreamType};
use crate::schema::{Column, ColumnType, FeatureTableSchema, ScalarType, TilesetSchema};
use crate::tile::{Feature, Layer, PropertyValue, TableHeader, Tile};

const DATA: PhysicalStreamType = PhysicalStreamType::Data(DictionaryType::None);

/// Encodes every layer of `tile` against the feature table of the same name.
pub fn encode_tile(tile: &Tile, schema: &TilesetSchema, config: &VtileConfig) -> Result<Vec<u8>, VtileError> {
    schema.validate()?;
    let mut out = Vec::new();
    for layer in &tile.layers {
        let table = schema.table_by_name(&layer.name)?;
        encode_layer(layer, table, config, &mut out)?;
    }
    log::info!("encoded {} layers into {} bytes", tile.layers.len(), out.len());
    Ok(out)
}

/// Appends one feature table block.
pub fn encode_layer(
    layer: &Layer,
    table: &FeatureTableSchema,
    config: &VtileConfig,
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let num_features = u32::try_from(layer.features.len())
        .map_err(|_| VtileError::UnsupportedType(format!("layer '{}' has too many features", layer.name)))?;
    let header = TableHeader {
        table_id: table.id,
        extent: layer.extent,
        geometry_extent: geometry_extent(layer),
        num_features,
    };
    header.write(out);

    for column in &table.columns {
        let (stream_count, bytes) =
            encode_column(&layer.features, column, config).map_err(|e| e.in_column(&column.name))?;
        leb128::encode_one(stream_count, out);
        out.extend_from_slice(&bytes);
        log_metric!(
            "event" = "encode_column",
            "table" = &layer.name,
            "column" = &column.name,
            "streams" = stream_count,
            "bytes" = bytes.len()
        );
    }
    Ok(())
}

fn geometry_extent(layer: &Layer) -> u32 {
    layer
        .features
        .iter()
        .flat_map(|f| f.geometry.vertices())
        .map(|c| c.x.unsigned_abs().max(c.y.unsigned_abs()))
        .max()
        .unwrap_or(0)
}

fn encode_column(features: &[Feature], column: &Column, config: &VtileConfig) -> Result<(u32, Vec<u8>), VtileError> {
    match &column.column_type {
        ColumnType::Id(id_type) => encode_ids(features, *id_type, column.nullable, config),
        ColumnType::Geometry => geometry::encode_column(features.iter().map(|f| &f.geometry), config),
        ColumnType::Scalar(scalar_type) => encode_scalar(features, column, *scalar_type, config),
        ColumnType::Struct(_) => {
            let children = column
                .child_names()
                .iter()
                .map(|name| {
                    features
                        .iter()
                        .map(|f| string_property(f, name))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            string::encode_shared(&children, config)
        }
    }
}

fn string_property<'f>(feature: &'f Feature, name: &str) -> Result<Option<&'f str>, VtileError> {
    match feature.properties.get(name) {
        None => Ok(None),
        Some(PropertyValue::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(VtileError::InvalidSchema(format!(
            "property '{}' is {:?}, expected a string",
            name,
            ScalarType::of(other)
        ))),
    }
}

/// Splits a column into its present bitmap (nullable columns only) and the
/// values of the present rows.
fn split_nulls<T>(
    values: impl Iterator<Item = Option<T>>,
    nullable: bool,
) -> Result<(Option<Vec<bool>>, Vec<T>), VtileError> {
    let mut present = Vec::new();
    let mut dense = Vec::new();
    for value in values {
        match value {
            Some(v) => {
                present.push(true);
                dense.push(v);
            }
            None if nullable => present.push(false),
            None => {
                return Err(VtileError::InvalidSchema(
                    "null value in a non-nullable column".to_string(),
                ))
            }
        }
    }
    Ok((nullable.then_some(present), dense))
}

fn encode_ids(
    features: &[Feature],
    id_type: ScalarType,
    nullable: bool,
    config: &VtileConfig,
) -> Result<(u32, Vec<u8>), VtileError> {
    // An id column without streams decodes as features without ids.
    if !config.include_ids {
        return Ok((0, Vec::new()));
    }
    let encoder = IntegerEncoder::from_config(config);
    let (present, ids) = split_nulls(features.iter().map(|f| f.id), nullable)?;

    let mut out = Vec::new();
    let mut stream_count = 0;
    if let Some(present) = &present {
        boolean::encode_present(present, &mut out)?;
        stream_count += 1;
    }
    match id_type {
        ScalarType::Uint32 => {
            let narrow = ids
                .iter()
                .map(|&id| u32::try_from(id))
                .collect::<Result<Vec<u32>, _>>()
                .map_err(|_| VtileError::InvalidSchema("id does not fit a uint32 id column".to_string()))?;
            integer::encode_stream(&narrow, false, DATA, &encoder, &mut out)?;
        }
        ScalarType::Uint64 => integer::encode_stream(&ids, false, DATA, &encoder, &mut out)?,
        other => return Err(VtileError::InvalidSchema(format!("id column of type {:?}", other))),
    }
    Ok((stream_count + 1, out))
}

macro_rules! property_lanes {
    ($values:expr, $variant:ident, |$x:ident| $convert:expr) => {
        $values
            .iter()
            .filter_map(|v| match v {
                PropertyValue::$variant($x) => Some($convert),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
}

fn encode_scalar(
    features: &[Feature],
    column: &Column,
    scalar_type: ScalarType,
    config: &VtileConfig,
) -> Result<(u32, Vec<u8>), VtileError> {
    let encoder = IntegerEncoder::from_config(config);
    let cells = features
        .iter()
        .map(|f| match f.properties.get(&column.name) {
            Some(value) if ScalarType::of(value) != scalar_type => Err(VtileError::InvalidSchema(format!(
                "value of type {:?} in a {:?} column",
                ScalarType::of(value),
                scalar_type
            ))),
            value => Ok(value),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (present, values) = split_nulls(cells.into_iter(), column.nullable)?;

    let mut out = Vec::new();
    let mut stream_count = 0;
    if let Some(present) = &present {
        boolean::encode_present(present, &mut out)?;
        stream_count += 1;
    }

    match scalar_type {
        ScalarType::Boolean => boolean::encode_stream(&property_lanes!(values, Bool, |v| *v), DATA, &mut out)?,
        ScalarType::Int32 => {
            integer::encode_stream(&property_lanes!(values, I32, |v| *v as u32), true, DATA, &encoder, &mut out)?
        }
        ScalarType::Int64 => {
            integer::encode_stream(&property_lanes!(values, I64, |v| *v as u64), true, DATA, &encoder, &mut out)?
        }
        ScalarType::Uint32 => {
            integer::encode_stream(&property_lanes!(values, U32, |v| *v), false, DATA, &encoder, &mut out)?
        }
        ScalarType::Uint64 => {
            integer::encode_stream(&property_lanes!(values, U64, |v| *v), false, DATA, &encoder, &mut out)?
        }
        ScalarType::Float => float::encode_f32s(&property_lanes!(values, F32, |v| *v), &mut out)?,
        ScalarType::Double => float::encode_f64s(&property_lanes!(values, F64, |v| *v), &mut out)?,
        ScalarType::String => {
            let strings = property_lanes!(values, String, |v| v.as_str());
            let (count, encoded) = string::encode_column(&strings, config)?;
            out.extend_from_slice(&encoded);
            return Ok((stream_count + count, out));
        }
    }
    Ok((stream_count + 1, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Coord, Geometry};
    use std::collections::BTreeMap;

    fn point_layer(values: &[Option<PropertyValue>]) -> Layer {
        Layer {
            name: "points".to_string(),
            extent: 4096,
            features: values
                .iter()
                .enumerate()
                .map(|(i, value)| Feature {
                    id: Some(i as u64),
                    geometry: Geometry::Point(Coord::new(i as i32, -(i as i32) * 100)),
                    properties: value
                        .iter()
                        .map(|v| ("value".to_string(), v.clone()))
                        .collect::<BTreeMap<_, _>>(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_header_carries_geometry_extent() {
        let layer = point_layer(&[None, None, None]);
        assert_eq!(geometry_extent(&layer), 200);

        let tile = Tile { layers: vec![layer] };
        let config = VtileConfig::default();
        let schema = TilesetSchema::infer(&tile, &config).unwrap();
        let bytes = encode_tile(&tile, &schema, &config).unwrap();
        let header = TableHeader::read(&mut std::io::Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(header.num_features, 3);
        assert_eq!(header.geometry_extent, 200);
        assert_eq!(header.extent, 4096);
    }

    #[test]
    fn test_type_mismatch_names_the_column() {
        let layer = point_layer(&[Some(PropertyValue::I32(1)), Some(PropertyValue::U32(2))]);
        let table = FeatureTableSchema {
            id: 0,
            name: "points".to_string(),
            columns: vec![
                Column {
                    name: "geometry".to_string(),
                    nullable: false,
                    column_type: ColumnType::Geometry,
                },
                Column::scalar("value", ScalarType::Int32, false),
            ],
        };
        let err = encode_layer(&layer, &table, &VtileConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, VtileError::ColumnError { ref column, .. } if column == "value"));
    }

    #[test]
    fn test_null_in_non_nullable_column_is_rejected() {
        let (present, values) = split_nulls([Some(1), None, Some(3)].into_iter(), true).unwrap();
        assert_eq!(present, Some(vec![true, false, true]));
        assert_eq!(values, [1, 3]);
        assert!(matches!(
            split_nulls([Some(1), None].into_iter(), false),
            Err(VtileError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_excluded_ids_write_no_streams() {
        let layer = point_layer(&[None]);
        let config = VtileConfig {
            include_ids: false,
            ..VtileConfig::default()
        };
        assert_eq!(encode_ids(&layer.features, ScalarType::Uint32, false, &config).unwrap(), (0, Vec::new()));
        let wide = Feature {
            id: Some(u32::MAX as u64 + 1),
            ..layer.features[0].clone()
        };
        assert!(encode_ids(&[wide], ScalarType::Uint32, false, &VtileConfig::default()).is_err());
    }
}
