//! Column declarations for feature tables.
//!
//! Both the encoder and the decoders walk a table's columns in schema order;
//! the tile bytes carry no column names or types of their own. A schema is
//! either loaded from JSON or inferred from a materialized tile.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::VtileConfig;
use crate::error::VtileError;
use crate::tile::{PropertyValue, Tile};

pub const ID_COLUMN: &str = "id";
pub const GEOMETRY_COLUMN: &str = "geometry";

//==================================================================================
// 1. Types
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Boolean,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
}

impl ScalarType {
    /// The scalar type a property value is stored as.
    pub fn of(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(_) => ScalarType::Boolean,
            PropertyValue::I32(_) => ScalarType::Int32,
            PropertyValue::I64(_) => ScalarType::Int64,
            PropertyValue::U32(_) => ScalarType::Uint32,
            PropertyValue::U64(_) => ScalarType::Uint64,
            PropertyValue::F32(_) => ScalarType::Float,
            PropertyValue::F64(_) => ScalarType::Double,
            PropertyValue::String(_) => ScalarType::String,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Feature ids, `uint32` or `uint64`.
    Id(ScalarType),
    Geometry,
    Scalar(ScalarType),
    /// String children sharing one dictionary. A child's property name is the
    /// struct column's name followed by the child's name.
    Struct(Vec<String>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn scalar(name: &str, scalar_type: ScalarType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            nullable,
            column_type: ColumnType::Scalar(scalar_type),
        }
    }

    /// Property names of a struct column's children.
    pub fn child_names(&self) -> Vec<String> {
        match &self.column_type {
            ColumnType::Struct(children) => children
                .iter()
                .map(|child| format!("{}{}", self.name, child))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeatureTableSchema {
    pub id: u32,
    pub name: String,
    pub columns: Vec<Column>,
}

impl FeatureTableSchema {
    fn validate(&self) -> Result<(), VtileError> {
        let invalid = |msg: String| Err(VtileError::InvalidSchema(format!("table '{}': {}", self.name, msg)));

        let mut names = BTreeSet::new();
        let mut num_ids = 0;
        let mut num_geometries = 0;
        for column in &self.columns {
            if !names.insert(column.name.as_str()) {
                return invalid(format!("duplicate column '{}'", column.name));
            }
            match &column.column_type {
                ColumnType::Id(ScalarType::Uint32 | ScalarType::Uint64) => num_ids += 1,
                ColumnType::Id(other) => return invalid(format!("id column of type {:?}", other)),
                ColumnType::Geometry => {
                    if column.nullable {
                        return invalid("nullable geometry column".to_string());
                    }
                    num_geometries += 1;
                }
                ColumnType::Scalar(_) => {}
                ColumnType::Struct(children) => {
                    if children.is_empty() {
                        return invalid(format!("struct column '{}' without children", column.name));
                    }
                    if column.nullable {
                        return Err(VtileError::NotSupported(format!(
                            "nullable struct column '{}'",
                            column.name
                        )));
                    }
                }
            }
        }
        if num_ids > 1 {
            return invalid("more than one id column".to_string());
        }
        if num_geometries != 1 {
            return invalid(format!("{} geometry columns, expected one", num_geometries));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TilesetSchema {
    pub feature_tables: Vec<FeatureTableSchema>,
}

impl TilesetSchema {
    /// Parses and validates a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, VtileError> {
        let schema: TilesetSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String, VtileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), VtileError> {
        let mut ids = BTreeSet::new();
        for table in &self.feature_tables {
            if !ids.insert(table.id) {
                return Err(VtileError::InvalidSchema(format!(
                    "duplicate feature table id {}",
                    table.id
                )));
            }
            table.validate()?;
        }
        Ok(())
    }

    pub fn table(&self, id: u32) -> Result<&FeatureTableSchema, VtileError> {
        self.feature_tables
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| VtileError::InvalidSchema(format!("no feature table with id {}", id)))
    }

    pub fn table_by_name(&self, name: &str) -> Result<&FeatureTableSchema, VtileError> {
        self.feature_tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| VtileError::InvalidSchema(format!("no feature table named '{}'", name)))
    }

    //==============================================================================
    // 2. Inference
    //==============================================================================

    /// Derives a schema from the values of a tile.
    ///
    /// Property types come from the values (a property seen with two types is
    /// an error), nullability from properties missing on some features. With a
    /// delimiter configured, string properties `base`, `base<d>x`, `base<d>y`
    /// become one struct column named `base`.
    pub fn infer(tile: &Tile, config: &VtileConfig) -> Result<Self, VtileError> {
        let mut feature_tables = Vec::with_capacity(tile.layers.len());
        for (index, layer) in tile.layers.iter().enumerate() {
            let mut columns = Vec::new();

            let ids: Vec<Option<u64>> = layer.features.iter().map(|f| f.id).collect();
            if config.include_ids && ids.iter().any(Option::is_some) {
                let wide = ids.iter().flatten().any(|&id| id > u32::MAX as u64);
                columns.push(Column {
                    name: ID_COLUMN.to_string(),
                    nullable: ids.iter().any(Option::is_none),
                    column_type: ColumnType::Id(if wide { ScalarType::Uint64 } else { ScalarType::Uint32 }),
                });
            }
            columns.push(Column {
                name: GEOMETRY_COLUMN.to_string(),
                nullable: false,
                column_type: ColumnType::Geometry,
            });

            let mut properties: BTreeMap<&str, (ScalarType, usize)> = BTreeMap::new();
            let mut shadowed = BTreeSet::new();
            for feature in &layer.features {
                for (name, value) in &feature.properties {
                    if is_reserved(name) {
                        shadowed.insert(name.as_str());
                        continue;
                    }
                    let scalar_type = ScalarType::of(value);
                    let entry = properties.entry(name.as_str()).or_insert((scalar_type, 0));
                    if entry.0 != scalar_type {
                        return Err(VtileError::InvalidSchema(format!(
                            "property '{}' in layer '{}' has values of type {:?} and {:?}",
                            name, layer.name, entry.0, scalar_type
                        )));
                    }
                    entry.1 += 1;
                }
            }
            if !shadowed.is_empty() {
                log::warn!(
                    "layer '{}': properties {:?} share a reserved column name and are not encoded",
                    layer.name,
                    shadowed
                );
            }

            let mut groups = match &config.shared_dictionary_delimiter {
                Some(delimiter) => shared_groups(&properties, delimiter),
                None => BTreeMap::new(),
            };
            groups.retain(|base, _| !is_reserved(base));
            let grouped: BTreeSet<&str> = groups.values().flatten().copied().collect();

            for (&name, &(scalar_type, count)) in &properties {
                if let Some(members) = groups.get(name) {
                    columns.push(Column {
                        name: name.to_string(),
                        nullable: false,
                        column_type: ColumnType::Struct(
                            members.iter().map(|m| m[name.len()..].to_string()).collect(),
                        ),
                    });
                } else if !grouped.contains(name) {
                    columns.push(Column::scalar(name, scalar_type, count < layer.features.len()));
                }
            }
            // Groups whose base name is not itself a property.
            for (base, members) in &groups {
                if !properties.contains_key(base.as_str()) {
                    columns.push(Column {
                        name: base.clone(),
                        nullable: false,
                        column_type: ColumnType::Struct(
                            members.iter().map(|m| m[base.len()..].to_string()).collect(),
                        ),
                    });
                }
            }

            feature_tables.push(FeatureTableSchema {
                id: index as u32,
                name: layer.name.clone(),
                columns,
            });
        }

        let schema = TilesetSchema { feature_tables };
        schema.validate()?;
        log::debug!("inferred schema for {} feature tables", schema.feature_tables.len());
        Ok(schema)
    }
}

/// Groups string properties by the part of their name before `delimiter`.
/// Only groups of at least two members whose base is absent or a string are
/// kept. Members are listed base first.
fn is_reserved(name: &str) -> bool {
    name == ID_COLUMN || name == GEOMETRY_COLUMN
}

fn shared_groups<'p>(
    properties: &BTreeMap<&'p str, (ScalarType, usize)>,
    delimiter: &str,
) -> BTreeMap<String, Vec<&'p str>> {
    let mut groups: BTreeMap<String, Vec<&'p str>> = BTreeMap::new();
    for (&name, &(scalar_type, _)) in properties {
        if scalar_type != ScalarType::String || delimiter.is_empty() {
            continue;
        }
        if let Some(pos) = name.find(delimiter) {
            groups.entry(name[..pos].to_string()).or_default().push(name);
        }
    }
    groups.retain(|base, members| match properties.get(base.as_str()) {
        Some((ScalarType::String, _)) => {
            members.insert(0, properties.get_key_value(base.as_str()).map_or("", |(k, _)| *k));
            true
        }
        Some(_) => false,
        None => members.len() >= 2,
    });
    groups
}
