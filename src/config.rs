// In: src/config.rs

//! The single source of truth for all vtile encoding configuration.
//!
//! `VtileConfig` is created once at the application boundary (e.g., from a JSON
//! file) and passed by reference into the tile encoder. Decoding never needs a
//! config: every choice made here is recorded in the stream headers.

use serde::{Deserialize, Serialize};

use crate::error::VtileError;

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// The physical technique used for 32-bit integer streams. 64-bit streams are
/// always varint-encoded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalTechniqueChoice {
    /// LEB128 variable-length bytes.
    #[default]
    Varint,
    /// Block bit-packing with exceptions, 256 values per block.
    FastPfor,
}

/// Which logical technique the integer encoder applies.
///
/// `Auto` tries every applicable candidate and keeps the smallest; the other
/// options force one technique regardless of the resulting size.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegerEncodingOption {
    #[default]
    Auto,
    Plain,
    Delta,
    Rle,
    DeltaRle,
}

/// Which implementation trains and applies symbol tables.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymbolTableBackendKind {
    /// The pure-Rust builder in `crate::fsst::builder`.
    #[default]
    Builtin,
    /// The `fsst-rs` crate. Requires the `fsst-rs` cargo feature.
    Native,
}

//==================================================================================
// II. The Unified VtileConfig
//==================================================================================

/// The single, unified configuration for encoding a tile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct VtileConfig {
    /// Physical technique for 32-bit integer streams.
    #[serde(default)]
    pub physical_technique: PhysicalTechniqueChoice,

    /// Logical technique selection for integer streams.
    #[serde(default)]
    pub integer_encoding: IntegerEncodingOption,

    /// If false, feature ids are dropped and the id column is not written.
    #[serde(default = "default_true")]
    pub include_ids: bool,

    /// Allow the deduplicated, Z-order sorted vertex buffer layout.
    #[serde(default = "default_true")]
    pub use_vertex_dictionary: bool,

    /// Allow the deduplicated Morton-code vertex buffer layout.
    #[serde(default = "default_true")]
    pub use_morton_dictionary: bool,

    /// Allow symbol-table compression of string dictionaries.
    #[serde(default = "default_true")]
    pub use_symbol_table: bool,

    #[serde(default)]
    pub symbol_table_backend: SymbolTableBackendKind,

    /// Number of corpus bytes the built-in symbol table builder trains on.
    #[serde(default = "default_symbol_table_sample_size")]
    pub symbol_table_sample_size: usize,

    /// Delimiter that groups string properties into one shared dictionary
    /// during schema inference (`name`, `name:de`, `name:en`). `None` disables
    /// grouping.
    #[serde(default = "default_shared_dictionary_delimiter")]
    pub shared_dictionary_delimiter: Option<String>,
}

impl Default for VtileConfig {
    fn default() -> Self {
        Self {
            physical_technique: PhysicalTechniqueChoice::default(),
            integer_encoding: IntegerEncodingOption::default(),
            include_ids: true,
            use_vertex_dictionary: true,
            use_morton_dictionary: true,
            use_symbol_table: true,
            symbol_table_backend: SymbolTableBackendKind::default(),
            symbol_table_sample_size: default_symbol_table_sample_size(),
            shared_dictionary_delimiter: default_shared_dictionary_delimiter(),
        }
    }
}

impl VtileConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, VtileError> {
        let config: VtileConfig = serde_json::from_str(json)?;
        if config.symbol_table_sample_size == 0 {
            return Err(VtileError::InvalidSchema(
                "symbol_table_sample_size must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_symbol_table_sample_size() -> usize {
    crate::fsst::DEFAULT_SAMPLE_SIZE
}

fn default_shared_dictionary_delimiter() -> Option<String> {
    Some(":".to_string())
}
