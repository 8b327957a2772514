// In: src/error.rs

//! This module defines the single, unified error type for the entire vtile library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every failure is fatal for the call that produced it: the codec never retries,
//! never masks corruption and never returns a partially decoded tile.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VtileError {
    // =========================================================================
    // === High-Level, Semantic Errors
    // =========================================================================
    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    /// A combination that is recognised but not implemented, e.g. FastPFOR on a
    /// 64-bit stream or a nullable nested struct.
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Unknown {kind} ordinal: {value}")]
    UnknownEnumValue { kind: &'static str, value: u32 },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Count mismatch in {context}: expected {expected}, got {actual}")]
    CountMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index} out of bounds for vector of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a schema or config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Invalid UTF-8 in string data: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    // =========================================================================
    // === Low-Level Stream/Kernel Errors
    // =========================================================================
    #[error("Truncated buffer: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("LEB128 decoding error: {0}")]
    Leb128DecodeError(String),

    #[error("RLE decoding error: {0}")]
    RleDecodeError(String),

    #[error("FastPFOR error: {0}")]
    FastPforError(String),

    #[error("Morton code error: {0}")]
    MortonError(String),

    #[error("Symbol table encoding/decoding failed: {0}")]
    SymbolTableError(String),

    #[error("Dictionary encoding/decoding failed: {0}")]
    DictionaryError(String),

    #[error("Geometry encoding/decoding failed: {0}")]
    GeometryError(String),

    #[error("Stream decoding failed in column '{column}': {source}")]
    ColumnError {
        column: String,
        #[source]
        source: Box<VtileError>,
    },
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<std::string::FromUtf8Error> for VtileError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        VtileError::Utf8(err.utf8_error())
    }
}

impl VtileError {
    /// Wraps an error with the name of the column being processed.
    pub fn in_column(self, column: &str) -> Self {
        match self {
            VtileError::ColumnError { .. } => self,
            other => VtileError::ColumnError {
                column: column.to_string(),
                source: Box::new(other),
            },
        }
    }
}
