//! Symbol-table compression of string corpora.
//!
//! A symbol table maps one-byte codes to byte sequences of up to eight bytes.
//! The compressed corpus is a sequence of codes; code 255 is an escape meaning
//! "the next byte is a literal". Training is pluggable behind
//! [`SymbolTableBackend`]; decoding only depends on the table and is shared by
//! every backend.

pub mod builder;
#[cfg(feature = "fsst-rs")]
pub mod native;

use crate::config::{SymbolTableBackendKind, VtileConfig};
use crate::error::VtileError;

pub const ESCAPE_CODE: u8 = 255;
pub const MAX_SYMBOL_LENGTH: usize = 8;
pub const DEFAULT_SAMPLE_SIZE: usize = 30_000;

/// A trained table together with the corpus compressed by it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolTable {
    /// All symbols, concatenated in code order.
    pub symbols: Vec<u8>,
    pub symbol_lengths: Vec<u32>,
    pub compressed: Vec<u8>,
}

impl SymbolTable {
    pub fn num_symbols(&self) -> usize {
        self.symbol_lengths.len()
    }

    /// Expands the compressed corpus back to its original bytes.
    pub fn decode(&self) -> Result<Vec<u8>, VtileError> {
        decode(&self.symbols, &self.symbol_lengths, &self.compressed)
    }
}

/// Expands `compressed` using a symbol table given as concatenated symbols and
/// their lengths.
pub fn decode(symbols: &[u8], symbol_lengths: &[u32], compressed: &[u8]) -> Result<Vec<u8>, VtileError> {
    if symbol_lengths.len() > ESCAPE_CODE as usize {
        return Err(VtileError::SymbolTableError(format!(
            "{} symbols exceed the 255 available codes",
            symbol_lengths.len()
        )));
    }
    let mut offsets = Vec::with_capacity(symbol_lengths.len() + 1);
    let mut total = 0usize;
    offsets.push(0);
    for &len in symbol_lengths {
        total += len as usize;
        offsets.push(total);
    }
    if total != symbols.len() {
        return Err(VtileError::SymbolTableError(format!(
            "symbol lengths cover {} bytes, table holds {}",
            total,
            symbols.len()
        )));
    }

    let mut output = Vec::with_capacity(compressed.len() * 2);
    let mut bytes = compressed.iter().copied();
    while let Some(code) = bytes.next() {
        if code == ESCAPE_CODE {
            let literal = bytes.next().ok_or_else(|| {
                VtileError::SymbolTableError("escape code at the end of the corpus".to_string())
            })?;
            output.push(literal);
        } else {
            let code = code as usize;
            if code >= symbol_lengths.len() {
                return Err(VtileError::SymbolTableError(format!(
                    "code {} outside a table of {} symbols",
                    code,
                    symbol_lengths.len()
                )));
            }
            output.extend_from_slice(&symbols[offsets[code]..offsets[code + 1]]);
        }
    }
    Ok(output)
}

/// Trains a symbol table on a corpus and compresses the corpus with it.
pub trait SymbolTableBackend {
    fn name(&self) -> &'static str;
    fn encode(&self, corpus: &[u8]) -> Result<SymbolTable, VtileError>;
}

/// The pure-Rust builder.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinBackend {
    pub sample_size: usize,
}

impl Default for BuiltinBackend {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl SymbolTableBackend for BuiltinBackend {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn encode(&self, corpus: &[u8]) -> Result<SymbolTable, VtileError> {
        Ok(builder::SymbolTableBuilder::train(corpus, self.sample_size).encode(corpus))
    }
}

/// Selects the backend named by the config.
pub fn backend_for(config: &VtileConfig) -> Result<Box<dyn SymbolTableBackend>, VtileError> {
    match config.symbol_table_backend {
        SymbolTableBackendKind::Builtin => Ok(Box::new(BuiltinBackend {
            sample_size: config.symbol_table_sample_size,
        })),
        #[cfg(feature = "fsst-rs")]
        SymbolTableBackendKind::Native => Ok(Box::new(native::NativeBackend)),
        #[cfg(not(feature = "fsst-rs"))]
        SymbolTableBackendKind::Native => Err(VtileError::NotSupported(
            "the native symbol table backend needs the `fsst-rs` feature".to_string(),
        )),
    }
}
