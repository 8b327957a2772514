//! Symbol tables trained by the `fsst-rs` crate.

use fsst::Compressor;

use super::{SymbolTable, SymbolTableBackend};
use crate::error::VtileError;

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl SymbolTableBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "fsst-rs"
    }

    fn encode(&self, corpus: &[u8]) -> Result<SymbolTable, VtileError> {
        let compressor = Compressor::train(&vec![corpus]);
        let lengths = compressor.symbol_lengths();

        let mut symbols = Vec::new();
        for (symbol, &len) in compressor.symbol_table().iter().zip(lengths) {
            symbols.extend_from_slice(&symbol.to_u64().to_le_bytes()[..len as usize]);
        }

        Ok(SymbolTable {
            symbols,
            symbol_lengths: lengths.iter().map(|&len| len as u32).collect(),
            compressed: compressor.compress(corpus),
        })
    }
}
