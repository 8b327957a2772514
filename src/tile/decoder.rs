//! The sequential decoder: tile bytes in, fully materialized layers out.

use crate::error::VtileError;
use crate::schema::TilesetSchema;
use crate::tile::{decode_vectorized, FeatureTable, Tile};

/// Decodes a tile into layers of features. Fails on the first malformed
/// block; no partial tile is returned.
pub fn decode_tile(data: &[u8], schema: &TilesetSchema) -> Result<Tile, VtileError> {
    let layers = decode_vectorized(data, schema)?
        .iter()
        .map(FeatureTable::to_layer)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Tile { layers })
}
