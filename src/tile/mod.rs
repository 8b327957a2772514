//! Tile framing and the three tile-level entry points.
//!
//! A tile is a sequence of feature table blocks read until the buffer ends.
//! Each block opens with a version byte and a varint header, followed by one
//! varint stream count plus that many streams for every column of the table's
//! schema, in schema order.

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod vectorized;

pub use decoder::decode_tile;
pub use encoder::encode_tile;
pub use model::*;
pub use vectorized::{decode_vectorized, FeatureTable};

use std::io::Cursor;

use crate::error::VtileError;
use crate::kernels::leb128;
use crate::utils::read_u8;

/// The only block version this crate reads and writes.
pub const TILE_VERSION: u8 = 1;

/// The header that opens every feature table block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub table_id: u32,
    pub extent: u32,
    /// Largest absolute coordinate value in the table.
    pub geometry_extent: u32,
    pub num_features: u32,
}

impl TableHeader {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(TILE_VERSION);
        leb128::encode_one(self.table_id, out);
        leb128::encode_one(self.extent, out);
        leb128::encode_one(self.geometry_extent, out);
        leb128::encode_one(self.num_features, out);
    }

    pub fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, VtileError> {
        let version = read_u8(cursor)?;
        if version != TILE_VERSION {
            return Err(VtileError::UnknownEnumValue {
                kind: "tile version",
                value: version as u32,
            });
        }
        Ok(Self {
            table_id: leb128::decode_one(cursor)?,
            extent: leb128::decode_one(cursor)?,
            geometry_extent: leb128::decode_one(cursor)?,
            num_features: leb128::decode_one(cursor)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = TableHeader {
            table_id: 3,
            extent: 4096,
            geometry_extent: 4200,
            num_features: 1,
        };
        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf, [1, 3, 0x80, 0x20, 0xE8, 0x20, 1]);
        assert_eq!(TableHeader::read(&mut Cursor::new(buf.as_slice())).unwrap(), header);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let buf = [2u8, 0, 0, 0, 0];
        assert!(matches!(
            TableHeader::read(&mut Cursor::new(&buf[..])),
            Err(VtileError::UnknownEnumValue { kind: "tile version", value: 2 })
        ));
        assert!(matches!(
            TableHeader::read(&mut Cursor::new(&[1u8, 0][..])),
            Err(VtileError::Truncated { .. })
        ));
    }
}
