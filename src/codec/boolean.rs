//! Boolean and present (null bitmap) streams.
//!
//! Both are LSB-first bitmaps compressed with byte RLE. The header carries the
//! bit count as its value count, technique 1 = RLE and physical NONE, which keeps
//! the base header variant.

use bitvec::prelude::*;
use std::io::Cursor;

use crate::error::VtileError;
use crate::kernels::byte_rle;
use crate::metadata::{LogicalTechnique, PhysicalStreamType, PhysicalTechnique, Stream, StreamMetadata};

/// Encodes a boolean sequence as one stream of the given role.
pub fn encode_stream(
    values: &[bool],
    stream_type: PhysicalStreamType,
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let payload = byte_rle::encode_bools(values);
    let metadata = StreamMetadata::new(
        stream_type,
        LogicalTechnique::Rle,
        LogicalTechnique::None,
        PhysicalTechnique::None,
        values.len() as u32,
        payload.len() as u32,
    );
    Stream::write(&metadata, &payload, out)
}

/// Encodes the present stream for a nullable column.
pub fn encode_present(present: &[bool], out: &mut Vec<u8>) -> Result<(), VtileError> {
    encode_stream(present, PhysicalStreamType::Present, out)
}

/// Decodes a boolean stream into a bitmap of exactly `num_values` bits.
pub fn decode_stream(stream: &Stream<'_>) -> Result<BitVec<u8, Lsb0>, VtileError> {
    let meta = &stream.metadata;
    if meta.physical != PhysicalTechnique::None {
        return Err(VtileError::NotSupported(format!(
            "physical technique {:?} for a boolean stream",
            meta.physical
        )));
    }
    let num_values = crate::utils::checked_count(meta.num_values, "boolean")?;
    let mut cursor = Cursor::new(stream.data);
    byte_rle::decode_bools(&mut cursor, num_values)
}

/// Reads the present stream that opens a nullable column.
pub fn read_present(cursor: &mut Cursor<&[u8]>) -> Result<BitVec<u8, Lsb0>, VtileError> {
    let stream = Stream::read_expecting(cursor, PhysicalStreamType::Present)?;
    decode_stream(&stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DictionaryType;

    #[test]
    fn test_present_roundtrip() {
        let present: Vec<bool> = (0..1000).map(|i| i % 3 != 0).collect();
        let mut buf = Vec::new();
        encode_present(&present, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf.as_slice());
        let bitmap = read_present(&mut cursor).unwrap();
        assert_eq!(bitmap.len(), present.len());
        assert_eq!(bitmap.iter().by_vals().collect::<Vec<_>>(), present);
        assert_eq!(bitmap.count_ones(), present.iter().filter(|&&p| p).count());
    }

    #[test]
    fn test_boolean_data_stream_and_role_check() {
        let values = vec![true; 20];
        let mut buf = Vec::new();
        encode_stream(&values, PhysicalStreamType::Data(DictionaryType::None), &mut buf).unwrap();

        let mut cursor = Cursor::new(buf.as_slice());
        assert!(read_present(&mut cursor).is_err());

        let mut cursor = Cursor::new(buf.as_slice());
        let stream = Stream::read(&mut cursor).unwrap();
        assert_eq!(stream.metadata.num_values, 20);
        assert!(decode_stream(&stream).unwrap().all());
    }

    #[test]
    fn test_empty_bitmap() {
        let mut buf = Vec::new();
        encode_present(&[], &mut buf).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        assert!(read_present(&mut cursor).unwrap().is_empty());
    }
}
