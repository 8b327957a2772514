//! Float and double streams: raw little-endian IEEE-754 values.

use crate::error::VtileError;
use crate::metadata::{DictionaryType, PhysicalStreamType, PhysicalTechnique, Stream, StreamMetadata};

const DATA: PhysicalStreamType = PhysicalStreamType::Data(DictionaryType::None);

pub fn encode_f32s(values: &[f32], out: &mut Vec<u8>) -> Result<(), VtileError> {
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let metadata = StreamMetadata::plain(DATA, values.len() as u32, payload.len() as u32);
    Stream::write(&metadata, &payload, out)
}

pub fn encode_f64s(values: &[f64], out: &mut Vec<u8>) -> Result<(), VtileError> {
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let metadata = StreamMetadata::plain(DATA, values.len() as u32, payload.len() as u32);
    Stream::write(&metadata, &payload, out)
}

fn check_layout(stream: &Stream<'_>, width: usize) -> Result<usize, VtileError> {
    let meta = &stream.metadata;
    if meta.physical != PhysicalTechnique::None {
        return Err(VtileError::NotSupported(format!(
            "physical technique {:?} for a floating point stream",
            meta.physical
        )));
    }
    let num_values = meta.num_values as usize;
    if stream.data.len() != num_values * width {
        return Err(VtileError::CountMismatch {
            context: "floating point stream bytes".to_string(),
            expected: num_values * width,
            actual: stream.data.len(),
        });
    }
    Ok(num_values)
}

pub fn decode_f32s(stream: &Stream<'_>) -> Result<Vec<f32>, VtileError> {
    check_layout(stream, 4)?;
    Ok(stream
        .data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn decode_f64s(stream: &Stream<'_>) -> Result<Vec<f64>, VtileError> {
    check_layout(stream, 8)?;
    Ok(stream
        .data
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}
