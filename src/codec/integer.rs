//! The integer stream codec: composes the delta, zigzag, RLE and physical
//! kernels according to a stream's header.
//!
//! Values travel as unsigned lane types (`u32`/`u64`); signed columns pass their
//! two's complement bit patterns together with `signed = true`, which switches on
//! zigzag for the plain and RLE value paths. Delta paths always zigzag.
//!
//! Decoding order is the exact reverse of encoding: physical decode, RLE
//! expansion, inverse zigzag, prefix sum.

use crate::config::{IntegerEncodingOption, PhysicalTechniqueChoice, VtileConfig};
use crate::error::VtileError;
use crate::kernels::{delta, fastpfor, leb128, rle, zigzag};
use crate::log_metric;
use crate::metadata::{
    LogicalTechnique, PhysicalStreamType, PhysicalTechnique, Stream, StreamMetadata, StreamVariant,
};
use crate::traits::StreamInt;

//==================================================================================
// 1. Encoder Settings
//==================================================================================

/// The integer encoding choices carried from the config into every stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerEncoder {
    pub physical: PhysicalTechniqueChoice,
    pub option: IntegerEncodingOption,
}

impl IntegerEncoder {
    pub fn from_config(config: &VtileConfig) -> Self {
        Self {
            physical: config.physical_technique,
            option: config.integer_encoding,
        }
    }

    pub fn with_option(self, option: IntegerEncodingOption) -> Self {
        Self { option, ..self }
    }

    /// The physical technique for a lane type; 64-bit lanes are always varint.
    pub fn physical_for<U: StreamInt>(&self) -> PhysicalTechnique {
        match (U::BITS, self.physical) {
            (32, PhysicalTechniqueChoice::FastPfor) => PhysicalTechnique::FastPfor,
            _ => PhysicalTechnique::Varint,
        }
    }
}

//==================================================================================
// 2. Physical Level
//==================================================================================

/// Physically encodes already transformed values.
pub fn encode_physical<U: StreamInt>(
    values: &[U],
    physical: PhysicalTechnique,
) -> Result<Vec<u8>, VtileError> {
    let mut out = Vec::new();
    match physical {
        PhysicalTechnique::Varint => leb128::encode(values, &mut out),
        PhysicalTechnique::FastPfor => {
            if U::BITS != 32 {
                return Err(VtileError::NotSupported(
                    "FastPFOR is only defined for 32-bit streams".to_string(),
                ));
            }
            let words: Vec<u32> = values.iter().map(|v| v.as_u64() as u32).collect();
            fastpfor::encode_to_bytes(&words, &mut out);
        }
        other => {
            return Err(VtileError::NotSupported(format!(
                "physical technique {:?} for an integer stream",
                other
            )))
        }
    }
    Ok(out)
}

/// Reverses only the physical technique, yielding `num_values` raw elements.
pub fn decode_physical<U: StreamInt>(stream: &Stream<'_>) -> Result<Vec<U>, VtileError> {
    let meta = &stream.metadata;
    let num_values = crate::utils::checked_count(meta.num_values, "stream value")?;
    if num_values == 0 {
        return Ok(Vec::new());
    }
    match meta.physical {
        PhysicalTechnique::Varint => leb128::decode_exact::<U>(stream.data, num_values),
        PhysicalTechnique::FastPfor => {
            if U::BITS != 32 {
                return Err(VtileError::NotSupported(
                    "FastPFOR on a 64-bit stream".to_string(),
                ));
            }
            Ok(fastpfor::decode_from_bytes(stream.data, num_values)?
                .into_iter()
                .map(|v| U::from_u64_lossy(v as u64))
                .collect())
        }
        other => Err(VtileError::NotSupported(format!(
            "physical technique {:?} for an integer stream",
            other
        ))),
    }
}

/// Writes one stream header plus the physically encoded `values`.
pub fn write_stream<U: StreamInt>(
    stream_type: PhysicalStreamType,
    logical1: LogicalTechnique,
    logical2: LogicalTechnique,
    variant: StreamVariant,
    physical: PhysicalTechnique,
    values: &[U],
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let payload = encode_physical(values, physical)?;
    let metadata = StreamMetadata {
        variant,
        ..StreamMetadata::new(
            stream_type,
            logical1,
            logical2,
            physical,
            values.len() as u32,
            payload.len() as u32,
        )
    };
    Stream::write(&metadata, &payload, out)
}

//==================================================================================
// 3. Logical Level Encoding
//==================================================================================

/// One encoded candidate: header plus payload.
struct Candidate {
    name: &'static str,
    metadata: StreamMetadata,
    payload: Vec<u8>,
}

fn build_candidate<U: StreamInt>(
    name: &'static str,
    stream_type: PhysicalStreamType,
    logical1: LogicalTechnique,
    logical2: LogicalTechnique,
    variant: StreamVariant,
    physical: PhysicalTechnique,
    values: &[U],
) -> Result<Candidate, VtileError> {
    let payload = encode_physical(values, physical)?;
    let metadata = StreamMetadata {
        variant,
        ..StreamMetadata::new(
            stream_type,
            logical1,
            logical2,
            physical,
            values.len() as u32,
            payload.len() as u32,
        )
    };
    Ok(Candidate {
        name,
        metadata,
        payload,
    })
}

fn plain_candidate<U: StreamInt>(
    values: &[U],
    signed: bool,
    stream_type: PhysicalStreamType,
    physical: PhysicalTechnique,
) -> Result<Candidate, VtileError> {
    let transformed = if signed { zigzag::encode(values) } else { values.to_vec() };
    build_candidate(
        "plain",
        stream_type,
        LogicalTechnique::None,
        LogicalTechnique::None,
        StreamVariant::Base,
        physical,
        &transformed,
    )
}

fn delta_candidate<U: StreamInt>(
    deltas: &[U],
    stream_type: PhysicalStreamType,
    physical: PhysicalTechnique,
) -> Result<Candidate, VtileError> {
    build_candidate(
        "delta",
        stream_type,
        LogicalTechnique::Delta,
        LogicalTechnique::None,
        StreamVariant::Base,
        physical,
        deltas,
    )
}

fn rle_candidate<U: StreamInt>(
    values: &[U],
    signed: bool,
    stream_type: PhysicalStreamType,
    physical: PhysicalTechnique,
) -> Result<Candidate, VtileError> {
    let mut runs = rle::encode(values);
    if signed {
        runs.values = zigzag::encode(&runs.values);
    }
    let variant = StreamVariant::Rle {
        runs: runs.num_runs() as u32,
        num_rle_values: values.len() as u32,
    };
    build_candidate(
        "rle",
        stream_type,
        LogicalTechnique::Rle,
        LogicalTechnique::None,
        variant,
        physical,
        &runs.into_flat(),
    )
}

fn delta_rle_candidate<U: StreamInt>(
    deltas: &[U],
    stream_type: PhysicalStreamType,
    physical: PhysicalTechnique,
) -> Result<Candidate, VtileError> {
    let runs = rle::encode(deltas);
    let variant = StreamVariant::Rle {
        runs: runs.num_runs() as u32,
        num_rle_values: deltas.len() as u32,
    };
    build_candidate(
        "delta_rle",
        stream_type,
        LogicalTechnique::Delta,
        LogicalTechnique::Rle,
        variant,
        physical,
        &runs.into_flat(),
    )
}

/// Encodes an integer sequence as one stream, choosing the logical technique
/// per the encoder option, and appends header plus payload to `out`.
pub fn encode_stream<U: StreamInt>(
    values: &[U],
    signed: bool,
    stream_type: PhysicalStreamType,
    encoder: &IntegerEncoder,
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let physical = encoder.physical_for::<U>();
    if values.is_empty() {
        let metadata = StreamMetadata::new(
            stream_type,
            LogicalTechnique::None,
            LogicalTechnique::None,
            physical,
            0,
            0,
        );
        return Stream::write(&metadata, &[], out);
    }

    let deltas = || zigzag::encode(&delta::encode(values));
    let chosen = match encoder.option {
        IntegerEncodingOption::Plain => plain_candidate(values, signed, stream_type, physical)?,
        IntegerEncodingOption::Delta => delta_candidate(&deltas(), stream_type, physical)?,
        IntegerEncodingOption::Rle => rle_candidate(values, signed, stream_type, physical)?,
        IntegerEncodingOption::DeltaRle => delta_rle_candidate(&deltas(), stream_type, physical)?,
        IntegerEncodingOption::Auto => {
            let num_runs = rle::count_runs(values);
            if num_runs == 1 {
                // A constant column stays recognisable as one run.
                rle_candidate(values, signed, stream_type, physical)?
            } else {
                let deltas = deltas();
                let num_delta_runs = rle::count_runs(&deltas);
                let mut candidates = vec![
                    plain_candidate(values, signed, stream_type, physical)?,
                    delta_candidate(&deltas, stream_type, physical)?,
                ];
                if values.len() >= 2 * num_runs {
                    candidates.push(rle_candidate(values, signed, stream_type, physical)?);
                }
                if values.len() >= 2 * num_delta_runs {
                    candidates.push(delta_rle_candidate(&deltas, stream_type, physical)?);
                }
                let mut best_index = 0;
                for (i, candidate) in candidates.iter().enumerate() {
                    if candidate.payload.len() < candidates[best_index].payload.len() {
                        best_index = i;
                    }
                }
                candidates.swap_remove(best_index)
            }
        }
    };

    log_metric!(
        "event" = "encode_int_stream",
        "stream" = format!("{:?}", stream_type),
        "technique" = chosen.name,
        "values" = values.len(),
        "bytes" = chosen.payload.len()
    );
    Stream::write(&chosen.metadata, &chosen.payload, out)
}

//==================================================================================
// 4. Logical Level Decoding
//==================================================================================

fn rle_params(meta: &StreamMetadata) -> Result<(usize, usize), VtileError> {
    match meta.variant {
        StreamVariant::Rle { runs, num_rle_values } => {
            Ok((runs as usize, crate::utils::checked_count(num_rle_values, "RLE value")?))
        }
        _ => Err(VtileError::RleDecodeError(
            "RLE technique without an RLE header".to_string(),
        )),
    }
}

/// Decodes a stream back into the values that were passed to `encode_stream`.
pub fn decode_stream<U: StreamInt>(stream: &Stream<'_>, signed: bool) -> Result<Vec<U>, VtileError> {
    let meta = &stream.metadata;
    if meta.num_values == 0 {
        return if meta.decoded_len() == 0 {
            Ok(Vec::new())
        } else {
            Err(VtileError::RleDecodeError(format!(
                "empty payload declares {} values",
                meta.decoded_len()
            )))
        };
    }

    let mut values = decode_physical::<U>(stream)?;
    match (meta.logical1, meta.logical2) {
        (LogicalTechnique::None, LogicalTechnique::None) => {
            if signed {
                zigzag::decode_in_place(&mut values);
            }
        }
        (LogicalTechnique::Delta, LogicalTechnique::None) => {
            zigzag::decode_in_place(&mut values);
            delta::decode_in_place(&mut values);
        }
        (LogicalTechnique::Rle, LogicalTechnique::None) => {
            let (runs, total) = rle_params(meta)?;
            values = rle::decode(&values, runs, total)?;
            if signed {
                zigzag::decode_in_place(&mut values);
            }
        }
        (LogicalTechnique::Delta, LogicalTechnique::Rle) => {
            let (runs, total) = rle_params(meta)?;
            values = rle::decode(&values, runs, total)?;
            zigzag::decode_in_place(&mut values);
            delta::decode_in_place(&mut values);
        }
        (LogicalTechnique::ComponentwiseDelta, LogicalTechnique::None) => {
            zigzag::decode_in_place(&mut values);
            delta::decode_componentwise_in_place(&mut values)?;
        }
        (l1, l2) => {
            return Err(VtileError::NotSupported(format!(
                "logical technique combination {:?}/{:?} for an integer stream",
                l1, l2
            )))
        }
    }
    Ok(values)
}

/// Reads the next stream from the cursor and decodes it.
pub fn read_stream<U: StreamInt>(
    cursor: &mut std::io::Cursor<&[u8]>,
    signed: bool,
) -> Result<(StreamMetadata, Vec<U>), VtileError> {
    let stream = Stream::read(cursor)?;
    let values = decode_stream(&stream, signed)?;
    Ok((stream.metadata, values))
}

//==================================================================================
// 5. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DictionaryType;
    use std::io::Cursor;

    const DATA: PhysicalStreamType = PhysicalStreamType::Data(DictionaryType::None);

    fn roundtrip<U: StreamInt>(values: &[U], signed: bool, encoder: IntegerEncoder) -> StreamMetadata {
        let mut buf = Vec::new();
        encode_stream(values, signed, DATA, &encoder, &mut buf).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        let (meta, decoded) = read_stream::<U>(&mut cursor, signed).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(cursor.position() as usize, buf.len());
        meta
    }

    fn encoder(physical: PhysicalTechniqueChoice, option: IntegerEncodingOption) -> IntegerEncoder {
        IntegerEncoder { physical, option }
    }

    #[test]
    fn test_signed_sequence_with_both_physical_techniques() {
        let values: Vec<u32> = [1i32, 2, 7, 3, -4, 5, 1, -8].iter().map(|&v| v as u32).collect();
        let varint = roundtrip(
            &values,
            true,
            encoder(PhysicalTechniqueChoice::Varint, IntegerEncodingOption::Plain),
        );
        assert_eq!(varint.physical, PhysicalTechnique::Varint);
        let pfor = roundtrip(
            &values,
            true,
            encoder(PhysicalTechniqueChoice::FastPfor, IntegerEncodingOption::Plain),
        );
        assert_eq!(pfor.physical, PhysicalTechnique::FastPfor);
    }

    #[test]
    fn test_every_forced_option_roundtrips() {
        let values: Vec<u32> = vec![3, 3, 3, 10, 10, 11, 12, 13, 13, 0];
        for physical in [PhysicalTechniqueChoice::Varint, PhysicalTechniqueChoice::FastPfor] {
            for option in [
                IntegerEncodingOption::Auto,
                IntegerEncodingOption::Plain,
                IntegerEncodingOption::Delta,
                IntegerEncodingOption::Rle,
                IntegerEncodingOption::DeltaRle,
            ] {
                roundtrip(&values, false, encoder(physical, option));
            }
        }
    }

    #[test]
    fn test_auto_selects_rle_for_constants_and_delta_rle_for_sequences() {
        let auto = IntegerEncoder::default();
        let constant = roundtrip(&vec![42u32; 100], false, auto);
        assert_eq!(constant.logical1, LogicalTechnique::Rle);
        assert_eq!(constant.variant, StreamVariant::Rle { runs: 1, num_rle_values: 100 });

        let ids: Vec<u64> = (1..=500).collect();
        let sequence = roundtrip(&ids, false, auto);
        assert_eq!(sequence.logical1, LogicalTechnique::Delta);
        assert_eq!(sequence.logical2, LogicalTechnique::Rle);
        assert_eq!(sequence.physical, PhysicalTechnique::Varint);
    }

    #[test]
    fn test_64_bit_streams_ignore_fastpfor() {
        let values: Vec<u64> = vec![u64::MAX, 0, 1 << 40, 7];
        let meta = roundtrip(
            &values,
            false,
            encoder(PhysicalTechniqueChoice::FastPfor, IntegerEncodingOption::Auto),
        );
        assert_eq!(meta.physical, PhysicalTechnique::Varint);
        let signed: Vec<u64> = [i64::MIN, -1, i64::MAX].iter().map(|&v| v as u64).collect();
        roundtrip(&signed, true, IntegerEncoder::default());
    }

    #[test]
    fn test_empty_stream() {
        let meta = roundtrip::<u32>(&[], false, IntegerEncoder::default());
        assert_eq!(meta.num_values, 0);
        assert_eq!(meta.byte_length, 0);
    }

    #[test]
    fn test_random_sequences_roundtrip() {
        use rand::Rng;
        let mut rng = rand::rng();
        for _ in 0..20 {
            let len = rng.random_range(1..2000);
            let values: Vec<u32> = (0..len).map(|_| rng.random_range(0..64) as u32).collect();
            roundtrip(
                &values,
                rng.random_bool(0.5),
                encoder(PhysicalTechniqueChoice::FastPfor, IntegerEncodingOption::Auto),
            );
        }
    }

    #[test]
    fn test_unsupported_physical_techniques() {
        let meta = StreamMetadata::new(
            DATA,
            LogicalTechnique::None,
            LogicalTechnique::None,
            PhysicalTechnique::Alp,
            1,
            1,
        );
        let stream = Stream { metadata: meta, data: &[1] };
        assert!(matches!(decode_stream::<u32>(&stream, false), Err(VtileError::NotSupported(_))));

        let none = Stream {
            metadata: StreamMetadata { physical: PhysicalTechnique::None, ..meta },
            data: &[1],
        };
        assert!(matches!(decode_stream::<u32>(&none, false), Err(VtileError::NotSupported(_))));
    }

    #[test]
    fn test_oversized_header_count_fails_without_allocating() {
        for physical in [PhysicalTechnique::FastPfor, PhysicalTechnique::Varint] {
            let stream = Stream {
                metadata: StreamMetadata::new(
                    DATA,
                    LogicalTechnique::None,
                    LogicalTechnique::None,
                    physical,
                    u32::MAX,
                    4,
                ),
                data: &[0, 0, 0, 0],
            };
            assert!(matches!(decode_stream::<u32>(&stream, false), Err(VtileError::Leb128DecodeError(_))));
        }
    }

    #[test]
    fn test_rle_without_rle_header_is_rejected() {
        let mut buf = Vec::new();
        write_stream::<u32>(
            DATA,
            LogicalTechnique::Rle,
            LogicalTechnique::None,
            StreamVariant::Rle { runs: 1, num_rle_values: 5 },
            PhysicalTechnique::Varint,
            &[5, 9],
            &mut buf,
        )
        .unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        let (_, decoded) = read_stream::<u32>(&mut cursor, false).unwrap();
        assert_eq!(decoded, vec![9; 5]);

        let stream = Stream {
            metadata: StreamMetadata::new(
                DATA,
                LogicalTechnique::Rle,
                LogicalTechnique::None,
                PhysicalTechnique::None,
                2,
                2,
            ),
            data: &[5, 9],
        };
        assert!(decode_stream::<u32>(&stream, false).is_err());
    }
}
