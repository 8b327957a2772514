//! Defines the self-describing header that precedes every stream payload, and
//! the single source of truth for reading and writing it.
//!
//! Header bytes:
//! - byte 0: stream role (high nibble) and role-specific subtype (low nibble)
//! - byte 1: logical technique 1 (3 bits), logical technique 2 (3 bits),
//!   physical technique (2 bits)
//! - varint value count, varint byte length
//! - RLE variant: varint run count, varint decoded value count
//! - Morton variant: varint bit width, varint coordinate shift

use std::io::Cursor;

use crate::error::VtileError;
use crate::kernels::leb128;
use crate::utils::{read_u8, take_bytes};

//==================================================================================
// Wire Enumerations
//==================================================================================

/// Defines a `u8` wire enum with checked conversion from its ordinal.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident = $ordinal:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn ordinal(self) -> u8 {
                match self {
                    $($name::$variant => $ordinal),+
                }
            }

            pub fn from_ordinal(value: u8) -> Result<Self, VtileError> {
                match value {
                    $($ordinal => Ok($name::$variant),)+
                    other => Err(VtileError::UnknownEnumValue {
                        kind: $kind,
                        value: other as u32,
                    }),
                }
            }
        }
    };
}

wire_enum!(
    /// Subtype of DATA streams.
    DictionaryType, "dictionary type" {
        None = 0,
        Single = 1,
        Shared = 2,
        Vertex = 3,
        Morton = 4,
        Fsst = 5,
    }
);

wire_enum!(
    /// Subtype of OFFSET streams.
    OffsetType, "offset type" {
        Vertex = 0,
        Index = 1,
        String = 2,
        Key = 3,
    }
);

wire_enum!(
    /// Subtype of LENGTH streams.
    LengthType, "length type" {
        VarBinary = 0,
        Geometries = 1,
        Parts = 2,
        Rings = 3,
        Triangles = 4,
        Symbol = 5,
        Dictionary = 6,
    }
);

wire_enum!(
    LogicalTechnique, "logical technique" {
        None = 0,
        Delta = 1,
        ComponentwiseDelta = 2,
        Rle = 3,
        Morton = 4,
        PseudoDecimal = 5,
    }
);

wire_enum!(
    PhysicalTechnique, "physical technique" {
        None = 0,
        FastPfor = 1,
        Varint = 2,
        Alp = 3,
    }
);

/// The role of a stream within its column, with the role's subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalStreamType {
    Present,
    Data(DictionaryType),
    Offset(OffsetType),
    Length(LengthType),
}

impl PhysicalStreamType {
    fn to_byte(self) -> u8 {
        let (role, subtype) = match self {
            PhysicalStreamType::Present => (0, 0),
            PhysicalStreamType::Data(t) => (1, t.ordinal()),
            PhysicalStreamType::Offset(t) => (2, t.ordinal()),
            PhysicalStreamType::Length(t) => (3, t.ordinal()),
        };
        (role << 4) | subtype
    }

    fn from_byte(byte: u8) -> Result<Self, VtileError> {
        let subtype = byte & 0x0F;
        match byte >> 4 {
            // The present subtype nibble carries no meaning.
            0 => Ok(PhysicalStreamType::Present),
            1 => Ok(PhysicalStreamType::Data(DictionaryType::from_ordinal(subtype)?)),
            2 => Ok(PhysicalStreamType::Offset(OffsetType::from_ordinal(subtype)?)),
            3 => Ok(PhysicalStreamType::Length(LengthType::from_ordinal(subtype)?)),
            other => Err(VtileError::UnknownEnumValue {
                kind: "stream role",
                value: other as u32,
            }),
        }
    }
}

//==================================================================================
// Stream Metadata
//==================================================================================

/// Variant-specific header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamVariant {
    Base,
    Rle { runs: u32, num_rle_values: u32 },
    Morton { num_bits: u32, coordinate_shift: u32 },
}

/// The header layout a stream's technique fields select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantKind {
    Base,
    Rle,
    Morton,
}

impl VariantKind {
    fn of(variant: &StreamVariant) -> Self {
        match variant {
            StreamVariant::Base => VariantKind::Base,
            StreamVariant::Rle { .. } => VariantKind::Rle,
            StreamVariant::Morton { .. } => VariantKind::Morton,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMetadata {
    pub stream_type: PhysicalStreamType,
    pub logical1: LogicalTechnique,
    pub logical2: LogicalTechnique,
    pub physical: PhysicalTechnique,
    /// Number of physically encoded elements.
    pub num_values: u32,
    pub byte_length: u32,
    pub variant: StreamVariant,
}

impl StreamMetadata {
    /// A base-variant header.
    pub fn new(
        stream_type: PhysicalStreamType,
        logical1: LogicalTechnique,
        logical2: LogicalTechnique,
        physical: PhysicalTechnique,
        num_values: u32,
        byte_length: u32,
    ) -> Self {
        Self {
            stream_type,
            logical1,
            logical2,
            physical,
            num_values,
            byte_length,
            variant: StreamVariant::Base,
        }
    }

    /// A header for a raw payload without any technique.
    pub fn plain(stream_type: PhysicalStreamType, num_values: u32, byte_length: u32) -> Self {
        Self::new(
            stream_type,
            LogicalTechnique::None,
            LogicalTechnique::None,
            PhysicalTechnique::None,
            num_values,
            byte_length,
        )
    }

    /// Which variant the technique fields select on decode.
    fn expected_variant_kind(
        logical1: LogicalTechnique,
        logical2: LogicalTechnique,
        physical: PhysicalTechnique,
    ) -> VariantKind {
        if logical1 == LogicalTechnique::Morton {
            VariantKind::Morton
        } else if (logical1 == LogicalTechnique::Rle || logical2 == LogicalTechnique::Rle)
            && physical != PhysicalTechnique::None
        {
            VariantKind::Rle
        } else {
            VariantKind::Base
        }
    }

    /// The number of logical values after every technique is reversed.
    pub fn decoded_len(&self) -> usize {
        match self.variant {
            StreamVariant::Rle { num_rle_values, .. } => num_rle_values as usize,
            _ => self.num_values as usize,
        }
    }

    pub fn uses(&self, technique: LogicalTechnique) -> bool {
        self.logical1 == technique || self.logical2 == technique
    }

    /// Appends the header bytes to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), VtileError> {
        let kind = VariantKind::of(&self.variant);
        if kind != Self::expected_variant_kind(self.logical1, self.logical2, self.physical) {
            return Err(VtileError::InternalError(format!(
                "header variant {:?} does not match techniques {:?}/{:?}/{:?}",
                self.variant, self.logical1, self.logical2, self.physical
            )));
        }

        out.push(self.stream_type.to_byte());
        out.push(
            (self.logical1.ordinal() << 5) | (self.logical2.ordinal() << 2) | self.physical.ordinal(),
        );
        leb128::encode_one(self.num_values, out);
        leb128::encode_one(self.byte_length, out);
        match self.variant {
            StreamVariant::Base => {}
            StreamVariant::Rle { runs, num_rle_values } => {
                leb128::encode_one(runs, out);
                leb128::encode_one(num_rle_values, out);
            }
            StreamVariant::Morton { num_bits, coordinate_shift } => {
                leb128::encode_one(num_bits, out);
                leb128::encode_one(coordinate_shift, out);
            }
        }
        Ok(())
    }

    /// Reads a header and leaves the cursor at the first payload byte.
    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, VtileError> {
        let stream_type = PhysicalStreamType::from_byte(read_u8(cursor)?)?;
        let techniques = read_u8(cursor)?;
        let logical1 = LogicalTechnique::from_ordinal(techniques >> 5)?;
        let logical2 = LogicalTechnique::from_ordinal((techniques >> 2) & 0x07)?;
        let physical = PhysicalTechnique::from_ordinal(techniques & 0x03)?;
        let num_values = leb128::decode_one::<u32>(cursor)?;
        let byte_length = leb128::decode_one::<u32>(cursor)?;

        let variant = match Self::expected_variant_kind(logical1, logical2, physical) {
            VariantKind::Morton => StreamVariant::Morton {
                num_bits: leb128::decode_one(cursor)?,
                coordinate_shift: leb128::decode_one(cursor)?,
            },
            VariantKind::Rle => StreamVariant::Rle {
                runs: leb128::decode_one(cursor)?,
                num_rle_values: leb128::decode_one(cursor)?,
            },
            VariantKind::Base => StreamVariant::Base,
        };

        Ok(Self {
            stream_type,
            logical1,
            logical2,
            physical,
            num_values,
            byte_length,
            variant,
        })
    }
}

/// A header together with its borrowed payload.
#[derive(Debug, Clone, Copy)]
pub struct Stream<'a> {
    pub metadata: StreamMetadata,
    pub data: &'a [u8],
}

impl<'a> Stream<'a> {
    /// Reads one header and its payload, advancing past both.
    pub fn read(cursor: &mut Cursor<&'a [u8]>) -> Result<Self, VtileError> {
        let metadata = StreamMetadata::decode(cursor)?;
        let data = take_bytes(cursor, metadata.byte_length as usize)?;
        Ok(Self { metadata, data })
    }

    /// Like `read`, but rejects a stream whose role is not `expected`.
    pub fn read_expecting(
        cursor: &mut Cursor<&'a [u8]>,
        expected: PhysicalStreamType,
    ) -> Result<Self, VtileError> {
        let stream = Self::read(cursor)?;
        if stream.metadata.stream_type != expected {
            return Err(VtileError::InvalidSchema(format!(
                "expected a {:?} stream, found {:?}",
                expected, stream.metadata.stream_type
            )));
        }
        Ok(stream)
    }

    /// Appends header and payload to `out`.
    pub fn write(metadata: &StreamMetadata, payload: &[u8], out: &mut Vec<u8>) -> Result<(), VtileError> {
        if metadata.byte_length as usize != payload.len() {
            return Err(VtileError::InternalError(format!(
                "header declares {} bytes, payload has {}",
                metadata.byte_length,
                payload.len()
            )));
        }
        metadata.encode(out)?;
        out.extend_from_slice(payload);
        Ok(())
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_header_bit_layout() {
        let meta = StreamMetadata::new(
            PhysicalStreamType::Length(LengthType::Rings),
            LogicalTechnique::Delta,
            LogicalTechnique::None,
            PhysicalTechnique::Varint,
            300,
            5,
        );
        let mut buf = Vec::new();
        meta.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x33, 0b001_000_10, 0xAC, 0x02, 0x05]);

        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(StreamMetadata::decode(&mut cursor).unwrap(), meta);
        assert_eq!(cursor.position() as usize, buf.len());
    }

    #[test]
    fn test_rle_and_morton_variants() {
        let rle = StreamMetadata {
            variant: StreamVariant::Rle { runs: 2, num_rle_values: 10 },
            ..StreamMetadata::new(
                PhysicalStreamType::Data(DictionaryType::None),
                LogicalTechnique::Delta,
                LogicalTechnique::Rle,
                PhysicalTechnique::FastPfor,
                4,
                16,
            )
        };
        let morton = StreamMetadata {
            variant: StreamVariant::Morton { num_bits: 13, coordinate_shift: 5 },
            ..StreamMetadata::new(
                PhysicalStreamType::Data(DictionaryType::Morton),
                LogicalTechnique::Morton,
                LogicalTechnique::Delta,
                PhysicalTechnique::Varint,
                3,
                3,
            )
        };
        for meta in [rle, morton] {
            let mut buf = Vec::new();
            meta.encode(&mut buf).unwrap();
            let mut cursor = Cursor::new(buf.as_slice());
            let decoded = StreamMetadata::decode(&mut cursor).unwrap();
            assert_eq!(decoded, meta);
        }
        assert_eq!(rle.decoded_len(), 10);
        assert!(rle.uses(LogicalTechnique::Rle));
    }

    #[test]
    fn test_techniques_select_the_variant() {
        use LogicalTechnique::{Delta, Morton, Rle};
        let select = StreamMetadata::expected_variant_kind;
        assert_eq!(select(Morton, Delta, PhysicalTechnique::Varint), VariantKind::Morton);
        assert_eq!(select(Delta, Rle, PhysicalTechnique::FastPfor), VariantKind::Rle);
        assert_eq!(select(Rle, LogicalTechnique::None, PhysicalTechnique::None), VariantKind::Base);
        assert_eq!(select(Delta, LogicalTechnique::None, PhysicalTechnique::Varint), VariantKind::Base);
        assert_eq!(VariantKind::of(&StreamVariant::Rle { runs: 1, num_rle_values: 2 }), VariantKind::Rle);
    }

    #[test]
    fn test_boolean_rle_keeps_base_header() {
        let meta = StreamMetadata::new(
            PhysicalStreamType::Present,
            LogicalTechnique::Rle,
            LogicalTechnique::None,
            PhysicalTechnique::None,
            9,
            4,
        );
        let mut buf = Vec::new();
        meta.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        let wrong = StreamMetadata {
            variant: StreamVariant::Rle { runs: 1, num_rle_values: 9 },
            ..meta
        };
        assert!(matches!(wrong.encode(&mut buf), Err(VtileError::InternalError(_))));
    }

    #[test]
    fn test_unknown_ordinals_are_fatal() {
        let mut cursor = Cursor::new(&[0x17u8, 0x00, 0x00, 0x00][..]);
        assert!(matches!(
            StreamMetadata::decode(&mut cursor),
            Err(VtileError::UnknownEnumValue { kind: "dictionary type", value: 7 })
        ));
        let mut cursor = Cursor::new(&[0x50u8, 0x00, 0x00, 0x00][..]);
        assert!(matches!(
            StreamMetadata::decode(&mut cursor),
            Err(VtileError::UnknownEnumValue { kind: "stream role", .. })
        ));
        let mut cursor = Cursor::new(&[0x10u8, 0b110_000_00, 0x00, 0x00][..]);
        assert!(StreamMetadata::decode(&mut cursor).is_err());
    }

    #[test]
    fn test_stream_payload_is_bounds_checked() {
        let mut buf = Vec::new();
        let meta = StreamMetadata::plain(PhysicalStreamType::Data(DictionaryType::None), 3, 3);
        Stream::write(&meta, &[1, 2, 3], &mut buf).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        let stream = Stream::read(&mut cursor).unwrap();
        assert_eq!(stream.data, &[1, 2, 3]);

        let truncated = &buf[..buf.len() - 1];
        let mut cursor = Cursor::new(truncated);
        assert!(matches!(Stream::read(&mut cursor), Err(VtileError::Truncated { .. })));
    }
}
