//! Stream-level metadata: the header protocol every payload is framed with.

pub mod stream;

pub use stream::{
    DictionaryType, LengthType, LogicalTechnique, OffsetType, PhysicalStreamType,
    PhysicalTechnique, Stream, StreamMetadata, StreamVariant,
};
