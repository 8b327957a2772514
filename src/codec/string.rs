//! String columns.
//!
//! A single column is written in one of three layouts, whichever is smallest:
//!
//! - plain: `LENGTH/VAR_BINARY`, `DATA/NONE`
//! - dictionary: `LENGTH/DICTIONARY`, `OFFSET/STRING`, `DATA/SINGLE`
//! - symbol-table dictionary: `LENGTH/SYMBOL`, `DATA/FSST`, `LENGTH/DICTIONARY`,
//!   `DATA/SINGLE` (compressed corpus), `OFFSET/STRING`
//!
//! Struct columns of string children share one dictionary that ends with a
//! `DATA/SHARED` stream, followed by a present stream and an offset stream per
//! child. Only present values are stored; nullability is handled by the caller
//! for single columns and by the per-child present streams for shared ones.

use bitvec::prelude::*;
use hashbrown::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use super::{boolean, integer};
use crate::codec::integer::IntegerEncoder;
use crate::config::VtileConfig;
use crate::error::VtileError;
use crate::fsst::{self, SymbolTableBackend};
use crate::kernels::leb128;
use crate::metadata::{
    DictionaryType, LengthType, OffsetType, PhysicalStreamType, Stream, StreamMetadata,
};

const OFFSETS: PhysicalStreamType = PhysicalStreamType::Offset(OffsetType::String);

//==================================================================================
// 1. Decoded Representations
//==================================================================================

/// UTF-8 strings stored as one corpus plus boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringDictionary {
    corpus: String,
    offsets: Vec<u32>,
}

impl StringDictionary {
    /// Cuts `corpus` into consecutive entries of the given byte lengths.
    pub fn from_parts(corpus: Vec<u8>, lengths: &[u32]) -> Result<Self, VtileError> {
        let corpus = String::from_utf8(corpus)?;
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0u32);
        let mut end = 0usize;
        for &len in lengths {
            end += len as usize;
            if end > corpus.len() || !corpus.is_char_boundary(end) {
                return Err(VtileError::DictionaryError(format!(
                    "entry ending at byte {} does not fit a corpus of {} bytes",
                    end,
                    corpus.len()
                )));
            }
            offsets.push(end as u32);
        }
        if end != corpus.len() {
            return Err(VtileError::DictionaryError(format!(
                "lengths cover {} of {} corpus bytes",
                end,
                corpus.len()
            )));
        }
        Ok(Self { corpus, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        let start = *self.offsets.get(index)? as usize;
        let end = *self.offsets.get(index + 1)? as usize;
        Some(&self.corpus[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.offsets
            .windows(2)
            .map(|w| &self.corpus[w[0] as usize..w[1] as usize])
    }
}

/// The present values of one string column.
#[derive(Debug, Clone, PartialEq)]
pub enum StringValues {
    Plain(StringDictionary),
    Dictionary {
        dictionary: Arc<StringDictionary>,
        indices: Vec<u32>,
    },
}

impl StringValues {
    pub fn len(&self) -> usize {
        match self {
            StringValues::Plain(values) => values.len(),
            StringValues::Dictionary { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        match self {
            StringValues::Plain(values) => values.get(index),
            StringValues::Dictionary { dictionary, indices } => {
                dictionary.get(*indices.get(index)? as usize)
            }
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|i| self.get(i).map(str::to_string))
            .collect()
    }
}

fn check_indices(indices: &[u32], dictionary: &StringDictionary) -> Result<(), VtileError> {
    match indices.iter().find(|&&i| i as usize >= dictionary.len()) {
        Some(&bad) => Err(VtileError::DictionaryError(format!(
            "offset {} outside a dictionary of {} entries",
            bad,
            dictionary.len()
        ))),
        None => Ok(()),
    }
}

//==================================================================================
// 2. Encoding
//==================================================================================

/// Insertion-ordered set of unique strings.
#[derive(Default)]
struct DictionaryBuilder<'s> {
    entries: Vec<&'s str>,
    index: HashMap<&'s str, u32>,
}

impl<'s> DictionaryBuilder<'s> {
    fn insert(&mut self, value: &'s str) -> u32 {
        if let Some(&i) = self.index.get(value) {
            return i;
        }
        let i = self.entries.len() as u32;
        self.entries.push(value);
        self.index.insert(value, i);
        i
    }

    fn lengths(&self) -> Vec<u32> {
        self.entries.iter().map(|s| s.len() as u32).collect()
    }

    fn corpus(&self) -> Vec<u8> {
        self.entries.concat().into_bytes()
    }
}

fn write_raw(
    stream_type: PhysicalStreamType,
    num_values: usize,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let metadata = StreamMetadata::plain(stream_type, num_values as u32, payload.len() as u32);
    Stream::write(&metadata, payload, out)
}

fn encode_plain(values: &[&str], encoder: &IntegerEncoder) -> Result<Vec<u8>, VtileError> {
    let lengths: Vec<u32> = values.iter().map(|s| s.len() as u32).collect();
    let mut out = Vec::new();
    integer::encode_stream(
        &lengths,
        false,
        PhysicalStreamType::Length(LengthType::VarBinary),
        encoder,
        &mut out,
    )?;
    write_raw(
        PhysicalStreamType::Data(DictionaryType::None),
        values.len(),
        values.concat().as_bytes(),
        &mut out,
    )?;
    Ok(out)
}

fn encode_dictionary(
    dictionary: &DictionaryBuilder<'_>,
    indices: &[u32],
    encoder: &IntegerEncoder,
) -> Result<Vec<u8>, VtileError> {
    let mut out = Vec::new();
    integer::encode_stream(
        &dictionary.lengths(),
        false,
        PhysicalStreamType::Length(LengthType::Dictionary),
        encoder,
        &mut out,
    )?;
    integer::encode_stream(indices, false, OFFSETS, encoder, &mut out)?;
    write_raw(
        PhysicalStreamType::Data(DictionaryType::Single),
        dictionary.entries.len(),
        &dictionary.corpus(),
        &mut out,
    )?;
    Ok(out)
}

/// Writes the symbol table streams, the dictionary lengths and the compressed
/// corpus.
fn encode_symbol_table_dictionary(
    dictionary: &DictionaryBuilder<'_>,
    corpus_type: DictionaryType,
    config: &VtileConfig,
    encoder: &IntegerEncoder,
    out: &mut Vec<u8>,
) -> Result<(), VtileError> {
    let backend = fsst::backend_for(config)?;
    let table = backend.encode(&dictionary.corpus())?;
    log::debug!(
        "symbol table from {}: {} symbols, {} compressed bytes",
        backend.name(),
        table.num_symbols(),
        table.compressed.len()
    );

    integer::encode_stream(
        &table.symbol_lengths,
        false,
        PhysicalStreamType::Length(LengthType::Symbol),
        encoder,
        out,
    )?;
    write_raw(
        PhysicalStreamType::Data(DictionaryType::Fsst),
        table.num_symbols(),
        &table.symbols,
        out,
    )?;
    integer::encode_stream(
        &dictionary.lengths(),
        false,
        PhysicalStreamType::Length(LengthType::Dictionary),
        encoder,
        out,
    )?;
    write_raw(
        PhysicalStreamType::Data(corpus_type),
        dictionary.entries.len(),
        &table.compressed,
        out,
    )
}

/// Encodes the present values of a string column, returning the stream count
/// and the encoded streams.
pub fn encode_column(values: &[&str], config: &VtileConfig) -> Result<(u32, Vec<u8>), VtileError> {
    let encoder = IntegerEncoder::from_config(config);
    let mut dictionary = DictionaryBuilder::default();
    let indices: Vec<u32> = values.iter().map(|v| dictionary.insert(v)).collect();

    let mut candidates = vec![
        ("plain", 2, encode_plain(values, &encoder)?),
        ("dictionary", 3, encode_dictionary(&dictionary, &indices, &encoder)?),
    ];
    if config.use_symbol_table && !values.is_empty() {
        let mut encoded = Vec::new();
        encode_symbol_table_dictionary(
            &dictionary,
            DictionaryType::Single,
            config,
            &encoder,
            &mut encoded,
        )?;
        integer::encode_stream(&indices, false, OFFSETS, &encoder, &mut encoded)?;
        candidates.push(("symbol_table", 5, encoded));
    }

    let mut best = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.2.len() < candidates[best].2.len() {
            best = i;
        }
    }
    let (layout, stream_count, encoded) = candidates.swap_remove(best);
    log::debug!(
        "string column: {} values, {} unique, {} layout ({} bytes)",
        values.len(),
        dictionary.entries.len(),
        layout,
        encoded.len()
    );
    Ok((stream_count, encoded))
}

/// Encodes the string children of a struct column against one shared
/// dictionary. `None` entries are nulls.
pub fn encode_shared(
    children: &[Vec<Option<&str>>],
    config: &VtileConfig,
) -> Result<(u32, Vec<u8>), VtileError> {
    let encoder = IntegerEncoder::from_config(config);
    let mut dictionary = DictionaryBuilder::default();
    let child_indices: Vec<Vec<u32>> = children
        .iter()
        .map(|column| column.iter().flatten().map(|v| dictionary.insert(v)).collect())
        .collect();
    if dictionary.entries.is_empty() {
        return Ok((0, Vec::new()));
    }

    let mut plain = Vec::new();
    integer::encode_stream(
        &dictionary.lengths(),
        false,
        PhysicalStreamType::Length(LengthType::Dictionary),
        &encoder,
        &mut plain,
    )?;
    write_raw(
        PhysicalStreamType::Data(DictionaryType::Shared),
        dictionary.entries.len(),
        &dictionary.corpus(),
        &mut plain,
    )?;
    let (mut stream_count, mut out) = (2u32, plain);
    if config.use_symbol_table {
        let mut compressed = Vec::new();
        encode_symbol_table_dictionary(
            &dictionary,
            DictionaryType::Shared,
            config,
            &encoder,
            &mut compressed,
        )?;
        if compressed.len() < out.len() {
            stream_count = 4;
            out = compressed;
        }
    }

    for (column, indices) in children.iter().zip(&child_indices) {
        if indices.is_empty() {
            leb128::encode_one(0u32, &mut out);
            continue;
        }
        leb128::encode_one(2u32, &mut out);
        let present: Vec<bool> = column.iter().map(Option::is_some).collect();
        boolean::encode_present(&present, &mut out)?;
        integer::encode_stream(indices, false, OFFSETS, &encoder, &mut out)?;
        stream_count += 2;
    }
    Ok((stream_count, out))
}

//==================================================================================
// 3. Decoding
//==================================================================================

/// The streams of one string layout, placed by their headers.
#[derive(Default)]
struct StringStreams<'a> {
    symbol_lengths: Option<Stream<'a>>,
    symbols: Option<Stream<'a>>,
    lengths: Option<Stream<'a>>,
    corpus: Option<Stream<'a>>,
    offsets: Option<Stream<'a>>,
}

impl<'a> StringStreams<'a> {
    fn assign(&mut self, stream: Stream<'a>) -> Result<(), VtileError> {
        let slot = match stream.metadata.stream_type {
            PhysicalStreamType::Length(LengthType::Symbol) => &mut self.symbol_lengths,
            PhysicalStreamType::Data(DictionaryType::Fsst) => &mut self.symbols,
            PhysicalStreamType::Length(LengthType::VarBinary | LengthType::Dictionary) => {
                &mut self.lengths
            }
            PhysicalStreamType::Data(
                DictionaryType::None | DictionaryType::Single | DictionaryType::Shared,
            ) => &mut self.corpus,
            PhysicalStreamType::Offset(OffsetType::String) => &mut self.offsets,
            other => {
                return Err(VtileError::InvalidSchema(format!(
                    "unexpected {:?} stream in a string column",
                    other
                )))
            }
        };
        if slot.is_some() {
            return Err(VtileError::InvalidSchema(format!(
                "duplicate {:?} stream in a string column",
                stream.metadata.stream_type
            )));
        }
        *slot = Some(stream);
        Ok(())
    }

    fn dictionary(&self) -> Result<StringDictionary, VtileError> {
        let (lengths, corpus) = match (&self.lengths, &self.corpus) {
            (Some(lengths), Some(corpus)) => (lengths, corpus),
            _ => {
                return Err(VtileError::InvalidSchema(
                    "string column without length and data streams".to_string(),
                ))
            }
        };
        let lengths = integer::decode_stream::<u32>(lengths, false)?;
        let bytes = match (&self.symbols, &self.symbol_lengths) {
            (None, None) => corpus.data.to_vec(),
            (Some(symbols), Some(symbol_lengths)) => {
                let symbol_lengths = integer::decode_stream::<u32>(symbol_lengths, false)?;
                fsst::decode(symbols.data, &symbol_lengths, corpus.data)?
            }
            _ => {
                return Err(VtileError::InvalidSchema(
                    "symbol table without its lengths".to_string(),
                ))
            }
        };
        StringDictionary::from_parts(bytes, &lengths)
    }
}

/// Decodes the `stream_count` streams of a string column.
pub fn decode_column<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    stream_count: u32,
) -> Result<StringValues, VtileError> {
    let mut streams = StringStreams::default();
    for _ in 0..stream_count {
        streams.assign(Stream::read(cursor)?)?;
    }
    let dictionary = streams.dictionary()?;
    match &streams.offsets {
        None => Ok(StringValues::Plain(dictionary)),
        Some(offsets) => {
            let indices = integer::decode_stream::<u32>(offsets, false)?;
            check_indices(&indices, &dictionary)?;
            Ok(StringValues::Dictionary {
                dictionary: Arc::new(dictionary),
                indices,
            })
        }
    }
}

/// One child of a shared dictionary column. `None` means every row is null.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedChild {
    pub present: BitVec<u8, Lsb0>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SharedDictionaryColumn {
    pub dictionary: Arc<StringDictionary>,
    pub children: Vec<Option<SharedChild>>,
}

impl SharedDictionaryColumn {
    /// The value of `child` at `row`, `None` when null.
    pub fn get(&self, child: usize, row: usize) -> Option<&str> {
        let child = self.children.get(child)?.as_ref()?;
        if !*child.present.get(row)? {
            return None;
        }
        let rank = child.present[..row].count_ones();
        self.dictionary.get(*child.indices.get(rank)? as usize)
    }
}

/// Decodes a struct column of `num_children` string children.
pub fn decode_shared<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    stream_count: u32,
    num_children: usize,
) -> Result<SharedDictionaryColumn, VtileError> {
    if stream_count == 0 {
        return Ok(SharedDictionaryColumn {
            dictionary: Arc::new(StringDictionary::default()),
            children: vec![None; num_children],
        });
    }

    let mut streams = StringStreams::default();
    let mut consumed = 0u32;
    loop {
        let stream = Stream::read(cursor)?;
        consumed += 1;
        let last = stream.metadata.stream_type == PhysicalStreamType::Data(DictionaryType::Shared);
        streams.assign(stream)?;
        if last {
            break;
        }
        if consumed >= stream_count {
            return Err(VtileError::InvalidSchema(
                "shared dictionary without a DATA/SHARED stream".to_string(),
            ));
        }
    }
    let dictionary = streams.dictionary()?;

    let mut children = Vec::with_capacity(num_children);
    for _ in 0..num_children {
        let child_streams = leb128::decode_one::<u32>(cursor)?;
        match child_streams {
            0 => children.push(None),
            2 => {
                let present = boolean::read_present(cursor)?;
                let offsets = Stream::read_expecting(cursor, OFFSETS)?;
                let indices = integer::decode_stream::<u32>(&offsets, false)?;
                if present.count_ones() != indices.len() {
                    return Err(VtileError::CountMismatch {
                        context: "shared dictionary child offsets".to_string(),
                        expected: present.count_ones(),
                        actual: indices.len(),
                    });
                }
                check_indices(&indices, &dictionary)?;
                children.push(Some(SharedChild { present, indices }));
            }
            other => {
                return Err(VtileError::InvalidSchema(format!(
                    "shared dictionary child with {} streams",
                    other
                )))
            }
        }
        consumed += child_streams;
    }

    if consumed != stream_count {
        return Err(VtileError::CountMismatch {
            context: "shared dictionary streams".to_string(),
            expected: stream_count as usize,
            actual: consumed as usize,
        });
    }
    Ok(SharedDictionaryColumn {
        dictionary: Arc::new(dictionary),
        children,
    })
}
