//! The built-in symbol table builder.
//!
//! Training starts from the 256 single-byte symbols and runs a fixed number of
//! passes over a sample of the corpus. Each pass greedily parses the sample
//! with the current table, counts how often every symbol and every adjacent
//! symbol pair occurs, and then builds the next table from the candidates with
//! the highest estimated gain (`count * length`). The table of the pass with
//! the best measured gain is kept and pruned once more before it compresses the
//! full corpus.
//!
//! Internally symbols are addressed by a 9-bit slot: slots `0..256` stand for
//! the bare byte (an escape on output), slots `256..` for table entries.

use std::ops::Range;

use hashbrown::HashMap;

use super::{SymbolTable, ESCAPE_CODE, MAX_SYMBOL_LENGTH};

const NUM_PASSES: usize = 6;
const MIN_COUNT: u64 = 5;
const SAMPLE_CHUNK: usize = 1000;
const MAX_SYMBOLS: usize = 255;
const NUM_SLOTS: usize = 512;

//==================================================================================
// 1. Symbols and Counters
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Symbol {
    bytes: [u8; MAX_SYMBOL_LENGTH],
    len: u8,
}

impl Symbol {
    fn single(byte: u8) -> Self {
        let mut bytes = [0; MAX_SYMBOL_LENGTH];
        bytes[0] = byte;
        Self { bytes, len: 1 }
    }

    fn len(&self) -> usize {
        self.len as usize
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// `self` followed by `other`, cut at the maximum symbol length.
    fn concat(&self, other: &Symbol) -> Symbol {
        let mut result = *self;
        for &b in other.as_slice() {
            if result.len() == MAX_SYMBOL_LENGTH {
                break;
            }
            result.bytes[result.len()] = b;
            result.len += 1;
        }
        result
    }

    fn matches_at(&self, text: &[u8], pos: usize) -> bool {
        text.get(pos..pos + self.len()) == Some(self.as_slice())
    }
}

struct Counters {
    single: Vec<u64>,
    pair: Vec<u64>,
}

impl Counters {
    fn new() -> Self {
        Self {
            single: vec![0; NUM_SLOTS],
            pair: vec![0; NUM_SLOTS * NUM_SLOTS],
        }
    }

    fn pair_index(first: usize, second: usize) -> usize {
        (first << 9) | second
    }
}

//==================================================================================
// 2. The Builder
//==================================================================================

pub struct SymbolTableBuilder {
    symbols: Vec<Symbol>,
    /// Slot of the single-byte table symbol for each byte value.
    single_index: [Option<u16>; 256],
    /// Slots of multi-byte symbols by their first two bytes, longest first.
    pair_index: HashMap<u16, Vec<u16>>,
    sample_size: usize,
}

impl SymbolTableBuilder {
    fn empty(sample_size: usize) -> Self {
        Self {
            symbols: Vec::new(),
            single_index: [None; 256],
            pair_index: HashMap::new(),
            sample_size,
        }
    }

    fn from_symbols(mut symbols: Vec<Symbol>, sample_size: usize) -> Self {
        // Symbols sharing their first two bytes end up adjacent, longest first.
        symbols.sort_by(|a, b| {
            a.bytes[..2]
                .cmp(&b.bytes[..2])
                .then(b.len.cmp(&a.len))
                .then(a.as_slice().cmp(b.as_slice()))
        });
        let mut table = Self::empty(sample_size);
        for (i, symbol) in symbols.iter().enumerate() {
            let slot = (256 + i) as u16;
            if symbol.len() == 1 {
                table.single_index[symbol.bytes[0] as usize] = Some(slot);
            } else {
                let key = u16::from_be_bytes([symbol.bytes[0], symbol.bytes[1]]);
                table.pair_index.entry(key).or_default().push(slot);
            }
        }
        table.symbols = symbols;
        table
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    fn symbol(&self, slot: usize) -> Symbol {
        if slot < 256 {
            Symbol::single(slot as u8)
        } else {
            self.symbols[slot - 256]
        }
    }

    /// Slot of the longest symbol matching `text` at `pos`. Requires `pos < text.len()`.
    fn find_longest(&self, text: &[u8], pos: usize) -> usize {
        if text.len() - pos >= 2 {
            let key = u16::from_be_bytes([text[pos], text[pos + 1]]);
            if let Some(slots) = self.pair_index.get(&key) {
                for &slot in slots {
                    if self.symbols[slot as usize - 256].matches_at(text, pos) {
                        return slot as usize;
                    }
                }
            }
        }
        match self.single_index[text[pos] as usize] {
            Some(slot) => slot as usize,
            None => text[pos] as usize,
        }
    }

    /// Whether a corpus of `len` bytes is trained on a sample rather than whole.
    fn is_sampled(&self, len: usize) -> bool {
        len > self.sample_size
    }

    fn sample_ranges(&self, len: usize) -> Vec<Range<usize>> {
        if !self.is_sampled(len) {
            return vec![0..len];
        }
        let samples = (self.sample_size / SAMPLE_CHUNK).max(1);
        let stride = len / samples;
        (0..samples)
            .map(|i| i * stride..(i * stride + SAMPLE_CHUNK).min(len))
            .collect()
    }

    /// Parses the sample with the current table, filling the counters, and
    /// returns the byte gain of the parse.
    fn compress_count(&self, text: &[u8], counters: &mut Counters, count_pairs: bool) -> i64 {
        let gain_of = |slot: usize, len: usize| -> i64 {
            let escape = if slot < 256 { 1 } else { 0 };
            len as i64 - (1 + escape)
        };

        let mut gain = 0i64;
        for range in self.sample_ranges(text.len()) {
            if range.is_empty() {
                continue;
            }
            let mut start = range.start;
            let mut slot1 = self.find_longest(text, start);
            let mut len1 = self.symbol(slot1).len();
            let mut pos = start + len1;
            gain += gain_of(slot1, len1);

            loop {
                counters.single[slot1] += 1;
                // The first byte alone is the alternative to a longer match.
                if len1 > 1 {
                    counters.single[text[start] as usize] += 1;
                }
                if pos >= range.end {
                    break;
                }

                let next_start = pos;
                let slot2 = self.find_longest(text, pos);
                let len2 = self.symbol(slot2).len();
                pos += len2;
                gain += gain_of(slot2, len2);

                if count_pairs {
                    counters.pair[Counters::pair_index(slot1, slot2)] += 1;
                    if len2 > 1 {
                        counters.pair[Counters::pair_index(slot1, text[next_start] as usize)] += 1;
                    }
                }
                slot1 = slot2;
                len1 = len2;
                start = next_start;
            }
        }
        gain
    }

    fn make_table(&self, counters: &Counters, last_pass: bool, sampled: bool) -> Self {
        let mut candidates: HashMap<Symbol, u64> = HashMap::new();
        let mut add = |symbol: Symbol, count: u64, min: u64| {
            if count >= min {
                *candidates.entry(symbol).or_insert(0) += count * symbol.len() as u64;
            }
        };

        let num_slots = 256 + self.symbols.len();
        for slot1 in 0..num_slots {
            let count1 = counters.single[slot1];
            if count1 == 0 {
                continue;
            }
            let symbol1 = self.symbol(slot1);
            if !last_pass || sampled {
                // Weighting single bytes up keeps the escape rate low.
                let weight = if symbol1.len() == 1 { 8 } else { 1 };
                add(symbol1, weight * count1, if last_pass { 1 } else { MIN_COUNT });
            } else {
                add(symbol1, symbol1.len() as u64 * count1, 1);
            }

            if last_pass || symbol1.len() == MAX_SYMBOL_LENGTH {
                continue;
            }
            for slot2 in 0..num_slots {
                let count2 = counters.pair[Counters::pair_index(slot1, slot2)];
                if count2 >= MIN_COUNT {
                    add(symbol1.concat(&self.symbol(slot2)), count2, MIN_COUNT);
                }
            }
        }

        let mut ranked: Vec<(Symbol, u64)> = candidates.into_iter().collect();
        ranked.sort_by(|(sa, ga), (sb, gb)| {
            gb.cmp(ga)
                .then(sb.len.cmp(&sa.len))
                .then(sa.as_slice().cmp(sb.as_slice()))
        });

        let mut chosen = Vec::with_capacity(MAX_SYMBOLS);
        for (symbol, gain) in ranked {
            if chosen.len() == MAX_SYMBOLS {
                break;
            }
            if !last_pass || sampled {
                chosen.push(symbol);
            } else {
                // A table entry costs its bytes plus a length.
                let costs = symbol.len() as u64 + 1;
                let saves = if symbol.len() == 1 { gain / 8 } else { gain };
                if saves > costs {
                    chosen.push(symbol);
                }
            }
        }
        Self::from_symbols(chosen, self.sample_size)
    }

    /// Trains a table on `corpus`, looking at no more than about `sample_size` bytes.
    pub fn train(corpus: &[u8], sample_size: usize) -> Self {
        let mut table = Self::empty(sample_size);
        let sampled = table.is_sampled(corpus.len());
        let mut best: Option<(i64, Self, Counters)> = None;

        for pass in 1..=NUM_PASSES {
            let last = pass == NUM_PASSES;
            let mut counters = Counters::new();
            let gain = if corpus.is_empty() {
                0
            } else {
                table.compress_count(corpus, &mut counters, !last)
            };
            let next = if last {
                Self::empty(sample_size)
            } else {
                table.make_table(&counters, false, sampled)
            };
            let current = std::mem::replace(&mut table, next);
            if best.as_ref().map_or(true, |(best_gain, _, _)| gain >= *best_gain) {
                best = Some((gain, current, counters));
            }
        }

        match best {
            Some((_, table, counters)) => table.make_table(&counters, true, sampled),
            None => Self::empty(sample_size),
        }
    }

    /// Compresses `corpus` with this table.
    pub fn encode(&self, corpus: &[u8]) -> SymbolTable {
        let mut compressed = Vec::with_capacity(corpus.len());
        let mut pos = 0;
        while pos < corpus.len() {
            let slot = self.find_longest(corpus, pos);
            if slot < 256 {
                compressed.push(ESCAPE_CODE);
                compressed.push(corpus[pos]);
                pos += 1;
            } else {
                compressed.push((slot - 256) as u8);
                pos += self.symbols[slot - 256].len();
            }
        }

        SymbolTable {
            symbols: self.symbols.iter().flat_map(|s| s.as_slice().to_vec()).collect(),
            symbol_lengths: self.symbols.iter().map(|s| s.len() as u32).collect(),
            compressed,
        }
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(corpus: &[u8], sample_size: usize) -> SymbolTable {
        let table = SymbolTableBuilder::train(corpus, sample_size).encode(corpus);
        assert!(table.num_symbols() <= MAX_SYMBOLS);
        assert_eq!(table.decode().unwrap(), corpus);
        table
    }

    #[test]
    fn test_repetitive_text_compresses() {
        let corpus = "Hauptstraße Nebenstraße Bahnhofstraße Hauptstraße ".repeat(40);
        let table = roundtrip(corpus.as_bytes(), super::super::DEFAULT_SAMPLE_SIZE);
        assert!(table.compressed.len() + table.symbols.len() < corpus.len() / 2);
        assert!(table.symbol_lengths.iter().any(|&len| len > 1));
    }

    #[test]
    fn test_edge_corpora() {
        let empty = roundtrip(b"", 30_000);
        assert!(empty.compressed.is_empty());
        roundtrip(b"x", 30_000);
        let all_bytes: Vec<u8> = (0..=255).collect();
        roundtrip(&all_bytes, 30_000);
    }

    #[test]
    fn test_corpus_larger_than_the_sample() {
        use rand::Rng;
        let mut rng = rand::rng();
        let words = ["amenity", "restaurant", "cafe", "parking", "school", "residential"];
        let mut corpus = Vec::new();
        while corpus.len() < 200_000 {
            corpus.extend_from_slice(words[rng.random_range(0..words.len())].as_bytes());
            corpus.push(rng.random::<u8>());
        }
        roundtrip(&corpus, 5_000);
    }

    #[test]
    fn test_training_is_deterministic() {
        let corpus = "road road street avenue road lane street ".repeat(25);
        let a = SymbolTableBuilder::train(corpus.as_bytes(), 30_000).encode(corpus.as_bytes());
        let b = SymbolTableBuilder::train(corpus.as_bytes(), 30_000).encode(corpus.as_bytes());
        assert_eq!(a, b);
    }

    #[test]
    fn test_corpus_of_exactly_the_sample_size_is_not_sampled() {
        let builder = SymbolTableBuilder::empty(64);
        assert!(!builder.is_sampled(64));
        assert!(builder.is_sampled(65));
        assert_eq!(builder.sample_ranges(64), vec![0..64]);
        let corpus = "bus stop ".repeat(8);
        assert_eq!(corpus.len(), 72);
        roundtrip(&corpus.as_bytes()[..64], 64);
    }

    #[test]
    fn test_every_parsed_symbol_is_counted() {
        let builder = SymbolTableBuilder::empty(1_000);
        let mut counters = Counters::new();
        let gain = builder.compress_count(b"abc", &mut counters, true);
        assert_eq!(gain, -3);
        for byte in b"abc" {
            assert_eq!(counters.single[*byte as usize], 1);
        }
        assert_eq!(counters.pair[Counters::pair_index(b'a' as usize, b'b' as usize)], 1);
        assert_eq!(counters.pair[Counters::pair_index(b'b' as usize, b'c' as usize)], 1);
    }

    #[test]
    fn test_symbol_concat_is_capped() {
        let abc = Symbol::single(b'a').concat(&Symbol::single(b'b'));
        let mut long = abc;
        for _ in 0..10 {
            long = long.concat(&abc);
        }
        assert_eq!(long.len(), MAX_SYMBOL_LENGTH);
        assert_eq!(long.as_slice(), b"abababab");
    }
}
