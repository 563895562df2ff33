// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Compressed, consecutive alphabets over byte sequences.
//!
//! The founder generation pipeline never works on raw byte values; every
//! column operation maps symbols through a [`CompressedAlphabet`] that assigns
//! consecutive ranks `0..σ` to the distinct bytes occurring in the input. The
//! alphabet is built once up front and borrowed read-only afterwards.
//!
//! # Example
//!
//! ```
//! use founder_sequences::alphabets::CompressedAlphabetBuilder;
//!
//! let mut builder = CompressedAlphabetBuilder::new();
//! builder.prepare(b"ACGT");
//! builder.prepare(b"AGGT");
//! let alphabet = builder.build();
//!
//! assert_eq!(alphabet.sigma(), 4);
//! assert_eq!(alphabet.rank(b'A'), 0);
//! assert_eq!(alphabet.rank(b'T'), 3);
//! assert_eq!(alphabet.symbol(2), b'G');
//! ```

use bit_set::BitSet;
use vec_map::VecMap;

/// Maps the distinct bytes of an input to consecutive ranks `0..σ` and back.
///
/// Ranks are assigned in ascending byte order, so the rank order of two
/// symbols agrees with their lexicographic order as bytes.
#[derive(Debug, Clone, Default)]
pub struct CompressedAlphabet {
    ranks: VecMap<u8>,
    symbols: Vec<u8>,
}

impl CompressedAlphabet {
    /// Restore an alphabet from its rank → symbol table, e.g. one read back
    /// from a serialised segmentation. Symbols must be strictly ascending.
    pub fn from_symbols(symbols: Vec<u8>) -> Self {
        let mut ranks = VecMap::new();
        for (r, &c) in symbols.iter().enumerate() {
            ranks.insert(c as usize, r as u8);
        }
        CompressedAlphabet { ranks, symbols }
    }

    /// Get the rank of symbol `a`.
    ///
    /// Panics if `a` does not belong to the alphabet; the pipeline builds the
    /// alphabet from the same matrix it later transforms, so an unknown
    /// symbol indicates a bug in the caller.
    pub fn rank(&self, a: u8) -> u8 {
        *self
            .ranks
            .get(a as usize)
            .expect("symbol not present in the compressed alphabet")
    }

    /// Check whether symbol `a` belongs to the alphabet.
    pub fn contains(&self, a: u8) -> bool {
        self.ranks.contains_key(a as usize)
    }

    /// Get the symbol with rank `r`.
    pub fn symbol(&self, r: u8) -> u8 {
        self.symbols[r as usize]
    }

    /// Alphabet size σ.
    pub fn sigma(&self) -> usize {
        self.symbols.len()
    }

    /// The rank → symbol table in rank order.
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }
}

/// Collects the symbols occurring in a set of sequences and compresses them
/// into a [`CompressedAlphabet`].
#[derive(Debug, Default)]
pub struct CompressedAlphabetBuilder {
    seen: BitSet,
}

impl CompressedAlphabetBuilder {
    pub fn new() -> Self {
        CompressedAlphabetBuilder {
            seen: BitSet::with_capacity(256),
        }
    }

    /// Record the symbols of `text`.
    pub fn prepare(&mut self, text: &[u8]) {
        for &c in text {
            self.seen.insert(c as usize);
        }
    }

    /// Compress the collected symbols into consecutive ranks.
    pub fn build(self) -> CompressedAlphabet {
        let symbols: Vec<u8> = self.seen.iter().map(|c| c as u8).collect();
        CompressedAlphabet::from_symbols(symbols)
    }
}
