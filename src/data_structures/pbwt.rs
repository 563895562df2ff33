// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The positional Burrows–Wheeler transform (PBWT, Durbin 2014), maintained
//! one column at a time over a sequence matrix, together with periodic state
//! snapshots that allow replaying the transform over any right-extending
//! column window without starting from scratch.
//!
//! For the column `j` reached so far the context holds
//!
//! * the *prefix permutation* `a`, where `a[i]` is the row whose prefix of
//!   length `j` has rank `i` among all prefixes in colexicographic order, and
//! * the *divergence array* `d`, where `d[i]` is the smallest column index
//!   from which the prefixes of `a[i-1]` and `a[i]` agree; `d[0] = j` serves
//!   as a sentinel.
//!
//! The number of ranks with `d[i] > lb` equals the number of distinct
//! substrings of the matrix on the column range `[lb, j)`, which is the
//! quantity the segmentation stage optimises.
//!
//! # Example
//!
//! ```
//! use founder_sequences::alphabets::CompressedAlphabetBuilder;
//! use founder_sequences::data_structures::pbwt::PbwtContext;
//! use founder_sequences::matrix::SequenceMatrix;
//!
//! let matrix = SequenceMatrix::new(vec![
//!     b"ACGT".to_vec(),
//!     b"AGGT".to_vec(),
//!     b"ACCT".to_vec(),
//! ])
//! .unwrap();
//! let mut builder = CompressedAlphabetBuilder::new();
//! for row in matrix.rows() {
//!     builder.prepare(row);
//! }
//! let alphabet = builder.build();
//!
//! let mut ctx = PbwtContext::new(&matrix, &alphabet);
//! ctx.prepare();
//! while ctx.column() < 4 {
//!     ctx.step().unwrap();
//! }
//! // Three distinct rows on [0, 4), two on [2, 4).
//! assert_eq!(ctx.unique_substring_count_lhs(0), 3);
//! assert_eq!(ctx.unique_substring_count_lhs(2), 2);
//! ```

use std::collections::BTreeMap;

use crate::alphabets::CompressedAlphabet;
use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;

/// One equivalence class of rows sharing a substring on `[lb, column)`,
/// reported in PBWT rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstringClass {
    /// The smallest row index belonging to the class.
    pub min_row: u32,
    /// Number of rows in the class.
    pub size: u32,
}

/// A snapshot of the PBWT state at a column boundary.
///
/// Snapshots keep the prefix permutation and the divergence array; divergence
/// value counts are recomputed from `d` on demand to save memory.
#[derive(Debug, Clone)]
pub struct PbwtSample {
    rb: u32,
    a: Vec<u32>,
    d: Vec<u32>,
}

impl PbwtSample {
    /// The column boundary this snapshot was taken at.
    pub fn rb(&self) -> u32 {
        self.rb
    }

    /// The prefix permutation (rank → row).
    pub fn permutation(&self) -> &[u32] {
        &self.a
    }

    /// The divergence array.
    pub fn divergence(&self) -> &[u32] {
        &self.d
    }

    /// Number of distinct substrings on `[lb, rb)`.
    pub fn unique_substring_count_lhs(&self, lb: u32) -> u32 {
        self.d.iter().filter(|&&v| v > lb).count() as u32
    }

    /// The substring classes on `[lb, rb)` in rank order.
    pub fn unique_substrings_lhs(&self, lb: u32) -> Vec<SubstringClass> {
        substring_classes(&self.a, &self.d, lb)
    }
}

/// Incremental PBWT over a borrowed sequence matrix.
pub struct PbwtContext<'a> {
    sequences: &'a SequenceMatrix,
    alphabet: &'a CompressedAlphabet,
    a: Vec<u32>,
    d: Vec<u32>,
    a_buf: Vec<u32>,
    d_buf: Vec<u32>,
    // Per-symbol scratch used by the column update.
    bucket_offsets: Vec<usize>,
    divergence_seeds: Vec<u32>,
    counts: BTreeMap<u32, u32>,
    col: u32,
    maintain_counts: bool,
    prepared: bool,
}

impl<'a> PbwtContext<'a> {
    pub fn new(sequences: &'a SequenceMatrix, alphabet: &'a CompressedAlphabet) -> Self {
        let n_rows = sequences.n_rows();
        let sigma = alphabet.sigma();
        PbwtContext {
            sequences,
            alphabet,
            a: Vec::with_capacity(n_rows),
            d: Vec::with_capacity(n_rows),
            a_buf: vec![0; n_rows],
            d_buf: vec![0; n_rows],
            bucket_offsets: vec![0; sigma],
            divergence_seeds: vec![0; sigma],
            counts: BTreeMap::new(),
            col: 0,
            maintain_counts: true,
            prepared: false,
        }
    }

    /// Restore a context from a snapshot so that stepping continues from
    /// `sample.rb()`. The matrix and alphabet must be the ones the snapshot
    /// was taken over.
    pub fn from_sample(
        sequences: &'a SequenceMatrix,
        alphabet: &'a CompressedAlphabet,
        sample: &PbwtSample,
    ) -> Self {
        let mut ctx = PbwtContext::new(sequences, alphabet);
        ctx.a = sample.a.clone();
        ctx.d = sample.d.clone();
        ctx.col = sample.rb;
        ctx.prepared = true;
        ctx.refresh_divergence_value_counts();
        ctx
    }

    /// Toggle maintenance of the divergence value counts. Replay paths that
    /// only need `a` and `d` switch this off.
    pub fn set_maintains_divergence_value_counts(&mut self, value: bool) {
        if value && !self.maintain_counts && self.prepared {
            self.refresh_divergence_value_counts();
        }
        self.maintain_counts = value;
    }

    /// Number of rows.
    pub fn size(&self) -> u32 {
        self.sequences.n_rows() as u32
    }

    /// Sequence length.
    pub fn sequence_length(&self) -> u32 {
        self.sequences.n_cols() as u32
    }

    /// The column boundary reached so far: columns `[0, column())` have been
    /// consumed.
    pub fn column(&self) -> u32 {
        self.col
    }

    /// The prefix permutation (rank → row).
    pub fn permutation(&self) -> &[u32] {
        &self.a
    }

    /// The divergence array.
    pub fn divergence(&self) -> &[u32] {
        &self.d
    }

    /// The sparse map from divergence value to the number of ranks holding
    /// it, in ascending value order.
    pub fn divergence_value_counts(&self) -> &BTreeMap<u32, u32> {
        debug_assert!(self.maintain_counts);
        &self.counts
    }

    /// Initialise for column zero: identity permutation, zero divergences.
    pub fn prepare(&mut self) {
        let n_rows = self.sequences.n_rows();
        self.a.clear();
        self.a.extend(0..n_rows as u32);
        self.d.clear();
        self.d.resize(n_rows, 0);
        self.col = 0;
        self.prepared = true;
        if self.maintain_counts {
            self.refresh_divergence_value_counts();
        }
    }

    /// Consume the next column, re-threading `a` and `d`.
    ///
    /// This is the generalised Durbin column update: ranks are partitioned
    /// into σ buckets by their symbol in the current column, each bucket
    /// tracking the largest divergence value seen since it last received a
    /// row. Concatenating the buckets in symbol order yields the permutation
    /// and divergences for the extended prefixes.
    pub fn step(&mut self) -> Result<()> {
        debug_assert!(self.prepared, "step() called before prepare()");
        let length = self.sequence_length();
        if self.col >= length {
            return Err(Error::ColumnOutOfRange {
                column: self.col,
                length,
            });
        }

        let col = self.col as usize;
        let sigma = self.alphabet.sigma();
        let sentinel = self.col + 1;

        // First pass: bucket sizes for the current column.
        self.bucket_offsets.iter_mut().for_each(|c| *c = 0);
        for &row in &self.a {
            let sym = self.alphabet.rank(self.sequences.row(row as usize)[col]) as usize;
            self.bucket_offsets[sym] += 1;
        }
        // Exclusive prefix sums turn the sizes into write offsets.
        let mut offset = 0;
        for c in self.bucket_offsets.iter_mut() {
            let size = *c;
            *c = offset;
            offset += size;
        }

        // Second pass: thread rows into their buckets. Every bucket's first
        // row receives the sentinel-seeded divergence, later rows the largest
        // divergence value since the bucket was last written.
        self.divergence_seeds.iter_mut().for_each(|p| *p = sentinel);
        for i in 0..self.a.len() {
            let row = self.a[i];
            let div = self.d[i];
            for p in self.divergence_seeds.iter_mut() {
                if div > *p {
                    *p = div;
                }
            }
            let sym = self.alphabet.rank(self.sequences.row(row as usize)[col]) as usize;
            let pos = self.bucket_offsets[sym];
            self.bucket_offsets[sym] += 1;
            self.a_buf[pos] = row;
            self.d_buf[pos] = self.divergence_seeds[sym];
            self.divergence_seeds[sym] = 0;
        }
        debug_assert_eq!(self.bucket_offsets[sigma - 1], self.a.len());

        std::mem::swap(&mut self.a, &mut self.a_buf);
        std::mem::swap(&mut self.d, &mut self.d_buf);
        self.col += 1;

        if self.maintain_counts {
            self.refresh_divergence_value_counts();
        }
        Ok(())
    }

    /// Number of distinct substrings on `[lb, column())`, computed from the
    /// divergence value counts in O(number of distinct values).
    pub fn unique_substring_count_lhs(&self, lb: u32) -> u32 {
        debug_assert!(self.maintain_counts);
        let joined: u32 = self.counts.range(..=lb).map(|(_, &c)| c).sum();
        self.size() - joined
    }

    /// The substring classes on `[lb, column())` in rank order, with class
    /// sizes and minimum member rows.
    pub fn unique_substrings_lhs(&self, lb: u32) -> Vec<SubstringClass> {
        substring_classes(&self.a, &self.d, lb)
    }

    /// Snapshot the current state.
    pub fn sample(&self) -> PbwtSample {
        PbwtSample {
            rb: self.col,
            a: self.a.clone(),
            d: self.d.clone(),
        }
    }

    fn refresh_divergence_value_counts(&mut self) {
        self.counts.clear();
        for &v in &self.d {
            *self.counts.entry(v).or_insert(0) += 1;
        }
    }
}

/// Group the ranks into substring classes: a rank starts a new class exactly
/// when its divergence value exceeds `lb`.
fn substring_classes(a: &[u32], d: &[u32], lb: u32) -> Vec<SubstringClass> {
    let mut classes: Vec<SubstringClass> = Vec::new();
    for (i, (&row, &div)) in a.iter().zip(d.iter()).enumerate() {
        if i == 0 || div > lb {
            classes.push(SubstringClass { min_row: row, size: 1 });
        } else {
            let last = classes.last_mut().expect("rank zero starts a class");
            last.size += 1;
            if row < last.min_row {
                last.min_row = row;
            }
        }
    }
    classes
}

/// Wraps a context and records snapshots at a fixed column cadence while
/// stepping. A snapshot of the initial state (column zero) is always kept so
/// replays have a base to start from even with sampling disabled.
pub struct SamplingContext<'a> {
    ctx: PbwtContext<'a>,
    rate: u32,
    samples: Vec<PbwtSample>,
}

impl<'a> SamplingContext<'a> {
    /// `rate` is the snapshot cadence in columns; zero disables periodic
    /// snapshots.
    pub fn new(sequences: &'a SequenceMatrix, alphabet: &'a CompressedAlphabet, rate: u32) -> Self {
        SamplingContext {
            ctx: PbwtContext::new(sequences, alphabet),
            rate,
            samples: Vec::new(),
        }
    }

    pub fn context(&self) -> &PbwtContext<'a> {
        &self.ctx
    }

    pub fn samples(&self) -> &[PbwtSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<PbwtSample> {
        self.samples
    }

    pub fn prepare(&mut self) {
        self.ctx.prepare();
        self.samples.clear();
        self.samples.push(self.ctx.sample());
    }

    /// Advance until the context has consumed the columns `[0, until)`,
    /// invoking `on_column` after every step and snapshotting on cadence.
    pub fn process<F>(&mut self, until: u32, mut on_column: F) -> Result<()>
    where
        F: FnMut(&PbwtContext<'a>),
    {
        while self.ctx.column() < until {
            self.ctx.step()?;
            on_column(&self.ctx);
            if self.rate != 0 && self.ctx.column() % self.rate == 0 {
                self.samples.push(self.ctx.sample());
            }
        }
        Ok(())
    }
}

/// Advance a snapshot to the given column boundary by replaying the PBWT.
pub fn advance_sample(
    sequences: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    sample: &PbwtSample,
    to_column: u32,
) -> Result<PbwtSample> {
    let mut ctx = PbwtContext::from_sample(sequences, alphabet, sample);
    ctx.set_maintains_divergence_value_counts(false);
    while ctx.column() < to_column {
        ctx.step()?;
    }
    Ok(ctx.sample())
}
