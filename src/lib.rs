// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Generation of founder sequences from multiple sequence alignments.
//!
//! Given N equal-length sequences and a minimum segment length L, the crate
//! partitions the columns into contiguous segments so that the largest
//! per-segment number of distinct substrings, K, is minimal, and then
//! concatenates one representative substring per segment into K *founder
//! sequences*. Founders preserve every input substring at least once and
//! restrict recombination to segment boundaries, which makes them a compact
//! reference set for haplotype panels.
//!
//! The segmentation is driven by the positional Burrows–Wheeler transform
//! ([`data_structures::pbwt`]), whose divergence arrays count distinct
//! substrings over any right-extending window, feeding an O(n) dynamic
//! program ([`segmentation::dp`]) with a block range-minimum structure
//! ([`data_structures::rmq`]). Substrings of adjacent segments are joined by
//! one of four disciplines ([`join`]): PBWT order, seeded random shuffling,
//! greedy co-occurrence matching or exact minimum-cost bipartite matching.
//!
//! # Example
//!
//! ```
//! use founder_sequences::join::{BipartiteSetScoring, SegmentJoining};
//! use founder_sequences::matrix::SequenceMatrix;
//! use founder_sequences::pipeline::{generate, GenerateConfig};
//! use founder_sequences::segmentation::dp::no_progress;
//!
//! let matrix = SequenceMatrix::new(vec![
//!     b"ACGTACGT".to_vec(),
//!     b"ACGTAAAT".to_vec(),
//!     b"TCGTACGT".to_vec(),
//!     b"TCGTAAAT".to_vec(),
//! ])
//! .unwrap();
//!
//! let config = GenerateConfig {
//!     segment_length: 2,
//!     joining: SegmentJoining::Greedy,
//!     set_scoring: BipartiteSetScoring::SymmetricDifference,
//!     pbwt_sample_rate: 1,
//!     random_seed: 42,
//!     single_threaded: true,
//! };
//! let mut founders = Vec::new();
//! let outcome =
//!     generate(&matrix, &config, no_progress(), &mut founders, None, None, "").unwrap();
//!
//! // Two founders cover all four rows.
//! assert_eq!(outcome.founder_count, 2);
//! ```

pub mod alphabets;
pub mod data_structures;
pub mod errors;
pub mod identity;
pub mod io;
pub mod join;
pub mod matcher;
pub mod matrix;
pub mod pipeline;
pub mod scheduler;
pub mod segmentation;

pub use crate::errors::{Error, Result};
