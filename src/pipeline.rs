// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The generation pipeline: alphabet → segmentation → sample update →
//! reduction → joining → output, as a linear sequence of owned stages.
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
//!     b"AAAA".to_vec(),
//!     b"AACC".to_vec(),
//!     b"AAAA".to_vec(),
//!     b"AACC".to_vec(),
//! ])
//! .unwrap();
//! let config = GenerateConfig {
//!     segment_length: 2,
//!     joining: SegmentJoining::PbwtOrder,
//!     set_scoring: BipartiteSetScoring::SymmetricDifference,
//!     pbwt_sample_rate: 1,
//!     random_seed: 42,
//!     single_threaded: true,
//! };
//! let mut founders = Vec::new();
//! let outcome = generate(&matrix, &config, no_progress(), &mut founders, None, None, "")
//!     .unwrap();
//! assert_eq!(outcome.founder_count, 2);
//! let text = String::from_utf8(founders).unwrap();
//! assert_eq!(text.lines().count(), 2);
//! ```

use std::io::Write;

use tracing::{info, warn};

use crate::alphabets::{CompressedAlphabet, CompressedAlphabetBuilder};
use crate::data_structures::pbwt::{PbwtContext, SamplingContext};
use crate::errors::{Error, Result};
use crate::join::{join_segments_and_output, BipartiteSetScoring, JoinConfig, SegmentJoining};
use crate::matrix::SequenceMatrix;
use crate::scheduler::{Inline, Scheduler, WorkStealing};
use crate::segmentation::container::SegmentationContainer;
use crate::segmentation::dp::{generate_traceback, Progress};
use crate::segmentation::reduce::find_segments_greedy;
use crate::segmentation::update::update_samples_to_traceback_positions;
use crate::segmentation::{DpCell, ReducedSegmentation};

/// Configuration of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Minimum segment length L.
    pub segment_length: u32,
    pub joining: SegmentJoining,
    pub set_scoring: BipartiteSetScoring,
    /// Multiplier m for the PBWT snapshot cadence `m·⌊√n⌋`; zero disables
    /// periodic snapshots.
    pub pbwt_sample_rate: u32,
    pub random_seed: u32,
    pub single_threaded: bool,
}

/// What a finished run reports back.
#[derive(Debug)]
pub struct GenerateOutcome {
    /// The founder count K.
    pub founder_count: u32,
    pub segment_count: usize,
    /// The reduced segmentation, ready to be serialised.
    pub segmentation: SegmentationContainer,
}

/// Run the full pipeline over `matrix`, writing founder rows to `founders`
/// and, if given, the segment listing to `segments`.
///
/// When `stored` is given, its segmentation replaces the DP stage; only the
/// PBWT snapshots at the cut positions are recomputed. `input_label` is
/// recorded in the returned segmentation container.
pub fn generate(
    matrix: &SequenceMatrix,
    config: &GenerateConfig,
    progress: Progress,
    founders: &mut dyn Write,
    segments: Option<&mut dyn Write>,
    stored: Option<&SegmentationContainer>,
    input_label: &str,
) -> Result<GenerateOutcome> {
    if config.segment_length == 0 {
        return Err(Error::ConfigInvalid(
            "the segment length bound must be positive".to_owned(),
        ));
    }

    let scheduler: Box<dyn Scheduler> = if config.single_threaded {
        Box::new(Inline)
    } else {
        Box::new(WorkStealing::new(None)?)
    };

    let alphabet = match stored {
        Some(container) => {
            check_stored_compatibility(matrix, container)?;
            let alphabet = container.alphabet();
            for row in matrix.rows() {
                for &symbol in row {
                    if !alphabet.contains(symbol) {
                        return Err(Error::InputMalformed(format!(
                            "input symbol {:?} is missing from the stored alphabet",
                            symbol as char
                        )));
                    }
                }
            }
            alphabet
        }
        None => {
            let mut builder = CompressedAlphabetBuilder::new();
            for row in matrix.rows() {
                builder.prepare(row);
            }
            builder.build()
        }
    };
    info!(sigma = alphabet.sigma(), "alphabet ready");

    let reduced = match stored {
        Some(container) => restore_segmentation(matrix, &alphabet, container, scheduler.as_ref())?,
        None => compute_segmentation(matrix, &alphabet, config, progress, scheduler.as_ref())?,
    };
    info!(
        founders = reduced.max_segment_size,
        segments = reduced.cells.len(),
        "segmentation ready"
    );

    let join_config = JoinConfig {
        joining: config.joining,
        set_scoring: config.set_scoring,
        random_seed: config.random_seed,
    };
    join_segments_and_output(
        matrix,
        &reduced,
        &join_config,
        scheduler.as_ref(),
        founders,
        segments,
    )?;

    let segmentation = SegmentationContainer {
        segment_length: config.segment_length,
        max_segment_size: reduced.max_segment_size,
        sequence_count: matrix.n_rows() as u32,
        sequence_length: matrix.n_cols() as u32,
        alphabet_symbols: alphabet.symbols().to_vec(),
        cells: reduced.cells.clone(),
        input_path: input_label.to_owned(),
    };

    Ok(GenerateOutcome {
        founder_count: reduced.max_segment_size,
        segment_count: segmentation.cells.len(),
        segmentation,
    })
}

fn compute_segmentation(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    config: &GenerateConfig,
    progress: Progress,
    scheduler: &dyn Scheduler,
) -> Result<ReducedSegmentation> {
    let n = matrix.n_cols() as u32;
    let seq_count = matrix.n_rows() as u32;

    if n < 2 * config.segment_length {
        return segment_short_path(matrix, alphabet, progress);
    }

    let sample_rate = snapshot_cadence(n, config.pbwt_sample_rate);
    let traceback = generate_traceback(
        matrix,
        alphabet,
        config.segment_length,
        sample_rate,
        progress,
    )?;
    if traceback.max_segment_size >= seq_count {
        warn!(
            founders = traceback.max_segment_size,
            sequences = seq_count,
            "the segmentation does not reduce the number of sequences"
        );
    }

    let updated = update_samples_to_traceback_positions(
        matrix,
        alphabet,
        &traceback.cells,
        traceback.samples,
        scheduler,
    )?;
    Ok(find_segments_greedy(
        &traceback.cells,
        updated,
        traceback.max_segment_size,
    ))
}

/// Fewer than two segments fit: run the PBWT over all columns and emit a
/// single segment sized by the distinct count of the whole matrix.
fn segment_short_path(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    progress: Progress,
) -> Result<ReducedSegmentation> {
    let n = matrix.n_cols() as u32;
    let mut sampling = SamplingContext::new(matrix, alphabet, 0);
    sampling.prepare();
    sampling.process(n, |ctx| progress(u64::from(ctx.column()), u64::from(n)))?;

    let ctx = sampling.context();
    let size = ctx.unique_substring_count_lhs(0);
    Ok(ReducedSegmentation {
        cells: vec![DpCell::new(0, n, size, size)],
        samples: vec![ctx.sample()],
        max_segment_size: size,
    })
}

/// Re-derive the PBWT snapshots for a stored segmentation and re-validate its
/// per-segment sizes against the presented input.
fn restore_segmentation(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    container: &SegmentationContainer,
    scheduler: &dyn Scheduler,
) -> Result<ReducedSegmentation> {
    let mut initial = PbwtContext::new(matrix, alphabet);
    initial.prepare();
    let samples = update_samples_to_traceback_positions(
        matrix,
        alphabet,
        &container.cells,
        vec![initial.sample()],
        scheduler,
    )?;

    let mut cells = container.cells.clone();
    for (cell, sample) in cells.iter_mut().zip(&samples) {
        let size = sample.unique_substring_count_lhs(cell.lb);
        if size > container.max_segment_size {
            return Err(Error::NotReducible(format!(
                "stored segmentation allows {} founders but segment [{}, {}) holds {} distinct substrings",
                container.max_segment_size, cell.lb, cell.rb, size
            )));
        }
        cell.segment_size = size;
        cell.segment_max_size = size;
    }

    Ok(ReducedSegmentation {
        cells,
        samples,
        max_segment_size: container.max_segment_size,
    })
}

fn check_stored_compatibility(
    matrix: &SequenceMatrix,
    container: &SegmentationContainer,
) -> Result<()> {
    if container.sequence_count != matrix.n_rows() as u32
        || container.sequence_length != matrix.n_cols() as u32
    {
        return Err(Error::InputMalformed(format!(
            "stored segmentation was computed for a {}×{} input, got {}×{}",
            container.sequence_count,
            container.sequence_length,
            matrix.n_rows(),
            matrix.n_cols()
        )));
    }
    if container.max_segment_size > container.sequence_count {
        return Err(Error::NotReducible(
            "stored segmentation declares more founders than input rows".to_owned(),
        ));
    }
    Ok(())
}

fn snapshot_cadence(n: u32, multiplier: u32) -> u32 {
    if multiplier == 0 {
        0
    } else {
        let root = (f64::from(n)).sqrt().floor() as u32;
        (multiplier * root.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::dp::no_progress;

    fn config(joining: SegmentJoining, l: u32) -> GenerateConfig {
        GenerateConfig {
            segment_length: l,
            joining,
            set_scoring: BipartiteSetScoring::SymmetricDifference,
            pbwt_sample_rate: 1,
            random_seed: 42,
            single_threaded: true,
        }
    }

    fn run(rows: Vec<Vec<u8>>, cfg: &GenerateConfig) -> (GenerateOutcome, Vec<String>) {
        let matrix = SequenceMatrix::new(rows).unwrap();
        let mut founders = Vec::new();
        let outcome = generate(
            &matrix,
            cfg,
            no_progress(),
            &mut founders,
            None,
            None,
            "test",
        )
        .unwrap();
        let lines = String::from_utf8(founders)
            .unwrap()
            .lines()
            .map(|l| l.to_owned())
            .collect();
        (outcome, lines)
    }

    #[test]
    fn test_zero_segment_length_rejected() {
        let matrix = SequenceMatrix::new(vec![b"ACGT".to_vec()]).unwrap();
        let cfg = config(SegmentJoining::PbwtOrder, 0);
        let mut founders = Vec::new();
        let err = generate(
            &matrix,
            &cfg,
            no_progress(),
            &mut founders,
            None,
            None,
            "",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn test_short_path_single_segment() {
        // n = 4 < 2L = 6 routes the short path.
        let (outcome, lines) = run(
            vec![b"AAAA".to_vec(), b"AACC".to_vec()],
            &config(SegmentJoining::PbwtOrder, 3),
        );
        assert_eq!(outcome.founder_count, 2);
        assert_eq!(outcome.segment_count, 1);
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["AAAA".to_owned(), "AACC".to_owned()]);
    }

    #[test]
    fn test_founder_line_shape() {
        let (outcome, lines) = run(
            vec![
                b"ACGTACGT".to_vec(),
                b"ACGTAAAT".to_vec(),
                b"TCGTACGT".to_vec(),
            ],
            &config(SegmentJoining::Greedy, 2),
        );
        assert_eq!(lines.len(), outcome.founder_count as usize);
        for line in &lines {
            assert_eq!(line.len(), 8);
        }
    }

    #[test]
    fn test_incompatible_stored_segmentation_rejected() {
        let matrix = SequenceMatrix::new(vec![b"ACGT".to_vec(), b"AGGT".to_vec()]).unwrap();
        let stored = SegmentationContainer {
            segment_length: 2,
            max_segment_size: 2,
            sequence_count: 3,
            sequence_length: 4,
            alphabet_symbols: b"ACGT".to_vec(),
            cells: vec![DpCell::new(0, 4, 2, 2)],
            input_path: String::new(),
        };
        let mut founders = Vec::new();
        let err = generate(
            &matrix,
            &config(SegmentJoining::PbwtOrder, 2),
            no_progress(),
            &mut founders,
            None,
            Some(&stored),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InputMalformed(_)));
    }

    #[test]
    fn test_stored_segmentation_that_cannot_cover_is_rejected() {
        let matrix = SequenceMatrix::new(vec![
            b"AAAA".to_vec(),
            b"CCCC".to_vec(),
            b"GGGG".to_vec(),
        ])
        .unwrap();
        // Claims one founder, but the input has three distinct rows.
        let stored = SegmentationContainer {
            segment_length: 2,
            max_segment_size: 1,
            sequence_count: 3,
            sequence_length: 4,
            alphabet_symbols: b"ACG".to_vec(),
            cells: vec![DpCell::new(0, 4, 1, 1)],
            input_path: String::new(),
        };
        let mut founders = Vec::new();
        let err = generate(
            &matrix,
            &config(SegmentJoining::PbwtOrder, 2),
            no_progress(),
            &mut founders,
            None,
            Some(&stored),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotReducible(_)));
    }

    #[test]
    fn test_snapshot_cadence() {
        assert_eq!(snapshot_cadence(100, 0), 0);
        assert_eq!(snapshot_cadence(100, 1), 10);
        assert_eq!(snapshot_cadence(100, 3), 30);
        assert_eq!(snapshot_cadence(2, 1), 1);
    }
}
