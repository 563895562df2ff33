// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Matching original sequences back onto a founder set.
//!
//! A founder set is only useful if every input sequence can be spelled as a
//! concatenation of founder stretches. The matcher verifies this: walking one
//! sequence left to right, it keeps the set of founders agreeing with it on
//! the open range `[lb, pos)`; whenever the set would become empty, the
//! maximal range is reported with its founder indices and a new range begins
//! at `pos`. Fewer, longer ranges mean fewer recombinations are needed to
//! explain the sequence.
//!
//! # Example
//!
//! ```
//! use founder_sequences::matcher::match_sequence_to_founders;
//! use founder_sequences::matrix::SequenceMatrix;
//!
//! let founders = SequenceMatrix::new(vec![
//!     b"ACGT".to_vec(),
//!     b"AGCT".to_vec(),
//! ])
//! .unwrap();
//! // AGGT = AG from founder 1, GT from founder 0.
//! let ranges = match_sequence_to_founders(b"AGGT", &founders).unwrap();
//! assert_eq!(ranges.len(), 2);
//! assert_eq!((ranges[0].lb, ranges[0].rb), (0, 2));
//! assert_eq!(ranges[0].founders, vec![1]);
//! assert_eq!((ranges[1].lb, ranges[1].rb), (2, 4));
//! assert_eq!(ranges[1].founders, vec![0]);
//! ```

use std::io::Write;

use itertools::Itertools;

use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;
use crate::scheduler::{Scheduler, Task};

/// A maximal column range on which at least one founder equals the matched
/// sequence, with the indices of all such founders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FounderMatch {
    /// Inclusive left bound.
    pub lb: u32,
    /// Exclusive right bound.
    pub rb: u32,
    /// Founder rows matching on `[lb, rb)`, ascending.
    pub founders: Vec<u32>,
}

/// Decompose `sequence` into maximal founder-matching ranges.
///
/// Fails with `InputMalformed` if some position of the sequence matches no
/// founder at all (the founders then cannot spell the sequence).
pub fn match_sequence_to_founders(
    sequence: &[u8],
    founders: &SequenceMatrix,
) -> Result<Vec<FounderMatch>> {
    if sequence.len() != founders.n_cols() {
        return Err(Error::InputMalformed(format!(
            "sequence length {} does not match the founder length {}",
            sequence.len(),
            founders.n_cols()
        )));
    }

    let mut ranges: Vec<FounderMatch> = Vec::new();
    let mut active: Vec<u32> = (0..founders.n_rows() as u32).collect();
    let mut surviving: Vec<u32> = Vec::with_capacity(active.len());
    let mut lb = 0u32;

    for (pos, &c) in sequence.iter().enumerate() {
        filter_matching(founders, &active, c, pos, &mut surviving);
        if surviving.is_empty() {
            // The range ends here; report and restart at this column.
            ranges.push(FounderMatch {
                lb,
                rb: pos as u32,
                founders: active.clone(),
            });
            lb = pos as u32;
            active.clear();
            active.extend(0..founders.n_rows() as u32);
            filter_matching(founders, &active, c, pos, &mut surviving);
            if surviving.is_empty() {
                return Err(Error::InputMalformed(format!(
                    "symbol {:?} at column {} does not occur in any founder",
                    c as char, pos
                )));
            }
        }
        std::mem::swap(&mut active, &mut surviving);
    }

    ranges.push(FounderMatch {
        lb,
        rb: sequence.len() as u32,
        founders: active,
    });
    Ok(ranges)
}

fn filter_matching(
    founders: &SequenceMatrix,
    active: &[u32],
    c: u8,
    pos: usize,
    surviving: &mut Vec<u32>,
) {
    surviving.clear();
    for &idx in active {
        if founders.row(idx as usize)[pos] == c {
            surviving.push(idx);
        }
    }
}

/// Match every sequence against the founders concurrently and write one
/// tab-separated block per sequence:
/// `SEQUENCE_INDEX LB RB FOUNDER_INDICES` with comma-separated indices.
pub fn match_all_and_report(
    sequences: &SequenceMatrix,
    founders: &SequenceMatrix,
    scheduler: &dyn Scheduler,
    writer: &mut dyn Write,
) -> Result<()> {
    let mut results: Vec<Result<Vec<FounderMatch>>> =
        (0..sequences.n_rows()).map(|_| Ok(Vec::new())).collect();
    {
        let tasks: Vec<Task> = results
            .iter_mut()
            .enumerate()
            .map(|(idx, slot)| {
                let task: Task = Box::new(move || {
                    *slot = match_sequence_to_founders(sequences.row(idx), founders);
                });
                task
            })
            .collect();
        scheduler.run_group(tasks);
    }

    writeln!(writer, "SEQUENCE_INDEX\tLB\tRB\tFOUNDER_INDICES")?;
    for (seq_idx, result) in results.into_iter().enumerate() {
        for range in result? {
            let indices = range.founders.iter().map(|f| f.to_string()).join(",");
            writeln!(writer, "{}\t{}\t{}\t{}", seq_idx, range.lb, range.rb, indices)?;
        }
    }
    writer.flush()?;
    Ok(())
}
