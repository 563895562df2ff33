// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Joining segment substrings into founder rows.
//!
//! After segmentation, every segment carries a list of distinct substrings
//! with their copy numbers. A joining discipline decides which substring of
//! one segment continues into which substring of the next:
//!
//! * [`pbwt_order`] — keep the PBWT rank order and emit by running
//!   cumulative copy-number sums,
//! * [`random`] — shuffle the slots within each segment with a seeded
//!   Mersenne Twister,
//! * [`greedy`] — pair substrings of adjacent segments by descending
//!   co-occurrence counts,
//! * [`bipartite`] — solve an exact minimum-cost perfect matching per
//!   adjacent segment pair.
//!
//! All disciplines produce K founder rows; the matchers may leave gap slots
//! (`-`) where a segment has fewer distinct substrings than K.

pub mod assignment;
pub mod bipartite;
pub mod greedy;
pub mod pbwt_order;
pub mod random;

use std::io::Write;

use crate::data_structures::int_vector::IntVector;
use crate::errors::Result;
use crate::io::write::{write_copy_number_segments, write_gaps, write_matcher_segments, write_substring};
use crate::matrix::SequenceMatrix;
use crate::scheduler::{Scheduler, Task};
use crate::segmentation::{DpCell, ReducedSegmentation};

/// The joining discipline pairing substrings across segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentJoining {
    Greedy,
    BipartiteMatching,
    Random,
    PbwtOrder,
}

/// Edge scoring for bipartite matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BipartiteSetScoring {
    /// Minimise the symmetric difference of the carried row sets.
    SymmetricDifference,
    /// Maximise the intersection of the carried row sets.
    Intersection,
}

#[derive(Debug, Clone)]
pub struct JoinConfig {
    pub joining: SegmentJoining,
    pub set_scoring: BipartiteSetScoring,
    pub random_seed: u32,
}

/// A distinct substring of one segment with its founder copy number.
///
/// `substring_idx` is the smallest input row carrying the substring;
/// `string_idx` preserves the PBWT rank order of the class for PBWT-order
/// output. After preparation the `copy_number` fields hold prefix sums so a
/// slot can be located by binary or cursor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstringCopyNumber {
    pub substring_idx: u32,
    pub copy_number: u32,
    pub string_idx: u32,
}

/// Drive the selected joining discipline and write the founder rows, plus the
/// segment listing if requested.
pub fn join_segments_and_output(
    matrix: &SequenceMatrix,
    reduced: &ReducedSegmentation,
    config: &JoinConfig,
    scheduler: &dyn Scheduler,
    founders: &mut dyn Write,
    mut segments: Option<&mut dyn Write>,
) -> Result<()> {
    let k = reduced.max_segment_size;
    let seq_count = matrix.n_rows() as u32;
    let copy_numbers = prepare_copy_numbers(reduced, config.joining, scheduler);

    match config.joining {
        SegmentJoining::PbwtOrder => {
            pbwt_order::output_founders(founders, matrix, &reduced.cells, &copy_numbers, k)?;
            if let Some(writer) = segments.as_deref_mut() {
                write_copy_number_listing(writer, matrix, &reduced.cells, &copy_numbers)?;
            }
        }
        SegmentJoining::Random => {
            let (permutations, permutation_max) =
                random::create_permutations(&copy_numbers, k, seq_count, config.random_seed);
            output_in_permutation_order(
                founders,
                matrix,
                &reduced.cells,
                &permutations,
                k,
                permutation_max,
            )?;
            if let Some(writer) = segments.as_deref_mut() {
                write_copy_number_listing(writer, matrix, &reduced.cells, &copy_numbers)?;
            }
        }
        SegmentJoining::Greedy => {
            let (permutations, permutation_max) =
                greedy::match_segments(&copy_numbers, &reduced.samples, k, seq_count)?;
            output_in_permutation_order(
                founders,
                matrix,
                &reduced.cells,
                &permutations,
                k,
                permutation_max,
            )?;
            if let Some(writer) = segments.as_deref_mut() {
                let listings = greedy::segment_listings(&copy_numbers, &reduced.samples);
                write_matcher_segments(writer, matrix, &reduced.cells, &listings)?;
            }
        }
        SegmentJoining::BipartiteMatching => {
            bipartite::join_and_output(
                matrix,
                reduced,
                &copy_numbers,
                config.set_scoring,
                scheduler,
                founders,
                segments,
            )?;
        }
    }
    Ok(())
}

/// Count substring classes per segment and turn them into cumulative copy
/// number lists.
///
/// The copy-number joiners (PBWT order, random) pad every segment to exactly
/// K slots, distributing the spare slots in proportion to class size; the
/// matchers keep the raw class sizes, whose cumulative sums then walk the
/// N-row PBWT permutations.
pub fn prepare_copy_numbers(
    reduced: &ReducedSegmentation,
    joining: SegmentJoining,
    scheduler: &dyn Scheduler,
) -> Vec<Vec<SubstringCopyNumber>> {
    let k = reduced.max_segment_size;
    let pad = matches!(joining, SegmentJoining::Random | SegmentJoining::PbwtOrder);
    let restore_order = joining == SegmentJoining::PbwtOrder;

    let mut result: Vec<Vec<SubstringCopyNumber>> =
        (0..reduced.cells.len()).map(|_| Vec::new()).collect();
    {
        let tasks: Vec<Task> = reduced
            .cells
            .iter()
            .zip(&reduced.samples)
            .zip(result.iter_mut())
            .map(|((cell, sample), slot)| {
                let task: Task = Box::new(move || {
                    let mut cn: Vec<SubstringCopyNumber> = sample
                        .unique_substrings_lhs(cell.lb)
                        .iter()
                        .enumerate()
                        .map(|(i, class)| SubstringCopyNumber {
                            substring_idx: class.min_row,
                            copy_number: class.size,
                            string_idx: i as u32,
                        })
                        .collect();
                    if pad {
                        cn.sort_by_key(|c| c.copy_number);
                        pad_to_founder_count(&mut cn, k);
                        if restore_order {
                            cn.sort_by_key(|c| c.string_idx);
                        }
                    }
                    make_cumulative_sum(&mut cn);
                    *slot = cn;
                });
                task
            })
            .collect();
        scheduler.run_group(tasks);
    }
    result
}

/// Distribute the `k - len` spare founder slots over the classes, largest
/// first and in proportion to class size, leaving every class at least one
/// slot. Expects the classes sorted by ascending size.
fn pad_to_founder_count(cn: &mut [SubstringCopyNumber], k: u32) {
    let count = cn.len() as u32;
    debug_assert!(count <= k);
    let empty_slots = k - count;
    let mut remaining = empty_slots;
    for c in cn.iter_mut().rev() {
        let share = (f64::from(c.copy_number) / f64::from(count) * f64::from(empty_slots)).ceil();
        let addition = remaining.min(share as u32);
        c.copy_number = 1 + addition;
        remaining -= addition;
    }
    while remaining > 0 {
        for c in cn.iter_mut().rev() {
            c.copy_number += 1;
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
    }
    debug_assert_eq!(cn.iter().map(|c| c.copy_number).sum::<u32>(), k);
}

fn make_cumulative_sum(cn: &mut [SubstringCopyNumber]) {
    let mut sum = 0;
    for c in cn.iter_mut() {
        sum += c.copy_number;
        c.copy_number = sum;
    }
}

/// Bit width needed to store `value` itself (not just `value - 1`), so the
/// all-ones pattern remains free as a gap marker.
pub(crate) fn bits_for(value: u32) -> u32 {
    debug_assert!(value > 0);
    32 - value.leading_zeros()
}

/// Allocate one K-slot permutation per segment, sized to store any row index
/// plus the gap marker (the all-ones value).
pub(crate) fn init_permutations(
    segment_count: usize,
    k: u32,
    seq_count: u32,
) -> (Vec<IntVector>, u64) {
    let width = bits_for(seq_count);
    let permutation_max = (1u64 << width) - 1;
    debug_assert!(u64::from(seq_count) <= permutation_max);
    let permutations = vec![IntVector::new(k as usize, width); segment_count];
    (permutations, permutation_max)
}

/// Emit the founder rows described by per-segment permutations of row
/// indices; the all-ones value denotes a gap.
pub(crate) fn output_in_permutation_order(
    writer: &mut dyn Write,
    matrix: &SequenceMatrix,
    cells: &[DpCell],
    permutations: &[IntVector],
    k: u32,
    permutation_max: u64,
) -> Result<()> {
    debug_assert_eq!(cells.len(), permutations.len());
    for row in 0..k as usize {
        for (permutation, cell) in permutations.iter().zip(cells) {
            let idx = permutation.get(row);
            if idx == permutation_max {
                write_gaps(writer, cell.text_length())?;
            } else {
                write_substring(writer, matrix, idx as u32, cell.lb, cell.rb)?;
            }
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_copy_number_listing(
    writer: &mut dyn Write,
    matrix: &SequenceMatrix,
    cells: &[DpCell],
    copy_numbers: &[Vec<SubstringCopyNumber>],
) -> Result<()> {
    let entries: Vec<Vec<(u32, u32)>> = copy_numbers
        .iter()
        .map(|cn| cn.iter().map(|c| (c.substring_idx, c.copy_number)).collect())
        .collect();
    write_copy_number_segments(writer, matrix, cells, &entries)
}
