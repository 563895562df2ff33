// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Bipartite joining: between every pair of adjacent segments, pair the K
//! substring slots by an exact minimum-cost perfect matching over the sets of
//! input rows each substring carries.
//!
//! Segments with fewer than K distinct substrings are padded with copies of
//! their substrings, largest first and in proportion to the row counts; a
//! copy scores like its source. Pair matchings are independent and solved as
//! one scheduler group; composing the per-row permutations is a single serial
//! pass chasing matched slot indices from left to right.

use std::io::Write;

use crate::data_structures::pbwt::PbwtSample;
use crate::errors::{Error, Result};
use crate::io::write::{write_matcher_segments, SegmentListingEntry};
use crate::matrix::SequenceMatrix;
use crate::scheduler::{Scheduler, Task};
use crate::segmentation::ReducedSegmentation;

use super::assignment::minimum_cost_assignment;
use super::{init_permutations, output_in_permutation_order, BipartiteSetScoring, SubstringCopyNumber};

/// One substring slot of a segment: the ascending input rows carrying the
/// substring, or a padding copy referring back to its source slot.
#[derive(Debug, Clone, Default)]
pub struct SegmentText {
    pub sequence_indices: Vec<u32>,
    pub copied_from: Option<u32>,
}

impl SegmentText {
    pub fn is_copied(&self) -> bool {
        self.copied_from.is_some()
    }

    /// Resolve a slot index to the slot holding the actual rows.
    pub fn source_slot(&self, own_slot: usize) -> usize {
        match self.copied_from {
            Some(src) => src as usize,
            None => own_slot,
        }
    }

    pub fn first_sequence_index(&self) -> u32 {
        self.sequence_indices[0]
    }

    pub fn sequence_count(&self) -> usize {
        self.sequence_indices.len()
    }
}

/// Build the K substring slots of one segment from its cumulative copy
/// numbers and the PBWT snapshot at its right bound.
pub fn create_segment_texts(
    copy_numbers: &[SubstringCopyNumber],
    sample: &PbwtSample,
    k: u32,
    seq_count: u32,
) -> Vec<SegmentText> {
    let permutation = sample.permutation();
    let mut texts: Vec<SegmentText> = Vec::with_capacity(k as usize);

    let mut start = 0usize;
    for cn in copy_numbers {
        // Copy numbers are running sums over the N permutation positions.
        let end = cn.copy_number as usize;
        let mut rows: Vec<u32> = permutation[start..end].to_vec();
        rows.sort_unstable();
        texts.push(SegmentText {
            sequence_indices: rows,
            copied_from: None,
        });
        start = end;
    }
    debug_assert_eq!(start, seq_count as usize);

    let class_count = texts.len();
    if class_count < k as usize {
        // Largest classes first, then pad with copies in proportion to their
        // row counts until all K slots are filled.
        texts.sort_by_key(|t| std::cmp::Reverse(t.sequence_count()));
        let mut remaining = k as usize - class_count;
        let mut copies: Vec<SegmentText> = Vec::with_capacity(remaining);
        for i in 0..class_count {
            let share = (texts[i].sequence_count() as f64 / f64::from(seq_count)
                * remaining as f64)
                .ceil() as usize;
            let count = remaining.min(share);
            for _ in 0..count {
                copies.push(SegmentText {
                    sequence_indices: Vec::new(),
                    copied_from: Some(i as u32),
                });
            }
            remaining -= count;
            if remaining == 0 {
                break;
            }
        }
        'outer: while remaining > 0 {
            for i in 0..class_count {
                copies.push(SegmentText {
                    sequence_indices: Vec::new(),
                    copied_from: Some(i as u32),
                });
                remaining -= 1;
                if remaining == 0 {
                    break 'outer;
                }
            }
        }
        texts.extend(copies);
    }

    debug_assert_eq!(texts.len(), k as usize);
    texts
}

/// Match the K slots of two adjacent segments, returning for each left slot
/// the matched right slot.
pub fn merge_pair(
    lhs: &[SegmentText],
    rhs: &[SegmentText],
    scoring: BipartiteSetScoring,
) -> Vec<u32> {
    let k = lhs.len();
    debug_assert_eq!(k, rhs.len());
    let mut cost = vec![0i64; k * k];

    for (i, l) in lhs.iter().enumerate() {
        for (j, r) in rhs.iter().enumerate() {
            if !(l.is_copied() || r.is_copied()) {
                cost[i * k + j] = edge_cost(&l.sequence_indices, &r.sequence_indices, scoring);
            }
        }
    }
    // Copies inherit the cost of their source slots.
    for (i, l) in lhs.iter().enumerate() {
        for (j, r) in rhs.iter().enumerate() {
            if l.is_copied() || r.is_copied() {
                cost[i * k + j] = cost[l.source_slot(i) * k + r.source_slot(j)];
            }
        }
    }

    minimum_cost_assignment(&cost, k)
}

fn edge_cost(lhs: &[u32], rhs: &[u32], scoring: BipartiteSetScoring) -> i64 {
    match scoring {
        BipartiteSetScoring::SymmetricDifference => symmetric_difference_size(lhs, rhs) as i64,
        BipartiteSetScoring::Intersection => -(intersection_size(lhs, rhs) as i64),
    }
}

fn intersection_size(lhs: &[u32], rhs: &[u32]) -> usize {
    let mut count = 0;
    let (mut i, mut j) = (0, 0);
    while i < lhs.len() && j < rhs.len() {
        if lhs[i] < rhs[j] {
            i += 1;
        } else if rhs[j] < lhs[i] {
            j += 1;
        } else {
            count += 1;
            i += 1;
            j += 1;
        }
    }
    count
}

fn symmetric_difference_size(lhs: &[u32], rhs: &[u32]) -> usize {
    lhs.len() + rhs.len() - 2 * intersection_size(lhs, rhs)
}

/// Run the full bipartite join: build slots, match adjacent pairs, compose
/// the output permutations and write the founders.
pub fn join_and_output(
    matrix: &SequenceMatrix,
    reduced: &ReducedSegmentation,
    copy_numbers: &[Vec<SubstringCopyNumber>],
    scoring: BipartiteSetScoring,
    scheduler: &dyn Scheduler,
    founders: &mut dyn Write,
    segments: Option<&mut dyn Write>,
) -> Result<()> {
    let k = reduced.max_segment_size;
    let seq_count = matrix.n_rows() as u32;
    let segment_count = reduced.cells.len();

    // Build the slot lists of all segments concurrently.
    let mut texts: Vec<Vec<SegmentText>> = (0..segment_count).map(|_| Vec::new()).collect();
    {
        let tasks: Vec<Task> = copy_numbers
            .iter()
            .zip(&reduced.samples)
            .zip(texts.iter_mut())
            .map(|((cn, sample), slot)| {
                let task: Task = Box::new(move || {
                    *slot = create_segment_texts(cn, sample, k, seq_count);
                });
                task
            })
            .collect();
        scheduler.run_group(tasks);
    }

    // Match adjacent pairs concurrently; each task owns one matching slot.
    let mut matchings: Vec<Vec<u32>> = (0..segment_count.saturating_sub(1))
        .map(|_| Vec::new())
        .collect();
    {
        let texts_ref = &texts;
        let tasks: Vec<Task> = matchings
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| {
                let task: Task = Box::new(move || {
                    *slot = merge_pair(&texts_ref[i], &texts_ref[i + 1], scoring);
                });
                task
            })
            .collect();
        scheduler.run_group(tasks);
    }

    // Compose the per-row permutations serially, chasing matched slots.
    let (mut permutations, permutation_max) = init_permutations(segment_count, k, seq_count);
    let mut slot_of_row: Vec<u32> = (0..k).collect();
    for (row, slot) in slot_of_row.iter().enumerate() {
        let text = &texts[0][*slot as usize];
        let source = &texts[0][text.source_slot(*slot as usize)];
        permutations[0].set(row, u64::from(source.first_sequence_index()));
    }
    for s in 1..segment_count {
        let matching = &matchings[s - 1];
        for row in 0..k as usize {
            let matched = matching[slot_of_row[row] as usize];
            let text = &texts[s][matched as usize];
            let source = &texts[s][text.source_slot(matched as usize)];
            if source.is_copied() {
                return Err(Error::Internal("copied segment text points at a copy"));
            }
            permutations[s].set(row, u64::from(source.first_sequence_index()));
            slot_of_row[row] = matched;
        }
    }

    output_in_permutation_order(founders, matrix, &reduced.cells, &permutations, k, permutation_max)?;

    if let Some(writer) = segments {
        let listings: Vec<Vec<SegmentListingEntry>> = texts
            .iter()
            .map(|segment| {
                segment
                    .iter()
                    .enumerate()
                    .map(|(slot, text)| SegmentListingEntry {
                        text_row: segment[text.source_slot(slot)].first_sequence_index(),
                        rows: text.sequence_indices.clone(),
                        copied_from: text.copied_from,
                    })
                    .collect()
            })
            .collect();
        write_matcher_segments(writer, matrix, &reduced.cells, &listings)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(rows: &[u32]) -> SegmentText {
        SegmentText {
            sequence_indices: rows.to_vec(),
            copied_from: None,
        }
    }

    fn cumulative(entries: &[(u32, u32)]) -> Vec<SubstringCopyNumber> {
        let mut sum = 0;
        entries
            .iter()
            .enumerate()
            .map(|(i, &(row, size))| {
                sum += size;
                SubstringCopyNumber {
                    substring_idx: row,
                    copy_number: sum,
                    string_idx: i as u32,
                }
            })
            .collect()
    }

    #[test]
    fn test_set_sizes() {
        assert_eq!(intersection_size(&[0, 2, 4], &[1, 2, 4, 7]), 2);
        assert_eq!(symmetric_difference_size(&[0, 2, 4], &[1, 2, 4, 7]), 3);
        assert_eq!(symmetric_difference_size(&[], &[1, 2]), 2);
    }

    #[test]
    fn test_matching_follows_shared_rows() {
        // Slot row sets mostly carry over; the matching should keep them.
        let lhs = vec![text(&[0, 1]), text(&[2, 3]), text(&[4])];
        let rhs = vec![text(&[2, 3]), text(&[4]), text(&[0, 1])];
        let matching = merge_pair(&lhs, &rhs, BipartiteSetScoring::SymmetricDifference);
        assert_eq!(matching, vec![2, 0, 1]);
        let matching = merge_pair(&lhs, &rhs, BipartiteSetScoring::Intersection);
        assert_eq!(matching, vec![2, 0, 1]);
    }

    #[test]
    fn test_copies_inherit_costs() {
        let mut lhs = vec![text(&[0, 1, 2]), text(&[3])];
        lhs.push(SegmentText {
            sequence_indices: Vec::new(),
            copied_from: Some(0),
        });
        let rhs = vec![text(&[0, 1]), text(&[2]), text(&[3])];
        let matching = merge_pair(&lhs, &rhs, BipartiteSetScoring::SymmetricDifference);
        // A perfect matching either way; the copy of {0,1,2} must take one of
        // the slots its source scores best against.
        let mut seen = vec![false; 3];
        for &m in &matching {
            assert!(!seen[m as usize]);
            seen[m as usize] = true;
        }
        // Slot 1 = {3} pairs with rhs slot 2 = {3} (cost 0).
        assert_eq!(matching[1], 2);
    }

    #[test]
    fn test_segment_texts_padding() {
        // Two classes over six rows, K = 4: two padding copies are added.
        let matrix_rows = 6u32;
        let perm: Vec<u32> = vec![0, 2, 4, 1, 3, 5];
        let sample = sample_with_permutation(&perm);
        let cn = cumulative(&[(0, 3), (1, 3)]);
        let texts = create_segment_texts(&cn, &sample, 4, matrix_rows);
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0].sequence_indices, vec![0, 2, 4]);
        assert_eq!(texts[1].sequence_indices, vec![1, 3, 5]);
        assert!(texts[2].is_copied() && texts[3].is_copied());
        let total_copies = texts.iter().filter(|t| t.is_copied()).count();
        assert_eq!(total_copies, 2);
    }

    // Build a snapshot with a chosen permutation through the public PBWT API.
    fn sample_with_permutation(perm: &[u32]) -> PbwtSample {
        use crate::alphabets::CompressedAlphabetBuilder;
        use crate::data_structures::pbwt::PbwtContext;

        // One column whose values sort the rows into the desired order.
        let n = perm.len();
        let mut rows = vec![Vec::new(); n];
        for (rank, &row) in perm.iter().enumerate() {
            rows[row as usize] = vec![b'a' + rank as u8];
        }
        let matrix = SequenceMatrix::new(rows).unwrap();
        let mut builder = CompressedAlphabetBuilder::new();
        for row in matrix.rows() {
            builder.prepare(row);
        }
        let alphabet = builder.build();
        let mut ctx = PbwtContext::new(&matrix, &alphabet);
        ctx.prepare();
        ctx.step().unwrap();
        assert_eq!(ctx.permutation(), perm);
        ctx.sample()
    }
}
