// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Greedy joining: adjacent segments are paired substring-by-substring in
//! descending co-occurrence order.
//!
//! For a segment pair, every input row pairs the founder slot of its
//! left-hand substring with the rank ordinal of its right-hand substring;
//! both are read off by walking the two PBWT permutations in lock step
//! through the cumulative copy-number lists. The row pairs are radix-sorted,
//! duplicates counted, and the resulting edges taken greedily from the most
//! frequent down, each consuming one slot on both sides. Slots left over —
//! including the virtual slots standing in for gap rows — are matched by a
//! final linear scan.
//!
//! The output permutation of the right segment is composed from the left one
//! through the matching, so founder rows extend continuously from left to
//! right.

use crate::data_structures::int_vector::IntVector;
use crate::data_structures::pbwt::PbwtSample;
use crate::errors::{Error, Result};
use crate::io::write::SegmentListingEntry;

use super::{bits_for, init_permutations, SubstringCopyNumber};

/// A left-slot/right-ordinal pair with its occurrence count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IndexPair {
    lhs_idx: u32,
    rhs_idx: u32,
    count: u32,
}

/// Compute the founder permutations for all segments.
///
/// `copy_numbers` must hold the unpadded, cumulative class sizes (summing to
/// the row count N) and `samples` the PBWT snapshots at the segment right
/// bounds, both in segment order.
pub fn match_segments(
    copy_numbers: &[Vec<SubstringCopyNumber>],
    samples: &[PbwtSample],
    k: u32,
    seq_count: u32,
) -> Result<(Vec<IntVector>, u64)> {
    debug_assert_eq!(copy_numbers.len(), samples.len());
    let (mut permutations, permutation_max) =
        init_permutations(copy_numbers.len(), k, seq_count);
    let permutation_width = permutations[0].width();

    let matching_width = bits_for(k);
    let matching_max = (1u64 << matching_width) - 1;

    // The first permutation lists the classes in rank order, gap slots after.
    {
        let cn_vec = &copy_numbers[0];
        let permutation = &mut permutations[0];
        for (i, cn) in cn_vec.iter().enumerate() {
            permutation.set(i, u64::from(cn.substring_idx));
        }
        for i in cn_vec.len()..k as usize {
            permutation.set(i, permutation_max);
        }
    }

    let mut lhs_matching = IntVector::with_fill(k as usize, matching_width, matching_max);
    // Founder slots of the left segment's classes; starts as the identity.
    let mut rhs_matching = IntVector::new(k as usize, matching_width);
    for i in 0..k as usize {
        rhs_matching.set(i, i as u64);
    }

    let mut to_lhs_substring = IntVector::new(seq_count as usize, matching_width);
    let mut to_rhs_string = IntVector::new(k as usize, permutation_width);
    let mut index_pairs: Vec<IndexPair> = Vec::new();
    let mut buffer: Vec<IndexPair> = Vec::new();
    let mut lhs_unused: Vec<u32> = Vec::new();

    for s in 0..copy_numbers.len().saturating_sub(1) {
        let (lhs_count, _rhs_count) = create_index_pairs(
            &copy_numbers[s],
            &copy_numbers[s + 1],
            &samples[s],
            &samples[s + 1],
            &rhs_matching,
            k,
            seq_count,
            permutation_max,
            &mut index_pairs,
            &mut buffer,
            &mut lhs_unused,
            &mut to_lhs_substring,
            &mut to_rhs_string,
        )?;
        debug_assert_eq!(k as usize - lhs_count, lhs_unused.len());

        create_matching(&index_pairs, matching_max, &mut lhs_matching, &mut rhs_matching, k);

        // Compose the next permutation through the matching.
        let (left, right) = permutations.split_at_mut(s + 1);
        let lhs_permutation = &left[s];
        let rhs_permutation = &mut right[0];
        let mut unused = lhs_unused.iter();
        for row in 0..k as usize {
            let lhs_string = lhs_permutation.get(row);
            let lhs_slot = if lhs_string == permutation_max {
                // Gap rows continue through the still-unmatched slots, in an
                // arbitrary but fixed order.
                u64::from(*unused.next().ok_or(Error::Internal(
                    "gap founder rows outnumber the unused matching slots",
                ))?)
            } else {
                to_lhs_substring.get(lhs_string as usize)
            };
            let rhs_ordinal = lhs_matching.get(lhs_slot as usize);
            let rhs_string = to_rhs_string.get(rhs_ordinal as usize);
            rhs_permutation.set(row, rhs_string);
        }
    }

    Ok((permutations, permutation_max))
}

/// Walk the two permutations in lock step and fill, for every input row, the
/// pair of its left founder slot and its right class ordinal. Also records
/// the row → slot and ordinal → representative-row translations needed for
/// composing the output permutation, and the founder slots left without a
/// left-hand class.
///
/// Returns the class counts of both sides.
#[allow(clippy::too_many_arguments)]
fn create_index_pairs(
    lhs_cn: &[SubstringCopyNumber],
    rhs_cn: &[SubstringCopyNumber],
    lhs_sample: &PbwtSample,
    rhs_sample: &PbwtSample,
    rhs_matching: &IntVector,
    k: u32,
    seq_count: u32,
    permutation_max: u64,
    index_pairs: &mut Vec<IndexPair>,
    buffer: &mut Vec<IndexPair>,
    lhs_unused: &mut Vec<u32>,
    to_lhs_substring: &mut IntVector,
    to_rhs_string: &mut IntVector,
) -> Result<(usize, usize)> {
    debug_assert!(!lhs_cn.is_empty() && !rhs_cn.is_empty());
    index_pairs.clear();
    index_pairs.resize(seq_count as usize, IndexPair::default());

    let lhs_permutation = lhs_sample.permutation();
    let rhs_permutation = rhs_sample.permutation();

    let mut position = 0usize;
    let mut lhs_ordinal = 0usize;
    let mut rhs_ordinal = 0usize;
    // Left class ordinals translate to founder slots via the previous
    // iteration's matching.
    let mut lhs_slot = rhs_matching.get(0) as u32;

    loop {
        let lhs_cum = lhs_cn[lhs_ordinal].copy_number;
        let rhs_cum = rhs_cn[rhs_ordinal].copy_number;
        let limit = lhs_cum.min(rhs_cum) as usize;

        while position < limit {
            let lhs_string = lhs_permutation[position];
            let rhs_string = rhs_permutation[position];
            position += 1;

            index_pairs[lhs_string as usize].lhs_idx = lhs_slot;
            index_pairs[rhs_string as usize].rhs_idx = rhs_ordinal as u32;
            to_lhs_substring.set(lhs_string as usize, u64::from(lhs_slot));
            to_rhs_string.set(rhs_ordinal, u64::from(rhs_string));
        }

        if position == seq_count as usize {
            break;
        }
        if position == lhs_cum as usize {
            lhs_ordinal += 1;
            lhs_slot = rhs_matching.get(lhs_ordinal) as u32;
        }
        if position == rhs_cum as usize {
            rhs_ordinal += 1;
        }
    }

    let lhs_count = lhs_ordinal + 1;
    let rhs_count = rhs_ordinal + 1;
    if lhs_count != lhs_cn.len() || rhs_count != rhs_cn.len() {
        return Err(Error::Internal("copy number walk left classes unvisited"));
    }

    // Ordinals past the right class count stand for gap rows.
    for ordinal in rhs_count..k as usize {
        to_rhs_string.set(ordinal, permutation_max);
    }

    // Founder slots without a left class, to be consumed by gap rows.
    lhs_unused.clear();
    lhs_unused.extend((lhs_count..k as usize).map(|ordinal| rhs_matching.get(ordinal) as u32));

    for pair in index_pairs.iter_mut() {
        pair.count = 1;
    }

    // Stable LSD sorts give (lhs, rhs) order, then duplicates collapse into
    // counts and a descending count order drives the greedy edge selection.
    radix_sort_by_key(index_pairs, buffer, |p| p.rhs_idx);
    radix_sort_by_key(index_pairs, buffer, |p| p.lhs_idx);
    unique_count(index_pairs, buffer);
    std::mem::swap(index_pairs, buffer);
    radix_sort_by_key(index_pairs, buffer, |p| !p.count);

    Ok((lhs_count, rhs_count))
}

/// Greedily assign edges in the prepared descending-count order, then match
/// whatever is left by a linear scan over both sides.
fn create_matching(
    index_pairs: &[IndexPair],
    matching_max: u64,
    lhs_matching: &mut IntVector,
    rhs_matching: &mut IntVector,
    k: u32,
) {
    lhs_matching.fill_range(0, k as usize, matching_max);
    rhs_matching.fill_range(0, k as usize, matching_max);

    for pair in index_pairs {
        if lhs_matching.get(pair.lhs_idx as usize) == matching_max
            && rhs_matching.get(pair.rhs_idx as usize) == matching_max
        {
            lhs_matching.set(pair.lhs_idx as usize, u64::from(pair.rhs_idx));
            rhs_matching.set(pair.rhs_idx as usize, u64::from(pair.lhs_idx));
        }
    }

    let mut lhs_idx = 0usize;
    let mut rhs_idx = 0usize;
    loop {
        while lhs_idx < k as usize && lhs_matching.get(lhs_idx) != matching_max {
            lhs_idx += 1;
        }
        while rhs_idx < k as usize && rhs_matching.get(rhs_idx) != matching_max {
            rhs_idx += 1;
        }
        if lhs_idx == k as usize || rhs_idx == k as usize {
            debug_assert_eq!(lhs_idx, rhs_idx);
            break;
        }
        lhs_matching.set(lhs_idx, rhs_idx as u64);
        rhs_matching.set(rhs_idx, lhs_idx as u64);
    }
}

/// Stable least-significant-digit radix sort by a 32-bit key, 8 bits per
/// pass; passes covering only zero bits are skipped.
fn radix_sort_by_key<F>(pairs: &mut Vec<IndexPair>, buffer: &mut Vec<IndexPair>, key: F)
where
    F: Fn(&IndexPair) -> u32,
{
    let max_key = pairs.iter().map(&key).max().unwrap_or(0);
    let passes = if max_key == 0 {
        1
    } else {
        ((bits_for(max_key) + 7) / 8) as usize
    };

    for pass in 0..passes {
        let shift = pass * 8;
        let mut counts = [0usize; 256];
        for pair in pairs.iter() {
            counts[((key(pair) >> shift) & 0xff) as usize] += 1;
        }
        let mut offsets = [0usize; 256];
        let mut sum = 0;
        for (offset, &count) in offsets.iter_mut().zip(counts.iter()) {
            *offset = sum;
            sum += count;
        }
        buffer.clear();
        buffer.resize(pairs.len(), IndexPair::default());
        for pair in pairs.iter() {
            let digit = ((key(pair) >> shift) & 0xff) as usize;
            buffer[offsets[digit]] = *pair;
            offsets[digit] += 1;
        }
        std::mem::swap(pairs, buffer);
    }
}

/// Collapse runs of equal `(lhs, rhs)` pairs into one entry accumulating the
/// counts. Input must be sorted by the pair.
fn unique_count(pairs: &[IndexPair], out: &mut Vec<IndexPair>) {
    out.clear();
    for pair in pairs {
        match out.last_mut() {
            Some(last) if last.lhs_idx == pair.lhs_idx && last.rhs_idx == pair.rhs_idx => {
                last.count += pair.count;
            }
            _ => out.push(*pair),
        }
    }
}

/// Segment listing entries for greedy joining: one line per class with its
/// carried rows; greedy joining never copies substrings.
pub fn segment_listings(
    copy_numbers: &[Vec<SubstringCopyNumber>],
    samples: &[PbwtSample],
) -> Vec<Vec<SegmentListingEntry>> {
    copy_numbers
        .iter()
        .zip(samples)
        .map(|(cn_vec, sample)| {
            let permutation = sample.permutation();
            let mut start = 0usize;
            cn_vec
                .iter()
                .map(|cn| {
                    let end = cn.copy_number as usize;
                    let mut rows: Vec<u32> = permutation[start..end].to_vec();
                    rows.sort_unstable();
                    start = end;
                    SegmentListingEntry {
                        text_row: cn.substring_idx,
                        rows,
                        copied_from: None,
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabets::{CompressedAlphabet, CompressedAlphabetBuilder};
    use crate::matrix::SequenceMatrix;
    use crate::scheduler::Inline;
    use crate::segmentation::dp::{generate_traceback, no_progress};
    use crate::segmentation::reduce::find_segments_greedy;
    use crate::segmentation::update::update_samples_to_traceback_positions;
    use crate::segmentation::ReducedSegmentation;

    fn pairs(raw: &[(u32, u32, u32)]) -> Vec<IndexPair> {
        raw.iter()
            .map(|&(lhs_idx, rhs_idx, count)| IndexPair {
                lhs_idx,
                rhs_idx,
                count,
            })
            .collect()
    }

    #[test]
    fn test_radix_sort_is_stable() {
        let mut input = pairs(&[(2, 9, 0), (1, 7, 1), (2, 3, 2), (1, 2, 3), (0, 5, 4)]);
        let mut buffer = Vec::new();
        radix_sort_by_key(&mut input, &mut buffer, |p| p.lhs_idx);
        // Equal keys keep their original relative order (tracked via count).
        let keys: Vec<u32> = input.iter().map(|p| p.lhs_idx).collect();
        assert_eq!(keys, [0, 1, 1, 2, 2]);
        assert_eq!(input[1].count, 1);
        assert_eq!(input[2].count, 3);
        assert_eq!(input[3].count, 0);
        assert_eq!(input[4].count, 2);
    }

    #[test]
    fn test_radix_sort_large_keys() {
        let mut input = pairs(&[(0, 0, 70_000), (0, 0, 5), (0, 0, 66_000)]);
        let mut buffer = Vec::new();
        radix_sort_by_key(&mut input, &mut buffer, |p| p.count);
        let counts: Vec<u32> = input.iter().map(|p| p.count).collect();
        assert_eq!(counts, [5, 66_000, 70_000]);
        // Complemented keys give a stable descending order.
        radix_sort_by_key(&mut input, &mut buffer, |p| !p.count);
        let counts: Vec<u32> = input.iter().map(|p| p.count).collect();
        assert_eq!(counts, [70_000, 66_000, 5]);
    }

    #[test]
    fn test_unique_count() {
        let input = pairs(&[(0, 1, 1), (0, 1, 1), (0, 2, 1), (1, 0, 1), (1, 0, 1)]);
        let mut out = Vec::new();
        unique_count(&input, &mut out);
        assert_eq!(out, pairs(&[(0, 1, 2), (0, 2, 1), (1, 0, 2)]));
    }

    #[test]
    fn test_create_matching_prefers_frequent_pairs() {
        let mut lhs = IntVector::new(3, 2);
        let mut rhs = IntVector::new(3, 2);
        // Descending count order: (0→1) beats the rest; (1→1) is blocked.
        let input = pairs(&[(0, 1, 5), (1, 1, 3), (2, 0, 2)]);
        create_matching(&input, 3, &mut lhs, &mut rhs, 3);
        assert_eq!(lhs.get(0), 1);
        assert_eq!(lhs.get(2), 0);
        // The leftover slot pairs by linear scan.
        assert_eq!(lhs.get(1), 2);
        for i in 0..3 {
            assert_eq!(rhs.get(lhs.get(i) as usize), i as u64);
        }
    }

    fn build(rows: Vec<Vec<u8>>) -> (SequenceMatrix, CompressedAlphabet) {
        let matrix = SequenceMatrix::new(rows).unwrap();
        let mut builder = CompressedAlphabetBuilder::new();
        for row in matrix.rows() {
            builder.prepare(row);
        }
        let alphabet = builder.build();
        (matrix, alphabet)
    }

    fn reduce(matrix: &SequenceMatrix, alphabet: &CompressedAlphabet, l: u32) -> ReducedSegmentation {
        let tb = generate_traceback(matrix, alphabet, l, 0, no_progress()).unwrap();
        let updated = update_samples_to_traceback_positions(
            matrix,
            alphabet,
            &tb.cells,
            tb.samples,
            &Inline,
        )
        .unwrap();
        find_segments_greedy(&tb.cells, updated, tb.max_segment_size)
    }

    #[test]
    fn test_permutations_are_row_permutations_per_segment() {
        let (matrix, alphabet) = build(vec![
            b"ACGTAC".to_vec(),
            b"AGGTAC".to_vec(),
            b"ACCTGC".to_vec(),
            b"AGGTGC".to_vec(),
        ]);
        let reduced = reduce(&matrix, &alphabet, 2);
        let copy_numbers = crate::join::prepare_copy_numbers(
            &reduced,
            crate::join::SegmentJoining::Greedy,
            &Inline,
        );
        let (permutations, permutation_max) = match_segments(
            &copy_numbers,
            &reduced.samples,
            reduced.max_segment_size,
            matrix.n_rows() as u32,
        )
        .unwrap();

        for (permutation, cn_vec) in permutations.iter().zip(&copy_numbers) {
            let mut non_gap: Vec<u64> = permutation
                .iter()
                .filter(|&v| v != permutation_max)
                .collect();
            non_gap.sort_unstable();
            non_gap.dedup();
            // One distinct representative row per class, no double use.
            assert_eq!(non_gap.len(), cn_vec.len());
        }
    }
}
