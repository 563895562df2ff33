// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The segmentation dynamic program.
//!
//! Columns are consumed left to right by a sampling PBWT context; the DP
//! vector is indexed by `rb - L` (the first L columns cannot end a segment)
//! and filled in four phases:
//!
//! * **A** `j < L-1`: PBWT burn-in, no cells.
//! * **B** up to `min(2L, n-L) - 1`: only one segment fits, so the cell for
//!   `[0, j+1)` is its distinct-substring count taken directly from the
//!   divergence counts.
//! * **C** up to `n - L`: for each column, candidate predecessor ranges are
//!   enumerated from the divergence value counts in ascending value order
//!   (following Ukkonen's minimisation), contracted so that both the new
//!   segment and its left neighbour retain the minimum length, and resolved
//!   with a range-minimum query over the filled prefix of the DP vector.
//! * **D**: the remaining columns are consumed and the final cell at index
//!   `n - L` is computed from the column-n divergence counts.
//!
//! The traceback then walks `lb` links right to left; the max segment size of
//! the last cell is the founder count K.

use std::collections::BTreeMap;

use tracing::debug;

use crate::alphabets::CompressedAlphabet;
use crate::data_structures::pbwt::SamplingContext;
use crate::data_structures::rmq::Rmq;
use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;
use crate::segmentation::{DpCell, Traceback};

/// Progress callback: `(columns consumed, total columns)`.
pub type Progress<'p> = &'p (dyn Fn(u64, u64) + Sync);

/// A no-op progress callback.
pub fn no_progress() -> Progress<'static> {
    &|_, _| {}
}

/// Compute the optimal segmentation of all columns with minimum segment
/// length `segment_length`, collecting PBWT snapshots every `sample_rate`
/// columns on the way.
///
/// Requires `n >= 2 * segment_length`; shorter inputs take the single-segment
/// short path in the pipeline instead.
pub fn generate_traceback(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    segment_length: u32,
    sample_rate: u32,
    progress: Progress,
) -> Result<Traceback> {
    let n = matrix.n_cols() as u32;
    let seq_count = matrix.n_rows() as u32;
    let l = segment_length;
    debug_assert!(l >= 1 && n >= 2 * l);

    let dp_size = (n - l + 1) as usize;
    let mut dp: Vec<DpCell> = vec![DpCell::default(); dp_size];
    let mut rmq = Rmq::new();

    let mut sampling = SamplingContext::new(matrix, alphabet, sample_rate);
    sampling.prepare();
    let total = u64::from(n);

    // Phase A: burn-in up to column L - 1.
    sampling.process(l - 1, |ctx| progress(u64::from(ctx.column()), total))?;

    // Phase B: one segment fits. The only divergence key that can be at or
    // below the left bound is zero, so the distinct count is N minus its
    // count.
    let limit_b = (2 * l).min(n - l) - 1;
    sampling.process(limit_b, |ctx| {
        let mut joined = 0;
        if let Some((&key, &count)) = ctx.divergence_value_counts().iter().next() {
            if key == 0 {
                joined = count;
            }
        }
        let size = seq_count - joined;
        let tb_idx = (ctx.column() - l) as usize;
        dp[tb_idx] = DpCell::new(0, ctx.column(), size, size);
        rmq.update(&dp, tb_idx);
        progress(u64::from(ctx.column()), total);
    })?;

    // Phase C: full dynamic program per column.
    let limit_c = n - l;
    sampling.process(limit_c, |ctx| {
        let text_pos = ctx.column() - 1;
        let mut min_arg = DpCell::new(0, ctx.column(), seq_count, seq_count);
        calculate_dp_arg(
            ctx.divergence_value_counts(),
            &dp,
            &rmq,
            seq_count,
            l,
            0,
            text_pos,
            &mut min_arg,
        );
        let tb_idx = (ctx.column() - l) as usize;
        dp[tb_idx] = min_arg;
        rmq.update(&dp, tb_idx);
        progress(u64::from(ctx.column()), total);
    })?;

    // Phase D: consume the tail and fill the final cell.
    sampling.process(n, |ctx| progress(u64::from(ctx.column()), total))?;
    {
        let ctx = sampling.context();
        let mut min_arg = DpCell::new(0, n, seq_count, seq_count);
        calculate_dp_arg(
            ctx.divergence_value_counts(),
            &dp,
            &rmq,
            seq_count,
            l,
            0,
            n - 1,
            &mut min_arg,
        );
        dp[dp_size - 1] = min_arg;
    }

    let cells = follow_traceback(&dp, l)?;
    let max_segment_size = cells
        .last()
        .map(|cell| cell.segment_max_size)
        .ok_or(Error::Internal("empty segmentation traceback"))?;
    debug!(
        segments = cells.len(),
        max_segment_size, "traceback complete"
    );

    Ok(Traceback {
        cells,
        samples: sampling.into_samples(),
        max_segment_size,
    })
}

/// Enumerate candidate predecessor ranges for the column `text_pos` and keep
/// the best in `min_arg`.
///
/// Walking the divergence value counts in ascending order, the running sum of
/// counts gives, for any cut point within the current key range, the number
/// of ranks joined to their predecessor on the right-hand segment; the
/// distinct count of that segment is the sequence count minus the sum. The
/// range is contracted so the right segment keeps length ≥ L (`dp_rb`) and a
/// whole segment fits on the left (`dp_lb`), then resolved by RMQ.
#[allow(clippy::too_many_arguments)]
pub(crate) fn calculate_dp_arg(
    divergence_value_counts: &BTreeMap<u32, u32>,
    dp: &[DpCell],
    rmq: &Rmq,
    seq_count: u32,
    segment_length: u32,
    lb: u32,
    text_pos: u32,
    min_arg: &mut DpCell,
) {
    let mut it = divergence_value_counts.iter();
    let (&first_key, &first_count) = it.next().expect("divergence counts cannot be empty");

    let mut joined = first_count;
    let mut dp_rb = first_key;

    // The whole range as a single segment, if some ranks share its prefix.
    if lb == dp_rb {
        let size = seq_count - joined;
        let candidate = DpCell::new(lb, 1 + text_pos, size, size);
        if candidate < *min_arg {
            *min_arg = candidate;
        }
        match it.next() {
            Some((&key, &count)) => {
                dp_rb = key;
                joined += count;
            }
            None => return,
        }
    }

    for (&key, &count) in it {
        let mut dp_lb = dp_rb;
        dp_rb = key;
        let mut dp_rb_c = dp_rb;
        debug_assert!(dp_lb < dp_rb && dp_rb <= 1 + text_pos);

        // The new segment must keep the minimum length…
        if text_pos + 2 - segment_length < dp_rb_c {
            dp_rb_c = text_pos + 2 - segment_length;
        }
        // …and one segment must fit to the left of the cut.
        let mut feasible = true;
        if dp_lb < lb + segment_length {
            if lb + segment_length < dp_rb_c {
                dp_lb = lb + segment_length;
            } else {
                feasible = false;
            }
        }

        if feasible && dp_lb < dp_rb_c {
            let lo = (dp_lb - segment_length) as usize;
            let hi = (dp_rb_c - segment_length) as usize;
            let idx = rmq.query(dp, lo, hi);
            let lhs = dp[idx].segment_max_size;
            let rhs = seq_count - joined;
            let candidate = DpCell::new(
                idx as u32 + segment_length,
                1 + text_pos,
                lhs.max(rhs),
                rhs,
            );
            if candidate < *min_arg {
                *min_arg = candidate;
            }
        }

        joined += count;
    }
}

fn follow_traceback(dp: &[DpCell], segment_length: u32) -> Result<Vec<DpCell>> {
    let mut cells = Vec::new();
    let mut idx = dp.len() - 1;
    loop {
        let cell = dp[idx];
        if cell.segment_max_size == u32::MAX {
            return Err(Error::Internal("traceback reached an unfilled DP cell"));
        }
        cells.push(cell);
        if cell.lb == 0 {
            break;
        }
        debug_assert!(segment_length <= cell.lb);
        idx = (cell.lb - segment_length) as usize;
    }
    cells.reverse();
    Ok(cells)
}
