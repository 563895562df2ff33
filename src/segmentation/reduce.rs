// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Greedy second-pass reduction of the DP segmentation.
//!
//! The DP minimises the maximum segment size but tends to cut more often than
//! necessary. Walking the cuts left to right with a running left bound, a cut
//! is dropped whenever the merged run up to the next cut still stays within
//! the founder bound K; its snapshot measures the merged distinct count
//! directly. Fewer segments mean fewer recombination points in the founders.

use tracing::debug;

use crate::data_structures::pbwt::PbwtSample;
use crate::segmentation::{DpCell, ReducedSegmentation};

/// Merge neighbouring DP segments while the merged distinct-substring count
/// stays within `max_segment_size`.
///
/// `samples[i]` must be the PBWT snapshot at `traceback[i].rb`.
pub fn find_segments_greedy(
    traceback: &[DpCell],
    samples: Vec<PbwtSample>,
    max_segment_size: u32,
) -> ReducedSegmentation {
    debug_assert_eq!(traceback.len(), samples.len());

    let mut reduced_cells: Vec<DpCell> = Vec::new();
    let mut reduced_samples: Vec<PbwtSample> = Vec::new();

    let mut iter = samples.into_iter().zip(traceback.iter());
    let (mut prev_sample, first_cell) = iter.next().expect("traceback cannot be empty");
    let mut current_lb = first_cell.lb;
    let mut prev_size = first_cell.segment_size;

    for (sample, cell) in iter {
        debug_assert_eq!(sample.rb(), cell.rb);

        let merged_size = sample.unique_substring_count_lhs(current_lb);
        if merged_size <= max_segment_size {
            prev_size = merged_size;
        } else {
            reduced_cells.push(DpCell::new(current_lb, prev_sample.rb(), prev_size, prev_size));
            prev_size = cell.segment_size;
            current_lb = prev_sample.rb();
            reduced_samples.push(prev_sample);
        }

        prev_sample = sample;
    }

    reduced_cells.push(DpCell::new(current_lb, prev_sample.rb(), prev_size, prev_size));
    reduced_samples.push(prev_sample);

    debug!(
        segments = reduced_cells.len(),
        from = traceback.len(),
        "greedy segment reduction done"
    );

    ReducedSegmentation {
        cells: reduced_cells,
        samples: reduced_samples,
        max_segment_size,
    }
}
