// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Advancing PBWT snapshots to the traceback cut positions.
//!
//! The DP collects snapshots on a fixed column cadence, which rarely lines up
//! with the chosen cuts. This stage partitions the cut positions among the
//! snapshots preceding them and replays each snapshot forward, emitting one
//! snapshot per cut. The replay tasks share nothing mutable, so they run as
//! one scheduler group.

use crate::alphabets::CompressedAlphabet;
use crate::data_structures::pbwt::{PbwtContext, PbwtSample};
use crate::errors::{Error, Result};
use crate::matrix::SequenceMatrix;
use crate::scheduler::{Scheduler, Task};
use crate::segmentation::DpCell;

struct UpdateTask {
    base: PbwtSample,
    right_bounds: Vec<u32>,
}

/// Produce one PBWT snapshot per traceback cell, taken at the cell's right
/// bound, by replaying the nearest preceding snapshots.
pub fn update_samples_to_traceback_positions(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    traceback: &[DpCell],
    samples: Vec<PbwtSample>,
    scheduler: &dyn Scheduler,
) -> Result<Vec<PbwtSample>> {
    debug_assert!(!samples.is_empty(), "the initial snapshot always exists");

    // Partition the cut positions: cells whose right bound lies before the
    // next snapshot are replayed from the previous one.
    let mut slots: Vec<Option<PbwtSample>> = samples.into_iter().map(Some).collect();
    let mut batches: Vec<UpdateTask> = Vec::new();
    let mut cells = traceback.iter().peekable();
    let mut right_bounds: Vec<u32> = Vec::new();

    let mut i = 1;
    while i < slots.len() {
        if cells.peek().is_none() {
            break;
        }
        let next_rb = slots[i].as_ref().expect("unconsumed snapshot").rb();
        while let Some(cell) = cells.peek() {
            if cell.rb < next_rb {
                right_bounds.push(cell.rb);
                cells.next();
            } else {
                break;
            }
        }
        if !right_bounds.is_empty() {
            let base = slots[i - 1].take().expect("snapshot moved twice");
            batches.push(UpdateTask {
                base,
                right_bounds: std::mem::take(&mut right_bounds),
            });
        }
        i += 1;
    }

    // Cut positions at or past the last snapshot.
    right_bounds.extend(cells.map(|cell| cell.rb));
    if !right_bounds.is_empty() {
        let base = slots[i - 1].take().expect("snapshot moved twice");
        batches.push(UpdateTask { base, right_bounds });
    }

    // Replay each base snapshot through its right bounds.
    let mut results: Vec<Result<Vec<PbwtSample>>> =
        (0..batches.len()).map(|_| Ok(Vec::new())).collect();
    {
        let tasks: Vec<Task> = batches
            .into_iter()
            .zip(results.iter_mut())
            .map(|(batch, slot)| {
                let task: Task = Box::new(move || {
                    *slot = run_update_task(matrix, alphabet, batch);
                });
                task
            })
            .collect();
        scheduler.run_group(tasks);
    }

    let mut updated = Vec::with_capacity(traceback.len());
    for result in results {
        updated.extend(result?);
    }
    if updated.len() != traceback.len() {
        return Err(Error::Internal(
            "sample update produced a snapshot count mismatch",
        ));
    }
    Ok(updated)
}

fn run_update_task(
    matrix: &SequenceMatrix,
    alphabet: &CompressedAlphabet,
    batch: UpdateTask,
) -> Result<Vec<PbwtSample>> {
    let mut ctx = PbwtContext::from_sample(matrix, alphabet, &batch.base);
    ctx.set_maintains_divergence_value_counts(false);
    let mut out = Vec::with_capacity(batch.right_bounds.len());
    for rb in batch.right_bounds {
        while ctx.column() < rb {
            ctx.step()?;
        }
        out.push(ctx.sample());
    }
    Ok(out)
}
