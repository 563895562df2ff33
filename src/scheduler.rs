// Copyright 2019-2021 Johannes Köster.
// Licensed under the MIT license (http://opensource.org/licenses/MIT)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Task scheduling for the CPU-bound stages of the pipeline.
//!
//! Stages that fan out — advancing PBWT snapshots, counting substring copy
//! numbers, building segment texts, solving per-pair matchings — submit a
//! group of independent closures and wait for all of them at a barrier. Each
//! closure writes to its own preallocated slot, so no locking is needed; the
//! barrier provides the ordering.
//!
//! Two implementations exist: [`WorkStealing`] runs the group on a rayon
//! thread pool, [`Inline`] runs the tasks sequentially on the calling thread
//! and backs single-threaded mode.

use crate::errors::{Error, Result};

/// A unit of work submitted to a scheduler group.
pub type Task<'s> = Box<dyn FnOnce() + Send + 's>;

/// Runs groups of independent tasks to completion.
pub trait Scheduler: Sync {
    /// Run every task and return once all of them have finished.
    fn run_group<'s>(&self, tasks: Vec<Task<'s>>);
}

/// Parallel scheduler backed by a rayon thread pool.
pub struct WorkStealing {
    pool: rayon::ThreadPool,
}

impl WorkStealing {
    /// Build a pool with the given thread count, or rayon's default when
    /// `None`.
    pub fn new(num_threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|_| Error::Internal("failed to build the worker thread pool"))?;
        Ok(WorkStealing { pool })
    }
}

impl Scheduler for WorkStealing {
    fn run_group<'s>(&self, tasks: Vec<Task<'s>>) {
        self.pool.install(|| {
            rayon::scope(|scope| {
                for task in tasks {
                    scope.spawn(move |_| task());
                }
            });
        });
    }
}

/// Serial scheduler that runs every task inline, in submission order.
pub struct Inline;

impl Scheduler for Inline {
    fn run_group<'s>(&self, tasks: Vec<Task<'s>>) {
        for task in tasks {
            task();
        }
    }
}
