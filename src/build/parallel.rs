//! Parallel unit execution.
//!
//! Export and injection units are independent, so they run on a fixed set of
//! scoped worker threads that pull the next unit index off a shared counter.
//! Results come back in input order regardless of completion order.
//!
//! # Example
//!
//! ```ignore
//! use aseforge::build::WorkerPool;
//!
//! let lengths = WorkerPool::new(4).run(&paths, |p| std::fs::metadata(p).map(|m| m.len()));
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Fixed-size pool of scoped worker threads.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    jobs: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self { jobs: default_jobs() }
    }
}

impl WorkerPool {
    /// Create a pool with `jobs` workers (at least one).
    pub fn new(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Apply `work` to every unit and return the results in input order.
    pub fn run<T, R, F>(&self, units: &[T], work: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        if units.is_empty() {
            return Vec::new();
        }

        // For single-threaded or single-unit batches, just execute sequentially
        if self.jobs == 1 || units.len() == 1 {
            return units.iter().map(&work).collect();
        }

        let results = Arc::new(Mutex::new(Vec::with_capacity(units.len())));
        let next_idx = AtomicUsize::new(0);
        let work = &work;

        std::thread::scope(|s| {
            let num_workers = self.jobs.min(units.len());

            for _ in 0..num_workers {
                let results = Arc::clone(&results);
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= units.len() {
                        break;
                    }

                    let result = work(&units[idx]);
                    results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
                });
            }
        });

        // Sort results by original index to maintain deterministic order
        let mut results = match Arc::try_unwrap(results) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(arc) => std::mem::take(&mut *arc.lock().unwrap_or_else(PoisonError::into_inner)),
        };
        results.sort_by_key(|(idx, _)| *idx);

        results.into_iter().map(|(_, r)| r).collect()
    }
}
