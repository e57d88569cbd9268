//! Fork-join thread layer (rayon under the `rayon` feature, serial otherwise).
//!
//! Work is handed out as contiguous index ranges, one per pool thread, using
//! the same partitioning rule as processes. Region bodies run with a
//! thread-local marker set so that entry points which open regions of their
//! own can assert that they are not nested.

use std::cell::Cell;
use std::ops::Range;

use crate::error::{HlError, Result};
use crate::utils::partition::{group_boundaries, group_range};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

thread_local! {
    static IN_REGION: Cell<bool> = const { Cell::new(false) };
    static THREAD_LIMIT: Cell<Option<usize>> = const { Cell::new(None) };
}

struct LimitGuard(Option<usize>);

impl LimitGuard {
    fn set(limit: usize) -> Self {
        Self(THREAD_LIMIT.with(|cell| cell.replace(Some(limit))))
    }
}

impl Drop for LimitGuard {
    fn drop(&mut self) {
        THREAD_LIMIT.with(|cell| cell.set(self.0));
    }
}

struct RegionGuard(bool);

impl RegionGuard {
    fn enter() -> Self {
        Self(IN_REGION.with(|flag| flag.replace(true)))
    }
}

impl Drop for RegionGuard {
    fn drop(&mut self) {
        IN_REGION.with(|flag| flag.set(self.0));
    }
}

fn pool_threads() -> usize {
    #[cfg(feature = "rayon")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "rayon"))]
    {
        1
    }
}

/// Number of threads work is split between.
pub fn max_threads() -> usize {
    let pool = pool_threads();
    THREAD_LIMIT
        .with(Cell::get)
        .map_or(pool, |limit| limit.min(pool))
}

/// True inside the body of a parallel region.
pub fn in_parallel_region() -> bool {
    IN_REGION.with(Cell::get)
}

/// Builds the global pool, by default with one thread per logical CPU.
///
/// Returns `Ok(false)` if a global pool already exists.
pub fn init_global(num_threads: Option<usize>) -> Result<bool> {
    if num_threads == Some(0) {
        return Err(HlError::Domain("thread count must be positive".into()));
    }
    #[cfg(feature = "rayon")]
    {
        let n = num_threads.unwrap_or_else(num_cpus::get);
        match rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            Ok(()) => {
                tracing::debug!(threads = n, "global thread pool initialized");
                Ok(true)
            }
            Err(err) => {
                tracing::debug!(error = %err, "global thread pool already initialized");
                Ok(false)
            }
        }
    }
    #[cfg(not(feature = "rayon"))]
    {
        Ok(false)
    }
}

/// Runs `f` with work split between at most `num_threads` threads, or as
/// many as the pool has when `None`.
pub fn with_max_threads<R>(num_threads: Option<usize>, f: impl FnOnce() -> R) -> Result<R> {
    match num_threads {
        None => Ok(f()),
        Some(0) => Err(HlError::Domain("thread count must be positive".into())),
        Some(n) => {
            let _limit = LimitGuard::set(n);
            Ok(f())
        }
    }
}

/// Calls `body(thread, range)` for each thread's share of `range`. Threads
/// with an empty share are skipped.
pub fn parallel_ranges<F>(range: Range<usize>, body: F)
where
    F: Fn(usize, Range<usize>) + Sync,
{
    let n = max_threads();
    let run = |t: usize| {
        let r = group_range(range.start, range.end, n, t);
        if !r.is_empty() {
            let _guard = RegionGuard::enter();
            body(t, r);
        }
    };
    #[cfg(feature = "rayon")]
    (0..n).into_par_iter().for_each(run);
    #[cfg(not(feature = "rayon"))]
    (0..n).for_each(run);
}

/// Splits `data`, a sequence of `unit`-sized records, between threads and
/// calls `body(records, chunk)` on each share, where `records` is the record
/// range covered by `chunk`.
pub fn parallel_chunks<T, F>(data: &mut [T], unit: usize, body: F)
where
    T: Send,
    F: Fn(Range<usize>, &mut [T]) + Sync,
{
    assert!(unit > 0, "Record size must be positive");
    assert_eq!(data.len() % unit, 0, "Data is not a whole number of records");
    let n = max_threads();
    let bounds = group_boundaries(0, data.len() / unit, n);
    let mut chunks = Vec::with_capacity(n);
    let mut rest = data;
    for w in bounds.windows(2) {
        let (head, tail) = rest.split_at_mut((w[1] - w[0]) * unit);
        if !head.is_empty() {
            chunks.push((w[0]..w[1], head));
        }
        rest = tail;
    }
    let run = |(records, chunk): (Range<usize>, &mut [T])| {
        let _guard = RegionGuard::enter();
        body(records, chunk);
    };
    #[cfg(feature = "rayon")]
    chunks.into_par_iter().for_each(run);
    #[cfg(not(feature = "rayon"))]
    chunks.into_iter().for_each(run);
}
