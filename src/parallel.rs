use log::warn;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core::BlockcolError;

/// Build a dedicated pool with `threads` workers. Returns `None` when the
/// pool cannot be created, callers then run single-threaded.
pub(crate) fn build_pool(threads: usize) -> Option<ThreadPool> {
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("blockcol-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Cannot start {threads} worker threads, running single-threaded: {e}");
            None
        }
    }
}

/// Run `work(worker, nr_of_workers)` once on each of `threads` workers and
/// wait for all of them. Returns the first error in worker order.
pub(crate) fn run_workers<F>(threads: usize, work: F) -> Result<(), BlockcolError>
where
    F: Fn(usize, usize) -> Result<(), BlockcolError> + Sync,
{
    if threads <= 1 {
        return work(0, 1);
    }
    let Some(pool) = build_pool(threads) else {
        return work(0, 1);
    };
    pool.broadcast(|ctx| work(ctx.index(), ctx.num_threads()))
        .into_iter()
        .collect()
}
