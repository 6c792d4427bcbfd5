mod logical;
mod radix;

use log::debug;
use rayon::ThreadPool;

use crate::core::BlockcolError;
use crate::parallel::build_pool;

pub use logical::{LOGICAL_NA, RowOrder};
pub use radix::{RadixKey, RadixKey32, RadixKey64};

/// Upper bound on threads the automatic policy picks for large inputs.
pub const MAX_SORT_THREADS: usize = 8;

/// Logical vectors below this length are always counted on one thread.
const LOGICAL_PARALLEL_MIN: usize = 1024;
const LOGICAL_MAX_THREADS: usize = 4;

/// How many threads a sort may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadPolicy {
    /// Scale with the input length, up to `max` threads.
    Auto { max: usize },
    /// Always use this many threads.
    Fixed(usize),
}

impl Default for ThreadPolicy {
    fn default() -> Self {
        let max = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ThreadPolicy::Auto { max }
    }
}

/// Radix sorter for integer and logical vectors. Results never depend on the
/// thread count.
#[derive(Clone, Copy, Debug, Default)]
pub struct RadixSorter {
    policy: ThreadPolicy,
}

impl RadixSorter {
    pub fn new(policy: ThreadPolicy) -> Self {
        Self { policy }
    }

    fn threads_for(&self, len: usize) -> usize {
        match self.policy {
            ThreadPolicy::Fixed(threads) => threads.max(1),
            ThreadPolicy::Auto { max } => {
                let wanted = if len < 90_000 {
                    1
                } else if len < 600_000 {
                    2
                } else {
                    MAX_SORT_THREADS
                };
                wanted.min(max).max(1)
            }
        }
    }

    fn logical_threads_for(&self, len: usize) -> usize {
        if len < LOGICAL_PARALLEL_MIN {
            return 1;
        }
        match self.policy {
            ThreadPolicy::Fixed(threads) => threads.max(1),
            ThreadPolicy::Auto { max } => LOGICAL_MAX_THREADS.min(max).max(1),
        }
    }

    fn pool(threads: usize) -> Option<ThreadPool> {
        if threads > 1 { build_pool(threads) } else { None }
    }

    /// Ascending in-place sort of 32-bit keys.
    pub fn sort_u32<K: RadixKey32>(&self, values: &mut [K]) {
        let threads = self.threads_for(values.len());
        debug!("Radix sorting {} 32-bit keys on {} threads", values.len(), threads);
        radix::radix_sort(values, Self::pool(threads).as_ref());
    }

    /// Ascending in-place sort of 64-bit keys.
    pub fn sort_u64<K: RadixKey64>(&self, values: &mut [K]) {
        let threads = self.threads_for(values.len());
        debug!("Radix sorting {} 64-bit keys on {} threads", values.len(), threads);
        radix::radix_sort(values, Self::pool(threads).as_ref());
    }

    /// Sort logical values (NA, FALSE=0, TRUE=1) in place with NA first.
    pub fn sort_logical(&self, values: &mut [i32]) -> Result<(), BlockcolError> {
        let pool = Self::pool(self.logical_threads_for(values.len()));
        logical::sort_logical(values, pool.as_ref())
    }

    /// Stable logical sort that returns the row numbers of `order` in the
    /// sorted sequence.
    pub fn sort_logical_with_order(
        &self,
        values: &mut [i32],
        order: RowOrder<'_>,
    ) -> Result<Vec<i32>, BlockcolError> {
        let pool = Self::pool(self.logical_threads_for(values.len()));
        logical::sort_logical_with_order(values, order, pool.as_ref())
    }
}

pub fn radix_sort_u32<K: RadixKey32>(values: &mut [K]) {
    RadixSorter::default().sort_u32(values)
}

pub fn radix_sort_u64<K: RadixKey64>(values: &mut [K]) {
    RadixSorter::default().sort_u64(values)
}

pub fn radix_sort_logical(values: &mut [i32]) -> Result<(), BlockcolError> {
    RadixSorter::default().sort_logical(values)
}

pub fn radix_sort_logical_with_order(
    values: &mut [i32],
    order: RowOrder<'_>,
) -> Result<Vec<i32>, BlockcolError> {
    RadixSorter::default().sort_logical_with_order(values, order)
}
