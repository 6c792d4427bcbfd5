use rayon::ThreadPool;
use rayon::prelude::*;

/// Bits consumed per counting pass.
pub(crate) const RADIX_BITS: u32 = 11;
pub(crate) const NR_OF_BUCKETS: usize = 1 << RADIX_BITS;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
    impl Sealed for u64 {}
    impl Sealed for i64 {}
}

/// Key type sortable with an LSD radix sort.
pub trait RadixKey: sealed::Sealed + Copy + Default + Send + Sync {
    const BITS: u32;

    /// Unsigned image of the key whose order matches the natural order of
    /// `Self`. Signed keys get their sign bit flipped.
    fn radix(self) -> u64;
}

/// Keys of exactly 32 bits, sorted in 3 passes.
pub trait RadixKey32: RadixKey {}

/// Keys of exactly 64 bits, sorted in 6 passes.
pub trait RadixKey64: RadixKey {}

impl RadixKey for u32 {
    const BITS: u32 = 32;
    fn radix(self) -> u64 {
        self as u64
    }
}

impl RadixKey for i32 {
    const BITS: u32 = 32;
    fn radix(self) -> u64 {
        ((self as u32) ^ 0x8000_0000) as u64
    }
}

impl RadixKey for u64 {
    const BITS: u32 = 64;
    fn radix(self) -> u64 {
        self
    }
}

impl RadixKey for i64 {
    const BITS: u32 = 64;
    fn radix(self) -> u64 {
        (self as u64) ^ 0x8000_0000_0000_0000
    }
}

impl RadixKey32 for u32 {}
impl RadixKey32 for i32 {}
impl RadixKey64 for u64 {}
impl RadixKey64 for i64 {}

#[derive(Clone, Copy)]
struct Pass {
    shift: u32,
    mask: u64,
}

impl Pass {
    fn bucket<K: RadixKey>(&self, key: K) -> usize {
        ((key.radix() >> self.shift) & self.mask) as usize
    }
}

fn passes<K: RadixKey>() -> impl Iterator<Item = Pass> {
    (0..K::BITS.div_ceil(RADIX_BITS)).map(|pass| {
        let shift = pass * RADIX_BITS;
        let width = RADIX_BITS.min(K::BITS - shift);
        Pass {
            shift,
            mask: (1u64 << width) - 1,
        }
    })
}

/// Stable ascending LSD radix sort. With a pool, every pass splits the input
/// into one contiguous chunk per pool thread.
pub(crate) fn radix_sort<K: RadixKey>(values: &mut [K], pool: Option<&ThreadPool>) {
    if values.len() < 2 {
        return;
    }
    let mut scratch = vec![K::default(); values.len()];
    let mut in_scratch = false;

    for pass in passes::<K>() {
        let moved = if in_scratch {
            scatter_pass(&scratch, values, pass, pool)
        } else {
            scatter_pass(values, &mut scratch, pass, pool)
        };
        if moved {
            in_scratch = !in_scratch;
        }
    }
    if in_scratch {
        values.copy_from_slice(&scratch);
    }
}

fn histogram<K: RadixKey>(chunk: &[K], pass: Pass) -> Vec<usize> {
    let mut counts = vec![0usize; NR_OF_BUCKETS];
    for key in chunk {
        counts[pass.bucket(*key)] += 1;
    }
    counts
}

/// Distribute `src` into `dst` by the bucket of `pass`. Returns `false`
/// without touching `dst` when every key falls in the same bucket.
fn scatter_pass<K: RadixKey>(src: &[K], dst: &mut [K], pass: Pass, pool: Option<&ThreadPool>) -> bool {
    let threads = pool.map_or(1, |p| p.current_num_threads()).max(1);
    let chunk_len = src.len().div_ceil(threads);
    let chunks: Vec<&[K]> = src.chunks(chunk_len).collect();

    let histograms: Vec<Vec<usize>> = match pool {
        Some(pool) if chunks.len() > 1 => pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| histogram(chunk, pass))
                .collect()
        }),
        _ => chunks.iter().map(|chunk| histogram(chunk, pass)).collect(),
    };

    let single_bucket = (0..NR_OF_BUCKETS)
        .any(|b| histograms.iter().map(|h| h[b]).sum::<usize>() == src.len());
    if single_bucket {
        return false;
    }

    if chunks.len() == 1 {
        let mut cursor = vec![0usize; NR_OF_BUCKETS];
        let mut offset = 0;
        for (b, count) in histograms[0].iter().enumerate() {
            cursor[b] = offset;
            offset += count;
        }
        for key in src {
            let b = pass.bucket(*key);
            dst[cursor[b]] = *key;
            cursor[b] += 1;
        }
        return true;
    }

    // Bucket-major layout: bucket 0 of chunk 0, bucket 0 of chunk 1, ...,
    // which keeps the sort stable across chunks.
    let mut targets: Vec<Vec<&mut [K]>> = (0..chunks.len())
        .map(|_| Vec::with_capacity(NR_OF_BUCKETS))
        .collect();
    let mut rest = dst;
    for b in 0..NR_OF_BUCKETS {
        for (t, histogram) in histograms.iter().enumerate() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(histogram[b]);
            targets[t].push(head);
            rest = tail;
        }
    }

    let scatter = |(chunk, mut buckets): (&&[K], Vec<&mut [K]>)| {
        let mut cursor = vec![0usize; NR_OF_BUCKETS];
        for key in chunk.iter() {
            let b = pass.bucket(*key);
            buckets[b][cursor[b]] = *key;
            cursor[b] += 1;
        }
    };
    match pool {
        Some(pool) => pool.install(|| {
            chunks
                .par_iter()
                .zip(targets.into_par_iter())
                .for_each(scatter)
        }),
        None => chunks.iter().zip(targets).for_each(scatter),
    }
    true
}
