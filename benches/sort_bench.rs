use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use blockcol::testutil::{BENCH_RNG_SEED, generate_i32, generate_logicals, generate_u64};
use blockcol::{RadixSorter, RowOrder, ThreadPolicy};

const SIZES: [usize; 3] = [50_000, 500_000, 5_000_000];

fn bench_sort_i32(c: &mut Criterion) {
    let mut group = c.benchmark_group("radix_sort_i32");
    for size in SIZES {
        let values = generate_i32(size, BENCH_RNG_SEED);
        group.throughput(Throughput::Elements(size as u64));
        for (name, policy) in [
            ("single", ThreadPolicy::Fixed(1)),
            ("auto", ThreadPolicy::default()),
        ] {
            let sorter = RadixSorter::new(policy);
            group.bench_with_input(BenchmarkId::new(name, size), &values, |b, values| {
                b.iter_batched_ref(
                    || values.clone(),
                    |v| sorter.sort_u32(black_box(v.as_mut_slice())),
                    BatchSize::LargeInput,
                )
            });
        }
        group.bench_with_input(BenchmarkId::new("std_unstable", size), &values, |b, values| {
            b.iter_batched_ref(|| values.clone(), |v| v.sort_unstable(), BatchSize::LargeInput)
        });
    }
    group.finish();
}

fn bench_sort_u64(c: &mut Criterion) {
    let mut group = c.benchmark_group("radix_sort_u64");
    let sorter = RadixSorter::default();
    for size in SIZES {
        let values = generate_u64(size, BENCH_RNG_SEED);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter_batched_ref(
                || values.clone(),
                |v| sorter.sort_u64(black_box(v.as_mut_slice())),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_sort_logical(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_logical");
    let sorter = RadixSorter::default();
    for size in SIZES {
        let values = generate_logicals(size, BENCH_RNG_SEED);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("values", size), &values, |b, values| {
            b.iter_batched_ref(
                || values.clone(),
                |v| sorter.sort_logical(black_box(v.as_mut_slice())).unwrap(),
                BatchSize::LargeInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("with_order", size), &values, |b, values| {
            b.iter_batched_ref(
                || values.clone(),
                |v| {
                    sorter
                        .sort_logical_with_order(black_box(v.as_mut_slice()), RowOrder::Identity)
                        .unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sort_i32, bench_sort_u64, bench_sort_logical);
criterion_main!(benches);
