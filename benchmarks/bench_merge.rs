use std::hint::black_box;
use std::io::{self, Cursor};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_channel::unbounded;

use logmerge::{
    OrderedMerger, ParallelConfig, Source, TimePrefix, TimeStrategy, UnorderedWorkerPool,
};

const RECORDS_PER_SOURCE: usize = 2_000;

/// Interleaved nginx-style sources: source `s` owns every `count`-th second
fn build_inputs(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|s| {
            let mut text = String::new();
            for i in 0..RECORDS_PER_SOURCE {
                let secs = i * count + s;
                text.push_str(&format!(
                    "2020/01/18 {:02}:{:02}:{:02} [info] 1#1: worker {} request {}\n",
                    (secs / 3600) % 24,
                    (secs / 60) % 60,
                    secs % 60,
                    s,
                    i
                ));
            }
            text.into_bytes()
        })
        .collect()
}

fn sources(inputs: &[Vec<u8>]) -> Vec<Source> {
    inputs
        .iter()
        .enumerate()
        .map(|(s, bytes)| Source::from_reader(format!("s{}", s), Cursor::new(bytes.clone())))
        .collect()
}

fn bench_ordered_merge(c: &mut Criterion) {
    let time: Arc<dyn TimeStrategy> = Arc::new(TimePrefix::default());
    let mut group = c.benchmark_group("ordered_merge");
    for count in [2usize, 8, 32] {
        let inputs = build_inputs(count);
        group.throughput(Throughput::Elements((count * RECORDS_PER_SOURCE) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &inputs, |b, inputs| {
            let merger = OrderedMerger::new(Arc::clone(&time));
            b.iter(|| {
                black_box(merger.run(sources(inputs), &mut io::sink()).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_unordered_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("unordered_merge");
    for workers in [1usize, 4] {
        let inputs = build_inputs(8);
        group.throughput(Throughput::Elements((8 * RECORDS_PER_SOURCE) as u64));
        group.bench_with_input(BenchmarkId::new("workers", workers), &inputs, |b, inputs| {
            b.iter(|| {
                let (errors, _error_rx) = unbounded();
                let pool = UnorderedWorkerPool::new(ParallelConfig {
                    num_workers: workers,
                    queue_size: 1024,
                })
                .with_error_sink(errors);
                black_box(pool.run(sources(inputs), &mut io::sink()).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(merge_benches, bench_ordered_merge, bench_unordered_merge);
criterion_main!(merge_benches);
