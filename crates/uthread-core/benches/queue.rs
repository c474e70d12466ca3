//! Queue throughput benchmarks
//!
//! `cargo bench -p uthread-core`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uthread_core::Queue;

fn bench_round_robin(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_round_robin");

    // Models the scheduler's yield: dequeue head, re-enqueue at tail
    for &threads in &[2usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            let mut q: Queue<usize> = (0..n).collect();
            b.iter(|| {
                let head = q.dequeue().unwrap();
                q.enqueue(black_box(head));
            });
        });
    }
    group.finish();
}

fn bench_delete_by(c: &mut Criterion) {
    c.bench_function("queue_delete_middle_64", |b| {
        let mut q: Queue<u32> = (0..64).collect();
        b.iter(|| {
            let v = q.delete_by(|&v| v == 32).unwrap();
            q.enqueue(black_box(v));
        });
    });
}

fn bench_cold_enqueue(c: &mut Criterion) {
    c.bench_function("queue_fill_drain_1024", |b| {
        b.iter(|| {
            let mut q = Queue::new();
            for i in 0..1024u32 {
                q.enqueue(i);
            }
            while let Some(v) = q.dequeue() {
                black_box(v);
            }
        });
    });
}

criterion_group!(benches, bench_round_robin, bench_delete_by, bench_cold_enqueue);
criterion_main!(benches);
