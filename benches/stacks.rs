//! Throughput benchmarks for the stack backends.

use std::sync::Mutex;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cairn::{Backend, CountedRef, Quiescent, Stack};

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_push_pop");

    fn run<B: Backend>(bencher: &mut criterion::Bencher<'_>) {
        let stack: Stack<usize, B> = Stack::new();
        bencher.iter(|| {
            stack.push(black_box(1));
            black_box(stack.pop());
        });
    }

    group.bench_function("quiescent", run::<Quiescent>);
    group.bench_function("counted", run::<CountedRef>);
    group.bench_function("mutex_vec", |bencher| {
        let stack = Mutex::new(Vec::new());
        bencher.iter(|| {
            stack.lock().unwrap().push(black_box(1usize));
            black_box(stack.lock().unwrap().pop());
        });
    });

    group.finish();
}

fn contended<B: Backend>(threads: usize, ops: usize) {
    let stack: Stack<usize, B> = Stack::new();
    thread::scope(|scope| {
        for tid in 0..threads {
            let stack = &stack;
            scope.spawn(move || {
                for i in 0..ops {
                    if i % 2 == 0 {
                        stack.push(tid * ops + i);
                    } else {
                        black_box(stack.pop());
                    }
                }
            });
        }
    });
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_mixed");
    const OPS: usize = 10_000;

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements((threads * OPS) as u64));
        group.bench_with_input(
            BenchmarkId::new("quiescent", threads),
            &threads,
            |bencher, &threads| {
                bencher.iter(|| contended::<Quiescent>(threads, OPS));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("counted", threads),
            &threads,
            |bencher, &threads| {
                bencher.iter(|| contended::<CountedRef>(threads, OPS));
            },
        );
    }

    group.finish();
}

fn bench_pop_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefilled_drain");
    const VALUES: usize = 10_000;

    fn run<B: Backend>(bencher: &mut criterion::Bencher<'_>) {
        bencher.iter(|| {
            let stack: Stack<usize, B> = Stack::new();
            for i in 0..VALUES {
                stack.push(i);
            }
            thread::scope(|scope| {
                for _ in 0..4 {
                    let stack = &stack;
                    scope.spawn(move || while black_box(stack.pop()).is_some() {});
                }
            });
        });
    }

    group.throughput(Throughput::Elements(VALUES as u64));
    group.bench_function("quiescent", run::<Quiescent>);
    group.bench_function("counted", run::<CountedRef>);
    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_contended, bench_pop_heavy);
criterion_main!(benches);
