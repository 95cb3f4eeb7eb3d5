//! # Mutation Benchmarks
//!
//! Performance benchmarks for decis-core table rewrites and filtering.
//!
//! Run with: `cargo bench -p decis-core`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use decis_core::{
    AnswerMap, Coord, CriterionRow, DataStore, Domain, MutationEngine, Question, QueryEngine,
    QuestionId, Target,
};
use std::hint::black_box;

/// A store with one wide-domain question and N criterion rows across N
/// targets.
fn create_wide_store(rows: usize) -> (DataStore, QuestionId) {
    let mut store = DataStore::new();
    let mut question = Question::new();
    question.absorb_answers(["A", "B", "C", "D", "E", "F", "G", "H"]);
    let q = store.add_question(question);

    for i in 0..rows {
        let t = store.add_target(Target::new(Domain::Monitoring, Coord::Row(i as u32 + 1)));
        store.add_criterion(CriterionRow {
            question: q,
            target: t,
            threshold: Some((i % 8) as u32),
        });
    }
    (store, q)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_reorder_answers(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_answers");

    for size in [100usize, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || create_wide_store(size),
                |(mut store, q)| {
                    MutationEngine::reorder_answers(&mut store, q, &[7, 6, 5, 4, 3, 2, 1, 0])
                        .expect("reorder");
                    black_box(store)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_merge_answers(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_answers");

    for size in [100usize, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || create_wide_store(size),
                |(mut store, q)| {
                    MutationEngine::merge_answers(
                        &mut store,
                        q,
                        &["G".to_string(), "H".to_string()],
                        None,
                    )
                    .expect("merge");
                    black_box(store)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_filter_qualifying(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_qualifying");

    for size in [100usize, 1000, 10000].iter() {
        let (store, q) = create_wide_store(*size);
        let answers: AnswerMap = [(q, 4u32)].into_iter().collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(QueryEngine::filter_qualifying(
                    &store,
                    Domain::Monitoring,
                    &answers,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reorder_answers,
    bench_merge_answers,
    bench_filter_qualifying
);
criterion_main!(benches);
