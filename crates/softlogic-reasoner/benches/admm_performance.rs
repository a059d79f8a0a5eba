//! ADMM throughput on chains of implication hinges.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use softlogic_grounding::{Database, FunctionTerm, GroundRule, GroundRuleStore, Origin, RuleId};
use softlogic_ir::Predicate;
use softlogic_reasoner::{AdmmConfig, AdmmReasoner, InitialValue, Reasoner, TermGenerator, TermStore};

/// `P(i) → P(i+1)` for every i, plus a prior pulling each atom down.
fn chain(n: usize) -> (Database, TermStore) {
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("P", 1)).unwrap();
    let ids: Vec<_> = (0..n)
        .map(|i| db.add_target("P", vec![i.to_string()], 0.5).unwrap())
        .collect();
    let mut ground_rules = GroundRuleStore::new();
    for w in ids.windows(2) {
        ground_rules.add(GroundRule::weighted(
            Origin::new(RuleId(0)),
            1.0,
            FunctionTerm::hinge(FunctionTerm::linear([(1.0, w[0]), (-1.0, w[1])], 0.0)),
        ));
    }
    for id in &ids {
        ground_rules.add(GroundRule::weighted(
            Origin::new(RuleId(1)),
            0.1,
            FunctionTerm::squared(FunctionTerm::hinge(FunctionTerm::linear([(1.0, *id)], 0.0))),
        ));
    }
    let mut store = TermStore::new();
    TermGenerator::new()
        .generate_terms(&ground_rules, &db, &mut store)
        .unwrap();
    (db, store)
}

fn bench_admm(c: &mut Criterion) {
    let mut group = c.benchmark_group("admm_chain");
    for n in [100usize, 1_000, 10_000] {
        let (db, mut store) = chain(n);
        let config = AdmmConfig::new()
            .with_max_iterations(200)
            .with_run_full_iterations(true);
        let mut reasoner = AdmmReasoner::new(config).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                store.reset(&db, InitialValue::Atom, 0);
                black_box(reasoner.optimize(&mut store, None).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_admm);
criterion_main!(benches);
