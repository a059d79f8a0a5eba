//! Summation rules under full and incremental grounding.

use softlogic_grounding::{
    ArithmeticExpression, ArithmeticRule, Comparator, Database, GroundRuleKind, GroundRuleStore,
    GroundingEngine, ModelRegistry,
};
use softlogic_ir::{Atom, Predicate, Term};

fn setup() -> (ModelRegistry, Database) {
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("Edge", 2)).unwrap();
    db.add_target("Edge", vec!["a", "b"], 0.5).unwrap();

    // Σ_y Edge(x, y) ≤ 1
    let mut registry = ModelRegistry::new();
    registry.add_rule(
        ArithmeticRule::new(
            ArithmeticExpression::new(Comparator::LessThanEqual, 1.0).with_sum(
                1.0,
                Atom::new("Edge", vec![Term::var("x"), Term::var("y")]),
                "y",
            ),
            None,
            false,
        )
        .unwrap(),
    );
    (registry, db)
}

#[test]
fn test_sum_expands_per_projection() {
    let (registry, mut db) = setup();
    db.add_target("Edge", vec!["a", "c"], 0.5).unwrap();
    db.add_target("Edge", vec!["b", "c"], 0.5).unwrap();

    let mut store = GroundRuleStore::new();
    GroundingEngine::new()
        .ground_all(&registry, &mut db, &mut store)
        .unwrap();

    // one constraint per source node
    assert_eq!(store.len(), 2);
    let mut sizes: Vec<usize> = store.iter().map(|(_, g)| g.atoms().len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2]);
    assert!(store
        .iter()
        .all(|(_, g)| matches!(g.kind(), GroundRuleKind::Constraint(_))));
}

#[test]
fn test_new_summand_replaces_the_aggregate() {
    let (registry, mut db) = setup();
    let mut store = GroundRuleStore::new();
    let engine = GroundingEngine::new();
    engine.ground_all(&registry, &mut db, &mut store).unwrap();
    assert_eq!(store.len(), 1);

    let added = db.add_target("Edge", vec!["a", "c"], 0.5).unwrap();
    let delta = engine
        .ground_incremental(&registry, &mut db, &mut store, &[added])
        .unwrap();

    assert_eq!(delta.added.len(), 1);
    assert_eq!(delta.removed.len(), 1);
    assert_eq!(delta.stats.replaced, 1);
    assert_eq!(store.len(), 1);
    let (_, ground_rule) = store.iter().next().unwrap();
    assert_eq!(ground_rule.atoms().len(), 2);
}
