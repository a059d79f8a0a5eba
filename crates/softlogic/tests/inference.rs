//! End-to-end inference: rules, grounding, ADMM and write-back.

use approx::assert_abs_diff_eq;
use softlogic::grounding::{
    ArithmeticExpression, ArithmeticRule, AtomStore, Comparator, Database, LogicalRule, ModelRegistry,
};
use softlogic::ir::{to_dnf, Atom, Formula, Predicate, Term};
use softlogic::reasoner::{ObjectiveSnapshot, StopReason};
use softlogic::{LazyMpeInference, MpeInference, OnlineSession, SoftLogicConfig};

fn unary(predicate: &str) -> Formula {
    Formula::atom(predicate, vec![Term::var("x")])
}

fn value(db: &Database, predicate: &str, args: &[&str]) -> f64 {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let id = db.get_atom(predicate, &args).expect("atom exists");
    db.atom(id).expect("atom is live").value()
}

fn items_db(targets: &[&str]) -> Database {
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("Item", 1).with_closed(true))
        .unwrap();
    for p in targets {
        db.register_predicate(Predicate::untyped(*p, 1)).unwrap();
    }
    db.add_observation("Item", vec!["i"], 1.0).unwrap();
    db
}

#[test]
fn test_single_hinge_reaches_the_line() {
    // Item(x) ∧ ¬A(x) → B(x): max(0, 1 − A − B) once Item is folded in
    let mut db = items_db(&["A", "B"]);
    db.add_target("A", vec!["i"], 0.5).unwrap();
    db.add_target("B", vec!["i"], 0.5).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(
        LogicalRule::weighted(
            Formula::implies(Formula::and(unary("Item"), Formula::negate(unary("A"))), unary("B")),
            2.0,
            false,
        )
        .unwrap(),
    );

    let result = MpeInference::new(SoftLogicConfig::default())
        .unwrap()
        .infer(&mut registry, &mut db)
        .unwrap();
    assert!(result.report.stop_reason.is_converged());
    assert_eq!(result.terms, 1);
    let sum = value(&db, "A", &["i"]) + value(&db, "B", &["i"]);
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-2);
}

#[test]
fn test_hard_equality_with_evidence() {
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("A", 1).with_closed(true))
        .unwrap();
    db.register_predicate(Predicate::untyped("B", 1)).unwrap();
    db.add_observation("A", vec!["i"], 0.3).unwrap();
    db.add_target("B", vec!["i"], 0.0).unwrap();

    let x = || vec![Term::var("x")];
    let mut registry = ModelRegistry::new();
    registry.add_rule(
        ArithmeticRule::new(
            ArithmeticExpression::new(Comparator::Equal, 1.0)
                .with_atom(1.0, Atom::new("A", x()))
                .with_atom(1.0, Atom::new("B", x())),
            None,
            false,
        )
        .unwrap(),
    );

    let result = MpeInference::new(SoftLogicConfig::default())
        .unwrap()
        .infer(&mut registry, &mut db)
        .unwrap();
    assert_eq!(result.report.violated_constraints, 0);
    assert_abs_diff_eq!(value(&db, "B", &["i"]), 0.7, epsilon = 1e-6);
    assert_eq!(value(&db, "A", &["i"]), 0.3);
}

#[test]
fn test_competing_rules_follow_the_heavier_weight() {
    let mut db = items_db(&["A"]);
    db.add_target("A", vec!["i"], 0.5).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(LogicalRule::weighted(Formula::implies(unary("Item"), unary("A")), 1.0, false).unwrap());
    registry.add_rule(
        LogicalRule::weighted(
            Formula::implies(unary("Item"), Formula::negate(unary("A"))),
            2.0,
            false,
        )
        .unwrap(),
    );

    MpeInference::new(SoftLogicConfig::default())
        .unwrap()
        .infer(&mut registry, &mut db)
        .unwrap();
    assert!(value(&db, "A", &["i"]) < 0.5);
}

#[test]
fn test_conjunction_of_disjunctions_expands_to_six_clauses() {
    let p = |name: &str| Formula::atom(name, vec![]);
    let formula = Formula::And(vec![
        Formula::Or(vec![p("A"), p("B")]),
        Formula::Or(vec![p("C"), p("D"), p("E")]),
    ]);
    match to_dnf(&formula) {
        Formula::Or(clauses) => assert_eq!(clauses.len(), 6),
        other => panic!("expected a disjunction, got {}", other),
    }
}

#[test]
fn test_symmetric_groundings_are_deduplicated() {
    // Link(x, y) ∧ Link(y, x) → Cyclic(g): (a, b) and (b, a) give the same ground rule
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("Link", 2).with_closed(true))
        .unwrap();
    db.register_predicate(Predicate::untyped("Cyclic", 1)).unwrap();
    db.add_observation("Link", vec!["a", "b"], 1.0).unwrap();
    db.add_observation("Link", vec!["b", "a"], 1.0).unwrap();
    db.add_target("Cyclic", vec!["g"], 0.0).unwrap();

    let mut registry = ModelRegistry::new();
    registry.add_rule(
        LogicalRule::weighted(
            Formula::implies(
                Formula::and(
                    Formula::atom("Link", vec![Term::var("x"), Term::var("y")]),
                    Formula::atom("Link", vec![Term::var("y"), Term::var("x")]),
                ),
                Formula::atom("Cyclic", vec![Term::constant("g")]),
            ),
            1.0,
            false,
        )
        .unwrap(),
    );

    let mut mpe = MpeInference::new(SoftLogicConfig::default()).unwrap();
    let first = mpe.infer(&mut registry, &mut db).unwrap();
    assert_eq!(first.ground_rules, 1);
    assert_eq!(first.terms, 1);
    let second = mpe.infer(&mut registry, &mut db).unwrap();
    assert_eq!(second.ground_rules, 1);
    assert_eq!(second.terms, 1);
    assert_abs_diff_eq!(value(&db, "Cyclic", &["g"]), 1.0, epsilon = 1e-2);
}

#[test]
fn test_relaxed_constraints_and_observer() {
    let mut db = items_db(&["A"]);
    db.add_target("A", vec!["i"], 0.0).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(LogicalRule::constraint(Formula::implies(unary("Item"), unary("A"))).unwrap());

    let mut config = SoftLogicConfig::default();
    config.inference.relax_hard_constraints = true;
    config.admm.compute_period = 5;
    let mut snapshots = 0;
    let mut observer = |_: usize, _: &ObjectiveSnapshot| snapshots += 1;
    let result = MpeInference::new(config)
        .unwrap()
        .infer_with(&mut registry, &mut db, Some(&mut observer))
        .unwrap();

    assert!(registry.rules().all(|(_, rule)| rule.is_weighted()));
    assert_eq!(result.report.violated_constraints, 0);
    assert!(snapshots >= 1);
    assert!(value(&db, "A", &["i"]) > 0.9);
}

#[test]
fn test_budget_exhaustion_is_reported_not_raised() {
    let mut db = items_db(&["A"]);
    db.add_target("A", vec!["i"], 0.0).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(LogicalRule::weighted(Formula::implies(unary("Item"), unary("A")), 1.0, false).unwrap());

    let mut config = SoftLogicConfig::default();
    config.admm = config.admm.with_max_iterations(3).with_run_full_iterations(true);
    let result = MpeInference::new(config)
        .unwrap()
        .infer(&mut registry, &mut db)
        .unwrap();
    assert_eq!(result.report.iterations, 3);
    assert_eq!(result.report.stop_reason, StopReason::IterationBudgetExhausted);
}

fn reachability() -> (ModelRegistry, Database) {
    let mut db = Database::new();
    db.register_predicate(Predicate::untyped("Link", 2).with_closed(true))
        .unwrap();
    db.register_predicate(Predicate::untyped("Reach", 2)).unwrap();
    db.add_observation("Link", vec!["a", "b"], 1.0).unwrap();
    db.add_observation("Link", vec!["b", "c"], 1.0).unwrap();
    db.add_observation("Link", vec!["c", "d"], 1.0).unwrap();
    db.add_observation("Reach", vec!["a", "b"], 1.0).unwrap();

    let mut registry = ModelRegistry::new();
    registry.add_rule(
        LogicalRule::weighted(
            Formula::implies(
                Formula::and(
                    Formula::atom("Reach", vec![Term::var("x"), Term::var("y")]),
                    Formula::atom("Link", vec![Term::var("y"), Term::var("z")]),
                ),
                Formula::atom("Reach", vec![Term::var("x"), Term::var("z")]),
            ),
            1.0,
            false,
        )
        .unwrap(),
    );
    (registry, db)
}

#[test]
fn test_lazy_inference_activates_reachable_atoms() {
    let (mut registry, mut db) = reachability();
    let mut lazy = LazyMpeInference::new(SoftLogicConfig::default()).unwrap();
    let result = lazy.infer(&mut registry, &mut db).unwrap();

    assert_eq!(result.activated, 2);
    assert_eq!(result.rounds, 2);
    assert_eq!(lazy.ground_rules().len(), 2);
    assert!(db.lazy_atoms().is_empty());
    assert!(value(&db, "Reach", &["a", "c"]) > 0.9);
    assert!(value(&db, "Reach", &["a", "d"]) > 0.9);
}

#[test]
fn test_lazy_rounds_are_bounded() {
    let (mut registry, mut db) = reachability();
    let mut config = SoftLogicConfig::default();
    config.inference.lazy_max_rounds = 0;
    let result = LazyMpeInference::new(config)
        .unwrap()
        .infer(&mut registry, &mut db)
        .unwrap();
    assert_eq!(result.activated, 0);
    assert_eq!(db.lazy_atoms().len(), 1);
}

fn online() -> OnlineSession {
    let mut db = items_db(&["A"]);
    db.add_target("A", vec!["i"], 0.0).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(LogicalRule::weighted(Formula::implies(unary("Item"), unary("A")), 1.0, false).unwrap());
    OnlineSession::new(SoftLogicConfig::default(), registry, db).unwrap()
}

#[test]
fn test_online_add_and_observe() {
    let mut session = online();
    assert_eq!(session.term_store().size(), 1);

    session
        .add_atom("Item", vec!["j".to_string()], 1.0, true)
        .unwrap();
    assert_eq!(session.ground_rules().len(), 2);
    assert_eq!(session.term_store().size(), 2);

    session.infer().unwrap();
    assert!(value(session.database(), "A", &["j"]) > 0.9);

    let a_i = session
        .database()
        .get_atom("A", &["i".to_string()])
        .unwrap();
    session.observe_atom(a_i, 0.2).unwrap();
    session.infer().unwrap();
    assert_eq!(value(session.database(), "A", &["i"]), 0.2);
    assert_eq!(session.term_store().value_of(a_i), Some(0.2));
}

#[test]
fn test_online_delete_and_deactivate() {
    let mut session = online();
    session
        .add_atom("Item", vec!["j".to_string()], 1.0, true)
        .unwrap();
    let a_j = session
        .database()
        .get_atom("A", &["j".to_string()])
        .unwrap();

    session.delete_atom(a_j).unwrap();
    assert_eq!(session.term_store().size(), 1);
    assert_eq!(session.ground_rules().len(), 1);
    assert!(session.database().atom(a_j).is_none());

    let rule = session.registry().rules().next().map(|(id, _)| id).unwrap();
    session.set_weight(rule, 4.0).unwrap();
    assert_eq!(session.term_store().terms()[0].weight(), Some(4.0));

    session.deactivate_rule(rule).unwrap();
    assert!(session.term_store().is_empty());
    assert!(session.ground_rules().is_empty());
    let result = session.infer().unwrap();
    assert_eq!(result.report.iterations, 0);
}

#[test]
fn test_online_add_rule() {
    let mut session = online();
    session
        .add_logical_rule(
            Formula::implies(unary("Item"), Formula::negate(unary("A"))),
            Some(3.0),
            false,
        )
        .unwrap();
    assert_eq!(session.term_store().size(), 2);
    session.infer().unwrap();
    assert!(value(session.database(), "A", &["i"]) < 0.5);
}

fn evidence_session(item_j: f64) -> OnlineSession {
    let mut db = items_db(&["A"]);
    db.add_observation("Item", vec!["j"], item_j).unwrap();
    let mut registry = ModelRegistry::new();
    registry.add_rule(LogicalRule::weighted(Formula::implies(unary("Item"), unary("A")), 1.0, false).unwrap());
    OnlineSession::new(SoftLogicConfig::default(), registry, db).unwrap()
}

#[test]
fn test_online_evidence_change_rebuilds_folded_terms() {
    let mut session = evidence_session(0.0);
    // Item(j) = 0 makes its grounding trivially satisfied
    assert_eq!(session.ground_rules().len(), 1);
    assert_eq!(session.term_store().size(), 1);

    let item_i = session
        .database()
        .get_atom("Item", &["i".to_string()])
        .unwrap();
    session.observe_atom(item_i, 0.0).unwrap();
    assert_eq!(session.term_store().size(), 0);
    session
        .add_atom("A", vec!["i".to_string()], 0.0, false)
        .unwrap();
    session.infer().unwrap();
    assert_abs_diff_eq!(value(session.database(), "A", &["i"]), 0.0, epsilon = 1e-6);

    session.observe_atom(item_i, 1.0).unwrap();
    assert_eq!(session.term_store().size(), 1);
    session.infer().unwrap();
    assert!(value(session.database(), "A", &["i"]) > 0.9);
}

#[test]
fn test_online_evidence_change_grounds_filtered_rules() {
    let mut session = evidence_session(0.0);
    session
        .add_atom("Item", vec!["j".to_string()], 1.0, true)
        .unwrap();
    assert_eq!(session.ground_rules().len(), 2);
    assert_eq!(session.term_store().size(), 2);
    session.infer().unwrap();
    assert!(value(session.database(), "A", &["j"]) > 0.9);

    // re-adding evidence with a new value goes through the same path
    session
        .add_atom("Item", vec!["i".to_string()], 0.0, true)
        .unwrap();
    assert_eq!(session.term_store().size(), 1);
}
