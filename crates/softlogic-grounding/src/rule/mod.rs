//! Rules: templates that grounding instantiates over the atom store.

mod arithmetic;
mod logical;

use std::fmt;

use serde::{Deserialize, Serialize};
use softlogic_ir::{Atom, VariableAssignment};

use crate::{GroundRule, GroundingError, GroundingResult, GroundingStore, ResultList};

pub use arithmetic::{ArithmeticExpression, ArithmeticRule, ArithmeticSummand};
pub use logical::LogicalRule;

/// Identifier of a rule inside a [`crate::ModelRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Logical(LogicalRule),
    Arithmetic(ArithmeticRule),
}

impl Rule {
    pub fn weight(&self) -> Option<f64> {
        match self {
            Rule::Logical(r) => r.weight(),
            Rule::Arithmetic(r) => r.weight(),
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.weight().is_some()
    }

    pub fn is_squared(&self) -> bool {
        match self {
            Rule::Logical(r) => r.is_squared(),
            Rule::Arithmetic(r) => r.is_squared(),
        }
    }

    /// Change the weight of a weighted rule.
    pub fn set_weight(&mut self, weight: f64) -> GroundingResult<()> {
        if !weight.is_finite() {
            return Err(GroundingError::InvalidWeight { weight });
        }
        if !self.is_weighted() {
            return Err(GroundingError::UnsupportedOperation(format!(
                "cannot set the weight of hard constraint {}",
                self
            )));
        }
        match self {
            Rule::Logical(r) => r.set_weight(weight),
            Rule::Arithmetic(r) => r.set_weight(weight),
        }
        Ok(())
    }

    /// A weighted copy of a hard constraint.
    pub fn relax(&self, weight: f64, squared: bool) -> GroundingResult<Rule> {
        if self.is_weighted() {
            return Err(GroundingError::UnsupportedOperation(format!(
                "rule {} is already weighted",
                self
            )));
        }
        if !weight.is_finite() {
            return Err(GroundingError::InvalidWeight { weight });
        }
        Ok(match self {
            Rule::Logical(r) => Rule::Logical(r.relaxed(weight, squared)),
            Rule::Arithmetic(r) => Rule::Arithmetic(r.relaxed(weight, squared)),
        })
    }

    /// Atoms of the grounding query.
    pub fn query_atoms(&self) -> Vec<&Atom> {
        match self {
            Rule::Logical(r) => r.query_atoms(),
            Rule::Arithmetic(r) => r.query_atoms(),
        }
    }

    /// Partial assignments under which the rule must be re-grounded when the
    /// given atom becomes visible.
    pub fn trace(&self, predicate: &str, args: &[String]) -> Vec<VariableAssignment> {
        match self {
            Rule::Logical(r) => r.trace(predicate, args),
            Rule::Arithmetic(r) => r.trace(predicate, args),
        }
    }

    pub fn query(&self, db: &impl GroundingStore, partial: &VariableAssignment) -> GroundingResult<ResultList> {
        match self {
            Rule::Logical(r) => r.query(db, partial),
            Rule::Arithmetic(r) => r.query(db, partial),
        }
    }

    pub fn instantiate(
        &self,
        id: RuleId,
        db: &mut impl GroundingStore,
        rows: &ResultList,
    ) -> GroundingResult<Vec<GroundRule>> {
        match self {
            Rule::Logical(r) => r.instantiate(id, db, rows),
            Rule::Arithmetic(r) => r.instantiate(id, db, rows),
        }
    }

    /// Every grounding of the rule.
    pub fn ground_all(&self, id: RuleId, db: &mut impl GroundingStore) -> GroundingResult<Vec<GroundRule>> {
        self.ground_with(id, db, &VariableAssignment::new())
    }

    /// Groundings consistent with a partial assignment.
    pub fn ground_with(
        &self,
        id: RuleId,
        db: &mut impl GroundingStore,
        partial: &VariableAssignment,
    ) -> GroundingResult<Vec<GroundRule>> {
        let rows = self.query(&*db, partial)?;
        self.instantiate(id, db, &rows)
    }
}

impl From<LogicalRule> for Rule {
    fn from(rule: LogicalRule) -> Self {
        Rule::Logical(rule)
    }
}

impl From<ArithmeticRule> for Rule {
    fn from(rule: ArithmeticRule) -> Self {
        Rule::Arithmetic(rule)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self {
            Rule::Logical(r) => r.formula().to_string(),
            Rule::Arithmetic(r) => r.expression().to_string(),
        };
        match self.weight() {
            Some(w) if self.is_squared() => write!(f, "{}: {} ^2", w, body),
            Some(w) => write!(f, "{}: {}", w, body),
            None => write!(f, "{} .", body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtomStore, Comparator, Database, FunctionTerm, GroundRuleKind};
    use approx::assert_abs_diff_eq;
    use softlogic_ir::{Formula, Predicate, Term};

    fn votes_db() -> Database {
        let mut db = Database::new();
        db.register_predicate(Predicate::untyped("Friends", 2).with_closed(true))
            .unwrap();
        db.register_predicate(Predicate::untyped("Votes", 2)).unwrap();
        db.add_observation("Friends", vec!["alice", "bob"], 1.0).unwrap();
        db.add_observation("Friends", vec!["bob", "carol"], 0.0).unwrap();
        db.add_target("Votes", vec!["alice", "dem"], 0.5).unwrap();
        db.add_target("Votes", vec!["bob", "dem"], 0.5).unwrap();
        db
    }

    fn friends_vote_alike() -> Formula {
        Formula::implies(
            Formula::and(
                Formula::atom("Friends", vec![Term::var("a"), Term::var("b")]),
                Formula::atom("Votes", vec![Term::var("a"), Term::var("p")]),
            ),
            Formula::atom("Votes", vec![Term::var("b"), Term::var("p")]),
        )
    }

    #[test]
    fn test_logical_rule_grounding() {
        let mut db = votes_db();
        let rule: Rule = LogicalRule::weighted(friends_vote_alike(), 2.0, false).unwrap().into();
        let ground = rule.ground_all(RuleId(0), &mut db).unwrap();

        // Friends(bob, carol) = 0 makes that grounding trivially satisfied.
        assert_eq!(ground.len(), 1);
        let g = &ground[0];
        assert_eq!(g.weight(), Some(2.0));
        assert_eq!(g.atoms().len(), 3);

        // Friends(alice,bob)=1, Votes(alice,dem)=0.5, Votes(bob,dem)=0.5 => satisfied.
        let truth = |id| db.atom(id).map_or(0.0, |a| a.value());
        assert_abs_diff_eq!(g.incompatibility(&truth), 0.0);
    }

    #[test]
    fn test_hard_logical_rule_is_constraint() {
        let mut db = votes_db();
        let rule: Rule = LogicalRule::constraint(friends_vote_alike()).unwrap().into();
        let ground = rule.ground_all(RuleId(0), &mut db).unwrap();
        assert_eq!(ground.len(), 1);
        match ground[0].kind() {
            GroundRuleKind::Constraint(c) => assert_eq!(c.comparator, Comparator::LessThanEqual),
            other => panic!("expected constraint, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_rules() {
        // The negation of this formula has two DNF clauses.
        let two_clauses = Formula::or(
            Formula::atom("Votes", vec![Term::var("a"), Term::var("p")]),
            Formula::and(
                Formula::atom("Votes", vec![Term::var("a"), Term::var("p")]),
                Formula::atom("Friends", vec![Term::var("a"), Term::var("p")]),
            ),
        );
        let negated = Formula::negate(two_clauses);
        assert!(matches!(
            LogicalRule::weighted(negated, 1.0, false),
            Err(GroundingError::InvalidRule { .. })
        ));

        let ground = Formula::implies(
            Formula::atom("Votes", vec![Term::constant("a"), Term::constant("p")]),
            Formula::atom("Votes", vec![Term::constant("b"), Term::constant("p")]),
        );
        assert!(LogicalRule::weighted(ground, 1.0, false).is_err());

        let unbound = Formula::implies(
            Formula::atom("Votes", vec![Term::var("a"), Term::var("p")]),
            Formula::atom("Votes", vec![Term::var("b"), Term::var("p")]),
        );
        assert!(LogicalRule::weighted(unbound, 1.0, false).is_err());

        assert!(matches!(
            LogicalRule::weighted(friends_vote_alike(), f64::NAN, false),
            Err(GroundingError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_set_weight_and_relax() {
        let mut weighted: Rule = LogicalRule::weighted(friends_vote_alike(), 1.0, false).unwrap().into();
        weighted.set_weight(3.0).unwrap();
        assert_eq!(weighted.weight(), Some(3.0));
        assert!(weighted.relax(1.0, true).is_err());

        let mut hard: Rule = LogicalRule::constraint(friends_vote_alike()).unwrap().into();
        assert!(matches!(
            hard.set_weight(1.0),
            Err(GroundingError::UnsupportedOperation(_))
        ));
        let relaxed = hard.relax(100.0, true).unwrap();
        assert_eq!(relaxed.weight(), Some(100.0));
        assert!(relaxed.is_squared());
    }

    #[test]
    fn test_arithmetic_equality_with_sum() {
        let mut db = Database::new();
        db.register_predicate(Predicate::untyped("Label", 2)).unwrap();
        for label in ["x", "y", "z"] {
            db.add_target("Label", vec!["doc", label], 0.0).unwrap();
        }
        let expression = ArithmeticExpression::new(Comparator::Equal, 1.0).with_sum(
            1.0,
            Atom::new("Label", vec![Term::var("d"), Term::var("l")]),
            "l",
        );
        let hard: Rule = ArithmeticRule::new(expression.clone(), None, false).unwrap().into();
        let ground = hard.ground_all(RuleId(0), &mut db).unwrap();
        assert_eq!(ground.len(), 1);
        assert_eq!(ground[0].atoms().len(), 3);

        let soft: Rule = ArithmeticRule::new(expression, Some(1.0), false).unwrap().into();
        let ground = soft.ground_all(RuleId(1), &mut db).unwrap();
        // Weighted equality becomes two hinges.
        assert_eq!(ground.len(), 2);
        assert!(ground.iter().all(|g| g.function().as_hinge().is_some()));
    }

    #[test]
    fn test_arithmetic_rule_validation() {
        let misplaced = ArithmeticExpression::new(Comparator::LessThanEqual, 1.0)
            .with_sum(1.0, Atom::new("Label", vec![Term::var("d"), Term::var("l")]), "l")
            .with_atom(1.0, Atom::new("Label", vec![Term::var("l"), Term::var("d")]));
        assert!(ArithmeticRule::new(misplaced, None, false).is_err());

        let missing = ArithmeticExpression::new(Comparator::LessThanEqual, 1.0)
            .with_sum(1.0, Atom::new("Label", vec![Term::var("d"), Term::var("l")]), "q");
        assert!(ArithmeticRule::new(missing, None, false).is_err());

        let empty = ArithmeticExpression::new(Comparator::Equal, 0.0);
        assert!(ArithmeticRule::new(empty, None, false).is_err());
    }

    #[test]
    fn test_trace_drops_summation_variable() {
        let expression = ArithmeticExpression::new(Comparator::Equal, 1.0).with_sum(
            1.0,
            Atom::new("Label", vec![Term::var("d"), Term::var("l")]),
            "l",
        );
        let rule: Rule = ArithmeticRule::new(expression, None, false).unwrap().into();
        let traced = rule.trace("Label", &["doc".into(), "x".into()]);
        assert_eq!(traced.len(), 1);
        assert_eq!(traced[0].get("d").map(String::as_str), Some("doc"));
        assert!(traced[0].get("l").is_none());
    }

    #[test]
    fn test_ground_arithmetic_constraint_function() {
        let mut db = Database::new();
        db.register_predicate(Predicate::untyped("P", 1)).unwrap();
        let a = db.add_observation("P", vec!["a"], 0.3).unwrap();
        let b = db.add_target("P", vec!["b"], 0.0).unwrap();
        let expression = ArithmeticExpression::new(Comparator::Equal, 1.0)
            .with_atom(1.0, Atom::new("P", vec![Term::constant("a")]))
            .with_atom(1.0, Atom::new("P", vec![Term::constant("b")]));
        let rule: Rule = ArithmeticRule::new(expression, None, false).unwrap().into();
        let ground = rule.ground_all(RuleId(0), &mut db).unwrap();
        assert_eq!(ground.len(), 1);
        assert_eq!(
            ground[0].function(),
            &FunctionTerm::linear([(1.0, a), (1.0, b)], 0.0)
        );
    }
}
