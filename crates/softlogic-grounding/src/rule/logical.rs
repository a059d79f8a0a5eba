//! First-order logical rules under Łukasiewicz semantics.
//!
//! A rule `body → head` is analysed through the DNF of its negation, which
//! must be a single conjunction `b₁ ∧ … ∧ bₙ ∧ ¬h₁ ∧ … ∧ ¬hₘ`. The positive
//! literals form the grounding query and each grounding gets the distance to
//! satisfaction `Σ bᵢ − Σ hⱼ + 1 − n`.

use log::trace;
use softlogic_ir::{Atom, DnfClause, Formula, FormulaAnalysis, Variable, VariableAssignment};

use crate::{
    AtomId, Comparator, ConstraintDefinition, FunctionTerm, GroundRule, GroundingError,
    GroundingResult, GroundingStore, Origin, ResultList, RuleId,
};

/// Distance to satisfaction below which a grounding is considered trivially satisfied.
const TRIVIAL_EPSILON: f64 = 1e-8;

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalRule {
    formula: Formula,
    clause: DnfClause,
    variables: Vec<Variable>,
    weight: Option<f64>,
    squared: bool,
}

impl LogicalRule {
    /// Build a rule, weighted if `weight` is given and a hard constraint otherwise.
    pub fn new(formula: Formula, weight: Option<f64>, squared: bool, max_clauses: usize) -> GroundingResult<Self> {
        if let Some(w) = weight {
            if !w.is_finite() {
                return Err(GroundingError::InvalidWeight { weight: w });
            }
        }
        let clause = analyse(&formula, max_clauses)?;
        let variables = clause.variables().into_iter().collect();
        Ok(LogicalRule {
            formula,
            clause,
            variables,
            weight,
            squared,
        })
    }

    pub fn weighted(formula: Formula, weight: f64, squared: bool) -> GroundingResult<Self> {
        Self::new(formula, Some(weight), squared, softlogic_ir::DEFAULT_MAX_DNF_CLAUSES)
    }

    pub fn constraint(formula: Formula) -> GroundingResult<Self> {
        Self::new(formula, None, false, softlogic_ir::DEFAULT_MAX_DNF_CLAUSES)
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn is_squared(&self) -> bool {
        self.squared
    }

    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = Some(weight);
    }

    pub(crate) fn relaxed(&self, weight: f64, squared: bool) -> Self {
        LogicalRule {
            weight: Some(weight),
            squared,
            ..self.clone()
        }
    }

    pub fn query_atoms(&self) -> Vec<&Atom> {
        self.clause.positive_literals().iter().collect()
    }

    pub(crate) fn query(&self, db: &impl GroundingStore, partial: &VariableAssignment) -> GroundingResult<ResultList> {
        let query = self.clause.query().ok_or_else(|| GroundingError::InvalidRule {
            rule: self.formula.to_string(),
            reason: "no positive literals to query".to_string(),
        })?;
        db.execute_query(&query, partial, &self.variables)
    }

    pub(crate) fn trace(&self, predicate: &str, args: &[String]) -> Vec<VariableAssignment> {
        self.clause.trace_atom_event(predicate, args)
    }

    pub(crate) fn instantiate(
        &self,
        id: RuleId,
        db: &mut impl GroundingStore,
        rows: &ResultList,
    ) -> GroundingResult<Vec<GroundRule>> {
        let clause = &self.clause;
        let mut out = Vec::with_capacity(rows.len());
        for (row, assignment) in rows.rows().iter().zip(rows.assignments()) {
            let positive = ground_atoms(db, clause.positive_literals(), &assignment)?;
            let negative = ground_atoms(db, clause.negative_literals(), &assignment)?;

            if worst_case_distance(&*db, &positive, &negative) <= TRIVIAL_EPSILON {
                trace!("skipping trivially satisfied grounding of {}", self.formula);
                continue;
            }

            let constant = 1.0 - positive.len() as f64;
            let summands = positive
                .iter()
                .map(|a| (1.0, *a))
                .chain(negative.iter().map(|a| (-1.0, *a)));
            let distance = FunctionTerm::linear(summands, constant);
            let origin = Origin::with_bindings(id, row.clone(), 0);

            let ground_rule = match self.weight {
                Some(weight) => {
                    let hinge = FunctionTerm::hinge(distance);
                    let function = if self.squared {
                        FunctionTerm::squared(hinge)
                    } else {
                        hinge
                    };
                    GroundRule::weighted(origin, weight, function)
                }
                None => GroundRule::constraint(
                    origin,
                    ConstraintDefinition::new(distance, Comparator::LessThanEqual, 0.0),
                ),
            };
            out.push(ground_rule);
        }
        Ok(out)
    }
}

fn analyse(formula: &Formula, max_clauses: usize) -> GroundingResult<DnfClause> {
    let invalid = |reason: String| GroundingError::InvalidRule {
        rule: formula.to_string(),
        reason,
    };
    let analysis = FormulaAnalysis::new(&Formula::negate(formula.clone()), max_clauses)?;
    if analysis.num_clauses() != 1 {
        return Err(invalid(format!(
            "negation must be a single conjunction of literals, found {} clauses",
            analysis.num_clauses()
        )));
    }
    let clause = analysis.clauses()[0].clone();
    if clause.is_ground() {
        return Err(invalid("formula has no variables".to_string()));
    }
    if !clause.all_variables_bound() {
        return Err(invalid(format!(
            "variables {:?} only appear in negated literals",
            clause.unbound_variables()
        )));
    }
    Ok(clause)
}

fn ground_atoms(
    db: &mut impl GroundingStore,
    templates: &[Atom],
    assignment: &VariableAssignment,
) -> GroundingResult<Vec<AtomId>> {
    templates
        .iter()
        .map(|t| {
            let args = t.ground(assignment)?;
            db.get_or_create_atom(&t.predicate, args)
        })
        .collect()
}

/// Distance to satisfaction with every random variable at its least favourable value.
fn worst_case_distance(db: &impl GroundingStore, positive: &[AtomId], negative: &[AtomId]) -> f64 {
    let worst = |id: &AtomId, unfavourable: f64| {
        db.atom(*id)
            .map(|a| if a.is_observed() { a.value() } else { unfavourable })
            .unwrap_or(unfavourable)
    };
    let body: f64 = positive.iter().map(|a| worst(a, 1.0)).sum();
    let head: f64 = negative.iter().map(|a| worst(a, 0.0)).sum();
    body - head + 1.0 - positive.len() as f64
}
