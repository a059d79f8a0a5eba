//! Arithmetic rules: linear (in)equalities over atoms.
//!
//! `Σ cᵢ·atomᵢ + Σ cⱼ·SUM(atomⱼ over xⱼ)  {≤, ≥, =}  constant`
//!
//! A summation atom expands, per grounding, to every materialized atom that
//! matches it with the summation variable left free.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use softlogic_ir::{Atom, Formula, Variable, VariableAssignment};

use crate::{
    AtomId, Comparator, ConstraintDefinition, FunctionTerm, GroundRule, GroundingError,
    GroundingResult, GroundingStore, Origin, ResultList, RuleId,
};

/// One term of the left-hand side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArithmeticSummand {
    Atom {
        coefficient: f64,
        atom: Atom,
    },
    /// `coefficient · Σ atom` over every value of `variable`.
    Sum {
        coefficient: f64,
        atom: Atom,
        variable: Variable,
    },
}

impl ArithmeticSummand {
    pub fn atom(&self) -> &Atom {
        match self {
            ArithmeticSummand::Atom { atom, .. } | ArithmeticSummand::Sum { atom, .. } => atom,
        }
    }

    pub fn coefficient(&self) -> f64 {
        match self {
            ArithmeticSummand::Atom { coefficient, .. } | ArithmeticSummand::Sum { coefficient, .. } => *coefficient,
        }
    }

    fn sum_variable(&self) -> Option<&str> {
        match self {
            ArithmeticSummand::Sum { variable, .. } => Some(variable),
            ArithmeticSummand::Atom { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArithmeticExpression {
    pub summands: Vec<ArithmeticSummand>,
    pub comparator: Comparator,
    pub constant: f64,
}

impl ArithmeticExpression {
    /// An expression with no summands yet; add them with the builders.
    pub fn new(comparator: Comparator, constant: f64) -> Self {
        ArithmeticExpression {
            summands: Vec::new(),
            comparator,
            constant,
        }
    }

    pub fn with_atom(mut self, coefficient: f64, atom: Atom) -> Self {
        self.summands.push(ArithmeticSummand::Atom { coefficient, atom });
        self
    }

    /// Add a summation over `variable`, which must appear in `atom` and
    /// nowhere else.
    pub fn with_sum(mut self, coefficient: f64, atom: Atom, variable: impl Into<Variable>) -> Self {
        self.summands.push(ArithmeticSummand::Sum {
            coefficient,
            atom,
            variable: variable.into(),
        });
        self
    }
}

impl fmt::Display for ArithmeticExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.summands.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            match s {
                ArithmeticSummand::Atom { coefficient, atom } => write!(f, "{} * {}", coefficient, atom)?,
                ArithmeticSummand::Sum {
                    coefficient,
                    atom,
                    variable,
                } => write!(f, "{} * SUM[{}]({})", coefficient, variable, atom)?,
            }
        }
        write!(f, " {} {}", self.comparator, self.constant)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArithmeticRule {
    expression: ArithmeticExpression,
    query: Formula,
    projection: Vec<Variable>,
    weight: Option<f64>,
    squared: bool,
}

impl ArithmeticRule {
    /// Validate the expression and derive the grounding query. `None` weight
    /// makes a hard constraint.
    pub fn new(expression: ArithmeticExpression, weight: Option<f64>, squared: bool) -> GroundingResult<Self> {
        let invalid = |reason: String| GroundingError::InvalidRule {
            rule: expression.to_string(),
            reason,
        };
        if let Some(w) = weight {
            if !w.is_finite() {
                return Err(GroundingError::InvalidWeight { weight: w });
            }
        }
        if expression.summands.is_empty() {
            return Err(invalid("expression has no summands".to_string()));
        }

        let sum_variables: IndexSet<&str> = expression
            .summands
            .iter()
            .filter_map(ArithmeticSummand::sum_variable)
            .collect();
        for summand in &expression.summands {
            let vars = summand.atom().variables();
            if let Some(v) = summand.sum_variable() {
                if !vars.contains(v) {
                    return Err(invalid(format!("summation variable {} does not appear in {}", v, summand.atom())));
                }
            }
            for v in &vars {
                if sum_variables.contains(v.as_str()) && summand.sum_variable() != Some(v.as_str()) {
                    return Err(invalid(format!("summation variable {} is used outside its summation", v)));
                }
            }
        }

        let mut atoms: Vec<Formula> = expression
            .summands
            .iter()
            .map(|s| Formula::Atom(s.atom().clone()))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        let query = if atoms.len() == 1 {
            atoms.remove(0)
        } else {
            Formula::And(atoms)
        };
        let projection = query
            .variables()
            .into_iter()
            .filter(|v| !sum_variables.contains(v.as_str()))
            .collect();

        Ok(ArithmeticRule {
            expression,
            query,
            projection,
            weight,
            squared,
        })
    }

    pub fn expression(&self) -> &ArithmeticExpression {
        &self.expression
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
        ArithmeticRule {
            weight: Some(weight),
            squared,
            ..self.clone()
        }
    }

    /// Atoms of every summand, summations included.
    pub fn query_atoms(&self) -> Vec<&Atom> {
        self.expression.summands.iter().map(ArithmeticSummand::atom).collect()
    }

    pub(crate) fn query(&self, db: &impl GroundingStore, partial: &VariableAssignment) -> GroundingResult<ResultList> {
        db.execute_query(&self.query, partial, &self.projection)
    }

    pub(crate) fn trace(&self, predicate: &str, args: &[String]) -> Vec<VariableAssignment> {
        let empty = VariableAssignment::new();
        let mut out: IndexSet<Vec<(String, String)>> = IndexSet::new();
        for summand in &self.expression.summands {
            let atom = summand.atom();
            if atom.predicate != predicate {
                continue;
            }
            if let Some(mut assignment) = atom.unify(args, &empty) {
                if let Some(v) = summand.sum_variable() {
                    assignment.shift_remove(v);
                }
                out.insert(assignment.into_iter().collect());
            }
        }
        out.into_iter().map(|pairs| pairs.into_iter().collect()).collect()
    }

    pub(crate) fn instantiate(
        &self,
        id: RuleId,
        db: &mut impl GroundingStore,
        rows: &ResultList,
    ) -> GroundingResult<Vec<GroundRule>> {
        let mut out = Vec::with_capacity(rows.len());
        for (row, assignment) in rows.rows().iter().zip(rows.assignments()) {
            let mut summands: Vec<(f64, AtomId)> = Vec::new();
            for summand in &self.expression.summands {
                match summand {
                    ArithmeticSummand::Atom { coefficient, atom } => {
                        let args = atom.ground(&assignment)?;
                        summands.push((*coefficient, db.get_or_create_atom(&atom.predicate, args)?));
                    }
                    ArithmeticSummand::Sum {
                        coefficient,
                        atom,
                        variable,
                    } => {
                        let matches = db.execute_query(
                            &Formula::Atom(atom.clone()),
                            &assignment,
                            std::slice::from_ref(variable),
                        )?;
                        for value in matches.rows().iter().filter_map(|r| r.first()) {
                            let mut expanded = assignment.clone();
                            expanded.insert(variable.clone(), value.clone());
                            let args = atom.ground(&expanded)?;
                            summands.push((*coefficient, db.get_or_create_atom(&atom.predicate, args)?));
                        }
                    }
                }
            }
            self.emit(id, row, summands, &mut out);
        }
        Ok(out)
    }

    fn emit(&self, id: RuleId, row: &[String], summands: Vec<(f64, AtomId)>, out: &mut Vec<GroundRule>) {
        let constant = self.expression.constant;
        let Some(weight) = self.weight else {
            out.push(GroundRule::constraint(
                Origin::with_bindings(id, row.to_vec(), 0),
                ConstraintDefinition::new(
                    FunctionTerm::linear(summands, 0.0),
                    self.expression.comparator,
                    constant,
                ),
            ));
            return;
        };

        let below = || FunctionTerm::linear(summands.iter().copied(), -constant);
        let above = || FunctionTerm::linear(summands.iter().map(|(c, a)| (-c, *a)), constant);
        let parts = match self.expression.comparator {
            Comparator::LessThanEqual => vec![below()],
            Comparator::GreaterThanEqual => vec![above()],
            Comparator::Equal => vec![below(), above()],
        };
        for (part, linear) in parts.into_iter().enumerate() {
            let hinge = FunctionTerm::hinge(linear);
            let function = if self.squared {
                FunctionTerm::squared(hinge)
            } else {
                hinge
            };
            out.push(GroundRule::weighted(
                Origin::with_bindings(id, row.to_vec(), part as u8),
                weight,
                function,
            ));
        }
    }
}
