//! Analysis of a formula's DNF clauses for grounding.
//!
//! Each clause of the DNF is split into positive and negative literals. The
//! positive literals form the query used to enumerate groundings; the
//! negative literals must only mention variables the query binds.

use indexmap::{IndexMap, IndexSet};

use crate::normal_forms::{dnf_clause_count, dnf_clauses};
use crate::{to_nnf, Atom, Formula, IrError, IrResult, VariableAssignment};

/// A single conjunction of literals from a DNF.
#[derive(Clone, Debug, PartialEq)]
pub struct DnfClause {
    positive: Vec<Atom>,
    negative: Vec<Atom>,
    all_variables_bound: bool,
    unbound_variables: Vec<String>,
    dependence: IndexMap<String, Vec<Atom>>,
}

impl DnfClause {
    fn from_literals(literals: Vec<Formula>) -> IrResult<Self> {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for literal in literals {
            match literal {
                Formula::Atom(atom) => positive.push(atom),
                Formula::Not(inner) => match *inner {
                    Formula::Atom(atom) => negative.push(atom),
                    other => {
                        return Err(IrError::NegatedNonAtom {
                            formula: other.to_string(),
                        })
                    }
                },
                other => {
                    return Err(IrError::NotInDnf {
                        formula: other.to_string(),
                    })
                }
            }
        }

        let bound: IndexSet<String> = positive.iter().flat_map(Atom::variables).collect();
        let unbound_variables: Vec<String> = negative
            .iter()
            .flat_map(Atom::variables)
            .filter(|v| !bound.contains(v))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let mut dependence: IndexMap<String, Vec<Atom>> = IndexMap::new();
        for atom in &positive {
            dependence
                .entry(atom.predicate.clone())
                .or_default()
                .push(atom.clone());
        }

        Ok(DnfClause {
            all_variables_bound: unbound_variables.is_empty(),
            unbound_variables,
            positive,
            negative,
            dependence,
        })
    }

    pub fn positive_literals(&self) -> &[Atom] {
        &self.positive
    }

    pub fn negative_literals(&self) -> &[Atom] {
        &self.negative
    }

    /// Every variable in a negative literal also appears in a positive one.
    pub fn all_variables_bound(&self) -> bool {
        self.all_variables_bound
    }

    pub fn unbound_variables(&self) -> &[String] {
        &self.unbound_variables
    }

    /// No literal mentions a variable.
    pub fn is_ground(&self) -> bool {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .all(Atom::is_ground)
    }

    /// Distinct variables of the clause in order of first appearance.
    pub fn variables(&self) -> IndexSet<String> {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .flat_map(Atom::variables)
            .collect()
    }

    /// The conjunction of positive literals, or `None` if there are none.
    pub fn query(&self) -> Option<Formula> {
        match self.positive.len() {
            0 => None,
            1 => Some(Formula::Atom(self.positive[0].clone())),
            _ => Some(Formula::And(
                self.positive.iter().cloned().map(Formula::Atom).collect(),
            )),
        }
    }

    /// Positive literal templates, grouped by predicate.
    pub fn dependence(&self) -> &IndexMap<String, Vec<Atom>> {
        &self.dependence
    }

    /// Variable assignments that make some positive literal of `predicate`
    /// equal to the ground atom with the given constants.
    ///
    /// One assignment is produced per matching template; the caller grounds
    /// the clause once under each of them.
    pub fn trace_atom_event(&self, predicate: &str, constants: &[String]) -> Vec<VariableAssignment> {
        let Some(templates) = self.dependence.get(predicate) else {
            return Vec::new();
        };
        let empty = VariableAssignment::new();
        let mut out: IndexSet<Vec<(String, String)>> = IndexSet::new();
        for template in templates {
            if let Some(assignment) = template.unify(constants, &empty) {
                out.insert(assignment.into_iter().collect());
            }
        }
        out.into_iter()
            .map(|pairs| pairs.into_iter().collect())
            .collect()
    }
}

/// The DNF clauses of a formula.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaAnalysis {
    clauses: Vec<DnfClause>,
}

impl FormulaAnalysis {
    /// Analyse `formula`, refusing DNF expansions above `max_clauses` clauses.
    pub fn new(formula: &Formula, max_clauses: usize) -> IrResult<Self> {
        let nnf = to_nnf(formula);
        let count = dnf_clause_count(&nnf);
        if count > max_clauses as u128 {
            return Err(IrError::DnfTooLarge {
                clauses: count,
                limit: max_clauses,
            });
        }
        let clauses = dnf_clauses(&nnf)
            .into_iter()
            .map(DnfClause::from_literals)
            .collect::<IrResult<Vec<_>>>()?;
        Ok(FormulaAnalysis { clauses })
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clause(&self, index: usize) -> Option<&DnfClause> {
        self.clauses.get(index)
    }

    pub fn clauses(&self) -> &[DnfClause] {
        &self.clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Term;

    fn friends_rule() -> Formula {
        Formula::implies(
            Formula::and(
                Formula::atom("Friends", vec![Term::var("a"), Term::var("b")]),
                Formula::atom("Votes", vec![Term::var("a"), Term::var("p")]),
            ),
            Formula::atom("Votes", vec![Term::var("b"), Term::var("p")]),
        )
    }

    #[test]
    fn test_negated_rule_analysis() {
        let analysis = FormulaAnalysis::new(&Formula::negate(friends_rule()), 64).unwrap();
        assert_eq!(analysis.num_clauses(), 1);

        let clause = analysis.clause(0).unwrap();
        assert_eq!(clause.positive_literals().len(), 2);
        assert_eq!(clause.negative_literals().len(), 1);
        assert!(clause.all_variables_bound());
        assert!(!clause.is_ground());
        assert!(matches!(clause.query(), Some(Formula::And(ref ops)) if ops.len() == 2));
    }

    #[test]
    fn test_unbound_negative_variable() {
        let rule = Formula::implies(
            Formula::atom("A", vec![Term::var("x")]),
            Formula::atom("B", vec![Term::var("x"), Term::var("y")]),
        );
        let analysis = FormulaAnalysis::new(&Formula::negate(rule), 64).unwrap();
        let clause = analysis.clause(0).unwrap();
        assert!(!clause.all_variables_bound());
        assert_eq!(clause.unbound_variables(), &["y".to_string()]);
    }

    #[test]
    fn test_trace_atom_event() {
        let analysis = FormulaAnalysis::new(&Formula::negate(friends_rule()), 64).unwrap();
        let clause = analysis.clause(0).unwrap();

        let bindings = clause.trace_atom_event("Votes", &["alice".into(), "dem".into()]);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].get("a").map(String::as_str), Some("alice"));
        assert_eq!(bindings[0].get("p").map(String::as_str), Some("dem"));

        // Votes in the head is a negative literal and is not traced.
        assert!(clause.trace_atom_event("Missing", &["x".into()]).is_empty());
    }

    #[test]
    fn test_trace_self_join_yields_each_position() {
        let rule = Formula::implies(
            Formula::and(
                Formula::atom("Link", vec![Term::var("a"), Term::var("b")]),
                Formula::atom("Link", vec![Term::var("b"), Term::var("c")]),
            ),
            Formula::atom("Path", vec![Term::var("a"), Term::var("c")]),
        );
        let analysis = FormulaAnalysis::new(&Formula::negate(rule), 64).unwrap();
        let bindings = analysis
            .clause(0)
            .unwrap()
            .trace_atom_event("Link", &["x".into(), "y".into()]);
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_disjunctive_body_yields_two_clauses() {
        let f = Formula::or(
            Formula::atom("A", vec![Term::var("x")]),
            Formula::atom("B", vec![Term::var("x")]),
        );
        assert_eq!(FormulaAnalysis::new(&f, 64).unwrap().num_clauses(), 2);
    }
}
