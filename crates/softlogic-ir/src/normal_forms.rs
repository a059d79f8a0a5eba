//! Normal form transformations for formulas.
//!
//! The transformation follows these steps:
//! 1. Eliminate implications: `A → B` becomes `¬A ∨ B`
//! 2. Push negations inward using De Morgan's laws
//! 3. Distribute conjunction over disjunction
//! 4. Drop duplicate literals and clauses, keeping first occurrence order
//!
//! The output is canonical with respect to this procedure, so converting an
//! already converted formula returns it unchanged.

use indexmap::IndexSet;

use crate::{Formula, IrError, IrResult};

/// Convert a formula to Negation Normal Form (NNF).
///
/// ```
/// use softlogic_ir::{to_nnf, Formula};
///
/// let a = Formula::atom("A", vec![]);
/// let b = Formula::atom("B", vec![]);
/// let nnf = to_nnf(&Formula::negate(Formula::and(a.clone(), b.clone())));
/// assert_eq!(nnf, Formula::or(Formula::negate(a), Formula::negate(b)));
/// ```
pub fn to_nnf(formula: &Formula) -> Formula {
    match formula {
        Formula::Atom(_) => formula.clone(),
        Formula::And(ops) => Formula::And(ops.iter().map(to_nnf).collect()),
        Formula::Or(ops) => Formula::Or(ops.iter().map(to_nnf).collect()),
        Formula::Implies(body, head) => Formula::Or(vec![push_negation_inward(body), to_nnf(head)]),
        Formula::Not(inner) => push_negation_inward(inner),
    }
}

/// NNF of `¬formula`.
fn push_negation_inward(formula: &Formula) -> Formula {
    match formula {
        Formula::Atom(_) => Formula::negate(formula.clone()),
        // ¬¬A = A
        Formula::Not(inner) => to_nnf(inner),
        // ¬(A ∧ B) = ¬A ∨ ¬B
        Formula::And(ops) => Formula::Or(ops.iter().map(push_negation_inward).collect()),
        // ¬(A ∨ B) = ¬A ∧ ¬B
        Formula::Or(ops) => Formula::And(ops.iter().map(push_negation_inward).collect()),
        // ¬(A → B) = A ∧ ¬B
        Formula::Implies(body, head) => Formula::And(vec![to_nnf(body), push_negation_inward(head)]),
    }
}

/// Upper bound on the number of clauses DNF expansion of an NNF formula produces.
pub fn dnf_clause_count(nnf: &Formula) -> u128 {
    match nnf {
        Formula::Atom(_) | Formula::Not(_) | Formula::Implies(..) => 1,
        Formula::Or(ops) => ops
            .iter()
            .fold(0u128, |acc, f| acc.saturating_add(dnf_clause_count(f))),
        Formula::And(ops) => ops
            .iter()
            .fold(1u128, |acc, f| acc.saturating_mul(dnf_clause_count(f))),
    }
}

/// Convert a formula to Disjunctive Normal Form (DNF).
///
/// A single clause is returned without an enclosing disjunction and a clause
/// with one literal is returned as that literal.
pub fn to_dnf(formula: &Formula) -> Formula {
    from_clauses(dnf_clauses(&to_nnf(formula)))
}

/// Like [`to_dnf`], but refuses expansions above `max_clauses` clauses.
pub fn to_dnf_bounded(formula: &Formula, max_clauses: usize) -> IrResult<Formula> {
    let nnf = to_nnf(formula);
    let clauses = dnf_clause_count(&nnf);
    if clauses > max_clauses as u128 {
        return Err(IrError::DnfTooLarge {
            clauses,
            limit: max_clauses,
        });
    }
    Ok(from_clauses(dnf_clauses(&nnf)))
}

/// Clauses (conjunctions of literals) of an NNF formula, de-duplicated.
pub(crate) fn dnf_clauses(nnf: &Formula) -> Vec<Vec<Formula>> {
    let raw = distribute(nnf);
    let mut seen = IndexSet::new();
    for clause in raw {
        let literals: IndexSet<Formula> = clause.into_iter().collect();
        seen.insert(literals.into_iter().collect::<Vec<_>>());
    }
    seen.into_iter().collect()
}

fn distribute(nnf: &Formula) -> Vec<Vec<Formula>> {
    match nnf {
        Formula::Or(ops) => ops.iter().flat_map(distribute).collect(),
        Formula::And(ops) => {
            let mut acc: Vec<Vec<Formula>> = vec![Vec::new()];
            for op in ops {
                let right = distribute(op);
                let mut next = Vec::with_capacity(acc.len() * right.len());
                for left in &acc {
                    for clause in &right {
                        let mut merged = left.clone();
                        merged.extend(clause.iter().cloned());
                        next.push(merged);
                    }
                }
                acc = next;
            }
            acc
        }
        // Literals; implications never survive NNF.
        other => vec![vec![other.clone()]],
    }
}

fn from_clauses(clauses: Vec<Vec<Formula>>) -> Formula {
    let mut disjuncts: Vec<Formula> = clauses
        .into_iter()
        .map(|mut literals| {
            if literals.len() == 1 {
                literals.remove(0)
            } else {
                Formula::And(literals)
            }
        })
        .collect();
    if disjuncts.len() == 1 {
        disjuncts.remove(0)
    } else {
        Formula::Or(disjuncts)
    }
}
