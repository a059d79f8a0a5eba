//! Atoms and first-order formulas.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{IrError, IrResult, Term, VariableAssignment};

/// A predicate applied to terms, e.g. `Friends(?a, bob)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Atom {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Atom {
            predicate: predicate.into(),
            args,
        }
    }

    /// Distinct variables in argument order.
    pub fn variables(&self) -> IndexSet<String> {
        self.args
            .iter()
            .filter_map(|t| match t {
                Term::Var(v) => Some(v.clone()),
                Term::Const(_) => None,
            })
            .collect()
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Term::is_const)
    }

    /// Substitute the assignment into the arguments.
    pub fn ground(&self, assignment: &VariableAssignment) -> IrResult<Vec<String>> {
        self.args
            .iter()
            .map(|t| {
                t.resolve(assignment).map(str::to_string).ok_or_else(|| {
                    IrError::UnboundVariable {
                        var: t.name().to_string(),
                        atom: self.to_string(),
                    }
                })
            })
            .collect()
    }

    /// Match this template against constants, extending `base`.
    ///
    /// Returns `None` if a constant argument disagrees or a variable would be
    /// bound to two different constants.
    pub fn unify(&self, constants: &[String], base: &VariableAssignment) -> Option<VariableAssignment> {
        if constants.len() != self.args.len() {
            return None;
        }
        let mut assignment = base.clone();
        for (term, value) in self.args.iter().zip(constants) {
            match term {
                Term::Const(c) if c != value => return None,
                Term::Const(_) => {}
                Term::Var(v) => match assignment.get(v) {
                    Some(bound) if bound != value => return None,
                    Some(_) => {}
                    None => {
                        assignment.insert(v.clone(), value.clone());
                    }
                },
            }
        }
        Some(assignment)
    }
}

/// A first-order formula over atoms.
///
/// `And` and `Or` are n-ary; use [`Formula::and`], [`Formula::or`] or the
/// checked [`Formula::conjunction`] / [`Formula::disjunction`] builders.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Formula {
    Atom(Atom),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Not(Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn atom(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Formula::Atom(Atom::new(predicate, args))
    }

    pub fn and(left: Formula, right: Formula) -> Self {
        Formula::And(vec![left, right])
    }

    pub fn or(left: Formula, right: Formula) -> Self {
        Formula::Or(vec![left, right])
    }

    pub fn negate(inner: Formula) -> Self {
        Formula::Not(Box::new(inner))
    }

    pub fn implies(body: Formula, head: Formula) -> Self {
        Formula::Implies(Box::new(body), Box::new(head))
    }

    pub fn conjunction(operands: Vec<Formula>) -> IrResult<Self> {
        if operands.len() < 2 {
            return Err(IrError::TooFewOperands {
                connective: "conjunction",
                actual: operands.len(),
            });
        }
        Ok(Formula::And(operands))
    }

    pub fn disjunction(operands: Vec<Formula>) -> IrResult<Self> {
        if operands.len() < 2 {
            return Err(IrError::TooFewOperands {
                connective: "disjunction",
                actual: operands.len(),
            });
        }
        Ok(Formula::Or(operands))
    }

    /// True for an atom or a negated atom.
    pub fn is_literal(&self) -> bool {
        match self {
            Formula::Atom(_) => true,
            Formula::Not(inner) => matches!(**inner, Formula::Atom(_)),
            _ => false,
        }
    }

    /// All atoms in left-to-right order, duplicates included.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Formula::Atom(a) => out.push(a),
            Formula::And(ops) | Formula::Or(ops) => ops.iter().for_each(|f| f.collect_atoms(out)),
            Formula::Not(inner) => inner.collect_atoms(out),
            Formula::Implies(l, r) => {
                l.collect_atoms(out);
                r.collect_atoms(out);
            }
        }
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> IndexSet<String> {
        self.atoms()
            .into_iter()
            .flat_map(|a| a.variables())
            .collect()
    }

    /// Merge nested operators of the same kind and drop duplicate operands.
    ///
    /// A connective left with a single operand collapses to that operand.
    pub fn flatten(&self) -> Formula {
        match self {
            Formula::Atom(_) => self.clone(),
            Formula::Not(inner) => Formula::negate(inner.flatten()),
            Formula::Implies(l, r) => Formula::implies(l.flatten(), r.flatten()),
            Formula::And(ops) => {
                let mut merged = IndexSet::new();
                for op in ops {
                    match op.flatten() {
                        Formula::And(inner) => merged.extend(inner),
                        other => {
                            merged.insert(other);
                        }
                    }
                }
                collapse(merged.into_iter().collect(), Formula::And)
            }
            Formula::Or(ops) => {
                let mut merged = IndexSet::new();
                for op in ops {
                    match op.flatten() {
                        Formula::Or(inner) => merged.extend(inner),
                        other => {
                            merged.insert(other);
                        }
                    }
                }
                collapse(merged.into_iter().collect(), Formula::Or)
            }
        }
    }

    /// Evaluate under a Boolean interpretation of atoms.
    pub fn evaluate<F>(&self, interpretation: &F) -> bool
    where
        F: Fn(&Atom) -> bool,
    {
        match self {
            Formula::Atom(a) => interpretation(a),
            Formula::And(ops) => ops.iter().all(|f| f.evaluate(interpretation)),
            Formula::Or(ops) => ops.iter().any(|f| f.evaluate(interpretation)),
            Formula::Not(inner) => !inner.evaluate(interpretation),
            Formula::Implies(l, r) => !l.evaluate(interpretation) || r.evaluate(interpretation),
        }
    }

    /// Negation appears only directly above atoms and there are no implications.
    pub fn is_nnf(&self) -> bool {
        match self {
            Formula::Atom(_) => true,
            Formula::Not(inner) => matches!(**inner, Formula::Atom(_)),
            Formula::And(ops) | Formula::Or(ops) => ops.iter().all(Formula::is_nnf),
            Formula::Implies(..) => false,
        }
    }

    pub fn nnf(&self) -> Formula {
        crate::to_nnf(self)
    }

    pub fn dnf(&self) -> Formula {
        crate::to_dnf(self)
    }

    /// A literal, a conjunction of literals, or a disjunction of those.
    pub fn is_dnf(&self) -> bool {
        fn is_clause(f: &Formula) -> bool {
            match f {
                Formula::And(ops) => ops.iter().all(Formula::is_literal),
                other => other.is_literal(),
            }
        }
        match self {
            Formula::Or(ops) => ops.iter().all(is_clause),
            other => is_clause(other),
        }
    }
}

fn collapse(mut ops: Vec<Formula>, wrap: fn(Vec<Formula>) -> Formula) -> Formula {
    if ops.len() == 1 {
        ops.remove(0)
    } else {
        wrap(ops)
    }
}

impl From<Atom> for Formula {
    fn from(atom: Atom) -> Self {
        Formula::Atom(atom)
    }
}
