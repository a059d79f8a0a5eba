//! Function and constraint definitions carried by ground rules.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AtomId;

/// A real-valued function of ground atom truth values.
///
/// The term generator only accepts linear sums, hinges of linear sums
/// (`max(linear, 0)`) and squares of those; the other shapes can be built
/// and evaluated but are rejected when turned into optimization terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FunctionTerm {
    Constant(f64),
    Atom(AtomId),
    Summand { coefficient: f64, term: Box<FunctionTerm> },
    Sum(Vec<FunctionTerm>),
    Max(Vec<FunctionTerm>),
    Squared(Box<FunctionTerm>),
}

impl FunctionTerm {
    pub fn summand(coefficient: f64, atom: AtomId) -> Self {
        FunctionTerm::Summand {
            coefficient,
            term: Box::new(FunctionTerm::Atom(atom)),
        }
    }

    /// `Σ cᵢ·atomᵢ + constant`.
    pub fn linear(summands: impl IntoIterator<Item = (f64, AtomId)>, constant: f64) -> Self {
        let mut terms: Vec<FunctionTerm> = summands
            .into_iter()
            .map(|(c, atom)| FunctionTerm::summand(c, atom))
            .collect();
        if constant != 0.0 {
            terms.push(FunctionTerm::Constant(constant));
        }
        FunctionTerm::Sum(terms)
    }

    /// `max(inner, 0)`.
    pub fn hinge(inner: FunctionTerm) -> Self {
        FunctionTerm::Max(vec![inner, FunctionTerm::Constant(0.0)])
    }

    pub fn squared(inner: FunctionTerm) -> Self {
        FunctionTerm::Squared(Box::new(inner))
    }

    pub fn value<F>(&self, truth: &F) -> f64
    where
        F: Fn(AtomId) -> f64,
    {
        match self {
            FunctionTerm::Constant(c) => *c,
            FunctionTerm::Atom(id) => truth(*id),
            FunctionTerm::Summand { coefficient, term } => coefficient * term.value(truth),
            FunctionTerm::Sum(terms) => terms.iter().map(|t| t.value(truth)).sum(),
            FunctionTerm::Max(terms) => terms
                .iter()
                .map(|t| t.value(truth))
                .fold(f64::NEG_INFINITY, f64::max),
            FunctionTerm::Squared(inner) => inner.value(truth).powi(2),
        }
    }

    /// Distinct atoms in order of first appearance.
    pub fn atoms(&self) -> Vec<AtomId> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<AtomId>) {
        match self {
            FunctionTerm::Constant(_) => {}
            FunctionTerm::Atom(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            FunctionTerm::Summand { term, .. } => term.collect_atoms(out),
            FunctionTerm::Sum(terms) | FunctionTerm::Max(terms) => {
                terms.iter().for_each(|t| t.collect_atoms(out))
            }
            FunctionTerm::Squared(inner) => inner.collect_atoms(out),
        }
    }

    /// Linear summands `(coefficient, atom)` and the constant part, if this
    /// is a constant, an atom, a summand of either, or a sum of those.
    pub fn as_linear(&self) -> Option<(Vec<(f64, AtomId)>, f64)> {
        fn walk(term: &FunctionTerm, scale: f64, out: &mut Vec<(f64, AtomId)>, constant: &mut f64, depth: u8) -> bool {
            match term {
                FunctionTerm::Constant(c) => {
                    *constant += scale * c;
                    true
                }
                FunctionTerm::Atom(id) => {
                    out.push((scale, *id));
                    true
                }
                FunctionTerm::Summand { coefficient, term } => match **term {
                    FunctionTerm::Constant(_) | FunctionTerm::Atom(_) => {
                        walk(term, scale * coefficient, out, constant, depth)
                    }
                    _ => false,
                },
                FunctionTerm::Sum(terms) if depth == 0 => {
                    terms.iter().all(|t| walk(t, scale, out, constant, depth + 1))
                }
                _ => false,
            }
        }
        let mut summands = Vec::new();
        let mut constant = 0.0;
        walk(self, 1.0, &mut summands, &mut constant, 0).then_some((summands, constant))
    }

    /// If this is `max(linear, 0)` or `max(0, linear)`, the linear part.
    pub fn as_hinge(&self) -> Option<&FunctionTerm> {
        match self {
            FunctionTerm::Max(terms) if terms.len() == 2 => match (&terms[0], &terms[1]) {
                (FunctionTerm::Constant(z), inner) | (inner, FunctionTerm::Constant(z))
                    if *z == 0.0 && inner.as_linear().is_some() =>
                {
                    Some(inner)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical token stream used to detect duplicate ground rules.
    ///
    /// Linear sums are normalised (summands merged per atom and sorted), so
    /// two groundings that reach the same atoms with the same signs agree.
    pub(crate) fn signature(&self, out: &mut Vec<u64>) {
        if let Some((summands, constant)) = self.as_linear() {
            let mut merged: BTreeMap<AtomId, f64> = BTreeMap::new();
            for (c, atom) in summands {
                *merged.entry(atom).or_insert(0.0) += c;
            }
            out.push(1);
            out.push(merged.len() as u64);
            for (atom, c) in merged {
                out.push(atom.0 as u64);
                out.push(canonical_bits(c));
            }
            out.push(canonical_bits(constant));
            return;
        }
        match self {
            FunctionTerm::Max(terms) => {
                out.push(2);
                out.push(terms.len() as u64);
                terms.iter().for_each(|t| t.signature(out));
            }
            FunctionTerm::Squared(inner) => {
                out.push(3);
                inner.signature(out);
            }
            FunctionTerm::Sum(terms) => {
                out.push(4);
                out.push(terms.len() as u64);
                terms.iter().for_each(|t| t.signature(out));
            }
            FunctionTerm::Summand { coefficient, term } => {
                out.push(5);
                out.push(canonical_bits(*coefficient));
                term.signature(out);
            }
            // Constants and atoms are linear and handled above.
            FunctionTerm::Constant(_) | FunctionTerm::Atom(_) => {}
        }
    }
}

fn canonical_bits(value: f64) -> u64 {
    // -0.0 and 0.0 compare equal; give them one encoding.
    (value + 0.0).to_bits()
}

impl fmt::Display for FunctionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionTerm::Constant(c) => write!(f, "{}", c),
            FunctionTerm::Atom(id) => write!(f, "{}", id),
            FunctionTerm::Summand { coefficient, term } => write!(f, "{} * {}", coefficient, term),
            FunctionTerm::Sum(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            FunctionTerm::Max(terms) => {
                write!(f, "max(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            FunctionTerm::Squared(inner) => write!(f, "{}^2", inner),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    LessThanEqual,
    GreaterThanEqual,
    Equal,
}

impl Comparator {
    /// Amount by which `lhs comparator rhs` is violated.
    pub fn violation(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Comparator::LessThanEqual => (lhs - rhs).max(0.0),
            Comparator::GreaterThanEqual => (rhs - lhs).max(0.0),
            Comparator::Equal => (lhs - rhs).abs(),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::LessThanEqual => "<=",
            Comparator::GreaterThanEqual => ">=",
            Comparator::Equal => "=",
        };
        write!(f, "{}", symbol)
    }
}

/// `function comparator value`, a hard constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    pub function: FunctionTerm,
    pub comparator: Comparator,
    pub value: f64,
}

impl ConstraintDefinition {
    pub fn new(function: FunctionTerm, comparator: Comparator, value: f64) -> Self {
        ConstraintDefinition {
            function,
            comparator,
            value,
        }
    }

    pub fn violation<F>(&self, truth: &F) -> f64
    where
        F: Fn(AtomId) -> f64,
    {
        self.comparator.violation(self.function.value(truth), self.value)
    }
}

impl fmt::Display for ConstraintDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.function, self.comparator, self.value)
    }
}
