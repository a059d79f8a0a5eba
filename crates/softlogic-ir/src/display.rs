//! Display trait implementations for IR types.

use std::fmt;

use crate::{Atom, Formula, Predicate, Term};

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "?{}", name),
            Term::Const(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)?;
        if self.closed {
            write!(f, " (closed)")?;
        }
        Ok(())
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, ops: &[Formula], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", op)?;
    }
    write!(f, ")")
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(atom) => write!(f, "{}", atom),
            Formula::And(ops) => write_joined(f, ops, "∧"),
            Formula::Or(ops) => write_joined(f, ops, "∨"),
            Formula::Not(inner) => write!(f, "¬{}", inner),
            Formula::Implies(body, head) => write!(f, "({} → {})", body, head),
        }
    }
}
