//! Terms: variables and constants.

use serde::{Deserialize, Serialize};

/// A variable name inside a formula.
pub type Variable = String;

/// A constant appearing as an argument of a ground atom.
pub type Constant = String;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Var(Variable),
    Const(Constant),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Term::Const(name.into())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Term::Const(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Term::Var(n) | Term::Const(n) => n,
        }
    }

    /// Resolve this term under an assignment. Returns `None` for an unbound variable.
    pub fn resolve<'a>(&'a self, assignment: &'a crate::VariableAssignment) -> Option<&'a str> {
        match self {
            Term::Const(c) => Some(c),
            Term::Var(v) => assignment.get(v).map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableAssignment;

    #[test]
    fn test_term_kinds() {
        assert!(Term::var("x").is_var());
        assert!(Term::constant("alice").is_const());
        assert_eq!(Term::var("x").name(), "x");
    }

    #[test]
    fn test_resolve() {
        let mut assignment = VariableAssignment::new();
        assignment.insert("x".to_string(), "alice".to_string());

        assert_eq!(Term::var("x").resolve(&assignment), Some("alice"));
        assert_eq!(Term::var("y").resolve(&assignment), None);
        assert_eq!(Term::constant("bob").resolve(&assignment), Some("bob"));
    }
}
