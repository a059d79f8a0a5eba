//! Predicates and the predicate registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Atom, IrError, IrResult};

/// A named relation with a fixed arity.
///
/// Closed predicates are fully observed: any atom of a closed predicate that is
/// not present in the data is taken to be false. Open predicates hold the
/// random variables that inference solves for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    pub arg_types: Vec<String>,
    pub arity: usize,
    pub closed: bool,
}

impl Predicate {
    pub fn new(name: impl Into<String>, arg_types: Vec<impl Into<String>>) -> Self {
        let arg_types: Vec<String> = arg_types.into_iter().map(Into::into).collect();
        let arity = arg_types.len();
        Predicate {
            name: name.into(),
            arg_types,
            arity,
            closed: false,
        }
    }

    /// Create a predicate without argument type names.
    pub fn untyped(name: impl Into<String>, arity: usize) -> Self {
        Predicate {
            name: name.into(),
            arg_types: Vec::new(),
            arity,
            closed: false,
        }
    }

    /// Mark the predicate as closed (fully observed).
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn matches_arity(&self, arg_count: usize) -> bool {
        self.arity == arg_count
    }
}

/// Registry of predicates, keyed by name in registration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateRegistry {
    predicates: IndexMap<String, Predicate>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate. Re-registering a name with the same arity
    /// replaces the previous entry; a different arity is rejected.
    pub fn register(&mut self, predicate: Predicate) -> IrResult<()> {
        if let Some(existing) = self.predicates.get(&predicate.name) {
            if existing.arity != predicate.arity {
                return Err(IrError::ArityMismatch {
                    name: predicate.name,
                    expected: existing.arity,
                    actual: predicate.arity,
                });
            }
        }
        self.predicates.insert(predicate.name.clone(), predicate);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn is_closed(&self, name: &str) -> bool {
        self.predicates.get(name).is_some_and(|p| p.closed)
    }

    /// Check that an atom names a registered predicate with the right arity.
    pub fn validate_atom(&self, atom: &Atom) -> IrResult<()> {
        self.validate_args(&atom.predicate, atom.args.len())
    }

    pub fn validate_args(&self, name: &str, arg_count: usize) -> IrResult<()> {
        let predicate = self
            .predicates
            .get(name)
            .ok_or_else(|| IrError::PredicateNotFound {
                name: name.to_string(),
            })?;
        if !predicate.matches_arity(arg_count) {
            return Err(IrError::ArityMismatch {
                name: name.to_string(),
                expected: predicate.arity,
                actual: arg_count,
            });
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.values()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
