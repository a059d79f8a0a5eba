//! In-memory relational store of ground atoms.
//!
//! Atoms live in an arena and are addressed by [`AtomId`]. Every other layer
//! (ground rules, terms, consensus variables) refers to atoms by id only.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use softlogic_ir::{Constant, Predicate, PredicateRegistry};

use crate::{GroundingError, GroundingResult};

/// Stable arena index of a ground atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub u32);

impl AtomId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomKind {
    /// Value is evidence and never changes during inference.
    Observed,
    /// Value is solved for by inference.
    RandomVariable,
}

/// A predicate applied to constants, with a soft truth value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundAtom {
    id: AtomId,
    predicate: String,
    args: Vec<Constant>,
    value: f64,
    committed: f64,
    kind: AtomKind,
    materialized: bool,
}

impl GroundAtom {
    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn args(&self) -> &[Constant] {
        &self.args
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value recorded by the last [`Database::commit`].
    pub fn committed_value(&self) -> f64 {
        self.committed
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    pub fn is_observed(&self) -> bool {
        self.kind == AtomKind::Observed
    }

    /// Observed atoms keep their value through inference.
    pub fn is_fixed(&self) -> bool {
        self.is_observed()
    }

    /// Materialized atoms are visible to queries. Atoms created on demand
    /// while grounding (lazy atoms) are not, until activated.
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }
}

impl fmt::Display for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.join(", "))
    }
}

/// Lookup and on-demand creation of ground atoms.
pub trait AtomStore {
    fn atom(&self, id: AtomId) -> Option<&GroundAtom>;

    fn get_atom(&self, predicate: &str, args: &[Constant]) -> Option<AtomId>;

    fn has_atom(&self, predicate: &str, args: &[Constant]) -> bool {
        self.get_atom(predicate, args).is_some()
    }

    /// Find an atom, creating it if it does not exist.
    ///
    /// Missing atoms of closed predicates are observed with value 0. Missing
    /// atoms of open predicates become lazy random variables with value 0.
    fn get_or_create_atom(&mut self, predicate: &str, args: Vec<Constant>) -> GroundingResult<AtomId>;

    fn is_closed(&self, predicate: &str) -> bool;
}

type AtomKey = (String, Vec<Constant>);

/// Arena-backed atom store with a predicate registry.
#[derive(Clone, Debug, Default)]
pub struct Database {
    predicates: PredicateRegistry,
    atoms: Vec<Option<GroundAtom>>,
    index: HashMap<AtomKey, AtomId>,
    by_predicate: HashMap<String, Vec<AtomId>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicates(predicates: PredicateRegistry) -> Self {
        Database {
            predicates,
            ..Self::default()
        }
    }

    pub fn register_predicate(&mut self, predicate: Predicate) -> GroundingResult<()> {
        self.predicates.register(predicate)?;
        Ok(())
    }

    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    /// Add or overwrite an observed atom.
    pub fn add_observation<S: Into<String>>(
        &mut self,
        predicate: &str,
        args: Vec<S>,
        value: f64,
    ) -> GroundingResult<AtomId> {
        let args: Vec<Constant> = args.into_iter().map(Into::into).collect();
        self.predicates.validate_args(predicate, args.len())?;
        check_truth_value(predicate, &args, value)?;
        let id = self.get_or_insert(predicate, args, AtomKind::Observed, value);
        if let Some(atom) = self.slot_mut(id) {
            atom.kind = AtomKind::Observed;
            atom.value = value;
            atom.committed = value;
            atom.materialized = true;
        }
        Ok(id)
    }

    /// Add a random variable atom with an initial value.
    pub fn add_target<S: Into<String>>(
        &mut self,
        predicate: &str,
        args: Vec<S>,
        initial_value: f64,
    ) -> GroundingResult<AtomId> {
        let args: Vec<Constant> = args.into_iter().map(Into::into).collect();
        self.predicates.validate_args(predicate, args.len())?;
        if self.predicates.is_closed(predicate) {
            return Err(GroundingError::ClosedPredicate {
                predicate: predicate.to_string(),
            });
        }
        check_truth_value(predicate, &args, initial_value)?;
        let id = self.get_or_insert(predicate, args, AtomKind::RandomVariable, initial_value);
        if let Some(atom) = self.slot_mut(id) {
            if atom.is_observed() {
                return Err(GroundingError::ObservedAtom {
                    atom: atom.to_string(),
                });
            }
            atom.value = initial_value;
            atom.materialized = true;
        }
        Ok(id)
    }

    fn get_or_insert(&mut self, predicate: &str, args: Vec<Constant>, kind: AtomKind, value: f64) -> AtomId {
        let key = (predicate.to_string(), args);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = AtomId(self.atoms.len() as u32);
        let (predicate, args) = key.clone();
        self.atoms.push(Some(GroundAtom {
            id,
            predicate: predicate.clone(),
            args,
            value,
            committed: value,
            kind,
            materialized: false,
        }));
        self.index.insert(key, id);
        self.by_predicate.entry(predicate).or_default().push(id);
        id
    }

    fn slot_mut(&mut self, id: AtomId) -> Option<&mut GroundAtom> {
        self.atoms.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> GroundingResult<&mut GroundAtom> {
        self.slot_mut(id).ok_or(GroundingError::UnknownAtom(id))
    }

    /// Set the value of a random variable, clamped to [0, 1].
    pub fn set_value(&mut self, id: AtomId, value: f64) -> GroundingResult<()> {
        let atom = self.atom_mut(id)?;
        if atom.is_observed() {
            return Err(GroundingError::ObservedAtom {
                atom: atom.to_string(),
            });
        }
        atom.value = value.clamp(0.0, 1.0);
        Ok(())
    }

    /// Turn an atom into evidence with the given value.
    pub fn observe(&mut self, id: AtomId, value: f64) -> GroundingResult<()> {
        let atom = self.atom_mut(id)?;
        check_truth_value(&atom.predicate, &atom.args, value)?;
        atom.kind = AtomKind::Observed;
        atom.value = value;
        atom.committed = value;
        atom.materialized = true;
        Ok(())
    }

    /// Make a lazy atom visible to queries. Returns `true` if it was lazy.
    pub fn activate(&mut self, id: AtomId) -> GroundingResult<bool> {
        let atom = self.atom_mut(id)?;
        let was_lazy = !atom.materialized;
        atom.materialized = true;
        Ok(was_lazy)
    }

    /// Random variables created on demand that are not yet materialized.
    pub fn lazy_atoms(&self) -> Vec<AtomId> {
        self.iter()
            .filter(|a| !a.materialized && !a.is_observed())
            .map(GroundAtom::id)
            .collect()
    }

    /// Remove an atom. Its id is never reused.
    pub fn remove_atom(&mut self, id: AtomId) -> GroundingResult<GroundAtom> {
        let atom = self
            .atoms
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(GroundingError::UnknownAtom(id))?;
        self.index.remove(&(atom.predicate.clone(), atom.args.clone()));
        if let Some(ids) = self.by_predicate.get_mut(&atom.predicate) {
            ids.retain(|other| *other != id);
        }
        Ok(atom)
    }

    /// Record current random variable values as committed.
    ///
    /// Returns the number of atoms whose committed value changed.
    pub fn commit(&mut self) -> usize {
        let mut changed = 0;
        for atom in self.atoms.iter_mut().flatten() {
            if !atom.is_observed() && atom.committed != atom.value {
                atom.committed = atom.value;
                changed += 1;
            }
        }
        changed
    }

    /// Materialized atoms of a predicate.
    pub fn atoms_of(&self, predicate: &str) -> impl Iterator<Item = &GroundAtom> {
        self.by_predicate
            .get(predicate)
            .into_iter()
            .flatten()
            .filter_map(|id| self.atom(*id))
            .filter(|a| a.materialized)
    }

    pub(crate) fn candidate_count(&self, predicate: &str) -> usize {
        self.by_predicate.get(predicate).map_or(0, Vec::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroundAtom> {
        self.atoms.iter().flatten()
    }

    pub fn random_variables(&self) -> impl Iterator<Item = &GroundAtom> {
        self.iter().filter(|a| !a.is_observed())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn check_truth_value(predicate: &str, args: &[Constant], value: f64) -> GroundingResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GroundingError::InvalidTruthValue {
            atom: format!("{}({})", predicate, args.join(", ")),
            value,
        })
    }
}

impl AtomStore for Database {
    fn atom(&self, id: AtomId) -> Option<&GroundAtom> {
        self.atoms.get(id.index()).and_then(Option::as_ref)
    }

    fn get_atom(&self, predicate: &str, args: &[Constant]) -> Option<AtomId> {
        self.index
            .get(&(predicate.to_string(), args.to_vec()))
            .copied()
    }

    fn get_or_create_atom(&mut self, predicate: &str, args: Vec<Constant>) -> GroundingResult<AtomId> {
        if let Some(id) = self.get_atom(predicate, &args) {
            return Ok(id);
        }
        self.predicates.validate_args(predicate, args.len())?;
        let kind = if self.predicates.is_closed(predicate) {
            AtomKind::Observed
        } else {
            AtomKind::RandomVariable
        };
        Ok(self.get_or_insert(predicate, args, kind, 0.0))
    }

    fn is_closed(&self, predicate: &str) -> bool {
        self.predicates.is_closed(predicate)
    }
}
