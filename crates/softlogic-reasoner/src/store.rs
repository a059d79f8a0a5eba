//! Term store: ADMM terms plus the consensus variables they share.
//!
//! Every random variable that appears in at least one term owns one
//! consensus slot. Each slot keeps a list of [`LocalRecord`]s pointing at
//! the term-local copies of it, which the consensus step averages.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use softlogic_grounding::{AtomId, AtomStore, Database, GroundAtom, GroundRuleId, GroundingResult};

use crate::{AdmmTerm, ReasonerError, ReasonerResult};

/// Where the consensus values start on [`TermStore::reset`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialValue {
    /// The atom's current value in the store.
    #[default]
    Atom,
    Zero,
    Random,
}

/// A term-local copy of a consensus variable: term index and slot in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalRecord {
    pub term: usize,
    pub slot: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TermStore {
    terms: Vec<AdmmTerm>,
    consensus: Vec<f64>,
    fixed: Vec<bool>,
    atoms: Vec<AtomId>,
    index: HashMap<AtomId, usize>,
    records: Vec<Vec<LocalRecord>>,
    num_local_variables: usize,
}

impl TermStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_capacity(&mut self, terms: usize) {
        self.terms.reserve(terms.saturating_sub(self.terms.len()));
    }

    pub fn ensure_variable_capacity(&mut self, variables: usize) {
        let extra = variables.saturating_sub(self.consensus.len());
        self.consensus.reserve(extra);
        self.fixed.reserve(extra);
        self.atoms.reserve(extra);
        self.records.reserve(extra);
        self.index.reserve(extra);
    }

    /// Consensus index for an atom, created from its value on first use.
    /// Observed atoms get fixed slots.
    pub fn add_global_variable(&mut self, atom: &GroundAtom) -> usize {
        if let Some(&i) = self.index.get(&atom.id()) {
            return i;
        }
        let i = self.consensus.len();
        self.consensus.push(atom.value().clamp(0.0, 1.0));
        self.fixed.push(atom.is_fixed());
        self.atoms.push(atom.id());
        self.records.push(Vec::new());
        self.index.insert(atom.id(), i);
        i
    }

    /// Consensus index for a term-local copy of `atom`. The local record
    /// itself is registered when the term is added.
    pub fn create_local_variable(&mut self, atom: &GroundAtom) -> usize {
        self.add_global_variable(atom)
    }

    pub fn add_term(&mut self, term: AdmmTerm) -> ReasonerResult<usize> {
        let len = self.consensus.len();
        if let Some(&index) = term.hyperplane().indices().iter().find(|&&i| i >= len) {
            return Err(ReasonerError::IndexOutOfBounds { index, len });
        }
        let t = self.terms.len();
        for (slot, &i) in term.hyperplane().indices().iter().enumerate() {
            self.records[i].push(LocalRecord { term: t, slot });
        }
        self.num_local_variables += term.len();
        self.terms.push(term);
        Ok(t)
    }

    pub fn local_records(&self, index: usize) -> &[LocalRecord] {
        self.records.get(index).map_or(&[], Vec::as_slice)
    }

    pub fn term(&self, index: usize) -> Option<&AdmmTerm> {
        self.terms.get(index)
    }

    pub fn terms(&self) -> &[AdmmTerm] {
        &self.terms
    }

    pub(crate) fn terms_mut(&mut self) -> &mut [AdmmTerm] {
        &mut self.terms
    }

    /// Number of terms.
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn num_variables(&self) -> usize {
        self.consensus.len()
    }

    pub fn num_local_variables(&self) -> usize {
        self.num_local_variables
    }

    pub fn consensus_values(&self) -> &[f64] {
        &self.consensus
    }

    pub fn variable_index(&self, atom: AtomId) -> Option<usize> {
        self.index.get(&atom).copied()
    }

    pub fn atom_at(&self, index: usize) -> Option<AtomId> {
        self.atoms.get(index).copied()
    }

    pub fn is_fixed(&self, index: usize) -> bool {
        self.fixed.get(index).copied().unwrap_or(false)
    }

    pub fn value_of(&self, atom: AtomId) -> Option<f64> {
        self.variable_index(atom).map(|i| self.consensus[i])
    }

    /// Split borrow for the term step: terms mutably, consensus read-only.
    pub(crate) fn term_phase(&mut self) -> (&mut [AdmmTerm], &[f64]) {
        (&mut self.terms, &self.consensus)
    }

    /// Split borrow for the consensus step.
    pub(crate) fn consensus_phase(&mut self) -> (&mut [f64], &[bool], &[Vec<LocalRecord>], &[AdmmTerm]) {
        (&mut self.consensus, &self.fixed, &self.records, &self.terms)
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.consensus.clear();
        self.fixed.clear();
        self.atoms.clear();
        self.index.clear();
        self.records.clear();
        self.num_local_variables = 0;
    }

    /// Reinitialize free consensus values and restart every term from them.
    /// Fixed slots keep their value.
    pub fn reset(&mut self, atoms: &impl AtomStore, initial: InitialValue, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for (i, value) in self.consensus.iter_mut().enumerate() {
            if self.fixed[i] {
                continue;
            }
            *value = match initial {
                InitialValue::Atom => atoms
                    .atom(self.atoms[i])
                    .map_or(*value, |a| a.value().clamp(0.0, 1.0)),
                InitialValue::Zero => 0.0,
                InitialValue::Random => rng.gen::<f64>(),
            };
        }
        for term in self.terms.iter_mut() {
            term.reset(&self.consensus);
        }
    }

    /// Set a consensus value in place, e.g. when an atom becomes observed.
    /// Returns `false` if the atom has no slot.
    pub fn update_local_variable(&mut self, atom: AtomId, value: f64, fixed: bool) -> bool {
        let Some(&i) = self.index.get(&atom) else {
            return false;
        };
        self.consensus[i] = value.clamp(0.0, 1.0);
        self.fixed[i] = fixed;
        true
    }

    /// Drop an atom's slot and every term touching it. Returns the number of
    /// terms removed.
    pub fn delete_local_variable(&mut self, atom: AtomId) -> usize {
        let Some(&i) = self.index.get(&atom) else {
            return 0;
        };
        let doomed: Vec<usize> = self.records[i].iter().map(|r| r.term).collect();
        let removed = doomed.len();
        let mut keep = vec![true; self.terms.len()];
        for t in doomed {
            keep[t] = false;
        }
        self.compact(&keep, Some(i));
        removed
    }

    /// Drop the terms generated from the given ground rules.
    pub fn remove_terms_for(&mut self, ground_rules: &[GroundRuleId]) -> usize {
        if ground_rules.is_empty() {
            return 0;
        }
        let doomed: HashSet<GroundRuleId> = ground_rules.iter().copied().collect();
        let keep: Vec<bool> = self
            .terms
            .iter()
            .map(|t| t.ground_rule().map_or(true, |id| !doomed.contains(&id)))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            self.compact(&keep, None);
        }
        removed
    }

    /// Keep the flagged terms, drop variables no remaining term references
    /// (and `drop_variable`), then renumber everything.
    fn compact(&mut self, keep: &[bool], drop_variable: Option<usize>) {
        let mut used = vec![false; self.consensus.len()];
        for (term, _) in self.terms.iter().zip(keep).filter(|(_, k)| **k) {
            for &i in term.hyperplane().indices() {
                used[i] = true;
            }
        }
        if let Some(i) = drop_variable {
            used[i] = false;
        }

        let mut mapping = vec![None; self.consensus.len()];
        let mut next = 0;
        for (i, u) in used.iter().enumerate() {
            if *u {
                mapping[i] = Some(next);
                next += 1;
            }
        }

        let old_terms = std::mem::take(&mut self.terms);
        self.terms = old_terms
            .into_iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .filter_map(|(mut term, _)| term.remap(&mapping).then_some(term))
            .collect();

        retain_used(&mut self.consensus, &used);
        retain_used(&mut self.fixed, &used);
        retain_used(&mut self.atoms, &used);

        self.index = self.atoms.iter().enumerate().map(|(i, a)| (*a, i)).collect();
        self.records = vec![Vec::new(); self.atoms.len()];
        self.num_local_variables = 0;
        for (t, term) in self.terms.iter().enumerate() {
            for (slot, &i) in term.hyperplane().indices().iter().enumerate() {
                self.records[i].push(LocalRecord { term: t, slot });
            }
            self.num_local_variables += term.len();
        }
    }

    /// Copy consensus values into the non-fixed atoms of `db`.
    pub fn write_back(&self, db: &mut Database) -> GroundingResult<usize> {
        let mut written = 0;
        for (i, atom) in self.atoms.iter().enumerate() {
            if self.fixed[i] {
                continue;
            }
            db.set_value(*atom, self.consensus[i])?;
            written += 1;
        }
        Ok(written)
    }
}

fn retain_used<T>(values: &mut Vec<T>, used: &[bool]) {
    let mut flags = used.iter();
    values.retain(|_| flags.next().copied().unwrap_or(false));
}
