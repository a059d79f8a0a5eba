//! Session-scoped registry of rules.
//!
//! Rules are registered once, addressed by [`RuleId`] and may be deactivated
//! without being removed. The [`DependencyIndex`] maps each predicate to the
//! active rules whose grounding query mentions it, so that incremental
//! grounding visits only the rules an atom can affect.

use indexmap::IndexMap;

use crate::{GroundingError, GroundingResult, Rule, RuleId};

#[derive(Clone, Debug)]
struct RuleEntry {
    rule: Rule,
    active: bool,
}

/// The rules of one session, addressed by [`RuleId`].
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    rules: IndexMap<RuleId, RuleEntry>,
    next_id: u32,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; it starts active.
    pub fn add_rule(&mut self, rule: impl Into<Rule>) -> RuleId {
        let id = RuleId(self.next_id);
        self.next_id += 1;
        self.rules.insert(
            id,
            RuleEntry {
                rule: rule.into(),
                active: true,
            },
        );
        id
    }

    /// Remove a rule for good. Its id is not reused.
    pub fn remove_rule(&mut self, id: RuleId) -> GroundingResult<Rule> {
        self.rules
            .shift_remove(&id)
            .map(|entry| entry.rule)
            .ok_or(GroundingError::UnknownRule(id))
    }

    /// Look up a rule, active or not.
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(&id).map(|entry| &entry.rule)
    }

    fn entry_mut(&mut self, id: RuleId) -> GroundingResult<&mut RuleEntry> {
        self.rules.get_mut(&id).ok_or(GroundingError::UnknownRule(id))
    }

    /// Make a rule take part in grounding again.
    pub fn activate(&mut self, id: RuleId) -> GroundingResult<()> {
        self.entry_mut(id)?.active = true;
        Ok(())
    }

    /// Exclude a rule from grounding without forgetting it.
    pub fn deactivate(&mut self, id: RuleId) -> GroundingResult<()> {
        self.entry_mut(id)?.active = false;
        Ok(())
    }

    /// `false` for deactivated and unknown rules.
    pub fn is_active(&self, id: RuleId) -> bool {
        self.rules.get(&id).is_some_and(|entry| entry.active)
    }

    /// Change a weighted rule's weight. Fails for hard constraints.
    pub fn set_weight(&mut self, id: RuleId, weight: f64) -> GroundingResult<()> {
        self.entry_mut(id)?.rule.set_weight(weight)
    }

    /// All rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().map(|(id, entry)| (*id, &entry.rule))
    }

    /// Active rules in registration order.
    pub fn active_rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(id, entry)| (*id, &entry.rule))
    }

    /// Number of registered rules, active or not.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Largest absolute weight among weighted rules.
    pub fn max_weight(&self) -> Option<f64> {
        self.rules
            .values()
            .filter_map(|entry| entry.rule.weight())
            .map(f64::abs)
            .reduce(f64::max)
    }

    /// Replace every hard constraint with a weighted version whose weight is
    /// `multiplier` times the largest existing weight (or `multiplier` when
    /// there are no weighted rules). Returns the ids of the relaxed rules.
    pub fn relax_hard_constraints(&mut self, multiplier: f64, squared: bool) -> GroundingResult<Vec<RuleId>> {
        let weight = multiplier * self.max_weight().unwrap_or(1.0);
        let mut relaxed = Vec::new();
        for (id, entry) in self.rules.iter_mut() {
            if entry.rule.is_weighted() {
                continue;
            }
            entry.rule = entry.rule.relax(weight, squared)?;
            relaxed.push(*id);
        }
        Ok(relaxed)
    }

    /// Predicate → active rules whose query mentions it.
    pub fn dependency_index(&self) -> DependencyIndex {
        let mut index = DependencyIndex::default();
        for (id, rule) in self.active_rules() {
            for atom in rule.query_atoms() {
                let watchers = index.by_predicate.entry(atom.predicate.clone()).or_default();
                if !watchers.contains(&id) {
                    watchers.push(id);
                }
            }
        }
        index
    }
}

/// Which rules must be re-grounded when an atom of a predicate appears.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DependencyIndex {
    by_predicate: IndexMap<String, Vec<RuleId>>,
}

impl DependencyIndex {
    /// Rules whose query mentions `predicate`; empty if none do.
    pub fn watchers(&self, predicate: &str) -> &[RuleId] {
        self.by_predicate.get(predicate).map_or(&[], Vec::as_slice)
    }

    /// Every predicate watched by at least one rule.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.by_predicate.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_predicate.is_empty()
    }
}
