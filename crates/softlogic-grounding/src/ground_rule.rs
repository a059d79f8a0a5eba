//! Ground rules and the ground rule store.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use softlogic_ir::Constant;

use crate::{AtomId, ConstraintDefinition, FunctionTerm, RuleId};

/// Where a ground rule came from: its rule and, for ground rules produced by
/// grounding, the variable bindings and which part of the rule it is (a
/// weighted equality produces two ground rules per binding).
///
/// A ground rule with bindings replaces an earlier one with the same origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub rule: RuleId,
    pub bindings: Option<Vec<Constant>>,
    pub part: u8,
}

impl Origin {
    /// An origin without bindings, for ground rules built by hand.
    pub fn new(rule: RuleId) -> Self {
        Origin {
            rule,
            bindings: None,
            part: 0,
        }
    }

    pub fn with_bindings(rule: RuleId, bindings: Vec<Constant>, part: u8) -> Self {
        Origin {
            rule,
            bindings: Some(bindings),
            part,
        }
    }

    fn is_tracked(&self) -> bool {
        self.bindings.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GroundRuleKind {
    Weighted { weight: f64, function: FunctionTerm },
    Constraint(ConstraintDefinition),
}

/// Identity of a ground rule for de-duplication.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroundRuleKey {
    rule: RuleId,
    signature: Vec<u64>,
}

/// A rule instantiated over specific atoms. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundRule {
    origin: Origin,
    atoms: Vec<AtomId>,
    kind: GroundRuleKind,
}

impl GroundRule {
    /// A soft rule contributing `weight * function` to the objective.
    pub fn weighted(origin: Origin, weight: f64, function: FunctionTerm) -> Self {
        GroundRule {
            atoms: function.atoms(),
            origin,
            kind: GroundRuleKind::Weighted { weight, function },
        }
    }

    /// A hard rule that must hold exactly.
    pub fn constraint(origin: Origin, definition: ConstraintDefinition) -> Self {
        GroundRule {
            atoms: definition.function.atoms(),
            origin,
            kind: GroundRuleKind::Constraint(definition),
        }
    }

    pub fn rule(&self) -> RuleId {
        self.origin.rule
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Atoms referenced by the function, in first-seen order.
    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn kind(&self) -> &GroundRuleKind {
        &self.kind
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self.kind, GroundRuleKind::Weighted { .. })
    }

    /// Weight snapshot taken at grounding time; `None` for constraints.
    pub fn weight(&self) -> Option<f64> {
        match &self.kind {
            GroundRuleKind::Weighted { weight, .. } => Some(*weight),
            GroundRuleKind::Constraint(_) => None,
        }
    }

    pub fn function(&self) -> &FunctionTerm {
        match &self.kind {
            GroundRuleKind::Weighted { function, .. } => function,
            GroundRuleKind::Constraint(c) => &c.function,
        }
    }

    /// Weighted loss, or the amount of constraint violation.
    pub fn incompatibility<F>(&self, truth: &F) -> f64
    where
        F: Fn(AtomId) -> f64,
    {
        match &self.kind {
            GroundRuleKind::Weighted { weight, function } => weight * function.value(truth),
            GroundRuleKind::Constraint(c) => c.violation(truth),
        }
    }

    /// Parent rule plus the canonical signature of the function.
    pub fn key(&self) -> GroundRuleKey {
        let mut signature = Vec::new();
        match &self.kind {
            GroundRuleKind::Weighted { function, .. } => {
                signature.push(0);
                function.signature(&mut signature);
            }
            GroundRuleKind::Constraint(c) => {
                signature.push(1);
                signature.push(c.comparator as u64);
                signature.push((c.value + 0.0).to_bits());
                c.function.signature(&mut signature);
            }
        }
        GroundRuleKey {
            rule: self.origin.rule,
            signature,
        }
    }
}

impl fmt::Display for GroundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GroundRuleKind::Weighted { weight, function } => {
                write!(f, "{}: {} [{}]", weight, function, self.origin.rule)
            }
            GroundRuleKind::Constraint(c) => write!(f, "{} . [{}]", c, self.origin.rule),
        }
    }
}

/// Stable arena index of a ground rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroundRuleId(pub u32);

impl GroundRuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroundRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Result of adding a ground rule to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(GroundRuleId),
    /// An equal ground rule already exists.
    Duplicate(GroundRuleId),
    /// Same origin, different content: the older ground rule was removed.
    Replaced { added: GroundRuleId, removed: GroundRuleId },
}

/// Arena of ground rules with de-duplication and adjacency indexes.
#[derive(Clone, Debug, Default)]
pub struct GroundRuleStore {
    rules: Vec<Option<GroundRule>>,
    keys: HashMap<GroundRuleKey, GroundRuleId>,
    origins: HashMap<Origin, GroundRuleId>,
    by_rule: HashMap<RuleId, Vec<GroundRuleId>>,
    by_atom: HashMap<AtomId, Vec<GroundRuleId>>,
    live: usize,
}

impl GroundRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an equal ground rule exists. A ground rule with bindings
    /// replaces the live one with the same origin.
    pub fn add(&mut self, ground_rule: GroundRule) -> AddOutcome {
        let key = ground_rule.key();
        if let Some(&existing) = self.keys.get(&key) {
            return AddOutcome::Duplicate(existing);
        }

        let replaced = if ground_rule.origin.is_tracked() {
            self.origins.get(&ground_rule.origin).copied()
        } else {
            None
        };
        if let Some(old) = replaced {
            self.remove(old);
        }

        let id = GroundRuleId(self.rules.len() as u32);
        self.keys.insert(key, id);
        if ground_rule.origin.is_tracked() {
            self.origins.insert(ground_rule.origin.clone(), id);
        }
        self.by_rule.entry(ground_rule.rule()).or_default().push(id);
        for atom in ground_rule.atoms() {
            self.by_atom.entry(*atom).or_default().push(id);
        }
        self.rules.push(Some(ground_rule));
        self.live += 1;

        match replaced {
            Some(removed) => AddOutcome::Replaced { added: id, removed },
            None => AddOutcome::Added(id),
        }
    }

    pub fn get(&self, id: GroundRuleId) -> Option<&GroundRule> {
        self.rules.get(id.index()).and_then(Option::as_ref)
    }

    /// Remove one ground rule and unlink it from the adjacency indexes.
    pub fn remove(&mut self, id: GroundRuleId) -> Option<GroundRule> {
        let ground_rule = self.rules.get_mut(id.index()).and_then(Option::take)?;
        self.keys.remove(&ground_rule.key());
        if self.origins.get(&ground_rule.origin) == Some(&id) {
            self.origins.remove(&ground_rule.origin);
        }
        if let Some(ids) = self.by_rule.get_mut(&ground_rule.rule()) {
            ids.retain(|other| *other != id);
        }
        for atom in ground_rule.atoms() {
            if let Some(ids) = self.by_atom.get_mut(atom) {
                ids.retain(|other| *other != id);
            }
        }
        self.live -= 1;
        Some(ground_rule)
    }

    /// Remove every ground rule of `rule`, returning their ids.
    pub fn remove_rule(&mut self, rule: RuleId) -> Vec<GroundRuleId> {
        let ids = self.by_rule.remove(&rule).unwrap_or_default();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    /// Remove every ground rule mentioning `atom`, returning their ids.
    pub fn remove_atom(&mut self, atom: AtomId) -> Vec<GroundRuleId> {
        let ids = self.by_atom.remove(&atom).unwrap_or_default();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    pub fn for_rule(&self, rule: RuleId) -> &[GroundRuleId] {
        self.by_rule.get(&rule).map_or(&[], Vec::as_slice)
    }

    /// Live ground rules mentioning `atom`, including as evidence.
    pub fn for_atom(&self, atom: AtomId) -> &[GroundRuleId] {
        self.by_atom.get(&atom).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroundRuleId, &GroundRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.as_ref().map(|g| (GroundRuleId(i as u32), g)))
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
