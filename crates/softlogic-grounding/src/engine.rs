//! Grounding engine.
//!
//! Grounding runs in two phases per rule: the query phase enumerates variable
//! bindings against the store and only reads it, so rules are queried in
//! parallel; the instantiation phase creates atoms on demand and builds ground
//! rules, sequentially, feeding the ground rule store.

use indexmap::IndexSet;
use log::debug;
use rayon::prelude::*;
use softlogic_ir::VariableAssignment;

use crate::{
    AddOutcome, AtomId, GroundRuleId, GroundRuleStore, GroundingError, GroundingResult,
    GroundingStore, ModelRegistry, ResultList, Rule, RuleId,
};

/// Counters from one grounding pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroundingStats {
    pub queries: usize,
    pub rows: usize,
    pub added: usize,
    pub duplicates: usize,
    pub replaced: usize,
}

/// Ground rules added to and removed from the store by one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroundingDelta {
    pub added: Vec<GroundRuleId>,
    pub removed: Vec<GroundRuleId>,
    pub stats: GroundingStats,
}

impl GroundingDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct GroundingEngine {
    parallel: bool,
}

impl Default for GroundingEngine {
    fn default() -> Self {
        GroundingEngine { parallel: true }
    }
}

struct Task<'a> {
    id: RuleId,
    rule: &'a Rule,
    partial: VariableAssignment,
}

impl GroundingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queries on the calling thread only.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Ground every active rule.
    pub fn ground_all<D>(&self, registry: &ModelRegistry, db: &mut D, store: &mut GroundRuleStore) -> GroundingResult<GroundingDelta>
    where
        D: GroundingStore + Sync,
    {
        let tasks = registry
            .active_rules()
            .map(|(id, rule)| Task {
                id,
                rule,
                partial: VariableAssignment::new(),
            })
            .collect();
        let delta = self.run(tasks, db, store)?;
        debug!(
            "grounded {} rules: {} ground rules added, {} duplicates",
            registry.active_rules().count(),
            delta.stats.added,
            delta.stats.duplicates
        );
        Ok(delta)
    }

    /// Ground a single rule, active or not.
    pub fn ground_rule<D>(
        &self,
        registry: &ModelRegistry,
        id: RuleId,
        db: &mut D,
        store: &mut GroundRuleStore,
    ) -> GroundingResult<GroundingDelta>
    where
        D: GroundingStore + Sync,
    {
        let rule = registry.rule(id).ok_or(GroundingError::UnknownRule(id))?;
        let task = Task {
            id,
            rule,
            partial: VariableAssignment::new(),
        };
        self.run(vec![task], db, store)
    }

    /// Ground only what newly visible atoms can affect.
    ///
    /// For each atom, the rules watching its predicate are grounded under the
    /// partial bindings that place the atom in their query. No other grounding
    /// is re-enumerated.
    pub fn ground_incremental<D>(
        &self,
        registry: &ModelRegistry,
        db: &mut D,
        store: &mut GroundRuleStore,
        activated: &[AtomId],
    ) -> GroundingResult<GroundingDelta>
    where
        D: GroundingStore + Sync,
    {
        let index = registry.dependency_index();
        let mut seen: IndexSet<(RuleId, Vec<(String, String)>)> = IndexSet::new();
        let mut tasks = Vec::new();
        for atom_id in activated {
            let atom = db.atom(*atom_id).ok_or(GroundingError::UnknownAtom(*atom_id))?;
            for rule_id in index.watchers(atom.predicate()) {
                let Some(rule) = registry.rule(*rule_id) else {
                    continue;
                };
                for partial in rule.trace(atom.predicate(), atom.args()) {
                    let key = (*rule_id, partial.clone().into_iter().collect());
                    if seen.insert(key) {
                        tasks.push(Task {
                            id: *rule_id,
                            rule,
                            partial,
                        });
                    }
                }
            }
        }
        let delta = self.run(tasks, db, store)?;
        debug!(
            "incremental grounding for {} atoms: {} added, {} replaced",
            activated.len(),
            delta.stats.added,
            delta.stats.replaced
        );
        Ok(delta)
    }

    fn run<D>(&self, tasks: Vec<Task<'_>>, db: &mut D, store: &mut GroundRuleStore) -> GroundingResult<GroundingDelta>
    where
        D: GroundingStore + Sync,
    {
        let results: Vec<GroundingResult<ResultList>> = {
            let reader: &D = db;
            if self.parallel {
                tasks
                    .par_iter()
                    .map(|t| t.rule.query(reader, &t.partial))
                    .collect()
            } else {
                tasks.iter().map(|t| t.rule.query(reader, &t.partial)).collect()
            }
        };

        let mut delta = GroundingDelta::default();
        for (task, rows) in tasks.iter().zip(results) {
            let rows = rows?;
            delta.stats.queries += 1;
            delta.stats.rows += rows.len();
            for ground_rule in task.rule.instantiate(task.id, db, &rows)? {
                match store.add(ground_rule) {
                    AddOutcome::Added(id) => {
                        delta.added.push(id);
                        delta.stats.added += 1;
                    }
                    AddOutcome::Duplicate(_) => delta.stats.duplicates += 1,
                    AddOutcome::Replaced { added, removed } => {
                        delta.added.push(added);
                        delta.stats.added += 1;
                        delta.stats.replaced += 1;
                        // Replacing something added in this same pass is invisible to callers.
                        if let Some(pos) = delta.added.iter().position(|id| *id == removed) {
                            delta.added.remove(pos);
                        } else {
                            delta.removed.push(removed);
                        }
                    }
                }
            }
        }
        Ok(delta)
    }
}
