//! Inference applications.
//!
//! - [`MpeInference`]: ground every active rule, generate terms, optimize and
//!   write the most probable values back to the database.
//! - [`LazyMpeInference`]: as above, then repeatedly activate lazy atoms
//!   whose inferred value exceeds a threshold and ground only what they
//!   affect.
//! - [`OnlineSession`]: keeps the model, database and term store alive and
//!   applies atom and rule changes incrementally between inferences.

use softlogic_grounding::{
    AtomId, Database, GroundRuleId, GroundRuleStore, GroundingDelta, GroundingEngine, LogicalRule, ModelRegistry, Rule,
    RuleId,
};
use softlogic_ir::Formula;
use softlogic_reasoner::{
    AdmmReasoner, IterationObserver, OptimizationReport, Reasoner, TermGenerator, TermStore,
};
use tracing::{debug, info};

use crate::{SoftLogicConfig, SoftLogicResult};

/// Outcome of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub report: OptimizationReport,
    /// Optimization rounds (1 unless lazy atoms were activated).
    pub rounds: usize,
    pub ground_rules: usize,
    pub terms: usize,
    pub variables: usize,
    /// Lazy atoms activated along the way.
    pub activated: usize,
}

/// Grounding, term generation and optimization state shared by the
/// inference applications.
struct Pipeline {
    config: SoftLogicConfig,
    engine: GroundingEngine,
    generator: TermGenerator,
    reasoner: AdmmReasoner,
    ground_rules: GroundRuleStore,
    store: TermStore,
}

impl Pipeline {
    fn new(config: SoftLogicConfig) -> SoftLogicResult<Self> {
        config.validate()?;
        let reasoner = AdmmReasoner::new(config.admm.clone())?;
        Ok(Pipeline {
            engine: GroundingEngine::new().with_parallel(config.grounding.parallel),
            generator: TermGenerator::new(),
            reasoner,
            ground_rules: GroundRuleStore::new(),
            store: TermStore::new(),
            config,
        })
    }

    /// Full grounding and fresh terms.
    fn rebuild(&mut self, registry: &mut ModelRegistry, db: &mut Database) -> SoftLogicResult<()> {
        let inference = &self.config.inference;
        if inference.relax_hard_constraints {
            let relaxed = registry.relax_hard_constraints(inference.relaxation_multiplier, inference.relax_squared)?;
            if !relaxed.is_empty() {
                info!(count = relaxed.len(), "relaxed hard constraints");
            }
        }
        self.ground_rules.clear();
        self.engine.ground_all(registry, db, &mut self.ground_rules)?;
        self.store.clear();
        self.generator.generate_terms(&self.ground_rules, &*db, &mut self.store)?;
        self.store.reset(&*db, inference.initial_value, inference.seed);
        Ok(())
    }

    /// Retire removed ground rules' terms and generate terms for new ones.
    fn apply(&mut self, delta: &GroundingDelta, db: &Database) -> SoftLogicResult<usize> {
        self.store.remove_terms_for(&delta.removed);
        let added = self
            .generator
            .generate_terms_for(&delta.added, &self.ground_rules, db, &mut self.store)?;
        Ok(added)
    }

    fn optimize(
        &mut self,
        db: &mut Database,
        observer: Option<&mut dyn IterationObserver>,
    ) -> SoftLogicResult<OptimizationReport> {
        let report = self.reasoner.optimize(&mut self.store, observer)?;
        self.store.write_back(db)?;
        Ok(report)
    }

    fn finish(&self, db: &mut Database, report: OptimizationReport, rounds: usize, activated: usize) -> InferenceResult {
        if self.config.inference.commit {
            let changed = db.commit();
            debug!(changed, "committed atom values");
        }
        let result = InferenceResult {
            report,
            rounds,
            ground_rules: self.ground_rules.len(),
            terms: self.store.size(),
            variables: self.store.num_variables(),
            activated,
        };
        info!(
            objective = result.report.objective,
            iterations = result.report.iterations,
            rounds = result.rounds,
            terms = result.terms,
            "inference finished"
        );
        result
    }
}

/// Most probable explanation over the materialized atoms.
pub struct MpeInference {
    pipeline: Pipeline,
}

impl MpeInference {
    pub fn new(config: SoftLogicConfig) -> SoftLogicResult<Self> {
        Ok(MpeInference {
            pipeline: Pipeline::new(config)?,
        })
    }

    pub fn ground_rules(&self) -> &GroundRuleStore {
        &self.pipeline.ground_rules
    }

    pub fn term_store(&self) -> &TermStore {
        &self.pipeline.store
    }

    pub fn reasoner_mut(&mut self) -> &mut AdmmReasoner {
        &mut self.pipeline.reasoner
    }

    pub fn infer(&mut self, registry: &mut ModelRegistry, db: &mut Database) -> SoftLogicResult<InferenceResult> {
        self.infer_with(registry, db, None)
    }

    pub fn infer_with(
        &mut self,
        registry: &mut ModelRegistry,
        db: &mut Database,
        observer: Option<&mut dyn IterationObserver>,
    ) -> SoftLogicResult<InferenceResult> {
        self.pipeline.rebuild(registry, db)?;
        let report = self.pipeline.optimize(db, observer)?;
        Ok(self.pipeline.finish(db, report, 1, 0))
    }
}

/// MPE inference that grows the model through lazy atoms.
///
/// Atoms created on demand while grounding start invisible to queries. After
/// each round those whose value exceeds `lazy_threshold` are activated, and
/// only the rules watching their predicates are re-grounded.
pub struct LazyMpeInference {
    pipeline: Pipeline,
}

impl LazyMpeInference {
    pub fn new(config: SoftLogicConfig) -> SoftLogicResult<Self> {
        Ok(LazyMpeInference {
            pipeline: Pipeline::new(config)?,
        })
    }

    pub fn ground_rules(&self) -> &GroundRuleStore {
        &self.pipeline.ground_rules
    }

    pub fn term_store(&self) -> &TermStore {
        &self.pipeline.store
    }

    pub fn infer(&mut self, registry: &mut ModelRegistry, db: &mut Database) -> SoftLogicResult<InferenceResult> {
        let threshold = self.pipeline.config.inference.lazy_threshold;
        let max_rounds = self.pipeline.config.inference.lazy_max_rounds;

        self.pipeline.rebuild(registry, db)?;
        let mut report = self.pipeline.optimize(db, None)?;
        let mut rounds = 1;
        let mut activated = 0;

        for _ in 0..max_rounds {
            let mut promoted: Vec<AtomId> = Vec::new();
            for id in db.lazy_atoms() {
                let above = db.atom_mut(id)?.value() > threshold;
                if above && db.activate(id)? {
                    promoted.push(id);
                }
            }
            if promoted.is_empty() {
                break;
            }
            activated += promoted.len();
            let delta = self
                .pipeline
                .engine
                .ground_incremental(registry, db, &mut self.pipeline.ground_rules, &promoted)?;
            let added = self.pipeline.apply(&delta, db)?;
            debug!(round = rounds, activated = promoted.len(), added, "lazy round");
            if added == 0 && delta.removed.is_empty() {
                break;
            }
            report = self.pipeline.optimize(db, None)?;
            rounds += 1;
        }

        Ok(self.pipeline.finish(db, report, rounds, activated))
    }
}

/// A long-lived model that accepts atom and rule changes between
/// inferences.
///
/// Every change is applied to the database, the ground rule store and the
/// term store together; the next [`OnlineSession::infer`] warm-starts from
/// the previous solution.
pub struct OnlineSession {
    pipeline: Pipeline,
    registry: ModelRegistry,
    db: Database,
}

impl OnlineSession {
    /// Ground the initial model and generate its terms.
    pub fn new(config: SoftLogicConfig, mut registry: ModelRegistry, mut db: Database) -> SoftLogicResult<Self> {
        let mut pipeline = Pipeline::new(config)?;
        pipeline.rebuild(&mut registry, &mut db)?;
        Ok(OnlineSession { pipeline, registry, db })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn term_store(&self) -> &TermStore {
        &self.pipeline.store
    }

    pub fn ground_rules(&self) -> &GroundRuleStore {
        &self.pipeline.ground_rules
    }

    /// Add an atom (observed when `observed` is set) and ground what it
    /// affects. Existing lazy atoms are materialized.
    pub fn add_atom(&mut self, predicate: &str, args: Vec<String>, value: f64, observed: bool) -> SoftLogicResult<AtomId> {
        let id = if observed {
            self.db.add_observation(predicate, args, value)?
        } else {
            self.db.add_target(predicate, args, value)?
        };
        let added = self.refresh_atom(id, value, observed)?;
        debug!(atom = %id, added, "added atom");
        Ok(id)
    }

    /// Turn an atom into evidence, or change the value of existing evidence.
    /// An atom with a consensus slot keeps it, fixed.
    pub fn observe_atom(&mut self, id: AtomId, value: f64) -> SoftLogicResult<()> {
        self.db.observe(id, value)?;
        let added = self.refresh_atom(id, value, true)?;
        debug!(atom = %id, added, "observed atom");
        Ok(())
    }

    /// Bring the term store in line with a changed atom value.
    ///
    /// Atoms without a slot were evidence when their terms were generated and
    /// their value lives in the term constants, so those terms are rebuilt.
    /// Incremental grounding then picks up groundings the old value had
    /// filtered out. Returns the number of terms generated.
    fn refresh_atom(&mut self, id: AtomId, value: f64, fixed: bool) -> SoftLogicResult<usize> {
        let pipeline = &mut self.pipeline;
        let mut generated = 0;
        if !pipeline.store.update_local_variable(id, value, fixed) {
            let stale: Vec<GroundRuleId> = pipeline.ground_rules.for_atom(id).to_vec();
            pipeline.store.remove_terms_for(&stale);
            generated += pipeline
                .generator
                .generate_terms_for(&stale, &pipeline.ground_rules, &self.db, &mut pipeline.store)?;
        }
        let delta = pipeline
            .engine
            .ground_incremental(&self.registry, &mut self.db, &mut pipeline.ground_rules, &[id])?;
        generated += pipeline.apply(&delta, &self.db)?;
        Ok(generated)
    }

    /// Remove an atom with its ground rules and terms.
    pub fn delete_atom(&mut self, id: AtomId) -> SoftLogicResult<()> {
        self.pipeline.store.delete_local_variable(id);
        let removed = self.pipeline.ground_rules.remove_atom(id);
        self.pipeline.store.remove_terms_for(&removed);
        self.db.remove_atom(id)?;
        debug!(atom = %id, ground_rules = removed.len(), "deleted atom");
        Ok(())
    }

    /// Register and ground a new rule.
    pub fn add_rule(&mut self, rule: impl Into<Rule>) -> SoftLogicResult<RuleId> {
        let id = self.registry.add_rule(rule);
        let delta = self
            .pipeline
            .engine
            .ground_rule(&self.registry, id, &mut self.db, &mut self.pipeline.ground_rules)?;
        self.pipeline.apply(&delta, &self.db)?;
        Ok(id)
    }

    /// Register a logical rule, normalizing it with the configured DNF cap.
    pub fn add_logical_rule(&mut self, formula: Formula, weight: Option<f64>, squared: bool) -> SoftLogicResult<RuleId> {
        let max_clauses = self.pipeline.config.grounding.max_dnf_clauses;
        let rule = LogicalRule::new(formula, weight, squared, max_clauses)?;
        self.add_rule(rule)
    }

    /// Stop a rule from contributing; its ground rules and terms are dropped.
    pub fn deactivate_rule(&mut self, id: RuleId) -> SoftLogicResult<()> {
        self.registry.deactivate(id)?;
        let removed = self.pipeline.ground_rules.remove_rule(id);
        self.pipeline.store.remove_terms_for(&removed);
        Ok(())
    }

    /// Change a rule's weight in place.
    pub fn set_weight(&mut self, id: RuleId, weight: f64) -> SoftLogicResult<()> {
        self.registry.set_weight(id, weight)?;
        self.pipeline
            .generator
            .update_weights(&self.registry, &self.pipeline.ground_rules, &mut self.pipeline.store);
        Ok(())
    }

    pub fn infer(&mut self) -> SoftLogicResult<InferenceResult> {
        let report = self.pipeline.optimize(&mut self.db, None)?;
        Ok(self.pipeline.finish(&mut self.db, report, 1, 0))
    }
}
