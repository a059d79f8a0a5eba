//! Turns ground rules into ADMM terms.

use indexmap::IndexMap;
use log::{debug, warn};
use softlogic_grounding::{
    AtomId, AtomStore, Comparator, FunctionTerm, GroundRule, GroundRuleId, GroundRuleKind,
    GroundRuleStore, GroundingError, ModelRegistry,
};

use crate::{AdmmTerm, Hyperplane, ReasonerError, ReasonerResult, TermKind, TermStore};

/// A ground rule reduced to `kind` over `Σ cᵢ·atomᵢ − constant`.
struct Shape {
    kind: TermKind,
    summands: Vec<(f64, AtomId)>,
    constant: f64,
}

#[derive(Clone, Debug, Default)]
pub struct TermGenerator;

impl TermGenerator {
    pub fn new() -> Self {
        TermGenerator
    }

    /// Build the term for one ground rule, allocating consensus slots in
    /// `store` for its free atoms. `None` when the rule cannot contribute:
    /// negative weight, no free atoms, or trivially satisfied.
    pub fn create_term(
        &self,
        ground_rule: &GroundRule,
        atoms: &impl AtomStore,
        store: &mut TermStore,
    ) -> ReasonerResult<Option<AdmmTerm>> {
        let Some(shape) = shape(ground_rule)? else {
            return Ok(None);
        };

        let mut constant = shape.constant;
        let mut merged: IndexMap<AtomId, f64> = IndexMap::new();
        for (coefficient, id) in shape.summands {
            let atom = atoms
                .atom(id)
                .ok_or(ReasonerError::Grounding(GroundingError::UnknownAtom(id)))?;
            // Evidence that already owns a slot stays there, fixed.
            if atom.is_fixed() && store.variable_index(id).is_none() {
                constant -= coefficient * atom.value();
            } else {
                *merged.entry(id).or_insert(0.0) += coefficient;
            }
        }
        merged.retain(|_, c| *c != 0.0);

        if merged.is_empty() {
            if let TermKind::LinearConstraint { comparator } = shape.kind {
                if comparator.violation(-constant, 0.0) > 1e-9 {
                    warn!("constraint over observed atoms only is violated: {}", ground_rule);
                }
            }
            return Ok(None);
        }
        if is_trivial(&shape.kind, merged.values(), constant) {
            return Ok(None);
        }

        let mut indices = Vec::with_capacity(merged.len());
        for id in merged.keys() {
            let atom = atoms
                .atom(*id)
                .ok_or(ReasonerError::Grounding(GroundingError::UnknownAtom(*id)))?;
            indices.push(store.create_local_variable(atom));
        }
        let hyperplane = Hyperplane::new(indices, merged.into_values().collect(), constant);
        Ok(Some(AdmmTerm::new(shape.kind, hyperplane, store.consensus_values())))
    }

    /// Generate terms for every ground rule in the store.
    pub fn generate_terms(
        &self,
        ground_rules: &GroundRuleStore,
        atoms: &impl AtomStore,
        store: &mut TermStore,
    ) -> ReasonerResult<usize> {
        store.ensure_capacity(store.size() + ground_rules.len());
        let ids: Vec<GroundRuleId> = ground_rules.iter().map(|(id, _)| id).collect();
        self.generate_terms_for(&ids, ground_rules, atoms, store)
    }

    /// Generate terms for the given ground rules only.
    pub fn generate_terms_for(
        &self,
        ids: &[GroundRuleId],
        ground_rules: &GroundRuleStore,
        atoms: &impl AtomStore,
        store: &mut TermStore,
    ) -> ReasonerResult<usize> {
        let mut added = 0;
        for id in ids {
            let Some(ground_rule) = ground_rules.get(*id) else {
                continue;
            };
            if let Some(term) = self.create_term(ground_rule, atoms, store)? {
                store.add_term(term.with_ground_rule(*id))?;
                added += 1;
            }
        }
        debug!(
            "generated {} terms from {} ground rules ({} variables)",
            added,
            ids.len(),
            store.num_variables()
        );
        Ok(added)
    }

    /// Copy current rule weights from the registry into existing terms.
    pub fn update_weights(
        &self,
        registry: &ModelRegistry,
        ground_rules: &GroundRuleStore,
        store: &mut TermStore,
    ) -> usize {
        let mut updated = 0;
        for term in store.terms_mut() {
            let weight = term
                .ground_rule()
                .and_then(|id| ground_rules.get(id))
                .and_then(|gr| registry.rule(gr.rule()))
                .and_then(|rule| rule.weight());
            match weight {
                Some(w) if w < 0.0 => warn!("ignoring negative weight {} for term update", w),
                Some(w) => {
                    if term.set_weight(w) {
                        updated += 1;
                    }
                }
                None => {}
            }
        }
        updated
    }
}

fn unsupported(function: &FunctionTerm, reason: &str) -> ReasonerError {
    ReasonerError::UnsupportedFunction {
        function: function.to_string(),
        reason: reason.to_string(),
    }
}

fn shape(ground_rule: &GroundRule) -> ReasonerResult<Option<Shape>> {
    match ground_rule.kind() {
        GroundRuleKind::Weighted { weight, function } => {
            if *weight < 0.0 {
                warn!("skipping ground rule with negative weight {}: {}", weight, ground_rule);
                return Ok(None);
            }
            let weight = *weight;
            let (squared, inner) = match function {
                FunctionTerm::Squared(inner) => (true, inner.as_ref()),
                other => (false, other),
            };
            let (hinge, linear) = match inner.as_hinge() {
                Some(linear) => (true, linear),
                None => (false, inner),
            };
            let (summands, k) = linear
                .as_linear()
                .ok_or_else(|| unsupported(function, "expected a linear sum or a hinge of one"))?;
            let kind = match (hinge, squared) {
                (false, false) => TermKind::LinearLoss { weight },
                (true, false) => TermKind::HingeLoss { weight },
                (false, true) => TermKind::SquaredLinearLoss { weight },
                (true, true) => TermKind::SquaredHingeLoss { weight },
            };
            Ok(Some(Shape {
                kind,
                summands,
                constant: -k,
            }))
        }
        GroundRuleKind::Constraint(definition) => {
            let (summands, k) = definition
                .function
                .as_linear()
                .ok_or_else(|| unsupported(&definition.function, "constraints must be linear"))?;
            Ok(Some(Shape {
                kind: TermKind::LinearConstraint {
                    comparator: definition.comparator,
                },
                summands,
                constant: definition.value - k,
            }))
        }
    }
}

/// A hinge or inequality that cannot be active anywhere in `[0, 1]ⁿ`.
fn is_trivial<'a>(kind: &TermKind, coefficients: impl Iterator<Item = &'a f64> + Clone, constant: f64) -> bool {
    let upper = coefficients.clone().map(|c| c.max(0.0)).sum::<f64>() - constant;
    let lower = coefficients.map(|c| c.min(0.0)).sum::<f64>() - constant;
    match kind {
        TermKind::HingeLoss { .. } | TermKind::SquaredHingeLoss { .. } => upper <= 0.0,
        TermKind::LinearConstraint {
            comparator: Comparator::LessThanEqual,
        } => upper <= 0.0,
        TermKind::LinearConstraint {
            comparator: Comparator::GreaterThanEqual,
        } => lower >= 0.0,
        _ => false,
    }
}
