//! Parallel ADMM consensus optimization.
//!
//! Each iteration has two phases. The term phase updates the multipliers
//! and minimizes every term locally, in parallel over blocks of terms. The
//! consensus phase averages the local copies of each variable, in parallel
//! over blocks of variables; each block also returns partial residual sums,
//! which are reduced once per iteration.

use std::sync::Arc;

use log::{info, trace, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{AdmmConfig, AdmmTerm, ReasonerError, ReasonerResult, TermStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonerState {
    Idle,
    Iterating,
    Converged,
    IterationBudgetExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Primal and dual residuals fell below their tolerances.
    Converged,
    /// The objective stopped changing between snapshots.
    ObjectiveBreak,
    /// The budget-scaled iteration cap was reached.
    IterationBudgetExhausted,
}

impl StopReason {
    pub fn is_converged(self) -> bool {
        !matches!(self, StopReason::IterationBudgetExhausted)
    }
}

/// Objective and hard-constraint violations at the consensus point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSnapshot {
    pub iteration: usize,
    pub objective: f64,
    pub violated_constraints: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub objective: f64,
    pub violated_constraints: usize,
    pub iterations: usize,
    pub primal_residual: f64,
    pub dual_residual: f64,
    pub stop_reason: StopReason,
}

/// Called with every objective snapshot.
pub trait IterationObserver {
    fn on_snapshot(&mut self, iteration: usize, snapshot: &ObjectiveSnapshot);
}

impl<F> IterationObserver for F
where
    F: FnMut(usize, &ObjectiveSnapshot),
{
    fn on_snapshot(&mut self, iteration: usize, snapshot: &ObjectiveSnapshot) {
        self(iteration, snapshot)
    }
}

/// Optimizes the terms of a [`TermStore`] in place.
pub trait Reasoner {
    fn optimize(
        &mut self,
        store: &mut TermStore,
        observer: Option<&mut dyn IterationObserver>,
    ) -> ReasonerResult<OptimizationReport>;

    /// Scale the iteration cap by `budget ∈ (0, 1]`.
    fn set_budget(&mut self, budget: f64) -> ReasonerResult<()>;
}

/// Cumulative counters over all `optimize` calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReasonerStats {
    pub runs: usize,
    pub total_iterations: usize,
    pub converged_runs: usize,
    pub last_objective: Option<f64>,
}

impl ReasonerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average_iterations(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.total_iterations as f64 / self.runs as f64
        }
    }

    pub fn convergence_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.converged_runs as f64 / self.runs as f64
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Residuals {
    primal: f64,
    dual: f64,
    ax_norm: f64,
    ay_norm: f64,
    bz_norm: f64,
}

impl Residuals {
    fn merge(self, other: Residuals) -> Residuals {
        Residuals {
            primal: self.primal + other.primal,
            dual: self.dual + other.dual,
            ax_norm: self.ax_norm + other.ax_norm,
            ay_norm: self.ay_norm + other.ay_norm,
            bz_norm: self.bz_norm + other.bz_norm,
        }
    }
}

pub struct AdmmReasoner {
    config: AdmmConfig,
    budget: f64,
    state: ReasonerState,
    pool: Option<rayon::ThreadPool>,
    stats: Arc<Mutex<ReasonerStats>>,
}

impl AdmmReasoner {
    pub fn new(config: AdmmConfig) -> ReasonerResult<Self> {
        config.validate()?;
        let pool = if config.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .build()
                .map_err(|e| ReasonerError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(AdmmReasoner {
            config,
            budget: 1.0,
            state: ReasonerState::Idle,
            pool,
            stats: Arc::new(Mutex::new(ReasonerStats::new())),
        })
    }

    pub fn config(&self) -> &AdmmConfig {
        &self.config
    }

    pub fn state(&self) -> ReasonerState {
        self.state
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn stats(&self) -> ReasonerStats {
        self.stats.lock().clone()
    }

    /// Shared handle to the counters, for monitoring from another thread.
    /// Updated once at the end of every `optimize` call.
    pub fn stats_handle(&self) -> Arc<Mutex<ReasonerStats>> {
        Arc::clone(&self.stats)
    }

    /// Iteration cap after applying the budget.
    pub fn iteration_limit(&self) -> usize {
        ((self.config.max_iterations as f64 * self.budget).ceil() as usize).max(1)
    }

    /// Objective and violated constraints at the current consensus point.
    pub fn snapshot(&self, store: &TermStore, iteration: usize) -> ObjectiveSnapshot {
        let tolerance = self.config.constraint_tolerance;
        self.install(|| objective_snapshot(store, tolerance, iteration))
    }

    /// Run `f` on the dedicated pool if there is one.
    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    fn run(
        &mut self,
        store: &mut TermStore,
        mut observer: Option<&mut dyn IterationObserver>,
    ) -> OptimizationReport {
        self.state = ReasonerState::Iterating;
        if store.is_empty() {
            self.state = ReasonerState::Converged;
            return OptimizationReport {
                objective: 0.0,
                violated_constraints: 0,
                iterations: 0,
                primal_residual: 0.0,
                dual_residual: 0.0,
                stop_reason: StopReason::Converged,
            };
        }

        let rho = self.config.step_size;
        let block = self.config.block_size;
        let sqrt_n = (store.num_local_variables() as f64).sqrt();
        let limit = self.iteration_limit();

        let mut snapshot = self.snapshot(store, 0);
        let mut snapshot_taken = false;
        let mut primal_residual = f64::INFINITY;
        let mut dual_residual = f64::INFINITY;
        let mut stop_reason = StopReason::IterationBudgetExhausted;
        let mut iteration = 0;

        while iteration < limit {
            iteration += 1;
            let residuals = self.install(|| admm_step(store, rho, block));

            primal_residual = residuals.primal.sqrt();
            dual_residual = rho * residuals.dual.sqrt();
            let epsilon_primal = self.config.epsilon_abs * sqrt_n
                + self.config.epsilon_rel * residuals.ax_norm.sqrt().max(residuals.bz_norm.sqrt());
            let epsilon_dual = self.config.epsilon_abs * sqrt_n + self.config.epsilon_rel * residuals.ay_norm.sqrt();

            if iteration % self.config.compute_period == 0 || iteration == limit {
                let previous = snapshot;
                snapshot = self.snapshot(store, iteration);
                trace!(
                    "iteration {}: objective {:.6}, violated {}, primal {:.3e} (eps {:.3e}), dual {:.3e} (eps {:.3e})",
                    iteration,
                    snapshot.objective,
                    snapshot.violated_constraints,
                    primal_residual,
                    epsilon_primal,
                    dual_residual,
                    epsilon_dual
                );
                if let Some(observer) = observer.as_deref_mut() {
                    observer.on_snapshot(iteration, &snapshot);
                }
                let had_previous = snapshot_taken;
                snapshot_taken = true;
                if !self.config.run_full_iterations
                    && self.config.objective_break
                    && had_previous
                    && snapshot.violated_constraints == 0
                    && (snapshot.objective - previous.objective).abs() < self.config.tolerance
                {
                    stop_reason = StopReason::ObjectiveBreak;
                    break;
                }
            }

            let converged = iteration > 1 && primal_residual < epsilon_primal && dual_residual < epsilon_dual;
            if converged && !self.config.run_full_iterations && snapshot.violated_constraints == 0 {
                stop_reason = StopReason::Converged;
                break;
            }
        }

        if snapshot.iteration != iteration {
            snapshot = self.snapshot(store, iteration);
            if let Some(observer) = observer.as_deref_mut() {
                observer.on_snapshot(iteration, &snapshot);
            }
        }
        if snapshot.violated_constraints > 0 {
            warn!(
                "{} hard constraints still violated after {} iterations",
                snapshot.violated_constraints, iteration
            );
        }

        self.state = if stop_reason.is_converged() {
            ReasonerState::Converged
        } else {
            ReasonerState::IterationBudgetExhausted
        };
        info!(
            "ADMM finished after {} iterations ({:?}): objective {:.6}, primal {:.3e}, dual {:.3e}",
            iteration, stop_reason, snapshot.objective, primal_residual, dual_residual
        );

        OptimizationReport {
            objective: snapshot.objective,
            violated_constraints: snapshot.violated_constraints,
            iterations: iteration,
            primal_residual,
            dual_residual,
            stop_reason,
        }
    }
}

impl Reasoner for AdmmReasoner {
    fn optimize(
        &mut self,
        store: &mut TermStore,
        observer: Option<&mut dyn IterationObserver>,
    ) -> ReasonerResult<OptimizationReport> {
        let report = self.run(store, observer);
        let mut stats = self.stats.lock();
        stats.runs += 1;
        stats.total_iterations += report.iterations;
        if report.stop_reason.is_converged() {
            stats.converged_runs += 1;
        }
        stats.last_objective = Some(report.objective);
        Ok(report)
    }

    fn set_budget(&mut self, budget: f64) -> ReasonerResult<()> {
        if !(budget > 0.0 && budget <= 1.0) {
            return Err(ReasonerError::InvalidBudget(budget));
        }
        self.budget = budget;
        Ok(())
    }
}

fn objective_snapshot(store: &TermStore, tolerance: f64, iteration: usize) -> ObjectiveSnapshot {
    let z = store.consensus_values();
    let (objective, violated_constraints) = store
        .terms()
        .par_iter()
        .map(|t| (t.evaluate(z), usize::from(t.violation(z) > tolerance)))
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
    ObjectiveSnapshot {
        iteration,
        objective,
        violated_constraints,
    }
}

/// One ADMM iteration; returns the residual sums.
fn admm_step(store: &mut TermStore, rho: f64, block: usize) -> Residuals {
    {
        let (terms, z) = store.term_phase();
        terms.par_chunks_mut(block).for_each(|chunk| {
            for term in chunk {
                term.update_lagrange(rho, z);
                term.minimize(rho, z);
            }
        });
    }

    let (z, fixed, records, terms) = store.consensus_phase();
    z.par_chunks_mut(block)
        .enumerate()
        .map(|(b, chunk)| {
            let mut acc = Residuals::default();
            for (offset, value) in chunk.iter_mut().enumerate() {
                let k = b * block + offset;
                let locals = &records[k];
                if locals.is_empty() {
                    continue;
                }
                let old = *value;
                let new = if fixed[k] {
                    old
                } else {
                    let sum: f64 = locals
                        .iter()
                        .map(|r| {
                            let term: &AdmmTerm = &terms[r.term];
                            term.local_values()[r.slot] + term.lagrange()[r.slot] / rho
                        })
                        .sum();
                    (sum / locals.len() as f64).clamp(0.0, 1.0)
                };
                for r in locals {
                    let term = &terms[r.term];
                    let x = term.local_values()[r.slot];
                    let y = term.lagrange()[r.slot];
                    acc.primal += (x - new) * (x - new);
                    acc.ax_norm += x * x;
                    acc.ay_norm += y * y;
                }
                let count = locals.len() as f64;
                acc.dual += (old - new) * (old - new) * count;
                acc.bz_norm += new * new * count;
                *value = new;
            }
            acc
        })
        .reduce(Residuals::default, Residuals::merge)
}
