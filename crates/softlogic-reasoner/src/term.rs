//! ADMM optimization terms.
//!
//! Every term owns a local copy `x` of the consensus variables it touches
//! and the matching Lagrange multipliers `y`. With `a = z − y/ρ`, the local
//! step minimizes `f(x) + ρ/2·‖x − a‖²`, which each term kind solves in
//! closed form.

use serde::{Deserialize, Serialize};
use softlogic_grounding::{Comparator, GroundRuleId};

/// `c·x − b` over a few consensus variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Hyperplane {
    indices: Vec<usize>,
    coefficients: Vec<f64>,
    constant: f64,
    norm_squared: f64,
}

impl Hyperplane {
    /// `indices` are consensus indices and must not repeat.
    pub fn new(indices: Vec<usize>, coefficients: Vec<f64>, constant: f64) -> Self {
        debug_assert_eq!(indices.len(), coefficients.len());
        let norm_squared = coefficients.iter().map(|c| c * c).sum();
        Hyperplane {
            indices,
            coefficients,
            constant,
            norm_squared,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn norm_squared(&self) -> f64 {
        self.norm_squared
    }

    /// `c·x` for local values.
    pub fn dot(&self, local: &[f64]) -> f64 {
        self.coefficients.iter().zip(local).map(|(c, x)| c * x).sum()
    }

    /// `c·z − b` for consensus values.
    pub fn value_at(&self, consensus: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(&self.indices)
            .map(|(c, &i)| c * consensus[i])
            .sum::<f64>()
            - self.constant
    }

    pub(crate) fn remap(&mut self, mapping: &[Option<usize>]) -> bool {
        for index in self.indices.iter_mut() {
            match mapping.get(*index).copied().flatten() {
                Some(new) => *index = new,
                None => return false,
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TermKind {
    /// `w·(c·x − b)`
    LinearLoss { weight: f64 },
    /// `w·max(0, c·x − b)`
    HingeLoss { weight: f64 },
    /// `w·(c·x − b)²`
    SquaredLinearLoss { weight: f64 },
    /// `w·max(0, c·x − b)²`
    SquaredHingeLoss { weight: f64 },
    /// `c·x {≤, ≥, =} b`
    LinearConstraint { comparator: Comparator },
}

impl TermKind {
    pub fn weight(&self) -> Option<f64> {
        match *self {
            TermKind::LinearLoss { weight }
            | TermKind::HingeLoss { weight }
            | TermKind::SquaredLinearLoss { weight }
            | TermKind::SquaredHingeLoss { weight } => Some(weight),
            TermKind::LinearConstraint { .. } => None,
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, TermKind::LinearConstraint { .. })
    }

    pub fn is_squared(&self) -> bool {
        matches!(
            self,
            TermKind::SquaredLinearLoss { .. } | TermKind::SquaredHingeLoss { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdmmTerm {
    kind: TermKind,
    hyperplane: Hyperplane,
    x: Vec<f64>,
    y: Vec<f64>,
    ground_rule: Option<GroundRuleId>,
}

impl AdmmTerm {
    /// Local values start at the current consensus values, multipliers at 0.
    pub fn new(kind: TermKind, hyperplane: Hyperplane, consensus: &[f64]) -> Self {
        let x = hyperplane.indices().iter().map(|&i| consensus[i]).collect();
        let y = vec![0.0; hyperplane.len()];
        AdmmTerm {
            kind,
            hyperplane,
            x,
            y,
            ground_rule: None,
        }
    }

    pub fn with_ground_rule(mut self, id: GroundRuleId) -> Self {
        self.ground_rule = Some(id);
        self
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    pub fn hyperplane(&self) -> &Hyperplane {
        &self.hyperplane
    }

    pub fn ground_rule(&self) -> Option<GroundRuleId> {
        self.ground_rule
    }

    pub fn local_values(&self) -> &[f64] {
        &self.x
    }

    pub fn lagrange(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn weight(&self) -> Option<f64> {
        self.kind.weight()
    }

    /// Returns `false` for constraints, which carry no weight.
    pub fn set_weight(&mut self, new_weight: f64) -> bool {
        match &mut self.kind {
            TermKind::LinearLoss { weight }
            | TermKind::HingeLoss { weight }
            | TermKind::SquaredLinearLoss { weight }
            | TermKind::SquaredHingeLoss { weight } => {
                *weight = new_weight;
                true
            }
            TermKind::LinearConstraint { .. } => false,
        }
    }

    /// Restart from the given consensus values with zero multipliers.
    pub fn reset(&mut self, consensus: &[f64]) {
        for (x, &i) in self.x.iter_mut().zip(self.hyperplane.indices()) {
            *x = consensus[i];
        }
        self.y.iter_mut().for_each(|y| *y = 0.0);
    }

    /// `y ← y + ρ(x − z)`
    pub fn update_lagrange(&mut self, step_size: f64, consensus: &[f64]) {
        for ((y, x), &i) in self.y.iter_mut().zip(&self.x).zip(self.hyperplane.indices()) {
            *y += step_size * (x - consensus[i]);
        }
    }

    /// Local ADMM step.
    pub fn minimize(&mut self, step_size: f64, consensus: &[f64]) {
        for ((x, y), &i) in self.x.iter_mut().zip(&self.y).zip(self.hyperplane.indices()) {
            *x = consensus[i] - y / step_size;
        }
        let b = self.hyperplane.constant;
        let ca = self.hyperplane.dot(&self.x);

        match self.kind {
            TermKind::LinearLoss { weight } => self.step_linear(weight, step_size),
            TermKind::HingeLoss { weight } => {
                if ca <= b {
                    return;
                }
                // c·(a − w·c/ρ) stays on the active side
                if ca - weight * self.hyperplane.norm_squared / step_size >= b {
                    self.step_linear(weight, step_size);
                } else {
                    self.project(ca);
                }
            }
            TermKind::SquaredLinearLoss { weight } => self.solve_squared(weight, step_size),
            TermKind::SquaredHingeLoss { weight } => {
                if ca > b {
                    self.solve_squared(weight, step_size);
                }
            }
            TermKind::LinearConstraint { comparator } => {
                let satisfied = match comparator {
                    Comparator::LessThanEqual => ca <= b,
                    Comparator::GreaterThanEqual => ca >= b,
                    Comparator::Equal => false,
                };
                if !satisfied {
                    self.project(ca);
                }
            }
        }
    }

    fn step_linear(&mut self, weight: f64, step_size: f64) {
        for (x, c) in self.x.iter_mut().zip(&self.hyperplane.coefficients) {
            *x -= weight * c / step_size;
        }
    }

    /// Projection of `a` (currently in `x`) onto `c·x = b`.
    fn project(&mut self, ca: f64) {
        let norm = self.hyperplane.norm_squared;
        if norm == 0.0 {
            return;
        }
        let scale = (ca - self.hyperplane.constant) / norm;
        for (x, c) in self.x.iter_mut().zip(&self.hyperplane.coefficients) {
            *x -= c * scale;
        }
    }

    /// Solves `(ρI + 2w·ccᵀ)x = ρa + 2wb·c` by Sherman–Morrison.
    fn solve_squared(&mut self, weight: f64, step_size: f64) {
        let norm = self.hyperplane.norm_squared;
        if norm == 0.0 {
            return;
        }
        let k = 2.0 * weight;
        let b = self.hyperplane.constant;
        let coefficients = &self.hyperplane.coefficients;
        for (x, c) in self.x.iter_mut().zip(coefficients) {
            *x = step_size * *x + k * b * c;
        }
        let cv: f64 = coefficients.iter().zip(&self.x).map(|(c, v)| c * v).sum();
        let scale = k * cv / (step_size + k * norm);
        for (x, c) in self.x.iter_mut().zip(coefficients) {
            *x = (*x - c * scale) / step_size;
        }
    }

    /// Weighted loss at the consensus point; constraints contribute 0.
    pub fn evaluate(&self, consensus: &[f64]) -> f64 {
        let value = self.hyperplane.value_at(consensus);
        match self.kind {
            TermKind::LinearLoss { weight } => weight * value,
            TermKind::HingeLoss { weight } => weight * value.max(0.0),
            TermKind::SquaredLinearLoss { weight } => weight * value * value,
            TermKind::SquaredHingeLoss { weight } => {
                let hinge = value.max(0.0);
                weight * hinge * hinge
            }
            TermKind::LinearConstraint { .. } => 0.0,
        }
    }

    /// Amount by which a constraint is violated at the consensus point.
    pub fn violation(&self, consensus: &[f64]) -> f64 {
        let TermKind::LinearConstraint { comparator } = self.kind else {
            return 0.0;
        };
        comparator.violation(self.hyperplane.value_at(consensus), 0.0)
    }

    pub(crate) fn remap(&mut self, mapping: &[Option<usize>]) -> bool {
        self.hyperplane.remap(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn term(kind: TermKind, coefficients: Vec<f64>, constant: f64, z: &[f64]) -> AdmmTerm {
        let indices = (0..coefficients.len()).collect();
        AdmmTerm::new(kind, Hyperplane::new(indices, coefficients, constant), z)
    }

    #[test]
    fn test_linear_loss_step() {
        let z = [0.5];
        let mut t = term(TermKind::LinearLoss { weight: 2.0 }, vec![1.0], 0.0, &z);
        t.minimize(1.0, &z);
        assert_abs_diff_eq!(t.local_values()[0], -1.5);
    }

    #[test]
    fn test_hinge_inactive_side() {
        // max(0, x − 0.8) at 0.5 is flat.
        let z = [0.5];
        let mut t = term(TermKind::HingeLoss { weight: 1.0 }, vec![1.0], 0.8, &z);
        t.minimize(1.0, &z);
        assert_abs_diff_eq!(t.local_values()[0], 0.5);
    }

    #[test]
    fn test_hinge_linear_side() {
        // max(0, x − 0.2) from 0.9 with w/ρ = 0.5 lands at 0.4 ≥ 0.2.
        let z = [0.9];
        let mut t = term(TermKind::HingeLoss { weight: 0.5 }, vec![1.0], 0.2, &z);
        t.minimize(1.0, &z);
        assert_abs_diff_eq!(t.local_values()[0], 0.4);
    }

    #[test]
    fn test_hinge_projects_to_kink() {
        // Linear step would overshoot past 0.2, so x stops at the hinge.
        let z = [0.9];
        let mut t = term(TermKind::HingeLoss { weight: 5.0 }, vec![1.0], 0.2, &z);
        t.minimize(1.0, &z);
        assert_abs_diff_eq!(t.local_values()[0], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_squared_linear_solve() {
        // min (x − 1)² + ½(x − 0)² ⇒ x = 2/3.
        let z = [0.0];
        let mut t = term(TermKind::SquaredLinearLoss { weight: 1.0 }, vec![1.0], 1.0, &z);
        t.minimize(1.0, &z);
        assert_abs_diff_eq!(t.local_values()[0], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_squared_linear_two_variables() {
        // Stationarity: 2w·c(c·x − b) + ρ(x − a) = 0.
        let z = [0.2, 0.7];
        let (w, rho, b) = (1.5, 2.0, 0.4);
        let c = [1.0, -2.0];
        let mut t = term(TermKind::SquaredLinearLoss { weight: w }, c.to_vec(), b, &z);
        t.minimize(rho, &z);
        let x = t.local_values();
        let cx = c[0] * x[0] + c[1] * x[1];
        for i in 0..2 {
            let gradient = 2.0 * w * c[i] * (cx - b) + rho * (x[i] - z[i]);
            assert_abs_diff_eq!(gradient, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_squared_hinge_inactive() {
        let z = [0.1, 0.2];
        let mut t = term(TermKind::SquaredHingeLoss { weight: 3.0 }, vec![1.0, 1.0], 1.0, &z);
        t.minimize(1.0, &z);
        assert_eq!(t.local_values(), &[0.1, 0.2]);
    }

    #[test]
    fn test_constraints() {
        let z = [0.3, 0.3];
        let mut eq = term(
            TermKind::LinearConstraint { comparator: Comparator::Equal },
            vec![1.0, 1.0],
            1.0,
            &z,
        );
        eq.minimize(1.0, &z);
        assert_abs_diff_eq!(eq.local_values()[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(eq.local_values()[1], 0.5, epsilon = 1e-12);

        let mut lte = term(
            TermKind::LinearConstraint { comparator: Comparator::LessThanEqual },
            vec![1.0, 1.0],
            1.0,
            &z,
        );
        lte.minimize(1.0, &z);
        assert_eq!(lte.local_values(), &[0.3, 0.3]);

        let mut gte = term(
            TermKind::LinearConstraint { comparator: Comparator::GreaterThanEqual },
            vec![1.0, 1.0],
            1.0,
            &z,
        );
        gte.minimize(1.0, &z);
        assert_abs_diff_eq!(gte.local_values()[0] + gte.local_values()[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gte.violation(&z), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_norm_leaves_point() {
        let z = [0.4];
        let mut t = term(
            TermKind::LinearConstraint { comparator: Comparator::Equal },
            vec![0.0],
            1.0,
            &z,
        );
        t.minimize(1.0, &z);
        assert_eq!(t.local_values(), &[0.4]);
    }

    #[test]
    fn test_lagrange_update_and_reset() {
        let z = [0.5];
        let mut t = term(TermKind::LinearLoss { weight: 1.0 }, vec![1.0], 0.0, &z);
        t.minimize(2.0, &z);
        t.update_lagrange(2.0, &z);
        assert_abs_diff_eq!(t.lagrange()[0], -1.0);
        t.reset(&[0.1]);
        assert_eq!(t.local_values(), &[0.1]);
        assert_eq!(t.lagrange(), &[0.0]);
    }

    #[test]
    fn test_evaluate() {
        let z = [1.0, 0.0];
        let hinge = term(TermKind::HingeLoss { weight: 2.0 }, vec![1.0, -1.0], 0.0, &z);
        assert_abs_diff_eq!(hinge.evaluate(&z), 2.0);
        let squared = term(TermKind::SquaredHingeLoss { weight: 2.0 }, vec![1.0, -1.0], 0.5, &z);
        assert_abs_diff_eq!(squared.evaluate(&z), 0.5);
        assert_eq!(squared.violation(&z), 0.0);
    }

    #[test]
    fn test_set_weight() {
        let z = [0.0];
        let mut t = term(TermKind::HingeLoss { weight: 1.0 }, vec![1.0], 0.0, &z);
        assert!(t.set_weight(4.0));
        assert_eq!(t.weight(), Some(4.0));
        let mut c = term(
            TermKind::LinearConstraint { comparator: Comparator::Equal },
            vec![1.0],
            0.0,
            &z,
        );
        assert!(!c.set_weight(4.0));
    }
}
