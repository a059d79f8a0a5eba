//! Property-based tests for SoftLogic IR
//!
//! Normal form conversions must preserve truth under every interpretation
//! and be stable when applied twice.

use proptest::prelude::*;
use softlogic_ir::{to_dnf, to_nnf, Atom, Formula, FormulaAnalysis};

const PROPOSITIONS: [&str; 4] = ["A", "B", "C", "D"];

/// Propositional atoms drawn from a small fixed alphabet so that truth tables
/// can be enumerated exhaustively.
fn arb_atom() -> impl Strategy<Value = Formula> {
    prop::sample::select(PROPOSITIONS.to_vec()).prop_map(|name| Formula::atom(name, vec![]))
}

fn arb_formula(depth: u32) -> impl Strategy<Value = Formula> {
    arb_atom().prop_recursive(depth, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Formula::negate),
            prop::collection::vec(inner.clone(), 2..=3).prop_map(Formula::And),
            prop::collection::vec(inner.clone(), 2..=3).prop_map(Formula::Or),
            (inner.clone(), inner).prop_map(|(a, b)| Formula::implies(a, b)),
        ]
    })
}

fn interpretations() -> impl Iterator<Item = impl Fn(&Atom) -> bool> {
    (0u32..(1 << PROPOSITIONS.len())).map(|mask| {
        move |atom: &Atom| {
            let index = PROPOSITIONS
                .iter()
                .position(|p| *p == atom.predicate)
                .unwrap_or(0);
            mask & (1 << index) != 0
        }
    })
}

proptest! {
    #[test]
    fn prop_nnf_preserves_truth(f in arb_formula(4)) {
        let nnf = to_nnf(&f);
        prop_assert!(nnf.is_nnf());
        for interpretation in interpretations() {
            prop_assert_eq!(f.evaluate(&interpretation), nnf.evaluate(&interpretation));
        }
    }

    #[test]
    fn prop_dnf_preserves_truth(f in arb_formula(4)) {
        let dnf = to_dnf(&f);
        prop_assert!(dnf.is_dnf(), "not in DNF: {}", dnf);
        for interpretation in interpretations() {
            prop_assert_eq!(f.evaluate(&interpretation), dnf.evaluate(&interpretation));
        }
    }

    #[test]
    fn prop_dnf_is_fixed_point(f in arb_formula(4)) {
        let once = to_dnf(&f);
        let twice = to_dnf(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_analysis_clause_count_matches_dnf(f in arb_formula(3)) {
        let analysis = FormulaAnalysis::new(&f, usize::MAX).unwrap();
        let expected = match to_dnf(&f) {
            Formula::Or(disjuncts) => disjuncts.len(),
            _ => 1,
        };
        prop_assert_eq!(analysis.num_clauses(), expected);
    }

    #[test]
    fn prop_flatten_preserves_truth(f in arb_formula(4)) {
        let flat = f.flatten();
        for interpretation in interpretations() {
            prop_assert_eq!(f.evaluate(&interpretation), flat.evaluate(&interpretation));
        }
    }
}
