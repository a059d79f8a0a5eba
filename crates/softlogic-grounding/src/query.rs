//! Conjunctive query execution against the atom store.
//!
//! Grounding queries are conjunctions of positive atoms. The executor binds
//! variables by a nested-loop join over materialized atoms, visiting the atom
//! with the most bound arguments first, and projects the requested variables.

use indexmap::IndexSet;
use softlogic_ir::{Atom, Constant, Formula, Term, Variable, VariableAssignment};

use crate::{AtomStore, Database, GroundingError, GroundingResult};

/// Rows of constants for a fixed list of variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultList {
    variables: Vec<Variable>,
    rows: Vec<Vec<Constant>>,
}

impl ResultList {
    pub fn new(variables: Vec<Variable>) -> Self {
        ResultList {
            variables,
            rows: Vec::new(),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn push(&mut self, row: Vec<Constant>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<Constant>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `index` as a variable assignment.
    pub fn assignment(&self, index: usize) -> Option<VariableAssignment> {
        self.rows.get(index).map(|row| {
            self.variables
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }

    pub fn assignments(&self) -> impl Iterator<Item = VariableAssignment> + '_ {
        (0..self.rows.len()).filter_map(move |i| self.assignment(i))
    }
}

/// Executes grounding queries.
pub trait QueryExecutor {
    /// Evaluate a conjunction of atoms under a partial assignment and return
    /// the distinct bindings of `projection`.
    fn execute_query(
        &self,
        query: &Formula,
        partial: &VariableAssignment,
        projection: &[Variable],
    ) -> GroundingResult<ResultList>;
}

/// A store that can both answer queries and hand out atoms.
pub trait GroundingStore: AtomStore + QueryExecutor {}

impl<T: AtomStore + QueryExecutor> GroundingStore for T {}

/// Flatten a query into its conjuncts. Only atoms and conjunctions are accepted.
pub fn query_atoms(query: &Formula) -> GroundingResult<Vec<&Atom>> {
    fn collect<'a>(f: &'a Formula, root: &Formula, out: &mut Vec<&'a Atom>) -> GroundingResult<()> {
        match f {
            Formula::Atom(a) => {
                out.push(a);
                Ok(())
            }
            Formula::And(ops) => ops.iter().try_for_each(|op| collect(op, root, out)),
            _ => Err(GroundingError::UnsupportedQuery {
                query: root.to_string(),
                reason: "only conjunctions of atoms can be queried".to_string(),
            }),
        }
    }
    let mut out = Vec::new();
    collect(query, query, &mut out)?;
    Ok(out)
}

impl QueryExecutor for Database {
    fn execute_query(
        &self,
        query: &Formula,
        partial: &VariableAssignment,
        projection: &[Variable],
    ) -> GroundingResult<ResultList> {
        let atoms = query_atoms(query)?;
        for atom in &atoms {
            self.predicates().validate_atom(atom)?;
        }
        let order = join_order(self, &atoms, partial);

        let mut seen: IndexSet<Vec<Constant>> = IndexSet::new();
        let mut assignment = partial.clone();
        let mut failure = None;
        join(self, &order, 0, &mut assignment, &mut |binding| {
            match project(binding, projection, query) {
                Ok(row) => {
                    seen.insert(row);
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let mut result = ResultList::new(projection.to_vec());
        for row in seen {
            result.push(row);
        }
        Ok(result)
    }
}

fn project(binding: &VariableAssignment, projection: &[Variable], query: &Formula) -> GroundingResult<Vec<Constant>> {
    projection
        .iter()
        .map(|v| {
            binding.get(v).cloned().ok_or_else(|| GroundingError::UnsupportedQuery {
                query: query.to_string(),
                reason: format!("projected variable {} is not bound", v),
            })
        })
        .collect()
}

/// Greedy order: most bound arguments first, then fewest candidate atoms.
fn join_order<'a>(db: &Database, atoms: &[&'a Atom], partial: &VariableAssignment) -> Vec<&'a Atom> {
    let mut bound: IndexSet<&str> = partial.keys().map(String::as_str).collect();
    let mut remaining: Vec<&'a Atom> = atoms.to_vec();
    let mut order = Vec::with_capacity(atoms.len());
    while !remaining.is_empty() {
        let best = remaining
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                let score = |atom: &Atom| {
                    let bound_args = atom
                        .args
                        .iter()
                        .filter(|t| match t {
                            Term::Const(_) => true,
                            Term::Var(v) => bound.contains(v.as_str()),
                        })
                        .count();
                    (bound_args, std::cmp::Reverse(db.candidate_count(&atom.predicate)))
                };
                score(a).cmp(&score(b))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        let atom = remaining.remove(best);
        for term in &atom.args {
            if let Term::Var(v) = term {
                bound.insert(v.as_str());
            }
        }
        order.push(atom);
    }
    order
}

fn join<F>(db: &Database, order: &[&Atom], depth: usize, assignment: &mut VariableAssignment, emit: &mut F)
where
    F: FnMut(&VariableAssignment),
{
    let Some(atom) = order.get(depth) else {
        emit(assignment);
        return;
    };

    // Fully bound: direct index lookup.
    if let Ok(args) = atom.ground(assignment) {
        let visible = db
            .get_atom(&atom.predicate, &args)
            .and_then(|id| db.atom(id))
            .is_some_and(|a| a.is_materialized());
        if visible {
            join(db, order, depth + 1, assignment, emit);
        }
        return;
    }

    for candidate in db.atoms_of(&atom.predicate) {
        if let Some(mut extended) = atom.unify(candidate.args(), assignment) {
            std::mem::swap(assignment, &mut extended);
            join(db, order, depth + 1, assignment, emit);
            std::mem::swap(assignment, &mut extended);
        }
    }
}
