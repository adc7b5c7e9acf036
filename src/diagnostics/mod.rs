//! Mergeable solve diagnostics.
//!
//! Counters and traces collected alongside solving. Every field is derived
//! from deterministic control flow, so two runs on identical input produce
//! equal [`Diagnostics`]; regression suites compare them directly.

use crate::model::{BoundState, Tableau};
use crate::rational::Rational;

/// One branching decision.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchTrace {
    /// Branching variable.
    pub variable: String,
    /// Bounds before the branch.
    pub old_bounds: (Rational, Rational),
    /// Bounds on the child edge.
    pub new_bounds: (Rational, Rational),
    /// Depth of the child node.
    pub depth: usize,
    /// Fractional distance of the relaxed value that triggered the branch.
    pub delta: Rational,
}

/// One applied ratio-test step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PivotTrace {
    /// Entering column.
    pub entering_column: usize,
    /// Row that left the basis, `None` for a bound hit.
    pub leaving_row: Option<usize>,
    /// Step length along the entering column.
    pub step: Rational,
}

/// Counters and traces for one solve, one node, or an aggregate of many.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    row_evaluations: u64,
    candidates_scored: u64,
    pivots: u64,
    nodes_explored: u64,
    branches: u64,
    max_depth: usize,
    first_branch_variable: Option<String>,
    last_branch_variable: Option<String>,
    branch_details: Vec<BranchTrace>,
    pivot_details: Vec<PivotTrace>,
    incumbent_history: Vec<Rational>,
    final_bound_states: Vec<(String, BoundState)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Goal-row evaluations performed while scoring candidates.
    pub fn row_evaluations(&self) -> u64 {
        self.row_evaluations
    }

    /// Candidate points scored by the continuous search.
    pub fn candidates_scored(&self) -> u64 {
        self.candidates_scored
    }

    pub fn pivots(&self) -> u64 {
        self.pivots
    }

    /// Branch-and-bound nodes popped and solved.
    pub fn nodes_explored(&self) -> u64 {
        self.nodes_explored
    }

    pub fn branches(&self) -> u64 {
        self.branches
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn first_branch_variable(&self) -> Option<&str> {
        self.first_branch_variable.as_deref()
    }

    pub fn last_branch_variable(&self) -> Option<&str> {
        self.last_branch_variable.as_deref()
    }

    pub fn branch_details(&self) -> &[BranchTrace] {
        &self.branch_details
    }

    pub fn pivot_details(&self) -> &[PivotTrace] {
        &self.pivot_details
    }

    /// Merit of each successive incumbent.
    pub fn incumbent_history(&self) -> &[Rational] {
        &self.incumbent_history
    }

    /// Bound state of each variable in the final solution.
    pub fn final_bound_states(&self) -> &[(String, BoundState)] {
        &self.final_bound_states
    }

    pub(crate) fn record_row_evaluations(&mut self, count: u64) {
        self.row_evaluations += count;
    }

    pub(crate) fn record_candidate(&mut self) {
        self.candidates_scored += 1;
    }

    pub(crate) fn record_pivot(&mut self, trace: PivotTrace) {
        self.pivots += 1;
        self.pivot_details.push(trace);
    }

    pub(crate) fn record_node(&mut self, depth: usize) {
        self.nodes_explored += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    pub(crate) fn record_branch(&mut self, trace: BranchTrace) {
        self.branches += 1;
        self.max_depth = self.max_depth.max(trace.depth);
        if self.first_branch_variable.is_none() {
            self.first_branch_variable = Some(trace.variable.clone());
        }
        self.last_branch_variable = Some(trace.variable.clone());
        self.branch_details.push(trace);
    }

    pub(crate) fn record_incumbent(&mut self, merit: Rational) {
        self.incumbent_history.push(merit);
    }

    pub(crate) fn capture_bound_states(&mut self, tableau: &Tableau) {
        self.final_bound_states = tableau
            .variables()
            .iter()
            .map(|v| (v.name().to_string(), v.bound_state()))
            .collect();
    }

    /// Folds `other` into `self`. Counters add, traces append in order, and
    /// the later non-empty bound-state snapshot wins.
    pub fn merge(&mut self, other: &Diagnostics) {
        self.row_evaluations += other.row_evaluations;
        self.candidates_scored += other.candidates_scored;
        self.pivots += other.pivots;
        self.nodes_explored += other.nodes_explored;
        self.branches += other.branches;
        self.max_depth = self.max_depth.max(other.max_depth);
        if self.first_branch_variable.is_none() {
            self.first_branch_variable = other.first_branch_variable.clone();
        }
        if other.last_branch_variable.is_some() {
            self.last_branch_variable = other.last_branch_variable.clone();
        }
        self.branch_details.extend(other.branch_details.iter().cloned());
        self.pivot_details.extend(other.pivot_details.iter().cloned());
        self.incumbent_history
            .extend(other.incumbent_history.iter().copied());
        if !other.final_bound_states.is_empty() {
            self.final_bound_states = other.final_bound_states.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(var: &str, depth: usize) -> BranchTrace {
        BranchTrace {
            variable: var.into(),
            old_bounds: (Rational::ZERO, Rational::from(3)),
            new_bounds: (Rational::ZERO, Rational::ONE),
            depth,
            delta: Rational::new(1, 2).unwrap(),
        }
    }

    #[test]
    fn test_record_branch_tracks_first_and_last() {
        let mut d = Diagnostics::new();
        d.record_branch(branch("a", 1));
        d.record_branch(branch("b", 3));
        assert_eq!(d.branches(), 2);
        assert_eq!(d.max_depth(), 3);
        assert_eq!(d.first_branch_variable(), Some("a"));
        assert_eq!(d.last_branch_variable(), Some("b"));
    }

    #[test]
    fn test_merge() {
        let mut a = Diagnostics::new();
        a.record_row_evaluations(10);
        a.record_branch(branch("x", 1));
        a.record_incumbent(Rational::ONE);

        let mut b = Diagnostics::new();
        b.record_row_evaluations(5);
        b.record_pivot(PivotTrace {
            entering_column: 2,
            leaving_row: None,
            step: Rational::ONE,
        });
        b.record_branch(branch("y", 4));
        b.record_incumbent(Rational::from(2));

        a.merge(&b);
        assert_eq!(a.row_evaluations(), 15);
        assert_eq!(a.pivots(), 1);
        assert_eq!(a.branches(), 2);
        assert_eq!(a.max_depth(), 4);
        assert_eq!(a.first_branch_variable(), Some("x"));
        assert_eq!(a.last_branch_variable(), Some("y"));
        assert_eq!(a.incumbent_history(), &[Rational::ONE, Rational::from(2)]);
        assert_eq!(a.pivot_details().len(), 1);
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let mut a = Diagnostics::new();
        a.record_branch(branch("x", 2));
        let before = a.clone();
        a.merge(&Diagnostics::new());
        assert_eq!(a, before);
    }
}
