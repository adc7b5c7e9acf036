//! Progress and result types of a lexicographic run.

use std::collections::BTreeMap;

use crate::continuous::{SimplexResult, SolveStatus};
use crate::model::Tableau;
use crate::rational::Rational;

/// Outcome of a whole priority sequence.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LexicographicGoalResult {
    /// `Optimal` if every priority was solved, otherwise the status of the
    /// first failing priority.
    pub status: SolveStatus,
    /// One entry per attempted priority, in solve order (including the
    /// failing one, if any).
    pub stages: Vec<SimplexResult>,
    /// Achieved objective per successfully solved priority.
    pub objectives: BTreeMap<u32, Rational>,
    /// Priority that stopped the run.
    pub failed_priority: Option<u32>,
    /// Working tableau after the last successful stage, with every solved
    /// priority locked.
    pub solution: Tableau,
}

impl LexicographicGoalResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Solved variable values in column order.
    pub fn values(&self) -> Vec<Rational> {
        self.solution.values()
    }
}

/// One pulled step of [`solve_progressively`](super::LexicographicCoordinator::solve_progressively).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressSnapshot {
    /// Human-readable status line.
    pub message: String,
    /// Priority the snapshot refers to, `None` on the terminal snapshot.
    pub priority: Option<u32>,
    /// Set on the terminal snapshot only.
    pub done: bool,
    /// Present on the terminal snapshot only.
    pub result: Option<LexicographicGoalResult>,
}

/// One pulled step of the matrix entry point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixProgress {
    pub message: String,
    pub done: bool,
    /// Status of the hard solve; `None` until done.
    pub status: Option<SolveStatus>,
    /// Best-effort variable values; `None` until done.
    pub solution: Option<Vec<f64>>,
}
