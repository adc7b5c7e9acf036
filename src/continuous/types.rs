//! Result types of a single-priority solve.

use crate::diagnostics::Diagnostics;
use crate::model::Tableau;
use crate::rational::Rational;

/// Outcome of a priority solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStatus {
    /// Every hard row holds and the objective is optimized.
    Optimal,
    /// No point satisfies the hard rows, or an `Equal` target stays out of
    /// reach.
    GoalViolation,
}

/// Result of solving one priority (or one branch-and-bound node).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimplexResult {
    pub status: SolveStatus,
    /// Achieved target-row value, or total soft deviation when the priority
    /// has no target row.
    pub objective_value: Rational,
    /// Higher-is-better form of the objective, used to rank incumbents.
    pub merit: Rational,
    pub diagnostics: Diagnostics,
    /// The tableau after the solve (unmodified on `GoalViolation`).
    pub solution: Tableau,
}

impl SimplexResult {
    /// A `GoalViolation` carrying the unmodified snapshot.
    pub fn violation(snapshot: Tableau, diagnostics: Diagnostics) -> Self {
        Self {
            status: SolveStatus::GoalViolation,
            objective_value: Rational::ZERO,
            merit: Rational::MIN_VALUE,
            diagnostics,
            solution: snapshot,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Solved variable values in column order.
    pub fn values(&self) -> Vec<Rational> {
        self.solution.values()
    }
}
