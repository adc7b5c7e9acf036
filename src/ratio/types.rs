//! Ratio-test contract and outcome types.

use crate::error::GoalResult;
use crate::model::Tableau;
use crate::rational::Rational;

/// What the ratio test decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PivotKind {
    /// No eligible entering variable or no positive step.
    DegeneratePivot,
    /// The entering variable reaches its own opposite bound first.
    PreEmptiveBoundHit,
    /// A row of the current priority blocks first and leaves the basis.
    RowPivot,
}

/// Outcome of one ratio test.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatioTestResult {
    pub kind: PivotKind,
    /// Entering column.
    pub entering: usize,
    /// +1 when the entering variable moves up from its lower bound, -1 when
    /// it moves down from its upper bound, 0 for a degenerate pivot.
    pub direction: i64,
    /// Step length (always non-negative).
    pub delta: Rational,
    /// Blocking row for [`PivotKind::RowPivot`].
    pub key_row: Option<usize>,
    /// Bound the key row lands on.
    pub target_bound: Option<Rational>,
}

impl RatioTestResult {
    pub fn degenerate(entering: usize) -> Self {
        Self {
            kind: PivotKind::DegeneratePivot,
            entering,
            direction: 0,
            delta: Rational::ZERO,
            key_row: None,
            target_bound: None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.kind == PivotKind::DegeneratePivot
    }
}

/// Pivot-selection strategy.
///
/// Implementations scan only the rows whose priority equals `priority`, and
/// must break ties between equally blocking rows by lowest row index. A
/// [`PivotKind::RowPivot`] records the key row's landing bound in that row's
/// `pending_target`, which is why the tableau is taken mutably.
pub trait RatioTest: Send + Sync {
    fn select(
        &self,
        tableau: &mut Tableau,
        entering: usize,
        priority: u32,
    ) -> GoalResult<RatioTestResult>;
}
