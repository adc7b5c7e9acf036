//! Default ratio test and pivot application.

use super::types::{PivotKind, RatioTest, RatioTestResult};
use crate::diagnostics::{Diagnostics, PivotTrace};
use crate::error::{GoalError, GoalResult};
use crate::model::{BoundState, Tableau};
use crate::rational::Rational;

/// Bounded-variable ratio test over exact row bands.
///
/// Rows whose band is open on the blocking side (the `MIN_VALUE` /
/// `MAX_VALUE` markers) never block.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedRatioTest;

impl BoundedRatioTest {
    pub fn new() -> Self {
        Self
    }
}

impl RatioTest for BoundedRatioTest {
    fn select(
        &self,
        tableau: &mut Tableau,
        entering: usize,
        priority: u32,
    ) -> GoalResult<RatioTestResult> {
        let var = tableau.variable(entering)?;
        let direction: i64 = match var.bound_state() {
            BoundState::AtLower => 1,
            BoundState::AtUpper => -1,
            BoundState::Basic => return Ok(RatioTestResult::degenerate(entering)),
        };
        let theta_bound = var.range()?;
        if !theta_bound.is_positive() {
            return Ok(RatioTestResult::degenerate(entering));
        }

        // (distance, row, landing bound)
        let mut best: Option<(Rational, usize, Rational)> = None;
        for r in tableau.rows_at(priority) {
            let a = tableau.coefficient(r, entering)?;
            if a.abs() <= Rational::EPSILON {
                continue;
            }
            let rate = if direction > 0 { a } else { -a };
            let state = tableau.row_state(r)?;
            let (distance, target) = if rate.is_positive() {
                if !state.has_upper() {
                    continue;
                }
                (state.upper.try_sub(state.basic_value)?.try_div(rate)?, state.upper)
            } else {
                if !state.has_lower() {
                    continue;
                }
                (state.basic_value.try_sub(state.lower)?.try_div(-rate)?, state.lower)
            };
            if !distance.is_positive() {
                continue;
            }
            // Strict comparison keeps the lowest row index on ties.
            if best.map_or(true, |(theta, _, _)| distance < theta) {
                best = Some((distance, r, target));
            }
        }

        match best {
            Some((theta, row, target)) if theta <= theta_bound => {
                let mut state = tableau.row_state(row)?.clone();
                state.pending_target = Some(target);
                tableau.set_row_state(row, state)?;
                Ok(RatioTestResult {
                    kind: PivotKind::RowPivot,
                    entering,
                    direction,
                    delta: theta,
                    key_row: Some(row),
                    target_bound: Some(target),
                })
            }
            _ => Ok(RatioTestResult {
                kind: PivotKind::PreEmptiveBoundHit,
                entering,
                direction,
                delta: theta_bound,
                key_row: None,
                target_bound: None,
            }),
        }
    }
}

/// Applies a ratio-test outcome: moves the entering variable by
/// `direction · delta`, refreshes row basic values and records the step.
///
/// Returns `false` (and changes nothing) for a degenerate pivot.
pub fn apply_pivot(
    tableau: &mut Tableau,
    result: &RatioTestResult,
    diagnostics: &mut Diagnostics,
) -> GoalResult<bool> {
    let var = tableau.variable(result.entering)?;
    let new_value = match result.kind {
        PivotKind::DegeneratePivot => return Ok(false),
        PivotKind::PreEmptiveBoundHit => {
            if result.direction > 0 {
                var.upper()
            } else {
                var.lower()
            }
        }
        PivotKind::RowPivot => {
            let step = if result.direction > 0 {
                result.delta
            } else {
                -result.delta
            };
            var.value().try_add(step)?
        }
    };
    tableau.set_value(result.entering, new_value)?;
    tableau.refresh_row_states()?;
    if let (Some(row), Some(target)) = (result.key_row, result.target_bound) {
        let landed = tableau.row_state(row)?.basic_value;
        if landed != target {
            return Err(GoalError::StateInvariant(format!(
                "row {row} landed at {landed}, expected {target}"
            )));
        }
    }
    diagnostics.record_pivot(PivotTrace {
        entering_column: result.entering,
        leaving_row: result.key_row,
        step: result.delta,
    });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundedVariable, GoalRow, GoalSense, RowState};

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    /// Two unit variables, rows given as (priority, coeff_a, coeff_b).
    fn tableau(rows: &[(u32, i64, i64)]) -> Tableau {
        let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
        let goal_rows = rows
            .iter()
            .enumerate()
            .map(|(i, &(p, ca, cb))| {
                GoalRow::new(format!("row{i}"), GoalSense::Maximize, p)
                    .with_coefficient("a", Rational::from(ca as i32))
                    .with_coefficient("b", Rational::from(cb as i32))
            })
            .collect();
        Tableau::new(vars, goal_rows).unwrap()
    }

    fn band(t: &mut Tableau, row: usize, lower: Rational, upper: Rational) {
        let basic = t.evaluate_row(row).unwrap();
        t.set_row_state(
            row,
            RowState {
                basic_value: basic,
                lower,
                upper,
                pending_target: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_row_pivot() {
        let mut t = tableau(&[(0, 1, 0)]);
        band(&mut t, 0, Rational::MIN_VALUE, r(1, 2));
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.kind, PivotKind::RowPivot);
        assert_eq!(res.delta, r(1, 2));
        assert_eq!(res.key_row, Some(0));
        assert_eq!(t.row_state(0).unwrap().pending_target, Some(r(1, 2)));
    }

    #[test]
    fn test_bound_hit_when_row_is_farther() {
        let mut t = tableau(&[(0, 1, 0)]);
        band(&mut t, 0, Rational::MIN_VALUE, Rational::from(2));
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.kind, PivotKind::PreEmptiveBoundHit);
        assert_eq!(res.delta, Rational::ONE);
        assert_eq!(res.key_row, None);
    }

    #[test]
    fn test_equal_distance_prefers_row() {
        let mut t = tableau(&[(0, 1, 0)]);
        band(&mut t, 0, Rational::MIN_VALUE, Rational::ONE);
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.kind, PivotKind::RowPivot);
        assert_eq!(res.delta, Rational::ONE);
    }

    #[test]
    fn test_tie_breaks_on_lowest_row() {
        let mut t = tableau(&[(0, 2, 0), (0, 1, 0), (0, 2, 0)]);
        band(&mut t, 0, Rational::MIN_VALUE, Rational::ONE);
        band(&mut t, 1, Rational::MIN_VALUE, r(1, 2));
        band(&mut t, 2, Rational::MIN_VALUE, Rational::ONE);
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.key_row, Some(0));
        assert_eq!(res.delta, r(1, 2));
    }

    #[test]
    fn test_other_priorities_ignored() {
        let mut t = tableau(&[(1, 1, 0), (0, 1, 0)]);
        band(&mut t, 0, Rational::MIN_VALUE, r(1, 10));
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.kind, PivotKind::PreEmptiveBoundHit);
    }

    #[test]
    fn test_moving_down_from_upper() {
        let mut t = tableau(&[(0, 1, 0)]);
        t.set_value(0, Rational::ONE).unwrap();
        band(&mut t, 0, r(1, 4), Rational::MAX_VALUE);
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert_eq!(res.direction, -1);
        assert_eq!(res.kind, PivotKind::RowPivot);
        assert_eq!(res.delta, r(3, 4));
        assert_eq!(res.target_bound, Some(r(1, 4)));

        let mut diag = Diagnostics::new();
        assert!(apply_pivot(&mut t, &res, &mut diag).unwrap());
        assert_eq!(t.variables()[0].value(), r(1, 4));
        assert_eq!(t.variables()[0].bound_state(), BoundState::Basic);
        assert_eq!(diag.pivots(), 1);
        assert_eq!(diag.pivot_details()[0].leaving_row, Some(0));
    }

    #[test]
    fn test_degenerate_cases() {
        let mut t = tableau(&[(0, 1, 0)]);
        t.set_value(0, r(1, 2)).unwrap();
        let res = BoundedRatioTest.select(&mut t, 0, 0).unwrap();
        assert!(res.is_degenerate());

        let mut diag = Diagnostics::new();
        assert!(!apply_pivot(&mut t, &res, &mut diag).unwrap());
        assert_eq!(diag.pivots(), 0);

        let fixed = BoundedVariable::new("f", Rational::ONE, Rational::ONE).unwrap();
        let row = GoalRow::new("g", GoalSense::Maximize, 0).with_coefficient("f", Rational::ONE);
        let mut t = Tableau::new(vec![fixed], vec![row]).unwrap();
        assert!(BoundedRatioTest.select(&mut t, 0, 0).unwrap().is_degenerate());
    }

    #[test]
    fn test_apply_bound_hit() {
        let mut t = tableau(&[(0, 3, 1)]);
        let res = BoundedRatioTest.select(&mut t, 1, 0).unwrap();
        assert_eq!(res.kind, PivotKind::PreEmptiveBoundHit);
        let mut diag = Diagnostics::new();
        apply_pivot(&mut t, &res, &mut diag).unwrap();
        assert_eq!(t.variables()[1].bound_state(), BoundState::AtUpper);
        assert_eq!(t.row_state(0).unwrap().basic_value, Rational::ONE);
    }
}
