//! Single-priority continuous solver.

use tracing::{debug, info, trace, warn};

use super::config::SolverConfig;
use super::problem::{LinearRow, Phase, PriorityProblem, Scorer, Target, TargetKind};
use super::strategies::search;
use super::types::{SimplexResult, SolveStatus};
use crate::diagnostics::Diagnostics;
use crate::error::{GoalError, GoalResult};
use crate::model::{BoundState, Tableau};
use crate::ratio::{apply_pivot, BoundedRatioTest, RatioTest};
use crate::rational::Rational;

/// Denominator growth per snapping retry.
const SNAP_REFINE_FACTOR: i64 = 100;
/// Retries after the first snap before a point is given up.
const SNAP_REFINEMENTS: u32 = 3;

/// A row that must sit within `tol` of an exact right-hand side.
#[derive(Debug, Clone, Copy)]
struct HardRow {
    row: usize,
    rhs: Rational,
    tol: f64,
}

/// Optimizes one priority of a [`Tableau`] over the continuous relaxation.
///
/// Phase 1 pushes the priority's target row (or brings an `Equal` target to
/// its right-hand side) while every earlier locked row and every hard
/// equality holds. Phase 2 keeps the target at its achieved value and
/// minimizes soft deviation plus total variable usage. Integrality is
/// ignored here; see [`BranchAndBound`](crate::branch::BranchAndBound).
///
/// # Examples
///
/// ```
/// use u_goalprog::continuous::{ContinuousPrioritySolver, SolverConfig};
/// use u_goalprog::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
/// use u_goalprog::rational::Rational;
///
/// let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
/// let rows = vec![GoalRow::new("push", GoalSense::Maximize, 0)
///     .with_coefficient("a", Rational::ONE)
///     .with_coefficient("b", Rational::from(2))];
/// let mut tableau = Tableau::new(vars, rows).unwrap();
///
/// let solver = ContinuousPrioritySolver::new(SolverConfig::default());
/// let result = solver.solve_priority(&mut tableau, 0).unwrap();
/// assert!(result.is_optimal());
/// assert_eq!(result.objective_value, Rational::from(3));
/// ```
pub struct ContinuousPrioritySolver {
    config: SolverConfig,
    ratio_test: Box<dyn RatioTest>,
}

impl Default for ContinuousPrioritySolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl ContinuousPrioritySolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ratio_test: Box::new(BoundedRatioTest::new()),
        }
    }

    /// Replaces the ratio test used by the exact polish walk.
    pub fn with_ratio_test(mut self, ratio_test: impl RatioTest + 'static) -> Self {
        self.ratio_test = Box::new(ratio_test);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves `priority` and writes the solution back into `tableau`.
    ///
    /// On `GoalViolation` the tableau is left untouched. Errors are reserved
    /// for misuse: an invalid configuration, an unknown priority or a
    /// tableau whose variables sit outside their bounds.
    pub fn solve_priority(&self, tableau: &mut Tableau, priority: u32) -> GoalResult<SimplexResult> {
        self.config.validate().map_err(GoalError::InvalidArgument)?;
        if !tableau.priorities().contains(&priority) {
            return Err(GoalError::out_of_range(
                "priority",
                format!("no goal row has priority {priority}"),
            ));
        }
        tableau.validate_state()?;

        let config = &self.config;
        let mut diagnostics = Diagnostics::new();
        let problem = PriorityProblem::classify(tableau, priority, config)?;
        debug!(
            priority,
            equalities = problem.equalities.len(),
            soft = problem.soft.len(),
            has_target = problem.target.is_some(),
            "classified priority"
        );

        let hard = problem
            .equalities
            .iter()
            .map(|line| {
                Ok(HardRow {
                    row: line.row,
                    rhs: tableau.rhs(line.row)?,
                    tol: line.tol,
                })
            })
            .collect::<GoalResult<Vec<_>>>()?;

        // Phase 1: the target row.
        let mut reached: Option<(Tableau, Rational)> = None;
        if let Some(target) = &problem.target {
            let mut scorer = Scorer::new(
                &problem,
                config,
                Phase::Target {
                    target: target.clone(),
                },
            );
            search(&mut scorer, float_values(tableau), &mut diagnostics);
            let Some(best) = scorer.into_best() else {
                warn!(priority, "no point satisfies the hard rows");
                return Ok(SimplexResult::violation(tableau.clone(), diagnostics));
            };
            let Some(mut candidate) = self.snap_verified(&best.x, tableau, &hard)? else {
                warn!(priority, "phase 1 point leaves a hard row once snapped");
                return Ok(SimplexResult::violation(tableau.clone(), diagnostics));
            };
            if config.ratio_polish && target.kind != TargetKind::Approach {
                self.polish(&mut candidate, &hard, target, priority, &mut diagnostics)?;
            }
            let achieved =
                candidate.evaluate_row_or_approx(target.line.row, config.max_denominator)?;
            if target.kind == TargetKind::Approach
                && (achieved.to_f64() - target.line.rhs).abs() > target.line.tol
            {
                warn!(
                    priority,
                    achieved = %achieved,
                    rhs = target.line.rhs,
                    "equality target out of reach"
                );
                return Ok(SimplexResult::violation(tableau.clone(), diagnostics));
            }
            debug!(priority, achieved = %achieved, "phase 1 finished");
            reached = Some((candidate, achieved));
        }

        // Phase 2: soft deviation and usage with the target held.
        let mut settle_hard = hard.clone();
        let pinned: Vec<LinearRow> = match (&problem.target, &reached) {
            (Some(target), Some((_, achieved))) => {
                settle_hard.push(HardRow {
                    row: target.line.row,
                    rhs: *achieved,
                    tol: target.line.tol,
                });
                vec![target.line.pinned(achieved.to_f64(), target.line.tol)]
            }
            _ => Vec::new(),
        };
        let base = reached.as_ref().map(|(t, _)| t).unwrap_or(&*tableau);
        let mut scorer = Scorer::new(
            &problem,
            config,
            Phase::Settle {
                pinned: pinned.clone(),
            },
        );
        search(&mut scorer, float_values(base), &mut diagnostics);
        let settled = match scorer.into_best() {
            Some(best) => {
                let settled = self.snap_verified(&best.x, tableau, &settle_hard)?;
                if settled.is_none() {
                    debug!(priority, "settled point lost feasibility when snapped");
                }
                settled
            }
            None => None,
        };
        let solution = match (settled, reached) {
            (Some(candidate), _) => candidate,
            (None, Some((candidate, _))) => candidate,
            (None, None) => {
                warn!(priority, "no point satisfies the hard rows");
                return Ok(SimplexResult::violation(tableau.clone(), diagnostics));
            }
        };

        let (objective_value, merit) = self.objective(&solution, &problem)?;
        diagnostics.capture_bound_states(&solution);
        info!(
            priority,
            objective = %objective_value,
            candidates = diagnostics.candidates_scored(),
            pivots = diagnostics.pivots(),
            "priority solved"
        );
        *tableau = solution.clone();
        Ok(SimplexResult {
            status: SolveStatus::Optimal,
            objective_value,
            merit,
            diagnostics,
            solution,
        })
    }

    /// Converts a float point to exact values: coordinates within
    /// `snap_tol` of a bound land on it, the rest are approximated with
    /// denominators up to `max_denom` and clamped.
    fn snap(
        x: &[f64],
        tableau: &Tableau,
        max_denom: i64,
        snap_tol: f64,
    ) -> GoalResult<Vec<Rational>> {
        tableau
            .variables()
            .iter()
            .zip(x)
            .map(|(var, &v)| {
                if (v - var.lower().to_f64()).abs() <= snap_tol {
                    Ok(var.lower())
                } else if (v - var.upper().to_f64()).abs() <= snap_tol {
                    Ok(var.upper())
                } else {
                    Ok(var.clamp(Rational::approximate(v, max_denom)?))
                }
            })
            .collect()
    }

    /// Snaps `x` onto a copy of `base` and checks `hard` exactly. When
    /// snapping pushes a row out of tolerance the point is snapped again
    /// with a finer denominator; `None` once every refinement fails.
    fn snap_verified(
        &self,
        x: &[f64],
        base: &Tableau,
        hard: &[HardRow],
    ) -> GoalResult<Option<Tableau>> {
        let mut max_denom = self.config.max_denominator;
        let mut snap_tol = self.config.snap_tolerance;
        for attempt in 0..=SNAP_REFINEMENTS {
            let mut candidate = base.clone();
            candidate.apply_solution(&Self::snap(x, base, max_denom, snap_tol)?)?;
            if holds(&candidate, hard, max_denom)? {
                return Ok(Some(candidate));
            }
            trace!(attempt, max_denom, "snapped point misses a hard row");
            max_denom = max_denom.saturating_mul(SNAP_REFINE_FACTOR);
            snap_tol /= SNAP_REFINE_FACTOR as f64;
        }
        Ok(None)
    }

    /// Exact ratio-test walk from the phase-1 point. Each improving column at
    /// a bound is tried once, lowest index first; a step is kept only if it
    /// gains more than the feasibility tolerance and the hard rows still hold
    /// afterwards.
    fn polish(
        &self,
        candidate: &mut Tableau,
        hard: &[HardRow],
        target: &Target,
        priority: u32,
        diagnostics: &mut Diagnostics,
    ) -> GoalResult<()> {
        let n = candidate.variable_count();
        let sign = target.sign();
        let locked_rows: Vec<usize> = candidate
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.priority() < priority && row.is_locked())
            .map(|(r, _)| r)
            .collect();
        let mut frozen = vec![false; n];
        for c in 0..n {
            for &r in &locked_rows {
                if !candidate.coefficient(r, c)?.is_zero() {
                    frozen[c] = true;
                }
            }
        }

        for _ in 0..4 * n {
            let entering = (0..n).find(|&c| {
                if frozen[c] {
                    return false;
                }
                let rate = sign * target.line.coeffs[c];
                match candidate.variables()[c].bound_state() {
                    BoundState::AtLower => rate > 0.0,
                    BoundState::AtUpper => rate < 0.0,
                    BoundState::Basic => false,
                }
            });
            let Some(column) = entering else {
                break;
            };

            let before = target.line.value(&float_values(candidate));
            let mut trial = candidate.clone();
            let mut step = Diagnostics::new();
            let moved = self
                .ratio_test
                .select(&mut trial, column, priority)
                .and_then(|result| apply_pivot(&mut trial, &result, &mut step));
            let x = float_values(&trial);
            let accepted = matches!(moved, Ok(true))
                && sign * (target.line.value(&x) - before) > self.config.feasibility_tolerance
                && holds(&trial, hard, self.config.max_denominator)?;
            if accepted {
                *candidate = trial;
                diagnostics.merge(&step);
            }
            frozen[column] = true;
        }
        Ok(())
    }

    /// Exact objective and merit of a solved tableau.
    fn objective(
        &self,
        solution: &Tableau,
        problem: &PriorityProblem,
    ) -> GoalResult<(Rational, Rational)> {
        let max_denom = self.config.max_denominator;
        if let Some(target) = &problem.target {
            let value = solution.evaluate_row_or_approx(target.line.row, max_denom)?;
            let merit = match target.kind {
                TargetKind::Maximize => value,
                TargetKind::Minimize => -value,
                TargetKind::Approach => -value.try_sub(solution.rhs(target.line.row)?)?.abs(),
            };
            return Ok((value, merit));
        }
        let mut deviation = Rational::ZERO;
        for row in &problem.soft {
            let value = solution.evaluate_row_or_approx(row.row, max_denom)?;
            let gap = value.try_sub(solution.rhs(row.row)?)?.abs();
            deviation = match deviation.try_add(gap) {
                Err(GoalError::Overflow(_)) => {
                    Rational::approximate(deviation.to_f64() + gap.to_f64(), max_denom)?
                }
                other => other?,
            };
        }
        Ok((deviation, -deviation))
    }
}

/// Whether every row in `hard` sits within tolerance of its exact rhs.
fn holds(tableau: &Tableau, hard: &[HardRow], max_denom: i64) -> GoalResult<bool> {
    for h in hard {
        let value = tableau.evaluate_row_or_approx(h.row, max_denom)?;
        let gap = match value.try_sub(h.rhs) {
            Ok(gap) => gap.abs().to_f64(),
            Err(GoalError::Overflow(_)) => (value.to_f64() - h.rhs.to_f64()).abs(),
            Err(e) => return Err(e),
        };
        if gap > h.tol {
            return Ok(false);
        }
    }
    Ok(true)
}

fn float_values(tableau: &Tableau) -> Vec<f64> {
    tableau.values().iter().map(|v| v.to_f64()).collect()
}
