//! Single-priority matrix entry point.
//!
//! Builds a tableau over unit variables `x0..x{n-1}` from a dense
//! coefficient matrix and a constant vector. A `NaN` constant marks a soft
//! zero row; the first row with a non-zero finite constant is the target
//! and the remaining finite rows are hard equalities.

use tracing::debug;

use super::config::LexConfig;
use super::runner::LexicographicCoordinator;
use super::types::MatrixProgress;
use crate::continuous::SolveStatus;
use crate::error::{GoalError, GoalResult};
use crate::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
use crate::rational::Rational;

/// Solves `coefficients · x ≈ constants` with default settings.
///
/// # Examples
///
/// ```
/// use u_goalprog::lexicographic::solve;
///
/// let coefficients = vec![vec![1.0, 1.0], vec![1.0, -1.0]];
/// let constants = vec![1.0, f64::NAN];
/// let last = solve(&coefficients, &constants).unwrap().last().unwrap().unwrap();
/// assert!(last.done);
/// let x = last.solution.unwrap();
/// assert!((x[0] + x[1] - 1.0).abs() < 1e-9);
/// assert!((x[0] - x[1]).abs() < 1e-9);
/// ```
pub fn solve(coefficients: &[Vec<f64>], constants: &[f64]) -> GoalResult<MatrixSolve> {
    solve_with_config(coefficients, constants, LexConfig::default())
}

/// Like [`solve`], with explicit configuration.
pub fn solve_with_config(
    coefficients: &[Vec<f64>],
    constants: &[f64],
    config: LexConfig,
) -> GoalResult<MatrixSolve> {
    config.validate().map_err(GoalError::InvalidArgument)?;
    if coefficients.is_empty() {
        return Err(GoalError::invalid("coefficient matrix has no rows"));
    }
    let columns = coefficients[0].len();
    if columns == 0 {
        return Err(GoalError::invalid("coefficient matrix has no columns"));
    }
    if constants.len() != coefficients.len() {
        return Err(GoalError::invalid(format!(
            "{} constants for {} coefficient rows",
            constants.len(),
            coefficients.len()
        )));
    }
    if let Some(i) = coefficients.iter().position(|row| row.len() != columns) {
        return Err(GoalError::invalid(format!(
            "row {i} has {} coefficients, expected {columns}",
            coefficients[i].len()
        )));
    }
    if coefficients.iter().flatten().any(|c| !c.is_finite()) {
        return Err(GoalError::invalid("coefficients must be finite"));
    }
    if constants.iter().any(|c| c.is_infinite()) {
        return Err(GoalError::invalid("constants must be finite or NaN"));
    }

    let max_denom = config.solver.max_denominator;
    let hard = build(coefficients, constants, max_denom, false)?;
    let soft = build(coefficients, constants, max_denom, true)?;
    Ok(MatrixSolve {
        coordinator: LexicographicCoordinator::new(config),
        hard,
        soft,
        rows: coefficients.len(),
        columns,
        started: false,
        finished: false,
    })
}

fn build(
    coefficients: &[Vec<f64>],
    constants: &[f64],
    max_denom: i64,
    all_soft: bool,
) -> GoalResult<Tableau> {
    let variables = (0..coefficients[0].len())
        .map(|j| BoundedVariable::unit(format!("x{j}")))
        .collect();
    let mut rows = Vec::with_capacity(coefficients.len());
    for (i, (coeffs, &constant)) in coefficients.iter().zip(constants).enumerate() {
        let rhs = if constant.is_nan() {
            Rational::ZERO
        } else {
            Rational::approximate(constant, max_denom)?
        };
        let mut row = GoalRow::new(format!("row{i}"), GoalSense::Equal, 0).with_rhs(rhs);
        for (j, &c) in coeffs.iter().enumerate() {
            row = row.with_coefficient(format!("x{j}"), Rational::approximate(c, max_denom)?);
        }
        if all_soft || constant.is_nan() {
            row = row.soft();
        }
        rows.push(row);
    }
    Tableau::new(variables, rows)
}

/// Lazy progress of a matrix solve: one "solving" snapshot, then the
/// terminal snapshot with the solution.
pub struct MatrixSolve {
    coordinator: LexicographicCoordinator,
    hard: Tableau,
    soft: Tableau,
    rows: usize,
    columns: usize,
    started: bool,
    finished: bool,
}

impl MatrixSolve {
    fn finish(&mut self) -> GoalResult<MatrixProgress> {
        let result = self.coordinator.solve(self.hard.clone())?;
        let status = result.status;
        let solution = if result.is_optimal() {
            result.solution
        } else {
            debug!("hard rows unsatisfiable, falling back to all-soft solve");
            self.coordinator.solve(self.soft.clone())?.solution
        };
        let message = match status {
            SolveStatus::Optimal => "solved".to_string(),
            SolveStatus::GoalViolation => "hard goals violated, best-effort solution".to_string(),
        };
        Ok(MatrixProgress {
            message,
            done: true,
            status: Some(status),
            solution: Some(solution.values().iter().map(|v| v.to_f64()).collect()),
        })
    }
}

impl Iterator for MatrixSolve {
    type Item = GoalResult<MatrixProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(Ok(MatrixProgress {
                message: format!("solving {} goals over {} variables", self.rows, self.columns),
                done: false,
                status: None,
                solution: None,
            }));
        }
        self.finished = true;
        Some(self.finish())
    }
}
