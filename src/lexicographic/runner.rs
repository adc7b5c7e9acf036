//! Priority sequencing.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::config::LexConfig;
use super::types::{LexicographicGoalResult, ProgressSnapshot};
use crate::branch::BranchAndBound;
use crate::continuous::{ContinuousPrioritySolver, SimplexResult, SolveStatus};
use crate::error::{GoalError, GoalResult};
use crate::model::Tableau;
use crate::ratio::RatioTest;
use crate::rational::Rational;

/// Solves every priority of a tableau in ascending order, locking each
/// achieved goal before moving on.
///
/// # Examples
///
/// ```
/// use u_goalprog::lexicographic::LexicographicCoordinator;
/// use u_goalprog::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
/// use u_goalprog::rational::Rational;
///
/// let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
/// let rows = vec![
///     GoalRow::new("total", GoalSense::Maximize, 0)
///         .with_coefficient("a", Rational::ONE)
///         .with_coefficient("b", Rational::ONE)
///         .with_rhs(Rational::ONE),
///     GoalRow::new("prefer_b", GoalSense::Maximize, 1).with_coefficient("b", Rational::ONE),
/// ];
/// let tableau = Tableau::new(vars, rows).unwrap();
///
/// let coordinator = LexicographicCoordinator::default();
/// let mut messages = Vec::new();
/// let mut last = None;
/// for step in coordinator.solve_progressively(tableau).unwrap() {
///     let step = step.unwrap();
///     messages.push(step.message.clone());
///     last = step.result;
/// }
/// assert_eq!(messages[0], "solving priority 0");
/// let result = last.unwrap();
/// assert!(result.is_optimal());
/// assert_eq!(result.objectives[&0], Rational::from(2));
/// ```
pub struct LexicographicCoordinator {
    branch: BranchAndBound,
    max_denominator: i64,
}

impl Default for LexicographicCoordinator {
    fn default() -> Self {
        Self::new(LexConfig::default())
    }
}

impl LexicographicCoordinator {
    pub fn new(config: LexConfig) -> Self {
        let max_denominator = config.solver.max_denominator;
        Self {
            branch: BranchAndBound::with_configs(config.solver, config.branch),
            max_denominator,
        }
    }

    /// Builds a coordinator whose continuous solver uses `ratio_test`.
    pub fn with_ratio_test(config: LexConfig, ratio_test: impl RatioTest + 'static) -> Self {
        let max_denominator = config.solver.max_denominator;
        let solver = ContinuousPrioritySolver::new(config.solver).with_ratio_test(ratio_test);
        Self {
            branch: BranchAndBound::new(solver, config.branch),
            max_denominator,
        }
    }

    pub fn branch_and_bound(&self) -> &BranchAndBound {
        &self.branch
    }

    /// Returns a lazy sequence of progress snapshots. No solving happens
    /// until the iterator is pulled, and dropping it early abandons the
    /// remaining priorities.
    ///
    /// Configuration and tableau state are checked up front; errors raised
    /// while solving are yielded once and end the sequence.
    pub fn solve_progressively(&self, tableau: Tableau) -> GoalResult<Progress<'_>> {
        self.branch
            .solver()
            .config()
            .validate()
            .and_then(|_| self.branch.config().validate())
            .map_err(GoalError::InvalidArgument)?;
        tableau.validate_state()?;
        let priorities = tableau.priorities();
        debug!(priorities = priorities.len(), "starting lexicographic run");
        Ok(Progress {
            coordinator: self,
            working: tableau,
            priorities,
            stages: Vec::new(),
            objectives: BTreeMap::new(),
            step: Step::Announce(0),
        })
    }

    /// Runs every priority to completion and returns the terminal result.
    pub fn solve(&self, tableau: Tableau) -> GoalResult<LexicographicGoalResult> {
        let mut last = None;
        for snapshot in self.solve_progressively(tableau)? {
            if let Some(result) = snapshot?.result {
                last = Some(result);
            }
        }
        last.ok_or_else(|| GoalError::StateInvariant("run ended without a result".into()))
    }

    /// Locks every row at `priority` at its current value.
    fn lock_priority(&self, tableau: &mut Tableau, priority: u32) -> GoalResult<()> {
        for row in tableau.rows_at(priority) {
            let value = tableau.evaluate_row_or_approx(row, self.max_denominator)?;
            tableau.lock_goal_value(row, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    /// Announce the priority at this index, or finish if past the end.
    Announce(usize),
    /// Solve the priority at this index.
    Solve(usize),
    Finished,
}

/// Pull-based progress of a lexicographic run.
pub struct Progress<'a> {
    coordinator: &'a LexicographicCoordinator,
    working: Tableau,
    priorities: Vec<u32>,
    stages: Vec<SimplexResult>,
    objectives: BTreeMap<u32, Rational>,
    step: Step,
}

impl Progress<'_> {
    fn terminal(&mut self, status: SolveStatus, failed_priority: Option<u32>) -> ProgressSnapshot {
        self.step = Step::Finished;
        let message = match failed_priority {
            Some(p) => format!("priority {p} could not be satisfied"),
            None => "all priorities solved".to_string(),
        };
        ProgressSnapshot {
            message,
            priority: None,
            done: true,
            result: Some(LexicographicGoalResult {
                status,
                stages: std::mem::take(&mut self.stages),
                objectives: std::mem::take(&mut self.objectives),
                failed_priority,
                solution: self.working.clone(),
            }),
        }
    }

    fn solve_stage(&mut self, index: usize) -> GoalResult<ProgressSnapshot> {
        let priority = self.priorities[index];
        let mut stage = self.working.clone();
        let result = self
            .coordinator
            .branch
            .enforce_integrality(&mut stage, priority)?;
        if !result.is_optimal() {
            warn!(priority, "stopping at unsatisfiable priority");
            let status = result.status;
            self.stages.push(result);
            return Ok(self.terminal(status, Some(priority)));
        }

        self.coordinator.lock_priority(&mut stage, priority)?;
        self.working = stage;
        self.objectives.insert(priority, result.objective_value);
        info!(priority, objective = %result.objective_value, "priority locked");
        let message = format!("priority {priority} solved: {}", result.objective_value);
        self.stages.push(result);
        self.step = Step::Announce(index + 1);
        Ok(ProgressSnapshot {
            message,
            priority: Some(priority),
            done: false,
            result: None,
        })
    }
}

impl Iterator for Progress<'_> {
    type Item = GoalResult<ProgressSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step {
            Step::Finished => None,
            Step::Announce(index) if index >= self.priorities.len() => {
                Some(Ok(self.terminal(SolveStatus::Optimal, None)))
            }
            Step::Announce(index) => {
                let priority = self.priorities[index];
                self.step = Step::Solve(index);
                Some(Ok(ProgressSnapshot {
                    message: format!("solving priority {priority}"),
                    priority: Some(priority),
                    done: false,
                    result: None,
                }))
            }
            Step::Solve(index) => {
                let outcome = self.solve_stage(index);
                if outcome.is_err() {
                    self.step = Step::Finished;
                }
                Some(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundedVariable, GoalRow, GoalSense};

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn two_level(second_coef: Rational) -> Tableau {
        let vars = vec![
            BoundedVariable::unit("a"),
            BoundedVariable::unit("b"),
            BoundedVariable::unit("c"),
        ];
        let rows = vec![
            GoalRow::new("share", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::ONE)
                .with_rhs(Rational::ONE),
            GoalRow::new("tilt", GoalSense::Maximize, 1)
                .with_coefficient("a", second_coef)
                .with_coefficient("c", Rational::ONE),
        ];
        Tableau::new(vars, rows).unwrap()
    }

    #[test]
    fn test_progress_sequence() {
        let coordinator = LexicographicCoordinator::default();
        let snapshots: Vec<ProgressSnapshot> = coordinator
            .solve_progressively(two_level(Rational::ONE))
            .unwrap()
            .map(|s| s.unwrap())
            .collect();
        let messages: Vec<&str> = snapshots.iter().map(|s| s.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "solving priority 0",
                "priority 0 solved: 1",
                "solving priority 1",
                "priority 1 solved: 2",
                "all priorities solved",
            ]
        );
        assert!(snapshots[..4].iter().all(|s| !s.done && s.result.is_none()));
        let result = snapshots[4].result.as_ref().unwrap();
        assert!(result.is_optimal());
        assert_eq!(result.stages.len(), 2);
        assert_eq!(result.objectives[&0], Rational::ONE);
        assert_eq!(result.objectives[&1], Rational::from(2));
        assert_eq!(result.values(), vec![Rational::ONE, Rational::ZERO, Rational::ONE]);
    }

    #[test]
    fn test_locks_hold_in_later_stages() {
        let result = LexicographicCoordinator::default()
            .solve(two_level(r(-1, 2)))
            .unwrap();
        assert!(result.is_optimal());
        let solution = &result.solution;
        let share = solution.row_index("share#locked").unwrap();
        assert_eq!(solution.evaluate_row(share).unwrap(), Rational::ONE);
        let tilt = solution.row_index("tilt#locked").unwrap();
        assert_eq!(solution.rhs(tilt).unwrap(), Rational::ONE);
        assert_eq!(solution.evaluate_row(tilt).unwrap(), Rational::ONE);
        assert_eq!(result.values(), vec![Rational::ZERO, Rational::ONE, Rational::ONE]);
    }

    #[test]
    fn test_lexicographic_dominance() {
        let coordinator = LexicographicCoordinator::default();
        for coef in [Rational::ONE, r(-1, 2), Rational::from(3), Rational::ZERO] {
            let result = coordinator.solve(two_level(coef)).unwrap();
            assert_eq!(result.objectives[&0], Rational::ONE);
        }
    }

    #[test]
    fn test_violation_keeps_partial_stages() {
        let vars = vec![BoundedVariable::unit("a")];
        let rows = vec![
            GoalRow::new("up", GoalSense::Maximize, 0).with_coefficient("a", Rational::ONE),
            GoalRow::new("impossible", GoalSense::Equal, 1)
                .with_coefficient("a", Rational::ONE)
                .with_rhs(r(1, 2)),
            GoalRow::new("never", GoalSense::Maximize, 2).with_coefficient("a", Rational::ONE),
        ];
        let t = Tableau::new(vars, rows).unwrap();
        let result = LexicographicCoordinator::default().solve(t).unwrap();
        assert_eq!(result.status, SolveStatus::GoalViolation);
        assert_eq!(result.failed_priority, Some(1));
        assert_eq!(result.stages.len(), 2);
        assert!(result.stages[0].is_optimal());
        assert!(!result.stages[1].is_optimal());
        assert_eq!(result.objectives.len(), 1);
        assert_eq!(result.values(), vec![Rational::ONE]);
    }

    #[test]
    fn test_lazy_consumer_can_stop_early() {
        let coordinator = LexicographicCoordinator::default();
        let mut progress = coordinator
            .solve_progressively(two_level(Rational::ONE))
            .unwrap();
        let first = progress.next().unwrap().unwrap();
        assert_eq!(first.priority, Some(0));
        assert!(progress.stages.is_empty());
        drop(progress);
    }

    #[test]
    fn test_integer_stage() {
        let vars = vec![
            BoundedVariable::integer("n", Rational::ZERO, r(7, 2)).unwrap(),
            BoundedVariable::unit("x"),
        ];
        let rows = vec![
            GoalRow::new("count", GoalSense::Maximize, 0).with_coefficient("n", Rational::ONE),
            GoalRow::new("fill", GoalSense::Maximize, 1).with_coefficient("x", Rational::ONE),
        ];
        let t = Tableau::new(vars, rows).unwrap();
        let result = LexicographicCoordinator::default().solve(t).unwrap();
        assert!(result.is_optimal());
        assert_eq!(result.values(), vec![Rational::from(3), Rational::ONE]);
        assert!(result.stages[0].diagnostics.branches() > 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let t = two_level(Rational::ONE);
        let coordinator = LexicographicCoordinator::new(
            LexConfig::default().with_branch(crate::branch::BranchConfig::default().with_max_nodes(0)),
        );
        assert!(matches!(
            coordinator.solve_progressively(t),
            Err(GoalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let coordinator = LexicographicCoordinator::default();
        let a = coordinator.solve(two_level(r(1, 3))).unwrap();
        let b = coordinator.solve(two_level(r(1, 3))).unwrap();
        assert_eq!(a.values(), b.values());
        for (x, y) in a.stages.iter().zip(&b.stages) {
            assert_eq!(x.diagnostics, y.diagnostics);
        }
    }
}
