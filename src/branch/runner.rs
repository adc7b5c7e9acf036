//! Branch-and-bound runner.

use tracing::{debug, trace, warn};

use super::config::BranchConfig;
use crate::continuous::{ContinuousPrioritySolver, SimplexResult, SolverConfig};
use crate::diagnostics::{BranchTrace, Diagnostics};
use crate::error::{GoalError, GoalResult};
use crate::model::{BoundedVariable, Tableau};
use crate::rational::Rational;

/// Denominator cap used when an exact bound sum overflows.
const BOUND_MAX_DENOMINATOR: i64 = 1_000_000;

struct Node {
    tableau: Tableau,
    depth: usize,
}

/// Enforces integrality of integer-flagged variables for one priority.
///
/// # Examples
///
/// ```
/// use u_goalprog::branch::{BranchAndBound, BranchConfig};
/// use u_goalprog::continuous::ContinuousPrioritySolver;
/// use u_goalprog::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
/// use u_goalprog::rational::Rational;
///
/// let vars = vec![
///     BoundedVariable::integer("n", Rational::ZERO, Rational::new(5, 2).unwrap()).unwrap(),
/// ];
/// let rows = vec![GoalRow::new("most", GoalSense::Maximize, 0).with_coefficient("n", Rational::ONE)];
/// let mut tableau = Tableau::new(vars, rows).unwrap();
///
/// let bnb = BranchAndBound::new(ContinuousPrioritySolver::default(), BranchConfig::default());
/// let result = bnb.enforce_integrality(&mut tableau, 0).unwrap();
/// assert_eq!(result.objective_value, Rational::from(2));
/// ```
pub struct BranchAndBound {
    solver: ContinuousPrioritySolver,
    config: BranchConfig,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self::new(ContinuousPrioritySolver::default(), BranchConfig::default())
    }
}

impl BranchAndBound {
    pub fn new(solver: ContinuousPrioritySolver, config: BranchConfig) -> Self {
        Self { solver, config }
    }

    /// Convenience constructor from both configurations.
    pub fn with_configs(solver: SolverConfig, branch: BranchConfig) -> Self {
        Self::new(ContinuousPrioritySolver::new(solver), branch)
    }

    pub fn config(&self) -> &BranchConfig {
        &self.config
    }

    pub fn solver(&self) -> &ContinuousPrioritySolver {
        &self.solver
    }

    /// Solves `priority` with every integer-flagged variable integral.
    ///
    /// The best incumbent is written back onto `tableau`. Returns
    /// `GoalViolation` (tableau untouched) when no integral point is found
    /// within the depth and node caps.
    pub fn enforce_integrality(
        &self,
        tableau: &mut Tableau,
        priority: u32,
    ) -> GoalResult<SimplexResult> {
        self.config.validate().map_err(GoalError::InvalidArgument)?;
        let weights = priority_weights(tableau, priority)?;
        let mut diagnostics = Diagnostics::new();
        let mut incumbent: Option<SimplexResult> = None;
        let mut stack = vec![Node {
            tableau: tableau.clone(),
            depth: 0,
        }];
        let mut solved = 0usize;

        while let Some(Node {
            tableau: mut work,
            depth,
        }) = stack.pop()
        {
            if solved >= self.config.max_nodes {
                warn!(priority, nodes = solved, "node limit reached");
                break;
            }
            solved += 1;
            diagnostics.record_node(depth);

            let result = self.solver.solve_priority(&mut work, priority)?;
            diagnostics.merge(&result.diagnostics);
            if !result.is_optimal() {
                trace!(priority, depth, "infeasible node pruned");
                continue;
            }

            let mut bound = result.merit;
            let mut branch: Option<(usize, Rational, Rational)> = None;
            for (c, var) in work.variables().iter().enumerate() {
                if !var.is_integer() || var.value().is_integer() {
                    continue;
                }
                let distance = var.value().fractional_distance()?;
                let impact = distance.try_mul(weights[c])?;
                bound = add_or_approx(bound, impact)?;
                if branch.map_or(true, |(_, _, best)| impact > best) {
                    branch = Some((c, distance, impact));
                }
            }

            if let Some(best) = &incumbent {
                if bound <= best.merit {
                    trace!(priority, depth, bound = %bound, "node bounded out");
                    continue;
                }
            }

            let Some((column, distance, _)) = branch else {
                debug!(priority, depth, merit = %result.merit, "new incumbent");
                diagnostics.record_incumbent(result.merit);
                incumbent = Some(result);
                continue;
            };

            let var = work.variable(column)?.clone();
            let (lower, upper) = (var.lower(), var.upper());
            let value = var.value();
            let child_depth = depth + 1;
            if child_depth > self.config.max_depth {
                trace!(priority, depth, variable = var.name(), "depth limit reached");
                continue;
            }

            let floor = value.floor()?;
            if floor >= lower {
                let narrowed = var.with_bounds(lower, floor)?;
                stack.push(self.fork(&work, column, narrowed, child_depth, distance, &mut diagnostics)?);
            }
            let ceil = value.ceil()?;
            if ceil <= upper {
                let narrowed = var.with_bounds(ceil, upper)?;
                stack.push(self.fork(&work, column, narrowed, child_depth, distance, &mut diagnostics)?);
            }
        }

        match incumbent {
            Some(mut best) => {
                diagnostics.capture_bound_states(&best.solution);
                best.diagnostics = diagnostics;
                *tableau = best.solution.clone();
                Ok(best)
            }
            None => {
                warn!(priority, "no integral solution found");
                Ok(SimplexResult::violation(tableau.clone(), diagnostics))
            }
        }
    }

    fn fork(
        &self,
        parent: &Tableau,
        column: usize,
        narrowed: BoundedVariable,
        depth: usize,
        distance: Rational,
        diagnostics: &mut Diagnostics,
    ) -> GoalResult<Node> {
        let old = parent.variable(column)?;
        diagnostics.record_branch(BranchTrace {
            variable: old.name().to_string(),
            old_bounds: (old.lower(), old.upper()),
            new_bounds: (narrowed.lower(), narrowed.upper()),
            depth,
            delta: distance,
        });
        let mut child = parent.clone();
        child.replace_variable(column, narrowed)?;
        child.refresh_row_states()?;
        Ok(Node {
            tableau: child,
            depth,
        })
    }
}

/// Σ|coefficient| per column over the rows at `priority`.
fn priority_weights(tableau: &Tableau, priority: u32) -> GoalResult<Vec<Rational>> {
    let rows = tableau.rows_at(priority);
    (0..tableau.variable_count())
        .map(|c| {
            rows.iter().try_fold(Rational::ZERO, |sum, &r| {
                add_or_approx(sum, tableau.coefficient(r, c)?.abs())
            })
        })
        .collect()
}

fn add_or_approx(a: Rational, b: Rational) -> GoalResult<Rational> {
    match a.try_add(b) {
        Err(GoalError::Overflow(_)) => {
            Rational::approximate(a.to_f64() + b.to_f64(), BOUND_MAX_DENOMINATOR)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuous::SolveStatus;
    use crate::model::{GoalRow, GoalSense};
    use proptest::prelude::*;

    fn int(name: &str, upper: i32) -> BoundedVariable {
        BoundedVariable::integer(name, Rational::ZERO, Rational::from(upper)).unwrap()
    }

    /// maximize 3a + 2b  subject to  2a + 2b + s = 5, a, b integer in [0, 3].
    fn knapsack() -> Tableau {
        let vars = vec![
            int("a", 3),
            int("b", 3),
            BoundedVariable::new("s", Rational::ZERO, Rational::from(5)).unwrap(),
        ];
        let rows = vec![
            GoalRow::new("value", GoalSense::Maximize, 0)
                .with_coefficient("a", Rational::from(3))
                .with_coefficient("b", Rational::from(2)),
            GoalRow::new("cap", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::from(2))
                .with_coefficient("b", Rational::from(2))
                .with_coefficient("s", Rational::ONE)
                .with_rhs(Rational::from(5)),
        ];
        Tableau::new(vars, rows).unwrap()
    }

    #[test]
    fn test_knapsack_optimum() {
        let mut t = knapsack();
        let res = BranchAndBound::default().enforce_integrality(&mut t, 0).unwrap();
        assert!(res.is_optimal());
        assert_eq!(res.objective_value, Rational::from(6));
        assert_eq!(
            t.values(),
            vec![Rational::from(2), Rational::ZERO, Rational::ONE]
        );
        let d = &res.diagnostics;
        assert!(d.branches() >= 2);
        assert_eq!(d.first_branch_variable(), Some("a"));
        assert_eq!(d.incumbent_history().last(), Some(&Rational::from(6)));
        assert!(d.nodes_explored() > 1);
        assert_eq!(d.final_bound_states().len(), 3);
    }

    #[test]
    fn test_continuous_only_is_single_node() {
        let vars = vec![BoundedVariable::unit("x")];
        let rows = vec![GoalRow::new("m", GoalSense::Maximize, 0).with_coefficient("x", Rational::ONE)];
        let mut t = Tableau::new(vars, rows).unwrap();
        let res = BranchAndBound::default().enforce_integrality(&mut t, 0).unwrap();
        assert_eq!(res.objective_value, Rational::ONE);
        assert_eq!(res.diagnostics.nodes_explored(), 1);
        assert_eq!(res.diagnostics.branches(), 0);
    }

    #[test]
    fn test_depth_cap_yields_violation() {
        let mut t = knapsack();
        let before = t.values();
        let bnb = BranchAndBound::with_configs(
            SolverConfig::default(),
            BranchConfig::default().with_max_depth(0),
        );
        let res = bnb.enforce_integrality(&mut t, 0).unwrap();
        assert_eq!(res.status, SolveStatus::GoalViolation);
        assert_eq!(res.diagnostics.branches(), 0);
        assert_eq!(t.values(), before);
    }

    #[test]
    fn test_no_integral_point() {
        // 2n = 3 has no integer solution.
        let vars = vec![int("n", 3)];
        let rows = vec![GoalRow::new("odd", GoalSense::Equal, 0)
            .with_coefficient("n", Rational::from(2))
            .with_rhs(Rational::from(3))];
        let mut t = Tableau::new(vars, rows).unwrap();
        let res = BranchAndBound::default().enforce_integrality(&mut t, 0).unwrap();
        assert_eq!(res.status, SolveStatus::GoalViolation);
        assert_eq!(res.diagnostics.branches(), 2);
    }

    #[test]
    fn test_branch_traces_record_bounds() {
        let mut t = knapsack();
        let res = BranchAndBound::default().enforce_integrality(&mut t, 0).unwrap();
        let first = &res.diagnostics.branch_details()[0];
        assert_eq!(first.variable, "a");
        assert_eq!(first.old_bounds, (Rational::ZERO, Rational::from(3)));
        assert_eq!(first.new_bounds, (Rational::ZERO, Rational::from(2)));
        assert_eq!(first.depth, 1);
        assert_eq!(first.delta, Rational::new(1, 2).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn incumbent_is_integral_and_in_bounds(
            ca in 1i32..6,
            cb in 1i32..6,
            wa in 1i32..4,
            wb in 1i32..4,
            cap in 1i32..9,
        ) {
            let vars = vec![
                int("a", 3),
                int("b", 3),
                BoundedVariable::new("s", Rational::ZERO, Rational::from(cap)).unwrap(),
            ];
            let rows = vec![
                GoalRow::new("value", GoalSense::Maximize, 0)
                    .with_coefficient("a", Rational::from(ca))
                    .with_coefficient("b", Rational::from(cb)),
                GoalRow::new("cap", GoalSense::Equal, 0)
                    .with_coefficient("a", Rational::from(wa))
                    .with_coefficient("b", Rational::from(wb))
                    .with_coefficient("s", Rational::ONE)
                    .with_rhs(Rational::from(cap)),
            ];
            let mut t = Tableau::new(vars, rows).unwrap();
            let res = BranchAndBound::default().enforce_integrality(&mut t, 0).unwrap();
            // a = b = 0, s = cap is always feasible.
            prop_assert!(res.is_optimal());
            for v in t.variables() {
                prop_assert!(v.is_within_bounds());
                if v.is_integer() {
                    prop_assert!(v.value().is_integer());
                }
            }
        }
    }
}
