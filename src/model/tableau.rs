//! The tableau: the complete numeric state consumed by one solve.

use std::collections::{BTreeSet, HashMap};

use super::goal::{GoalRow, GoalSense};
use super::variable::BoundedVariable;
use crate::error::{GoalError, GoalResult};
use crate::rational::Rational;

/// Denominator cap for row values whose exact sum overflows during refresh.
const REFRESH_MAX_DENOMINATOR: i64 = 1_000_000;

/// Per-row solver state used by the ratio test.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowState {
    /// Current value of `row · x`.
    pub basic_value: Rational,
    /// Lowest admissible row value (`MIN_VALUE` when unbounded).
    pub lower: Rational,
    /// Highest admissible row value (`MAX_VALUE` when unbounded).
    pub upper: Rational,
    /// Bound the row will sit at after a pending row pivot.
    pub pending_target: Option<Rational>,
}

impl RowState {
    /// A row with no admissible-value bounds.
    pub fn unbounded(basic_value: Rational) -> Self {
        Self {
            basic_value,
            lower: Rational::MIN_VALUE,
            upper: Rational::MAX_VALUE,
            pending_target: None,
        }
    }

    /// Derives the admissible band from a goal row: hard `Equal` rows are
    /// bounded by `rhs ± tolerance`, everything else is unbounded.
    pub fn for_row(row: &GoalRow, basic_value: Rational) -> GoalResult<Self> {
        if row.sense() == GoalSense::Equal && !row.is_soft() {
            Ok(Self {
                basic_value,
                lower: row.rhs().try_sub(row.tolerance())?,
                upper: row.rhs().try_add(row.tolerance())?,
                pending_target: None,
            })
        } else {
            Ok(Self::unbounded(basic_value))
        }
    }

    pub fn has_lower(&self) -> bool {
        self.lower > Rational::MIN_VALUE
    }

    pub fn has_upper(&self) -> bool {
        self.upper < Rational::MAX_VALUE
    }
}

/// Variables (columns), goal rows, row state, a dense coefficient matrix and
/// the right-hand-side vector.
///
/// The tableau is the unit of cloning: every branch-and-bound node and every
/// priority stage owns its own deep copy. All mutation goes through
/// index-checked accessors.
///
/// # Examples
///
/// ```
/// use u_goalprog::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
/// use u_goalprog::rational::Rational;
///
/// let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
/// let rows = vec![GoalRow::new("sum", GoalSense::Maximize, 0)
///     .with_coefficient("a", Rational::ONE)
///     .with_coefficient("b", Rational::from(2))];
/// let mut t = Tableau::new(vars, rows).unwrap();
/// t.set_value(1, Rational::ONE).unwrap();
/// assert_eq!(t.evaluate_row(0).unwrap(), Rational::from(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tableau {
    variables: Vec<BoundedVariable>,
    rows: Vec<GoalRow>,
    row_states: Vec<RowState>,
    matrix: Vec<Vec<Rational>>,
    rhs: Vec<Rational>,
}

impl Tableau {
    /// Builds a tableau, deriving row state from the rows.
    pub fn new(variables: Vec<BoundedVariable>, rows: Vec<GoalRow>) -> GoalResult<Self> {
        let (matrix, rhs) = Self::assemble(&variables, &rows)?;
        let mut tableau = Self {
            variables,
            rows,
            row_states: Vec::new(),
            matrix,
            rhs,
        };
        tableau.row_states = (0..tableau.rows.len())
            .map(|r| {
                let basic = tableau.evaluate_row(r)?;
                RowState::for_row(&tableau.rows[r], basic)
            })
            .collect::<GoalResult<_>>()?;
        Ok(tableau)
    }

    /// Builds a tableau with caller-supplied row state.
    pub fn from_parts(
        variables: Vec<BoundedVariable>,
        rows: Vec<GoalRow>,
        row_states: Vec<RowState>,
    ) -> GoalResult<Self> {
        if row_states.len() != rows.len() {
            return Err(GoalError::invalid(format!(
                "{} row states for {} goal rows",
                row_states.len(),
                rows.len()
            )));
        }
        let (matrix, rhs) = Self::assemble(&variables, &rows)?;
        Ok(Self {
            variables,
            rows,
            row_states,
            matrix,
            rhs,
        })
    }

    fn assemble(
        variables: &[BoundedVariable],
        rows: &[GoalRow],
    ) -> GoalResult<(Vec<Vec<Rational>>, Vec<Rational>)> {
        if variables.is_empty() {
            return Err(GoalError::invalid("tableau needs at least one variable"));
        }
        if rows.is_empty() {
            return Err(GoalError::invalid("tableau needs at least one goal row"));
        }
        let mut columns: HashMap<&str, usize> = HashMap::with_capacity(variables.len());
        for (c, v) in variables.iter().enumerate() {
            if columns.insert(v.name(), c).is_some() {
                return Err(GoalError::invalid(format!(
                    "duplicate variable name: {}",
                    v.name()
                )));
            }
        }
        let mut names = BTreeSet::new();
        let mut matrix = Vec::with_capacity(rows.len());
        let mut rhs = Vec::with_capacity(rows.len());
        for row in rows {
            if !names.insert(row.name()) {
                return Err(GoalError::invalid(format!(
                    "duplicate goal row name: {}",
                    row.name()
                )));
            }
            if row.rhs().is_nan() {
                return Err(GoalError::invalid(format!("{}: rhs is NaN", row.name())));
            }
            let mut dense = vec![Rational::ZERO; variables.len()];
            for (name, value) in row.coefficients() {
                let c = columns.get(name).ok_or_else(|| {
                    GoalError::invalid(format!(
                        "goal row {} references undefined variable {name}",
                        row.name()
                    ))
                })?;
                dense[*c] = value;
            }
            matrix.push(dense);
            rhs.push(row.rhs());
        }
        Ok((matrix, rhs))
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn check_row(&self, row: usize) -> GoalResult<()> {
        if row >= self.rows.len() {
            return Err(GoalError::out_of_range(
                "row index",
                format!("{row} >= {}", self.rows.len()),
            ));
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> GoalResult<()> {
        if column >= self.variables.len() {
            return Err(GoalError::out_of_range(
                "column index",
                format!("{column} >= {}", self.variables.len()),
            ));
        }
        Ok(())
    }

    pub fn variables(&self) -> &[BoundedVariable] {
        &self.variables
    }

    pub fn rows(&self) -> &[GoalRow] {
        &self.rows
    }

    pub fn variable(&self, column: usize) -> GoalResult<&BoundedVariable> {
        self.check_column(column)?;
        Ok(&self.variables[column])
    }

    pub fn row(&self, row: usize) -> GoalResult<&GoalRow> {
        self.check_row(row)?;
        Ok(&self.rows[row])
    }

    pub fn row_state(&self, row: usize) -> GoalResult<&RowState> {
        self.check_row(row)?;
        Ok(&self.row_states[row])
    }

    pub fn row_states(&self) -> &[RowState] {
        &self.row_states
    }

    pub fn set_row_state(&mut self, row: usize, state: RowState) -> GoalResult<()> {
        self.check_row(row)?;
        self.row_states[row] = state;
        Ok(())
    }

    pub fn coefficient(&self, row: usize, column: usize) -> GoalResult<Rational> {
        self.check_row(row)?;
        self.check_column(column)?;
        Ok(self.matrix[row][column])
    }

    /// Overwrites one matrix entry, keeping the goal row's sparse map in step.
    pub fn set_coefficient(&mut self, row: usize, column: usize, value: Rational) -> GoalResult<()> {
        self.check_row(row)?;
        self.check_column(column)?;
        if value.is_nan() {
            return Err(GoalError::invalid("coefficient must be a number"));
        }
        self.matrix[row][column] = value;
        let name = self.variables[column].name().to_string();
        self.rows[row].set_coefficient(name, value);
        Ok(())
    }

    pub fn rhs(&self, row: usize) -> GoalResult<Rational> {
        self.check_row(row)?;
        Ok(self.rhs[row])
    }

    /// Assigns one variable through its bounds-checked setter.
    pub fn set_value(&mut self, column: usize, value: Rational) -> GoalResult<()> {
        self.check_column(column)?;
        self.variables[column].set_value(value)
    }

    /// Replaces a column's variable (e.g. with narrowed bounds). The name
    /// must not change, since goal rows refer to it.
    pub fn replace_variable(&mut self, column: usize, variable: BoundedVariable) -> GoalResult<()> {
        self.check_column(column)?;
        if variable.name() != self.variables[column].name() {
            return Err(GoalError::invalid(format!(
                "column {column} is {}, not {}",
                self.variables[column].name(),
                variable.name()
            )));
        }
        self.variables[column] = variable;
        Ok(())
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name() == name)
    }

    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.name() == name)
    }

    /// Distinct priorities, ascending.
    pub fn priorities(&self) -> Vec<u32> {
        self.rows
            .iter()
            .map(GoalRow::priority)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Indices of the rows at `priority`.
    pub fn rows_at(&self, priority: u32) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&r| self.rows[r].priority() == priority)
            .collect()
    }

    /// Current variable values in column order.
    pub fn values(&self) -> Vec<Rational> {
        self.variables.iter().map(BoundedVariable::value).collect()
    }

    /// Writes a full solution vector. Every value is checked against its
    /// bounds first, so on error the tableau is unchanged.
    pub fn apply_solution(&mut self, values: &[Rational]) -> GoalResult<()> {
        if values.len() != self.variables.len() {
            return Err(GoalError::invalid(format!(
                "solution has {} values for {} variables",
                values.len(),
                self.variables.len()
            )));
        }
        for (var, &value) in self.variables.iter().zip(values) {
            var.check_value(value)?;
        }
        for (var, &value) in self.variables.iter_mut().zip(values) {
            var.set_value(value)?;
        }
        self.refresh_row_states()
    }

    /// Exact `row · x` at the current values.
    pub fn evaluate_row(&self, row: usize) -> GoalResult<Rational> {
        self.check_row(row)?;
        self.evaluate_with(row, &self.values())
    }

    /// Exact `row · values` for an arbitrary point.
    pub fn evaluate_with(&self, row: usize, values: &[Rational]) -> GoalResult<Rational> {
        self.check_row(row)?;
        let mut total = Rational::ZERO;
        for (&a, &x) in self.matrix[row].iter().zip(values) {
            if !a.is_zero() && !x.is_zero() {
                total = total.try_add(a.try_mul(x)?)?;
            }
        }
        Ok(total)
    }

    /// Like [`evaluate_row`](Self::evaluate_row), but when the exact sum
    /// overflows, falls back to the float sum snapped with `max_denom`.
    pub fn evaluate_row_or_approx(&self, row: usize, max_denom: i64) -> GoalResult<Rational> {
        self.check_row(row)?;
        self.evaluate_with_or_approx(row, &self.values(), max_denom)
    }

    fn evaluate_with_or_approx(
        &self,
        row: usize,
        values: &[Rational],
        max_denom: i64,
    ) -> GoalResult<Rational> {
        match self.evaluate_with(row, values) {
            Err(GoalError::Overflow(_)) => {
                let approx: f64 = self.matrix[row]
                    .iter()
                    .zip(values)
                    .map(|(a, x)| a.to_f64() * x.to_f64())
                    .sum();
                Rational::approximate(approx, max_denom)
            }
            other => other,
        }
    }

    /// Dense row in floating point, for the search strategies.
    pub fn row_f64(&self, row: usize) -> GoalResult<Vec<f64>> {
        self.check_row(row)?;
        Ok(self.matrix[row].iter().map(|a| a.to_f64()).collect())
    }

    /// Freezes `row` at `value`: replaces its goal definition with the lock
    /// row and its right-hand side in one step.
    pub fn lock_goal_value(&mut self, row: usize, value: Rational) -> GoalResult<()> {
        self.check_row(row)?;
        if value.is_nan() {
            return Err(GoalError::invalid("cannot lock a row at NaN"));
        }
        let lock = self.rows[row].create_lock(value);
        let basic = self.row_states[row].basic_value;
        let state = RowState::for_row(&lock, basic)?;
        self.rows[row] = lock;
        self.rhs[row] = value;
        self.row_states[row] = state;
        Ok(())
    }

    /// Recomputes every row's basic value from the current variable values
    /// and clears pending pivot targets.
    pub fn refresh_row_states(&mut self) -> GoalResult<()> {
        let values = self.values();
        for r in 0..self.rows.len() {
            let basic = self.evaluate_with_or_approx(r, &values, REFRESH_MAX_DENOMINATOR)?;
            let state = &mut self.row_states[r];
            state.basic_value = basic;
            state.pending_target = None;
        }
        Ok(())
    }

    /// Fails with [`GoalError::StateInvariant`] if any variable sits outside
    /// its bounds.
    pub fn validate_state(&self) -> GoalResult<()> {
        for v in &self.variables {
            if !v.is_within_bounds() {
                return Err(GoalError::StateInvariant(format!(
                    "{} = {} outside [{}, {}]",
                    v.name(),
                    v.value(),
                    v.lower(),
                    v.upper()
                )));
            }
        }
        if self.row_states.len() != self.rows.len() {
            return Err(GoalError::StateInvariant(format!(
                "{} row states for {} goal rows",
                self.row_states.len(),
                self.rows.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Tableau {
        let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
        let rows = vec![
            GoalRow::new("x", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::from(-1))
                .with_rhs(Rational::ZERO),
            GoalRow::new("y", GoalSense::Maximize, 1).with_coefficient("b", Rational::from(3)),
        ];
        Tableau::new(vars, rows).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(Tableau::new(vec![], vec![GoalRow::new("g", GoalSense::Equal, 0)]).is_err());
        assert!(Tableau::new(vec![BoundedVariable::unit("a")], vec![]).is_err());
        let dup = vec![BoundedVariable::unit("a"), BoundedVariable::unit("a")];
        assert!(Tableau::new(dup, vec![GoalRow::new("g", GoalSense::Equal, 0)]).is_err());
        let unknown = GoalRow::new("g", GoalSense::Equal, 0).with_coefficient("z", Rational::ONE);
        assert!(Tableau::new(vec![BoundedVariable::unit("a")], vec![unknown]).is_err());
        let states = vec![RowState::unbounded(Rational::ZERO); 2];
        assert!(Tableau::from_parts(
            vec![BoundedVariable::unit("a")],
            vec![GoalRow::new("g", GoalSense::Equal, 0)],
            states
        )
        .is_err());
    }

    #[test]
    fn test_index_checks() {
        let t = two_by_two();
        assert!(t.coefficient(2, 0).is_err());
        assert!(t.coefficient(0, 2).is_err());
        assert!(t.variable(5).is_err());
        assert_eq!(t.coefficient(0, 1).unwrap(), Rational::from(-1));
    }

    #[test]
    fn test_row_state_bands() {
        let t = two_by_two();
        let hard = t.row_state(0).unwrap();
        assert_eq!(hard.lower, -Rational::EPSILON);
        assert_eq!(hard.upper, Rational::EPSILON);
        let free = t.row_state(1).unwrap();
        assert!(!free.has_lower() && !free.has_upper());
    }

    #[test]
    fn test_clone_is_independent() {
        let t = two_by_two();
        let mut sibling = t.clone();
        sibling.set_value(0, Rational::ONE).unwrap();
        sibling.set_coefficient(1, 0, Rational::from(5)).unwrap();
        assert_eq!(t.variables()[0].value(), Rational::ZERO);
        assert_eq!(t.coefficient(1, 0).unwrap(), Rational::ZERO);
        assert_eq!(sibling.rows()[1].coefficient("a"), Rational::from(5));
    }

    #[test]
    fn test_lock_goal_value() {
        let mut t = two_by_two();
        t.apply_solution(&[Rational::ONE, Rational::ONE]).unwrap();
        let achieved = t.evaluate_row(1).unwrap();
        assert_eq!(achieved, Rational::from(3));
        t.lock_goal_value(1, achieved).unwrap();
        let row = t.row(1).unwrap();
        assert!(row.is_locked());
        assert_eq!(row.sense(), GoalSense::Equal);
        assert_eq!(row.priority(), 1);
        assert_eq!(t.rhs(1).unwrap(), Rational::from(3));
        assert_eq!(t.row_state(1).unwrap().basic_value, Rational::from(3));
        assert_eq!(t.evaluate_row(1).unwrap(), t.rhs(1).unwrap());
    }

    #[test]
    fn test_apply_solution_is_all_or_nothing() {
        let mut t = two_by_two();
        let before = t.clone();
        let err = t.apply_solution(&[Rational::ONE, Rational::from(2)]);
        assert!(matches!(err, Err(GoalError::OutOfRange { .. })));
        assert_eq!(t, before);
        assert!(t.apply_solution(&[Rational::ONE]).is_err());
        assert_eq!(t, before);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_out_of_bounds_value_is_state_error() {
        let mut json = serde_json::to_value(two_by_two()).unwrap();
        json["variables"][0]["value"] = serde_json::json!([2, 1]);
        let t: Tableau = serde_json::from_value(json).unwrap();
        assert!(matches!(t.validate_state(), Err(GoalError::StateInvariant(_))));

        let mut work = t.clone();
        let solver = crate::continuous::ContinuousPrioritySolver::default();
        assert!(matches!(
            solver.solve_priority(&mut work, 0),
            Err(GoalError::StateInvariant(_))
        ));
        assert!(matches!(
            crate::lexicographic::LexicographicCoordinator::default().solve_progressively(t),
            Err(GoalError::StateInvariant(_))
        ));
    }

    #[test]
    fn test_priorities_sorted_distinct() {
        let t = two_by_two();
        assert_eq!(t.priorities(), vec![0, 1]);
        assert_eq!(t.rows_at(1), vec![1]);
    }

    #[test]
    fn test_replace_variable_keeps_name() {
        let mut t = two_by_two();
        let narrowed = t.variables()[0]
            .with_bounds(Rational::ZERO, Rational::new(1, 2).unwrap())
            .unwrap();
        t.replace_variable(0, narrowed).unwrap();
        assert_eq!(t.variables()[0].upper(), Rational::new(1, 2).unwrap());
        assert!(t.replace_variable(0, BoundedVariable::unit("zzz")).is_err());
    }
}
