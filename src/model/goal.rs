//! Prioritized linear goal rows.

use std::collections::BTreeMap;

use crate::rational::Rational;

/// Tolerance at or above which a row is soft: minimized as a deviation
/// instead of enforced.
pub const SOFT_TOLERANCE: Rational = Rational::MAX_VALUE;

/// Tolerance given to hard rows unless overridden.
pub const DEFAULT_TOLERANCE: Rational = Rational::EPSILON;

/// Name suffix carried by rows frozen with [`GoalRow::create_lock`].
pub const LOCK_SUFFIX: &str = "#locked";

/// Optimization sense of a goal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalSense {
    /// Push `row · x` as high as the box allows.
    Maximize,
    /// Push `row · x` as low as the box allows.
    Minimize,
    /// Reach `row · x == rhs` within tolerance.
    Equal,
}

/// One prioritized linear goal `Σ coefficient(v) · v  (sense)  rhs`.
///
/// Coefficients are sparse: absent variables contribute zero. Priority 0 is
/// solved first.
///
/// # Examples
///
/// ```
/// use u_goalprog::model::{GoalRow, GoalSense};
/// use u_goalprog::rational::Rational;
///
/// let fx = GoalRow::new("force_x", GoalSense::Maximize, 0)
///     .with_coefficient("px_1", Rational::ONE)
///     .with_coefficient("nx_1", -Rational::ONE)
///     .with_rhs(Rational::ONE);
/// assert_eq!(fx.coefficient("px_1"), Rational::ONE);
/// assert_eq!(fx.coefficient("py_1"), Rational::ZERO);
///
/// let locked = fx.create_lock(Rational::from(2));
/// assert!(locked.is_locked());
/// assert_eq!(locked.sense(), GoalSense::Equal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GoalRow {
    name: String,
    sense: GoalSense,
    priority: u32,
    coefficients: BTreeMap<String, Rational>,
    rhs: Rational,
    tolerance: Rational,
}

impl GoalRow {
    /// Creates a hard row with no coefficients and `rhs = 0`.
    pub fn new(name: impl Into<String>, sense: GoalSense, priority: u32) -> Self {
        Self {
            name: name.into(),
            sense,
            priority,
            coefficients: BTreeMap::new(),
            rhs: Rational::ZERO,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Sets one coefficient. Zero and the `NAN` "no preference" marker are
    /// stored as absent.
    pub fn with_coefficient(mut self, variable: impl Into<String>, value: Rational) -> Self {
        self.set_coefficient(variable, value);
        self
    }

    pub fn with_rhs(mut self, rhs: Rational) -> Self {
        self.rhs = rhs;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Rational) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Makes the row soft.
    pub fn soft(mut self) -> Self {
        self.tolerance = SOFT_TOLERANCE;
        self
    }

    pub(crate) fn set_coefficient(&mut self, variable: impl Into<String>, value: Rational) {
        let variable = variable.into();
        if value.is_zero() || value.is_nan() {
            self.coefficients.remove(&variable);
        } else {
            self.coefficients.insert(variable, value);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> GoalSense {
        self.sense
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn rhs(&self) -> Rational {
        self.rhs
    }

    pub fn tolerance(&self) -> Rational {
        self.tolerance
    }

    /// Coefficient of `variable`, zero when absent.
    pub fn coefficient(&self, variable: &str) -> Rational {
        self.coefficients
            .get(variable)
            .copied()
            .unwrap_or(Rational::ZERO)
    }

    /// Non-zero coefficients in variable-name order.
    pub fn coefficients(&self) -> impl Iterator<Item = (&str, Rational)> + '_ {
        self.coefficients.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_soft(&self) -> bool {
        self.tolerance >= SOFT_TOLERANCE
    }

    /// Whether this row was produced by [`create_lock`](Self::create_lock).
    pub fn is_locked(&self) -> bool {
        self.name.ends_with(LOCK_SUFFIX)
    }

    /// Freezes the row at `achieved`: an `Equal` row with the same
    /// coefficients and priority. A soft row becomes hard at the default
    /// tolerance so later priorities cannot trade it away.
    pub fn create_lock(&self, achieved: Rational) -> GoalRow {
        let name = if self.is_locked() {
            self.name.clone()
        } else {
            format!("{}{}", self.name, LOCK_SUFFIX)
        };
        let tolerance = if self.is_soft() {
            DEFAULT_TOLERANCE
        } else {
            self.tolerance
        };
        GoalRow {
            name,
            sense: GoalSense::Equal,
            priority: self.priority,
            coefficients: self.coefficients.clone(),
            rhs: achieved,
            tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_coefficients() {
        let row = GoalRow::new("g", GoalSense::Equal, 1)
            .with_coefficient("a", Rational::from(3))
            .with_coefficient("b", Rational::ZERO)
            .with_coefficient("c", Rational::NAN);
        assert_eq!(row.coefficient("a"), Rational::from(3));
        assert_eq!(row.coefficient("b"), Rational::ZERO);
        assert_eq!(row.coefficient("c"), Rational::ZERO);
        assert_eq!(row.coefficients().count(), 1);
    }

    #[test]
    fn test_soft_flag() {
        let hard = GoalRow::new("h", GoalSense::Equal, 0);
        assert!(!hard.is_soft());
        assert!(hard.clone().soft().is_soft());
        let loose = hard.with_tolerance(Rational::new(1, 2).unwrap());
        assert!(!loose.is_soft());
    }

    #[test]
    fn test_create_lock() {
        let row = GoalRow::new("torque_z", GoalSense::Minimize, 2)
            .with_coefficient("a", Rational::from(-1))
            .soft();
        let lock = row.create_lock(Rational::new(1, 4).unwrap());
        assert_eq!(lock.name(), "torque_z#locked");
        assert_eq!(lock.sense(), GoalSense::Equal);
        assert_eq!(lock.priority(), 2);
        assert_eq!(lock.rhs(), Rational::new(1, 4).unwrap());
        assert!(!lock.is_soft());
        assert!(lock.is_locked());
        assert_eq!(lock.coefficient("a"), Rational::from(-1));
        // Re-locking keeps a single suffix.
        assert_eq!(lock.create_lock(Rational::ZERO).name(), "torque_z#locked");
    }
}
