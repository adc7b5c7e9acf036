//! Box-bounded decision variables.

use crate::error::{GoalError, GoalResult};
use crate::rational::Rational;

/// Where a variable's value sits relative to its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundState {
    /// Value equals the lower bound (checked first when `lower == upper`).
    AtLower,
    /// Value equals the upper bound.
    AtUpper,
    /// Strictly between the bounds.
    Basic,
}

/// A decision variable constrained to `[lower, upper]`.
///
/// The value can only change through [`set_value`](Self::set_value), which
/// rejects anything outside the bounds and recomputes the [`BoundState`] by
/// exact comparison.
///
/// # Examples
///
/// ```
/// use u_goalprog::model::{BoundedVariable, BoundState};
/// use u_goalprog::rational::Rational;
///
/// let mut v = BoundedVariable::unit("thruster_px");
/// assert_eq!(v.bound_state(), BoundState::AtLower);
/// v.set_value(Rational::ONE).unwrap();
/// assert_eq!(v.bound_state(), BoundState::AtUpper);
/// assert!(v.set_value(Rational::from(2)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundedVariable {
    name: String,
    lower: Rational,
    upper: Rational,
    is_integer: bool,
    priority: u32,
    value: Rational,
    state: BoundState,
}

impl BoundedVariable {
    /// Creates a continuous variable with value at `lower`.
    pub fn new(name: impl Into<String>, lower: Rational, upper: Rational) -> GoalResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(GoalError::invalid("variable name must not be empty"));
        }
        check_bounds(&name, lower, upper)?;
        Ok(Self {
            name,
            lower,
            upper,
            is_integer: false,
            priority: 0,
            value: lower,
            state: BoundState::AtLower,
        })
    }

    /// Creates an integer-constrained variable with value at `lower`.
    pub fn integer(name: impl Into<String>, lower: Rational, upper: Rational) -> GoalResult<Self> {
        Ok(Self::new(name, lower, upper)?.as_integer())
    }

    /// A continuous variable on `[0, 1]`, the usual duty-cycle domain.
    pub fn unit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: Rational::ZERO,
            upper: Rational::ONE,
            is_integer: false,
            priority: 0,
            value: Rational::ZERO,
            state: BoundState::AtLower,
        }
    }

    /// Marks the variable as integer-constrained.
    pub fn as_integer(mut self) -> Self {
        self.is_integer = true;
        self
    }

    /// Tags the variable with a priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lower(&self) -> Rational {
        self.lower
    }

    pub fn upper(&self) -> Rational {
        self.upper
    }

    pub fn value(&self) -> Rational {
        self.value
    }

    pub fn bound_state(&self) -> BoundState {
        self.state
    }

    pub fn is_integer(&self) -> bool {
        self.is_integer
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Fails if `value` lies outside `[lower, upper]`.
    pub fn check_value(&self, value: Rational) -> GoalResult<()> {
        if value.is_nan() || value < self.lower || value > self.upper {
            return Err(GoalError::out_of_range(
                "variable value",
                format!(
                    "{} = {} not in [{}, {}]",
                    self.name, value, self.lower, self.upper
                ),
            ));
        }
        Ok(())
    }

    /// Assigns `value`, failing if it lies outside `[lower, upper]`.
    pub fn set_value(&mut self, value: Rational) -> GoalResult<()> {
        self.check_value(value)?;
        self.value = value;
        self.state = self.classify(value);
        Ok(())
    }

    fn classify(&self, value: Rational) -> BoundState {
        if value == self.lower {
            BoundState::AtLower
        } else if value == self.upper {
            BoundState::AtUpper
        } else {
            BoundState::Basic
        }
    }

    /// Returns a copy with new bounds and the value clamped into them.
    ///
    /// Used to tighten one variable on a single search-tree edge without
    /// touching the sibling node's copy.
    pub fn with_bounds(&self, lower: Rational, upper: Rational) -> GoalResult<Self> {
        check_bounds(&self.name, lower, upper)?;
        let mut narrowed = Self {
            lower,
            upper,
            ..self.clone()
        };
        let value = narrowed.clamp(self.value);
        narrowed.value = value;
        narrowed.state = narrowed.classify(value);
        Ok(narrowed)
    }

    /// Clamps `value` into this variable's bounds.
    pub fn clamp(&self, value: Rational) -> Rational {
        value.max(self.lower).min(self.upper)
    }

    /// Whether the stored value respects the bounds. Always true for values
    /// assigned through the setter; a deserialized variable may not.
    pub fn is_within_bounds(&self) -> bool {
        !self.value.is_nan() && self.lower <= self.value && self.value <= self.upper
    }

    /// `upper - lower`.
    pub fn range(&self) -> GoalResult<Rational> {
        self.upper.try_sub(self.lower)
    }
}

fn check_bounds(name: &str, lower: Rational, upper: Rational) -> GoalResult<()> {
    if lower.is_nan() || upper.is_nan() {
        return Err(GoalError::invalid(format!("{name}: bounds must be numbers")));
    }
    if upper < lower {
        return Err(GoalError::invalid(format!(
            "{name}: upper bound {upper} below lower bound {lower}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn test_new_starts_at_lower() {
        let v = BoundedVariable::new("x", r(-1, 2), r(3, 1)).unwrap();
        assert_eq!(v.value(), r(-1, 2));
        assert_eq!(v.bound_state(), BoundState::AtLower);
        assert!(!v.is_integer());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(BoundedVariable::new("x", Rational::ONE, Rational::ZERO).is_err());
        assert!(BoundedVariable::new("x", Rational::NAN, Rational::ONE).is_err());
        assert!(BoundedVariable::new("", Rational::ZERO, Rational::ONE).is_err());
    }

    #[test]
    fn test_set_value_states() {
        let mut v = BoundedVariable::unit("x");
        v.set_value(r(1, 2)).unwrap();
        assert_eq!(v.bound_state(), BoundState::Basic);
        v.set_value(Rational::ONE).unwrap();
        assert_eq!(v.bound_state(), BoundState::AtUpper);
        v.set_value(Rational::ZERO).unwrap();
        assert_eq!(v.bound_state(), BoundState::AtLower);
        assert!(v.set_value(r(-1, 1_000_000)).is_err());
        assert_eq!(v.value(), Rational::ZERO);
    }

    #[test]
    fn test_fixed_variable_prefers_lower() {
        let mut v = BoundedVariable::new("x", Rational::ONE, Rational::ONE).unwrap();
        v.set_value(Rational::ONE).unwrap();
        assert_eq!(v.bound_state(), BoundState::AtLower);
    }

    #[test]
    fn test_with_bounds_clamps_and_is_independent() {
        let mut v = BoundedVariable::integer("n", Rational::ZERO, Rational::from(10)).unwrap();
        v.set_value(r(15, 2)).unwrap();
        let left = v.with_bounds(Rational::ZERO, Rational::from(7)).unwrap();
        let right = v.with_bounds(Rational::from(8), Rational::from(10)).unwrap();
        assert_eq!(left.value(), Rational::from(7));
        assert_eq!(left.bound_state(), BoundState::AtUpper);
        assert_eq!(right.value(), Rational::from(8));
        assert_eq!(right.bound_state(), BoundState::AtLower);
        assert_eq!(v.value(), r(15, 2));
        assert!(left.is_integer());
        assert!(v.with_bounds(Rational::from(3), Rational::from(2)).is_err());
    }

    proptest! {
        #[test]
        fn set_value_respects_bounds(
            lo in -100i64..100,
            width in 0i64..100,
            v in -300i64..300,
            d in 1i64..4,
        ) {
            let lower = Rational::from(lo as i32);
            let upper = Rational::from((lo + width) as i32);
            let value = r(v, d);
            let mut var = BoundedVariable::new("x", lower, upper).unwrap();
            let ok = var.set_value(value).is_ok();
            prop_assert_eq!(ok, lower <= value && value <= upper);
            if ok {
                let expected = if value == lower {
                    BoundState::AtLower
                } else if value == upper {
                    BoundState::AtUpper
                } else {
                    BoundState::Basic
                };
                prop_assert_eq!(var.bound_state(), expected);
            }
        }
    }
}
