//! Error type shared by every fallible operation in the crate.
//!
//! Algorithmic outcomes such as an unreachable goal are *not* errors; they are
//! reported through [`SolveStatus`](crate::continuous::SolveStatus). This enum
//! only covers misuse at the API boundary and arithmetic that leaves the
//! representable range.

use thiserror::Error;

/// Errors raised by rational arithmetic, model construction and solving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalError {
    /// A rational component left the `i64` storage range.
    #[error("rational overflow: {0}")]
    Overflow(String),

    /// Division by a zero-valued operand.
    #[error("division by zero")]
    DivideByZero,

    /// The out-of-band `NaN` marker was used as an arithmetic operand.
    #[error("NaN marker used as an arithmetic operand")]
    NotANumber,

    /// A value or index fell outside its permitted range.
    #[error("{what} out of range: {detail}")]
    OutOfRange {
        /// What was being accessed or assigned.
        what: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// Malformed input rejected at the API boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal state was found corrupted (e.g. a deserialized variable
    /// outside its bounds).
    #[error("state invariant violated: {0}")]
    StateInvariant(String),
}

/// Result alias used throughout the crate.
pub type GoalResult<T> = Result<T, GoalError>;

impl GoalError {
    pub(crate) fn out_of_range(what: &'static str, detail: impl Into<String>) -> Self {
        GoalError::OutOfRange {
            what,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        GoalError::InvalidArgument(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(GoalError::DivideByZero.to_string(), "division by zero");
        let e = GoalError::out_of_range("row index", "7 >= 3");
        assert_eq!(e.to_string(), "row index out of range: 7 >= 3");
        let e = GoalError::invalid("no variables");
        assert_eq!(e.to_string(), "invalid argument: no variables");
    }
}
