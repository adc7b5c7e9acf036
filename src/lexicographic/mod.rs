//! Preemptive lexicographic goal programming.
//!
//! Priorities are solved in ascending order. After each one, every goal row
//! at that priority is replaced by an equality lock at its achieved value,
//! so later priorities can only choose among points that keep earlier
//! goals exactly where they were.
//!
//! Two entry points return lazy progress iterators:
//!
//! - [`LexicographicCoordinator::solve_progressively`] over a full
//!   [`Tableau`](crate::model::Tableau);
//! - [`solve`] over a dense coefficient matrix, for simple single-priority
//!   callers.

mod config;
mod matrix;
mod runner;
mod types;

pub use config::LexConfig;
pub use matrix::{solve, solve_with_config, MatrixSolve};
pub use runner::{LexicographicCoordinator, Progress};
pub use types::{LexicographicGoalResult, MatrixProgress, ProgressSnapshot};
