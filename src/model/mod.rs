//! Data model: bounded variables, prioritized goal rows and the tableau.
//!
//! # Key Components
//!
//! - [`BoundedVariable`]: a decision variable on `[lower, upper]`
//! - [`GoalRow`]: a prioritized linear goal with a sense and tolerance
//! - [`Tableau`]: variables, rows, row state and the dense matrix, cloned
//!   whenever a search path forks

mod goal;
mod tableau;
mod variable;

pub use goal::{GoalRow, GoalSense, DEFAULT_TOLERANCE, LOCK_SUFFIX, SOFT_TOLERANCE};
pub use tableau::{RowState, Tableau};
pub use variable::{BoundState, BoundedVariable};
