//! Continuous single-priority solving.
//!
//! A priority is solved in two phases over the bounded box of the
//! tableau's variables. Candidate points come from a fixed sequence of
//! strategies (box corners, elimination, least-squares projection,
//! basic-solution enumeration, an active-set QP) and are scored in `f64`;
//! the winner is snapped back to exact rationals before it is written to
//! the tableau.

mod config;
mod linalg;
mod problem;
mod qp;
mod runner;
mod strategies;
mod types;

pub use config::SolverConfig;
pub use runner::ContinuousPrioritySolver;
pub use types::{SimplexResult, SolveStatus};
