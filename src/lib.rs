//! Exact preemptive goal programming over box-bounded variables.
//!
//! Goals are linear rows with a priority, a sense (maximize, minimize or
//! reach a target value) and a tolerance. Priorities are solved strictly in
//! order: once a priority is solved its rows are locked at their achieved
//! values, so no later priority can trade them away.
//!
//! - [`rational`]: overflow-checked exact arithmetic used for every stored
//!   value and every cross-stage comparison.
//! - [`model`]: bounded variables, goal rows and the tableau.
//! - [`ratio`]: the bounded-variable ratio test (a pluggable trait).
//! - [`continuous`]: the two-phase single-priority solver over the
//!   continuous relaxation.
//! - [`branch`]: depth-first branch-and-bound for integer variables.
//! - [`lexicographic`]: the priority sequencer and the matrix entry point,
//!   both exposed as lazy progress iterators.
//! - [`diagnostics`]: deterministic, mergeable counters and traces.
//!
//! # Example
//!
//! ```
//! use u_goalprog::lexicographic::LexicographicCoordinator;
//! use u_goalprog::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
//! use u_goalprog::rational::Rational;
//!
//! let vars = vec![
//!     BoundedVariable::integer("crates", Rational::ZERO, Rational::from(10)).unwrap(),
//!     BoundedVariable::new("fuel", Rational::ZERO, Rational::from(4)).unwrap(),
//! ];
//! let rows = vec![
//!     GoalRow::new("load", GoalSense::Equal, 0)
//!         .with_coefficient("crates", Rational::from(2))
//!         .with_coefficient("fuel", Rational::ONE)
//!         .with_rhs(Rational::from(9)),
//!     GoalRow::new("cargo", GoalSense::Maximize, 1).with_coefficient("crates", Rational::ONE),
//! ];
//! let tableau = Tableau::new(vars, rows).unwrap();
//!
//! let result = LexicographicCoordinator::default().solve(tableau).unwrap();
//! assert!(result.is_optimal());
//! assert_eq!(result.values(), vec![Rational::from(4), Rational::ONE]);
//! ```

pub mod branch;
pub mod continuous;
pub mod diagnostics;
pub mod error;
pub mod lexicographic;
pub mod model;
pub mod ratio;
pub mod rational;

#[cfg(feature = "wasm")]
mod wasm;

pub use error::{GoalError, GoalResult};
