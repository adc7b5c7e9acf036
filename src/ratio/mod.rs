//! Bounded-variable ratio test.
//!
//! The classical bounded revised-simplex pivot step: given an entering
//! column at one of its bounds, decide how far it can move before either a
//! row of the current priority hits its admissible band or the variable
//! reaches its opposite bound.
//!
//! The strategy is a trait so a solver can be built with a different
//! implementation for parity testing.
//!
//! # References
//!
//! Bazaraa, Jarvis & Sherali (2010), "Linear Programming and Network Flows",
//! ch. 5.2 (the bounded-variables simplex method).

mod runner;
mod types;

pub use runner::{apply_pivot, BoundedRatioTest};
pub use types::{PivotKind, RatioTest, RatioTestResult};
