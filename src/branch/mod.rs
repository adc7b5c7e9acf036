//! Depth-first branch-and-bound for integer-flagged variables.
//!
//! Wraps [`ContinuousPrioritySolver`](crate::continuous::ContinuousPrioritySolver):
//! every node is a cloned [`Tableau`](crate::model::Tableau) with narrowed
//! variable bounds, solved over the continuous relaxation. Nodes live on an
//! explicit stack so the tree depth never touches the call stack.

mod config;
mod runner;

pub use config::BranchConfig;
pub use runner::BranchAndBound;
