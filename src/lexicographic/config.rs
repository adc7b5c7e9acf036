//! Coordinator configuration.

use crate::branch::BranchConfig;
use crate::continuous::SolverConfig;

/// Settings for a full lexicographic run: the per-node continuous solver and
/// the integrality search wrapped around it.
///
/// # Examples
///
/// ```
/// use u_goalprog::branch::BranchConfig;
/// use u_goalprog::continuous::SolverConfig;
/// use u_goalprog::lexicographic::LexConfig;
///
/// let config = LexConfig::default()
///     .with_solver(SolverConfig::default().with_vertex_limit(10))
///     .with_branch(BranchConfig::default().with_max_nodes(500));
/// assert_eq!(config.solver.vertex_limit, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LexConfig {
    pub solver: SolverConfig,
    pub branch: BranchConfig,
}

impl LexConfig {
    /// Sets the continuous solver configuration.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Sets the branch-and-bound configuration.
    pub fn with_branch(mut self, branch: BranchConfig) -> Self {
        self.branch = branch;
        self
    }

    /// Validates both nested configurations.
    pub fn validate(&self) -> Result<(), String> {
        self.solver.validate()?;
        self.branch.validate()
    }
}
