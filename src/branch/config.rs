//! Branch-and-bound configuration.

/// Limits of the integrality search.
///
/// # Examples
///
/// ```
/// use u_goalprog::branch::BranchConfig;
///
/// let config = BranchConfig::default().with_max_depth(8);
/// assert_eq!(config.max_depth, 8);
/// assert_eq!(config.max_nodes, 10_000);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchConfig {
    /// Children deeper than this are never explored.
    pub max_depth: usize,
    /// Upper limit on solved nodes per priority.
    pub max_nodes: usize,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 10_000,
        }
    }
}

impl BranchConfig {
    /// Sets the maximum branching depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum number of nodes solved per priority.
    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = nodes;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_nodes == 0 {
            return Err("max_nodes must be at least 1".into());
        }
        Ok(())
    }
}
