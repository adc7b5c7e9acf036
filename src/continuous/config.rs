//! Continuous-solve configuration.

/// Configuration for [`ContinuousPrioritySolver`](super::ContinuousPrioritySolver).
///
/// The caps (`vertex_limit`, `fixing_sample_cap`, `qp_max_iterations`) are
/// what guarantee termination on pathological inputs.
///
/// # Examples
///
/// ```
/// use u_goalprog::continuous::SolverConfig;
///
/// let config = SolverConfig::default()
///     .with_feasibility_tolerance(1e-7)
///     .with_vertex_limit(12)
///     .with_max_denominator(10_000);
/// assert_eq!(config.vertex_limit, 12);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Absolute residual allowed on a hard row, on top of the row's own
    /// tolerance (the larger of the two applies).
    pub feasibility_tolerance: f64,

    /// A strategy is skipped once the best score is within this margin of
    /// the a-priori ceiling.
    pub improvement_tolerance: f64,

    /// Full 2ⁿ box-corner enumeration runs only for `n <= vertex_limit`.
    pub vertex_limit: usize,

    /// Maximum number of subsystems solved by each combinatorial strategy.
    pub fixing_sample_cap: usize,

    /// Ridge term of the least-squares projection.
    pub lsq_regularization: f64,

    /// Alternating project-and-clip rounds of the least-squares strategy.
    pub lsq_iterations: usize,

    /// Active-set iterations of the QP refinement.
    pub qp_max_iterations: usize,

    /// Phase-1 weight of total variable usage (keeps ties canonical).
    pub usage_penalty: f64,

    /// Phase-2 weight of total variable usage relative to soft deviation.
    pub usage_weight: f64,

    /// Denominator cap when snapping float results to rationals.
    pub max_denominator: i64,

    /// Distance within which a float value snaps exactly onto a bound.
    pub snap_tolerance: f64,

    /// Run the exact ratio-test walk after phase 1.
    pub ratio_polish: bool,

    /// Score enumerated candidate batches with rayon (requires the
    /// `parallel` feature; results are identical either way).
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            feasibility_tolerance: 1e-6,
            improvement_tolerance: 1e-9,
            vertex_limit: 16,
            fixing_sample_cap: 4096,
            lsq_regularization: 1e-9,
            lsq_iterations: 50,
            qp_max_iterations: 100,
            usage_penalty: 1e-6,
            usage_weight: 1e-4,
            max_denominator: 1_000_000,
            snap_tolerance: 1e-9,
            ratio_polish: true,
            parallel: false,
        }
    }
}

impl SolverConfig {
    /// Sets the residual allowed on hard rows.
    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    /// Sets the minimum gain that counts as an improvement.
    pub fn with_improvement_tolerance(mut self, tol: f64) -> Self {
        self.improvement_tolerance = tol;
        self
    }

    /// Sets the largest dimension for full box-corner enumeration.
    pub fn with_vertex_limit(mut self, n: usize) -> Self {
        self.vertex_limit = n;
        self
    }

    /// Sets the maximum number of bound-fixing patterns tried per strategy.
    pub fn with_fixing_sample_cap(mut self, n: usize) -> Self {
        self.fixing_sample_cap = n;
        self
    }

    /// Sets the ridge term of the least-squares projection.
    pub fn with_lsq_regularization(mut self, lambda: f64) -> Self {
        self.lsq_regularization = lambda;
        self
    }

    /// Sets the maximum number of projection sweeps.
    pub fn with_lsq_iterations(mut self, n: usize) -> Self {
        self.lsq_iterations = n;
        self
    }

    /// Sets the maximum number of active-set iterations.
    pub fn with_qp_max_iterations(mut self, n: usize) -> Self {
        self.qp_max_iterations = n;
        self
    }

    /// Sets the usage penalty applied while pushing the target.
    pub fn with_usage_penalty(mut self, w: f64) -> Self {
        self.usage_penalty = w;
        self
    }

    /// Sets the weight of total usage in the soft-deviation phase.
    pub fn with_usage_weight(mut self, w: f64) -> Self {
        self.usage_weight = w;
        self
    }

    /// Sets the snapping denominator cap. Larger values keep more precision
    /// but make exact row evaluation more likely to overflow.
    pub fn with_max_denominator(mut self, d: i64) -> Self {
        self.max_denominator = d;
        self
    }

    /// Sets how close a coordinate must be to a bound to snap onto it.
    pub fn with_snap_tolerance(mut self, tol: f64) -> Self {
        self.snap_tolerance = tol;
        self
    }

    /// Enables or disables the exact ratio-test walk after the target phase.
    pub fn with_ratio_polish(mut self, enabled: bool) -> Self {
        self.ratio_polish = enabled;
        self
    }

    /// Enables rayon scoring of candidate batches.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.feasibility_tolerance > 0.0) {
            return Err("feasibility_tolerance must be positive".into());
        }
        if !(self.improvement_tolerance >= 0.0) {
            return Err("improvement_tolerance must be non-negative".into());
        }
        if self.vertex_limit > 24 {
            return Err("vertex_limit above 24 would enumerate more than 16M corners".into());
        }
        if self.fixing_sample_cap == 0 {
            return Err("fixing_sample_cap must be at least 1".into());
        }
        if !(self.lsq_regularization >= 0.0) {
            return Err("lsq_regularization must be non-negative".into());
        }
        if !(self.usage_penalty >= 0.0) || !(self.usage_weight >= 0.0) {
            return Err("usage weights must be non-negative".into());
        }
        if self.max_denominator < 1 {
            return Err("max_denominator must be at least 1".into());
        }
        if !(self.snap_tolerance >= 0.0) {
            return Err("snap_tolerance must be non-negative".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.vertex_limit, 16);
        assert_eq!(config.fixing_sample_cap, 4096);
        assert_eq!(config.max_denominator, 1_000_000);
        assert!(config.ratio_polish);
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(SolverConfig::default()
            .with_feasibility_tolerance(0.0)
            .validate()
            .is_err());
        assert!(SolverConfig::default().with_vertex_limit(30).validate().is_err());
        assert!(SolverConfig::default()
            .with_fixing_sample_cap(0)
            .validate()
            .is_err());
        assert!(SolverConfig::default()
            .with_max_denominator(0)
            .validate()
            .is_err());
        assert!(SolverConfig::default()
            .with_usage_weight(f64::NAN)
            .validate()
            .is_err());
    }
}
