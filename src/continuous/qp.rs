//! Active-set refinement of the soft-deviation phase.
//!
//! Minimizes the smooth surrogate
//!
//! ```text
//! ½ xᵀHx + gᵀx,   H = 2(SᵀS + μI),   g = −2Sᵀt + ρ·1₊
//! ```
//!
//! over the box and the phase equalities, where `S x ≈ t` are the soft
//! rows and `1₊` marks columns with a non-negative lower bound. The result
//! is one more candidate for the L1 scorer.

use tracing::trace;

use super::linalg::{dot, solve_square};
use super::problem::{Phase, Scorer};
use crate::diagnostics::Diagnostics;

const ACTIVE_EPS: f64 = 1e-12;
const STEP_EPS: f64 = 1e-10;
const KKT_DAMPING: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Free,
    Lower,
    Upper,
}

pub(crate) fn refine(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let problem = scorer.problem();
    let config = scorer.config();
    if !matches!(scorer.phase(), Phase::Settle { .. }) || problem.soft.is_empty() {
        return;
    }
    let Some(start) = scorer.best().map(|b| b.x.clone()) else {
        return;
    };
    let n = problem.dimension();
    let equalities = scorer.system();
    let (lower, upper) = (&problem.lower, &problem.upper);

    let mu = config.lsq_regularization.max(1e-12);
    let mut h = vec![vec![0.0; n]; n];
    let mut g = vec![0.0; n];
    for row in &problem.soft {
        for i in 0..n {
            g[i] -= 2.0 * row.coeffs[i] * row.rhs;
            for j in 0..n {
                h[i][j] += 2.0 * row.coeffs[i] * row.coeffs[j];
            }
        }
    }
    for i in 0..n {
        h[i][i] += 2.0 * mu;
        if lower[i] >= 0.0 {
            g[i] += config.usage_weight;
        }
    }

    let mut x = start;
    let mut active: Vec<Active> = (0..n)
        .map(|j| {
            if (x[j] - lower[j]).abs() <= ACTIVE_EPS {
                Active::Lower
            } else if (x[j] - upper[j]).abs() <= ACTIVE_EPS {
                Active::Upper
            } else {
                Active::Free
            }
        })
        .collect();

    let mut iterations = 0;
    for _ in 0..config.qp_max_iterations {
        iterations += 1;
        let gradient: Vec<f64> = (0..n).map(|i| dot(&h[i], &x) + g[i]).collect();
        let free: Vec<usize> = (0..n).filter(|&j| active[j] == Active::Free).collect();
        let f = free.len();
        let m = equalities.len();

        // [H_FF  E_Fᵀ] [p]   [ -∇_F ]
        // [E_F   -δI ] [ν] = [ e-Ex ]
        // with δ = 0 unless the equalities are dependent on this face.
        let mut kkt = vec![vec![0.0; f + m]; f + m];
        let mut rhs = vec![0.0; f + m];
        for (a, &i) in free.iter().enumerate() {
            for (b, &j) in free.iter().enumerate() {
                kkt[a][b] = h[i][j];
            }
            for (e, row) in equalities.iter().enumerate() {
                kkt[a][f + e] = row.coeffs[i];
                kkt[f + e][a] = row.coeffs[i];
            }
            rhs[a] = -gradient[i];
        }
        for (e, row) in equalities.iter().enumerate() {
            rhs[f + e] = row.rhs - row.value(&x);
        }
        let solution = solve_square(kkt.clone(), rhs.clone()).or_else(|| {
            for e in 0..m {
                kkt[f + e][f + e] = -KKT_DAMPING;
            }
            solve_square(kkt, rhs)
        });
        let Some(solution) = solution else {
            break;
        };
        let (step, multipliers) = solution.split_at(f);

        if step.iter().all(|p| p.abs() <= STEP_EPS) {
            // Stationary on the current face: release the worst bound.
            let mut release: Option<(usize, f64)> = None;
            for j in 0..n {
                let reduced = gradient[j]
                    + equalities
                        .iter()
                        .zip(multipliers)
                        .map(|(row, nu)| row.coeffs[j] * nu)
                        .sum::<f64>();
                let violation = match active[j] {
                    Active::Lower => -reduced,
                    Active::Upper => reduced,
                    Active::Free => continue,
                };
                if violation > config.improvement_tolerance
                    && release.map_or(true, |(_, worst)| violation > worst)
                {
                    release = Some((j, violation));
                }
            }
            match release {
                Some((j, _)) => active[j] = Active::Free,
                None => break,
            }
            continue;
        }

        let mut alpha = 1.0;
        let mut blocking = None;
        for (&j, &p) in free.iter().zip(step) {
            let limit = if p < 0.0 {
                (lower[j] - x[j]) / p
            } else if p > 0.0 {
                (upper[j] - x[j]) / p
            } else {
                continue;
            };
            if limit < alpha {
                alpha = limit.max(0.0);
                blocking = Some((j, if p < 0.0 { Active::Lower } else { Active::Upper }));
            }
        }
        for (&j, &p) in free.iter().zip(step) {
            x[j] += alpha * p;
        }
        if let Some((j, side)) = blocking {
            x[j] = if side == Active::Lower { lower[j] } else { upper[j] };
            active[j] = side;
        }
    }

    let bound = active.iter().filter(|&&a| a != Active::Free).count();
    trace!(iterations, bound, "active-set refinement finished");
    scorer.offer(x, diagnostics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuous::config::SolverConfig;
    use crate::continuous::problem::PriorityProblem;
    use crate::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
    use crate::rational::Rational;

    #[test]
    fn test_refine_reaches_interior_soft_optimum() {
        // Soft a + b = 3/2 with a = b pinned by a lock: optimum at 3/4 each.
        let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
        let rows = vec![
            GoalRow::new("tie#locked", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::from(-1)),
            GoalRow::new("s", GoalSense::Equal, 1)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::ONE)
                .with_rhs(Rational::new(3, 2).unwrap())
                .soft(),
        ];
        let t = Tableau::new(vars, rows).unwrap();
        let config = SolverConfig::default().with_usage_weight(0.0);
        let problem = PriorityProblem::classify(&t, 1, &config).unwrap();
        let mut scorer = Scorer::new(&problem, &config, Phase::Settle { pinned: vec![] });
        let mut diag = Diagnostics::new();
        scorer.offer(vec![0.0, 0.0], &mut diag);
        refine(&mut scorer, &mut diag);
        let best = scorer.best().unwrap();
        assert!((best.x[0] - 0.75).abs() < 1e-6);
        assert!((best.x[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_refine_skips_target_phase() {
        let vars = vec![BoundedVariable::unit("a")];
        let rows = vec![GoalRow::new("m", GoalSense::Maximize, 0).with_coefficient("a", Rational::ONE)];
        let t = Tableau::new(vars, rows).unwrap();
        let config = SolverConfig::default();
        let problem = PriorityProblem::classify(&t, 0, &config).unwrap();
        let mut scorer = Scorer::new(
            &problem,
            &config,
            Phase::Target {
                target: problem.target.clone().unwrap(),
            },
        );
        let mut diag = Diagnostics::new();
        scorer.offer(vec![0.0], &mut diag);
        refine(&mut scorer, &mut diag);
        assert_eq!(diag.candidates_scored(), 1);
    }
}
