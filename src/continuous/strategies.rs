//! Candidate-generating search strategies.
//!
//! Each strategy proposes points to a [`Scorer`]; none of them decides
//! feasibility on its own. They run in a fixed order and the search stops
//! as soon as the incumbent reaches the score ceiling.

use std::mem;

use tracing::trace;

use super::linalg::{least_squares, min_norm_correction, solve_square, solve_with_free};
use super::problem::{LinearRow, Phase, Scorer, TargetKind};
use super::qp;
use crate::diagnostics::Diagnostics;

const BATCH: usize = 256;

type Strategy = fn(&mut Scorer<'_>, &mut Diagnostics);

const STRATEGIES: [(&str, Strategy); 7] = [
    ("vertex enumeration", vertices),
    ("gaussian elimination", gauss),
    ("least-squares projection", projection),
    ("fixed-free enumeration", fixed_free),
    ("overdetermined fixing", overdetermined),
    ("target patterns", target_patterns),
    ("active-set refinement", qp::refine),
];

/// Offers `seed`, then runs every strategy until the scorer saturates.
pub(crate) fn search(scorer: &mut Scorer<'_>, seed: Vec<f64>, diagnostics: &mut Diagnostics) {
    scorer.offer(seed, diagnostics);
    for (name, strategy) in STRATEGIES {
        if scorer.saturated() {
            trace!(strategy = name, "score ceiling reached, stopping");
            return;
        }
        let before = diagnostics.candidates_scored();
        strategy(scorer, diagnostics);
        trace!(
            strategy = name,
            candidates = diagnostics.candidates_scored() - before,
            best = scorer.best().map(|b| b.score),
            "strategy finished"
        );
    }
}

fn matrix(rows: &[LinearRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    (
        rows.iter().map(|r| r.coeffs.clone()).collect(),
        rows.iter().map(|r| r.rhs).collect(),
    )
}

/// Every box corner, for small dimensions.
fn vertices(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let problem = scorer.problem();
    let n = problem.dimension();
    if n == 0 || n > scorer.config().vertex_limit {
        return;
    }
    let mut batch = Vec::with_capacity(BATCH);
    for mask in 0u64..(1u64 << n) {
        let corner = (0..n)
            .map(|j| {
                if (mask >> j) & 1 == 1 {
                    problem.upper[j]
                } else {
                    problem.lower[j]
                }
            })
            .collect();
        batch.push(corner);
        if batch.len() == BATCH {
            scorer.offer_batch(mem::take(&mut batch), diagnostics);
            if scorer.saturated() {
                return;
            }
        }
    }
    scorer.offer_batch(batch, diagnostics);
}

/// Row-reduces the phase system with non-pivot columns at their lower bounds.
fn gauss(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let rows = scorer.system();
    if rows.is_empty() {
        return;
    }
    let (a, b) = matrix(&rows);
    if let Some(x) = solve_with_free(&a, &b, &scorer.problem().lower) {
        scorer.offer(x, diagnostics);
    }
}

/// Alternating minimum-norm projection onto the phase system and clipping
/// to the box. Only used while nothing useful has been found.
fn projection(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let problem = scorer.problem();
    let config = scorer.config();
    let needed = match (scorer.phase(), scorer.best()) {
        (_, None) => true,
        (Phase::Target { target }, Some(best)) => {
            target.line.value(&best.x).abs() <= config.feasibility_tolerance
        }
        (Phase::Settle { .. }, Some(_)) => false,
    };
    if !needed {
        return;
    }
    let rows = scorer.system();
    if rows.is_empty() {
        return;
    }
    let a: Vec<Vec<f64>> = rows.iter().map(|r| r.coeffs.clone()).collect();

    let midpoint: Vec<f64> = problem
        .lower
        .iter()
        .zip(&problem.upper)
        .map(|(l, u)| 0.5 * (l + u))
        .collect();
    let mut starts = vec![midpoint];
    if let Phase::Target { target } = scorer.phase() {
        if target.kind != TargetKind::Approach {
            starts.push(target.ideal_corner(&problem.lower, &problem.upper));
        }
    }

    for mut x in starts {
        for _ in 0..config.lsq_iterations {
            let residual: Vec<f64> = rows.iter().map(|r| r.rhs - r.value(&x)).collect();
            if rows
                .iter()
                .zip(&residual)
                .all(|(row, r)| r.abs() <= 1e-12 * (1.0 + row.rhs.abs()))
            {
                break;
            }
            let Some(step) = min_norm_correction(&a, &residual, config.lsq_regularization) else {
                break;
            };
            for (v, d) in x.iter_mut().zip(step) {
                *v += d;
            }
            problem.clip(&mut x);
        }
        scorer.offer(x, diagnostics);
    }
}

/// Advances `idx` to the next `k`-combination of `0..n` in lexicographic
/// order.
fn next_combination(idx: &mut [usize], n: usize) -> bool {
    let k = idx.len();
    for i in (0..k).rev() {
        if idx[i] < n - k + i {
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Solves `rows` for the `free` columns with every other column fixed.
fn solve_pattern<F>(
    rows: &[LinearRow],
    free: &[usize],
    fixed: &[(usize, f64)],
    n: usize,
    solve: F,
) -> Option<Vec<f64>>
where
    F: FnOnce(Vec<Vec<f64>>, Vec<f64>) -> Option<Vec<f64>>,
{
    let mut x = vec![0.0; n];
    for &(j, v) in fixed {
        x[j] = v;
    }
    let a = rows
        .iter()
        .map(|r| free.iter().map(|&j| r.coeffs[j]).collect())
        .collect();
    let b = rows
        .iter()
        .map(|r| r.rhs - fixed.iter().map(|&(j, v)| r.coeffs[j] * v).sum::<f64>())
        .collect();
    for (&j, v) in free.iter().zip(solve(a, b)?) {
        x[j] = v;
    }
    Some(x)
}

/// Square solves of `rows`: every choice of `rows.len()` free columns, with
/// the rest at lower/upper bound combinations, up to the sampling cap.
fn square_patterns(scorer: &mut Scorer<'_>, rows: &[LinearRow], diagnostics: &mut Diagnostics) {
    let problem = scorer.problem();
    let n = problem.dimension();
    let k = rows.len();
    if k == 0 || k > n {
        return;
    }
    let mut budget = scorer.config().fixing_sample_cap;
    let mut free: Vec<usize> = (0..k).collect();
    let mut batch = Vec::with_capacity(BATCH);
    loop {
        let fixed_cols: Vec<usize> = (0..n).filter(|j| !free.contains(j)).collect();
        let assignments = u32::try_from(fixed_cols.len())
            .ok()
            .and_then(|bits| 1u64.checked_shl(bits))
            .unwrap_or(u64::MAX);
        let mut mask = 0u64;
        while mask < assignments && budget > 0 {
            budget -= 1;
            let fixed: Vec<(usize, f64)> = fixed_cols
                .iter()
                .enumerate()
                .map(|(i, &j)| {
                    let at_upper = i < 64 && (mask >> i) & 1 == 1;
                    (j, if at_upper { problem.upper[j] } else { problem.lower[j] })
                })
                .collect();
            if let Some(x) = solve_pattern(rows, &free, &fixed, n, solve_square) {
                batch.push(x);
            }
            if batch.len() == BATCH {
                scorer.offer_batch(mem::take(&mut batch), diagnostics);
                if scorer.saturated() {
                    return;
                }
            }
            mask += 1;
        }
        if budget == 0 || !next_combination(&mut free, n) {
            break;
        }
    }
    scorer.offer_batch(batch, diagnostics);
}

/// Basic solutions of the phase system: square subsystems with the
/// remaining columns at bounds.
fn fixed_free(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let rows = scorer.system();
    square_patterns(scorer, &rows, diagnostics);
}

/// More equations than variables: each column is free, at lower or at
/// upper, and the free columns are fitted by least squares.
fn overdetermined(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let problem = scorer.problem();
    let config = scorer.config();
    let rows = scorer.system();
    let n = problem.dimension();
    if rows.len() <= n {
        return;
    }
    // 0 = free, 1 = lower, 2 = upper
    let mut pattern = vec![0u8; n];
    let mut batch = Vec::with_capacity(BATCH);
    for _ in 0..config.fixing_sample_cap {
        let free: Vec<usize> = (0..n).filter(|&j| pattern[j] == 0).collect();
        let fixed: Vec<(usize, f64)> = (0..n)
            .filter_map(|j| match pattern[j] {
                1 => Some((j, problem.lower[j])),
                2 => Some((j, problem.upper[j])),
                _ => None,
            })
            .collect();
        let lambda = config.lsq_regularization;
        let fitted = solve_pattern(&rows, &free, &fixed, n, |a, b| {
            if free.is_empty() {
                Some(Vec::new())
            } else {
                least_squares(&a, &b, lambda)
            }
        });
        if let Some(x) = fitted {
            batch.push(x);
        }
        if batch.len() == BATCH {
            scorer.offer_batch(mem::take(&mut batch), diagnostics);
            if scorer.saturated() {
                return;
            }
        }
        if !advance_ternary(&mut pattern) {
            break;
        }
    }
    scorer.offer_batch(batch, diagnostics);
}

fn advance_ternary(pattern: &mut [u8]) -> bool {
    for digit in pattern.iter_mut() {
        if *digit < 2 {
            *digit += 1;
            return true;
        }
        *digit = 0;
    }
    false
}

/// With room to spare (fewer equations than variables), pins a
/// `Maximize`/`Minimize` target at its box ideal and solves the widened
/// square systems.
fn target_patterns(scorer: &mut Scorer<'_>, diagnostics: &mut Diagnostics) {
    let Phase::Target { target } = scorer.phase() else {
        return;
    };
    if target.kind == TargetKind::Approach {
        return;
    }
    let problem = scorer.problem();
    let ideal = target.sign() * target.box_ceiling(&problem.lower, &problem.upper);
    let mut rows = scorer.system();
    if rows.len() >= problem.dimension() {
        return;
    }
    rows.push(target.line.pinned(ideal, 0.0));
    square_patterns(scorer, &rows, diagnostics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuous::config::SolverConfig;
    use crate::continuous::problem::PriorityProblem;
    use crate::model::{BoundedVariable, GoalRow, GoalSense, Tableau};
    use crate::rational::Rational;

    #[test]
    fn test_next_combination() {
        let mut idx = vec![0, 1];
        let mut seen = vec![idx.clone()];
        while next_combination(&mut idx, 4) {
            seen.push(idx.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last().unwrap(), &vec![2, 3]);

        let mut empty: Vec<usize> = vec![];
        assert!(!next_combination(&mut empty, 3));
    }

    #[test]
    fn test_advance_ternary_visits_all() {
        let mut p = vec![0u8; 3];
        let mut count = 1;
        while advance_ternary(&mut p) {
            count += 1;
        }
        assert_eq!(count, 27);
        assert_eq!(p, vec![0, 0, 0]);
    }

    #[test]
    fn test_search_finds_interior_optimum() {
        // maximize a subject to a - b = 0 (locked) with b <= 1/2 via box.
        let vars = vec![
            BoundedVariable::unit("a"),
            BoundedVariable::new("b", Rational::ZERO, Rational::new(1, 2).unwrap()).unwrap(),
        ];
        let rows = vec![
            GoalRow::new("tie#locked", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::from(-1)),
            GoalRow::new("push", GoalSense::Maximize, 1).with_coefficient("a", Rational::ONE),
        ];
        let t = Tableau::new(vars, rows).unwrap();
        let config = SolverConfig::default();
        let problem = PriorityProblem::classify(&t, 1, &config).unwrap();
        let phase = Phase::Target {
            target: problem.target.clone().unwrap(),
        };
        let mut scorer = Scorer::new(&problem, &config, phase);
        let mut diag = Diagnostics::new();
        search(&mut scorer, vec![0.0, 0.0], &mut diag);
        let best = scorer.best().unwrap();
        assert!((best.x[0] - 0.5).abs() < 1e-9);
        assert!((best.x[1] - 0.5).abs() < 1e-9);
        assert!(diag.candidates_scored() > 1);
        assert!(diag.row_evaluations() >= diag.candidates_scored());
    }

    #[test]
    fn test_overdetermined_fit() {
        // Three consistent equations in two unknowns.
        let vars = vec![BoundedVariable::unit("a"), BoundedVariable::unit("b")];
        let half = Rational::new(1, 2).unwrap();
        let rows = vec![
            GoalRow::new("e1", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_rhs(half),
            GoalRow::new("e2", GoalSense::Equal, 0)
                .with_coefficient("b", Rational::ONE)
                .with_rhs(half),
            GoalRow::new("e3", GoalSense::Equal, 0)
                .with_coefficient("a", Rational::ONE)
                .with_coefficient("b", Rational::ONE)
                .with_rhs(Rational::ONE),
        ];
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
        overdetermined(&mut scorer, &mut diag);
        let best = scorer.best().unwrap();
        assert!((best.x[0] - 0.5).abs() < 1e-6);
        assert!((best.x[1] - 0.5).abs() < 1e-6);
    }
}
