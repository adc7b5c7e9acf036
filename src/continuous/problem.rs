//! Row classification and candidate scoring for one priority.

use super::config::SolverConfig;
use super::linalg::dot;
use crate::diagnostics::Diagnostics;
use crate::error::GoalResult;
use crate::model::{GoalSense, Tableau};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A goal row in floating point.
#[derive(Debug, Clone)]
pub(crate) struct LinearRow {
    pub row: usize,
    pub coeffs: Vec<f64>,
    pub rhs: f64,
    pub tol: f64,
}

impl LinearRow {
    pub fn value(&self, x: &[f64]) -> f64 {
        dot(&self.coeffs, x)
    }

    pub fn residual(&self, x: &[f64]) -> f64 {
        (self.value(x) - self.rhs).abs()
    }

    pub fn pinned(&self, rhs: f64, tol: f64) -> LinearRow {
        LinearRow {
            rhs,
            tol,
            ..self.clone()
        }
    }
}

/// Direction a target row is pushed in. A negative rhs on a `Maximize` or
/// `Minimize` row reverses its sense, so the row always moves toward the
/// side its rhs points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    Maximize,
    Minimize,
    /// `Equal` target: get as close to the rhs as possible.
    Approach,
}

#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub line: LinearRow,
    pub kind: TargetKind,
}

impl Target {
    /// Higher-is-better form of the target value.
    pub fn signed(&self, value: f64) -> f64 {
        match self.kind {
            TargetKind::Maximize => value,
            TargetKind::Minimize => -value,
            TargetKind::Approach => -(value - self.line.rhs).abs(),
        }
    }

    /// Direction the raw row value should move in, `0` for `Approach`.
    pub fn sign(&self) -> f64 {
        match self.kind {
            TargetKind::Maximize => 1.0,
            TargetKind::Minimize => -1.0,
            TargetKind::Approach => 0.0,
        }
    }

    /// Box corner that optimizes the row on its own.
    pub fn ideal_corner(&self, lower: &[f64], upper: &[f64]) -> Vec<f64> {
        let sign = self.sign();
        self.line
            .coeffs
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(c, (&l, &u))| if sign * c > 0.0 { u } else { l })
            .collect()
    }

    /// Best signed value reachable anywhere in the box, ignoring constraints.
    pub fn box_ceiling(&self, lower: &[f64], upper: &[f64]) -> f64 {
        if self.kind == TargetKind::Approach {
            return 0.0;
        }
        let sign = self.sign();
        self.line
            .coeffs
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(c, (l, u))| (sign * c * l).max(sign * c * u))
            .sum()
    }
}

/// One priority of a tableau, classified and lowered to `f64`.
#[derive(Debug, Clone)]
pub(crate) struct PriorityProblem {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Locked rows from earlier priorities plus hard equalities of this one.
    pub equalities: Vec<LinearRow>,
    pub target: Option<Target>,
    pub soft: Vec<LinearRow>,
}

impl PriorityProblem {
    /// Classifies the rows of `tableau` for `priority`:
    ///
    /// - earlier-priority locked rows become hard equalities;
    /// - soft rows of this priority are minimized as deviation;
    /// - hard `Equal` rows with zero rhs are equalities;
    /// - the first remaining hard row is the target, its direction reversed
    ///   when the rhs is negative; later hard `Equal`
    ///   rows are equalities and later `Maximize`/`Minimize` rows are left
    ///   to subsequent stages.
    pub fn classify(tableau: &Tableau, priority: u32, config: &SolverConfig) -> GoalResult<Self> {
        let vars = tableau.variables();
        let lower = vars.iter().map(|v| v.lower().to_f64()).collect();
        let upper = vars.iter().map(|v| v.upper().to_f64()).collect();
        let mut equalities = Vec::new();
        let mut target = None;
        let mut soft = Vec::new();

        for (r, row) in tableau.rows().iter().enumerate() {
            let line = || -> GoalResult<LinearRow> {
                Ok(LinearRow {
                    row: r,
                    coeffs: tableau.row_f64(r)?,
                    rhs: row.rhs().to_f64(),
                    tol: if row.is_soft() {
                        f64::INFINITY
                    } else {
                        row.tolerance().to_f64().max(config.feasibility_tolerance)
                    },
                })
            };
            if row.priority() < priority {
                if row.is_locked() {
                    equalities.push(line()?);
                }
                continue;
            }
            if row.priority() > priority {
                continue;
            }
            if row.is_soft() {
                soft.push(line()?);
                continue;
            }
            let kind = match row.sense() {
                GoalSense::Equal if row.rhs().is_zero() => {
                    equalities.push(line()?);
                    continue;
                }
                GoalSense::Equal => TargetKind::Approach,
                sense => {
                    if (sense == GoalSense::Maximize) != row.rhs().is_negative() {
                        TargetKind::Maximize
                    } else {
                        TargetKind::Minimize
                    }
                }
            };
            if target.is_none() {
                target = Some(Target { line: line()?, kind });
            } else if kind == TargetKind::Approach {
                equalities.push(line()?);
            }
        }

        Ok(Self {
            lower,
            upper,
            equalities,
            target,
            soft,
        })
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn clip(&self, x: &mut [f64]) {
        for ((v, l), u) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*l, *u);
        }
    }

    pub fn usage(x: &[f64]) -> f64 {
        x.iter().map(|v| v.abs()).sum()
    }

    /// Smallest total usage anywhere in the box.
    pub fn min_usage(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(&l, &u)| if l <= 0.0 && 0.0 <= u { 0.0 } else { l.abs().min(u.abs()) })
            .sum()
    }
}

/// Which objective a scored search optimizes.
#[derive(Debug, Clone)]
pub(crate) enum Phase {
    /// Push the target.
    Target { target: Target },
    /// Minimize soft deviation plus usage, with extra pinned equalities.
    Settle { pinned: Vec<LinearRow> },
}

/// The best candidate seen so far.
#[derive(Debug, Clone)]
pub(crate) struct Best {
    pub x: Vec<f64>,
    pub score: f64,
    pub usage: f64,
}

/// Scores candidates for one phase and keeps the best.
pub(crate) struct Scorer<'a> {
    problem: &'a PriorityProblem,
    config: &'a SolverConfig,
    phase: Phase,
    best: Option<Best>,
}

impl<'a> Scorer<'a> {
    pub fn new(problem: &'a PriorityProblem, config: &'a SolverConfig, phase: Phase) -> Self {
        Self {
            problem,
            config,
            phase,
            best: None,
        }
    }

    pub fn problem(&self) -> &'a PriorityProblem {
        self.problem
    }

    pub fn config(&self) -> &'a SolverConfig {
        self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn best(&self) -> Option<&Best> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<Best> {
        self.best
    }

    /// Hard equations the elimination strategies aim at in this phase.
    pub fn system(&self) -> Vec<LinearRow> {
        let mut rows = self.problem.equalities.clone();
        match &self.phase {
            Phase::Target { target } if target.kind == TargetKind::Approach => {
                rows.push(target.line.clone());
            }
            Phase::Target { .. } => {}
            Phase::Settle { pinned } => rows.extend(pinned.iter().cloned()),
        }
        rows
    }

    fn hard_rows(&self) -> impl Iterator<Item = &LinearRow> {
        let pinned: &[LinearRow] = match &self.phase {
            Phase::Settle { pinned } => pinned,
            Phase::Target { .. } => &[],
        };
        self.problem.equalities.iter().chain(pinned)
    }

    fn rows_per_candidate(&self) -> u64 {
        let extra = match &self.phase {
            Phase::Target { .. } => 1,
            Phase::Settle { pinned } => pinned.len() + self.problem.soft.len(),
        };
        (self.problem.equalities.len() + extra) as u64
    }

    /// Score of a clipped candidate; `-inf` when a hard row is violated.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        if self.hard_rows().any(|row| row.residual(x) > row.tol) {
            return f64::NEG_INFINITY;
        }
        let usage = PriorityProblem::usage(x);
        match &self.phase {
            Phase::Target { target } => {
                target.signed(target.line.value(x)) - self.config.usage_penalty * usage
            }
            Phase::Settle { .. } => {
                let deviation: f64 = self.problem.soft.iter().map(|row| row.residual(x)).sum();
                -deviation - self.config.usage_weight * usage
            }
        }
    }

    /// Upper bound on any achievable score.
    pub fn ceiling(&self) -> f64 {
        let usage = self.problem.min_usage();
        match &self.phase {
            Phase::Target { target } => {
                target.box_ceiling(&self.problem.lower, &self.problem.upper)
                    - self.config.usage_penalty * usage
            }
            Phase::Settle { .. } => -self.config.usage_weight * usage,
        }
    }

    /// Whether no remaining strategy can beat the incumbent by more than the
    /// improvement tolerance.
    pub fn saturated(&self) -> bool {
        self.best
            .as_ref()
            .is_some_and(|b| b.score >= self.ceiling() - self.config.improvement_tolerance)
    }

    /// Clips, scores and possibly keeps one candidate. Returns whether it
    /// became the new best.
    pub fn offer(&mut self, mut x: Vec<f64>, diagnostics: &mut Diagnostics) -> bool {
        self.problem.clip(&mut x);
        let score = self.evaluate(&x);
        diagnostics.record_candidate();
        diagnostics.record_row_evaluations(self.rows_per_candidate());
        self.consider(x, score)
    }

    /// Scores a batch, in parallel when enabled; the reduction is sequential
    /// in input order so the winner never depends on scheduling.
    pub fn offer_batch(&mut self, mut batch: Vec<Vec<f64>>, diagnostics: &mut Diagnostics) {
        for x in batch.iter_mut() {
            self.problem.clip(x);
        }
        let scores = self.score_all(&batch);
        for _ in &batch {
            diagnostics.record_candidate();
        }
        diagnostics.record_row_evaluations(self.rows_per_candidate() * batch.len() as u64);
        for (x, score) in batch.into_iter().zip(scores) {
            self.consider(x, score);
        }
    }

    #[cfg(feature = "parallel")]
    fn score_all(&self, batch: &[Vec<f64>]) -> Vec<f64> {
        if self.config.parallel {
            batch.par_iter().map(|x| self.evaluate(x)).collect()
        } else {
            batch.iter().map(|x| self.evaluate(x)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn score_all(&self, batch: &[Vec<f64>]) -> Vec<f64> {
        batch.iter().map(|x| self.evaluate(x)).collect()
    }

    fn consider(&mut self, x: Vec<f64>, score: f64) -> bool {
        if score == f64::NEG_INFINITY {
            return false;
        }
        let usage = PriorityProblem::usage(&x);
        let better = match &self.best {
            None => true,
            Some(best) => {
                let margin = 1e-12 * best.score.abs().max(1.0);
                score > best.score + margin
                    || ((score - best.score).abs() <= margin && usage < best.usage - 1e-12)
            }
        };
        if better {
            self.best = Some(Best { x, score, usage });
        }
        better
    }
}
