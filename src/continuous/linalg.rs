//! Small dense linear-algebra kernels for the search strategies.
//!
//! Everything here works on `f64` and signals rank deficiency or
//! inconsistency with `None`; callers treat that as "no candidate".

/// Relative pivot threshold for elimination.
pub(crate) const PIVOT_EPS: f64 = 1e-12;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_abs(a: &[Vec<f64>]) -> f64 {
    a.iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Solves the square system `a · x = b` by Gaussian elimination with
/// partial pivoting.
pub(crate) fn solve_square(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }
    if n == 0 {
        return Some(Vec::new());
    }
    let threshold = PIVOT_EPS * max_abs(&a).max(1.0);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < threshold {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for i in col + 1..n {
            let factor = a[i][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[i][k] -= factor * a[col][k];
            }
            b[i] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|k| a[i][k] * x[k]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Solves a possibly non-square system `a · x = b` by reduction to row
/// echelon form. Non-pivot columns take their value from `free_values`.
///
/// Returns `None` when the system is inconsistent.
pub(crate) fn solve_with_free(a: &[Vec<f64>], b: &[f64], free_values: &[f64]) -> Option<Vec<f64>> {
    let m = a.len();
    let n = free_values.len();
    if b.len() != m || a.iter().any(|row| row.len() != n) {
        return None;
    }
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();
    let threshold = PIVOT_EPS * max_abs(a).max(1.0);

    let mut pivots: Vec<usize> = Vec::new();
    let mut row = 0;
    for col in 0..n {
        if row == m {
            break;
        }
        let Some(p) = (row..m).max_by(|&i, &j| aug[i][col].abs().total_cmp(&aug[j][col].abs()))
        else {
            break;
        };
        if aug[p][col].abs() < threshold {
            continue;
        }
        aug.swap(row, p);
        let lead = aug[row][col];
        for v in aug[row].iter_mut() {
            *v /= lead;
        }
        for i in 0..m {
            if i == row {
                continue;
            }
            let factor = aug[i][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                aug[i][k] -= factor * aug[row][k];
            }
        }
        pivots.push(col);
        row += 1;
    }

    let scale = b.iter().fold(1.0_f64, |s, v| s.max(v.abs()));
    if aug[row..].iter().any(|r| r[n].abs() > 1e-9 * scale) {
        return None;
    }

    let mut x = free_values.to_vec();
    for (k, &pc) in pivots.iter().enumerate() {
        let tail: f64 = (0..n)
            .filter(|j| !pivots.contains(j))
            .map(|j| aug[k][j] * x[j])
            .sum();
        x[pc] = aug[k][n] - tail;
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Minimum-norm correction `d` with `a · d ≈ r`, via the regularized normal
/// equations `(a aᵀ + λI) y = r`, `d = aᵀ y`.
pub(crate) fn min_norm_correction(a: &[Vec<f64>], r: &[f64], lambda: f64) -> Option<Vec<f64>> {
    let m = a.len();
    if m == 0 {
        return None;
    }
    let n = a[0].len();
    let gram: Vec<Vec<f64>> = (0..m)
        .map(|i| {
            (0..m)
                .map(|j| dot(&a[i], &a[j]) + if i == j { lambda } else { 0.0 })
                .collect()
        })
        .collect();
    let y = solve_square(gram, r.to_vec())?;
    Some((0..n).map(|j| (0..m).map(|i| a[i][j] * y[i]).sum()).collect())
}

/// Regularized least squares `min ‖a x − b‖² + λ‖x‖²`.
pub(crate) fn least_squares(a: &[Vec<f64>], b: &[f64], lambda: f64) -> Option<Vec<f64>> {
    let n = a.first()?.len();
    let normal: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    a.iter().map(|row| row[i] * row[j]).sum::<f64>()
                        + if i == j { lambda } else { 0.0 }
                })
                .collect()
        })
        .collect();
    let rhs: Vec<f64> = (0..n)
        .map(|i| a.iter().zip(b).map(|(row, bi)| row[i] * bi).sum())
        .collect();
    solve_square(normal, rhs)
}
