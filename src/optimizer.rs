//! # Optimizer Core
//!
//! $$
//! \min_{\mathbf{x}\ge 0,\ \mathbf{a}^\top\mathbf{x}=1}\ \mathbf{x}^\top\Sigma\,\mathbf{x}
//! $$
//!
//! Dense active-set quadratic programming over the long-only, fully-invested
//! constraint set. Both objectives reduce to one budget-constrained QP:
//! minimum volatility uses the unit budget vector, maximum Sharpe the
//! excess-return budget after the standard scaling change of variables.
//! Deterministic throughout: fixed pivoting, fixed tie-breaking, no
//! randomized restarts.

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::trace;

use crate::error::PortfolioError;
use crate::types::MAX_ACTIVE_SET_ITERS;
use crate::types::RIDGE_REGULARIZATION;
use crate::types::WEIGHT_CLIP_TOLERANCE;

/// Bound-activation threshold for candidate weights and multipliers.
const ACTIVE_SET_TOLERANCE: f64 = 1e-10;

/// Pivot magnitude below which an elimination step counts as singular.
const SINGULAR_PIVOT: f64 = 1e-15;

/// Minimum-volatility weights: minimize `w' S w` over the simplex.
pub fn minimize_volatility(cov: &Array2<f64>) -> Result<Array1<f64>, PortfolioError> {
  let n = check_square(cov)?;
  let budget = Array1::ones(n);
  let x = solve_budget_qp(cov, &budget)?;
  clean_weights(x)
}

/// Maximum-Sharpe weights via the convex reformulation.
///
/// Maximizing `(mu'w - r_f) / sqrt(w' S w)` over the simplex is equivalent
/// to minimizing `y' S y` subject to `(mu - r_f 1)'y = 1`, `y >= 0`, with
/// `w = y / sum(y)`. The reformulation is infeasible when no expected
/// return exceeds the risk-free rate.
pub fn maximize_sharpe(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
) -> Result<Array1<f64>, PortfolioError> {
  let n = check_square(cov)?;
  if mu.len() != n {
    return Err(PortfolioError::InsufficientData {
      detail: format!(
        "expected-return vector has {} entries for a {n}x{n} covariance",
        mu.len()
      ),
    });
  }

  let excess = mu.mapv(|m| m - risk_free);
  if !excess.iter().any(|&e| e > 0.0) {
    return Err(PortfolioError::NoFeasibleSharpeSolution { risk_free });
  }

  let y = solve_budget_qp(cov, &excess)?;
  let total = y.sum();
  if total <= 0.0 {
    return Err(PortfolioError::Optimization {
      iterations: 0,
      residual: total,
      detail: "scaled max-Sharpe solution has non-positive mass".to_string(),
    });
  }

  clean_weights(y / total)
}

/// Zero numerically negligible weights and renormalize to sum exactly 1.
///
/// Magnitudes below [`WEIGHT_CLIP_TOLERANCE`], including the tiny negative
/// values an active-set step can leave behind, round to zero. Negative
/// weights beyond the tolerance are a solver fault and are rejected.
pub fn clean_weights(mut weights: Array1<f64>) -> Result<Array1<f64>, PortfolioError> {
  for w in weights.iter_mut() {
    if w.abs() < WEIGHT_CLIP_TOLERANCE {
      *w = 0.0;
    }
  }

  let worst = weights.iter().copied().fold(f64::INFINITY, f64::min);
  if worst < 0.0 {
    return Err(PortfolioError::Optimization {
      iterations: 0,
      residual: worst,
      detail: "negative weight exceeds the cleaning tolerance".to_string(),
    });
  }

  let total = weights.sum();
  if total <= 0.0 {
    return Err(PortfolioError::Optimization {
      iterations: 0,
      residual: total,
      detail: "all weights vanished during cleaning".to_string(),
    });
  }

  Ok(weights / total)
}

fn check_square(cov: &Array2<f64>) -> Result<usize, PortfolioError> {
  let (rows, cols) = cov.dim();
  if rows == 0 || rows != cols {
    return Err(PortfolioError::InsufficientData {
      detail: format!("covariance matrix must be square and non-empty, got {rows}x{cols}"),
    });
  }
  Ok(rows)
}

/// Active-set solve of `min x' S x` subject to `a'x = 1`, `x >= 0`.
///
/// The equality-constrained subproblem on the free set F has the KKT
/// solution `x_F = S_FF^-1 a_F / (a_F' S_FF^-1 a_F)`. Negative candidates
/// are pinned to zero; pinned bounds with a negative Lagrange multiplier
/// are released one per iteration, most negative first with lowest-index
/// tie-break. A singular subsystem retries once with ridge regularization,
/// which covers collinear assets.
fn solve_budget_qp(
  cov: &Array2<f64>,
  budget: &Array1<f64>,
) -> Result<Array1<f64>, PortfolioError> {
  let n = cov.nrows();
  let mut sigma = cov.clone();
  let mut free: Vec<usize> = (0..n).collect();
  let mut regularized = false;
  let mut last_residual = f64::NAN;

  for iter in 0..MAX_ACTIVE_SET_ITERS {
    let sub = gather_matrix(&sigma, &free);
    let sub_budget = gather_vector(budget, &free);

    let z = match solve_linear_system(sub, &sub_budget) {
      Some(z) => z,
      None => {
        if regularized {
          return Err(PortfolioError::Optimization {
            iterations: iter,
            residual: last_residual,
            detail: "KKT system remained singular after ridge regularization".to_string(),
          });
        }
        regularize(&mut sigma);
        regularized = true;
        trace!(iteration = iter, "singular KKT system, retrying with ridge");
        continue;
      }
    };

    let denom = sub_budget.dot(&z);
    if denom <= SINGULAR_PIVOT {
      if regularized {
        return Err(PortfolioError::Optimization {
          iterations: iter,
          residual: denom,
          detail: "budget direction has no positive curvature support".to_string(),
        });
      }
      regularize(&mut sigma);
      regularized = true;
      continue;
    }

    let candidate = z.mapv(|v| v / denom);

    let pinned: Vec<usize> = free
      .iter()
      .enumerate()
      .filter(|(k, _)| candidate[*k] < -ACTIVE_SET_TOLERANCE)
      .map(|(_, &i)| i)
      .collect();
    if !pinned.is_empty() {
      last_residual = candidate.iter().cloned().fold(f64::INFINITY, f64::min);
      free.retain(|i| !pinned.contains(i));
      if free.is_empty() {
        return Err(PortfolioError::Optimization {
          iterations: iter,
          residual: last_residual,
          detail: "every weight was driven to its lower bound".to_string(),
        });
      }
      trace!(iteration = iter, pinned = pinned.len(), "pinned negative weights");
      continue;
    }

    let mut full = Array1::zeros(n);
    for (k, &i) in free.iter().enumerate() {
      full[i] = candidate[k].max(0.0);
    }

    // KKT stationarity: nu = 2 S x - lambda a must be non-negative on the
    // pinned set for the vertex to be optimal.
    let lambda = 2.0 / denom;
    let gradient = sigma.dot(&full) * 2.0;
    let mut release: Option<(usize, f64)> = None;
    for i in 0..n {
      if free.contains(&i) {
        continue;
      }
      let multiplier = gradient[i] - lambda * budget[i];
      if multiplier < -ACTIVE_SET_TOLERANCE {
        let better = release.map_or(true, |(_, best)| multiplier < best);
        if better {
          release = Some((i, multiplier));
        }
      }
    }

    if let Some((index, multiplier)) = release {
      last_residual = multiplier;
      let pos = free.partition_point(|&j| j < index);
      free.insert(pos, index);
      trace!(iteration = iter, index, multiplier, "released pinned bound");
      continue;
    }

    debug!(iterations = iter + 1, free = free.len(), "active-set converged");
    return Ok(full);
  }

  Err(PortfolioError::Optimization {
    iterations: MAX_ACTIVE_SET_ITERS,
    residual: last_residual,
    detail: "active-set iteration budget exhausted".to_string(),
  })
}

fn gather_matrix(sigma: &Array2<f64>, idx: &[usize]) -> Array2<f64> {
  let k = idx.len();
  let mut out = Array2::zeros((k, k));
  for (r, &i) in idx.iter().enumerate() {
    for (c, &j) in idx.iter().enumerate() {
      out[[r, c]] = sigma[[i, j]];
    }
  }
  out
}

fn gather_vector(v: &Array1<f64>, idx: &[usize]) -> Array1<f64> {
  idx.iter().map(|&i| v[i]).collect()
}

fn regularize(sigma: &mut Array2<f64>) {
  for i in 0..sigma.nrows() {
    sigma[[i, i]] += RIDGE_REGULARIZATION;
  }
}

/// Gauss-Jordan solve of `A x = b` with partial pivoting.
fn solve_linear_system(mut a: Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
  let n = a.nrows();
  let mut x = b.clone();

  for col in 0..n {
    let mut max_row = col;
    let mut max_val = a[[col, col]].abs();
    for row in (col + 1)..n {
      if a[[row, col]].abs() > max_val {
        max_val = a[[row, col]].abs();
        max_row = row;
      }
    }

    if max_val < SINGULAR_PIVOT {
      return None;
    }

    if max_row != col {
      for j in 0..n {
        let tmp = a[[col, j]];
        a[[col, j]] = a[[max_row, j]];
        a[[max_row, j]] = tmp;
      }
      x.swap(col, max_row);
    }

    let pivot = a[[col, col]];
    for j in col..n {
      a[[col, j]] /= pivot;
    }
    x[col] /= pivot;

    for row in 0..n {
      if row == col {
        continue;
      }
      let factor = a[[row, col]];
      if factor == 0.0 {
        continue;
      }
      for j in col..n {
        a[[row, j]] -= factor * a[[col, j]];
      }
      x[row] -= factor * x[col];
    }
  }

  Some(x)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn min_volatility_matches_closed_form_for_uncorrelated_assets() {
    // Two uncorrelated assets: w_i proportional to 1/sigma_i^2.
    let cov = array![[0.04, 0.0], [0.0, 0.01]];
    let w = minimize_volatility(&cov).unwrap();

    assert_relative_eq!(w[0], 0.2, max_relative = 1e-9);
    assert_relative_eq!(w[1], 0.8, max_relative = 1e-9);
  }

  #[test]
  fn min_volatility_weights_sum_to_one() {
    let cov = array![
      [0.04, 0.01, 0.0],
      [0.01, 0.09, 0.02],
      [0.0, 0.02, 0.16]
    ];
    let w = minimize_volatility(&cov).unwrap();

    let sum: f64 = w.sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(w.iter().all(|&wi| wi >= 0.0));
  }

  #[test]
  fn min_volatility_single_asset_gets_full_weight() {
    let cov = array![[0.09]];
    let w = minimize_volatility(&cov).unwrap();

    assert_eq!(w.len(), 1);
    assert_relative_eq!(w[0], 1.0, max_relative = 1e-12);
  }

  #[test]
  fn min_volatility_handles_collinear_assets() {
    // Rank-one covariance is singular; the ridge retry must still solve.
    let cov = array![[0.04, 0.04], [0.04, 0.04]];
    let w = minimize_volatility(&cov).unwrap();

    let sum: f64 = w.sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert_relative_eq!(w[0], 0.5, max_relative = 1e-6);
    assert_relative_eq!(w[1], 0.5, max_relative = 1e-6);
  }

  #[test]
  fn max_sharpe_matches_closed_form_for_uncorrelated_assets() {
    // Tangency portfolio: w proportional to S^-1 (mu - r_f).
    let mu = array![0.10, 0.14];
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let w = maximize_sharpe(&mu, &cov, 0.02).unwrap();

    assert_relative_eq!(w[0], 0.6, max_relative = 1e-9);
    assert_relative_eq!(w[1], 0.4, max_relative = 1e-9);
  }

  #[test]
  fn max_sharpe_pins_assets_below_the_risk_free_rate() {
    let mu = array![0.12, 0.01];
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    let w = maximize_sharpe(&mu, &cov, 0.02).unwrap();

    assert_relative_eq!(w[0], 1.0, max_relative = 1e-9);
    assert_eq!(w[1], 0.0);
  }

  #[test]
  fn max_sharpe_requires_an_asset_above_the_risk_free_rate() {
    let mu = array![0.010, 0.015];
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    let err = maximize_sharpe(&mu, &cov, 0.02).unwrap_err();

    assert!(matches!(
      err,
      PortfolioError::NoFeasibleSharpeSolution { .. }
    ));
  }

  #[test]
  fn optimizers_are_deterministic() {
    let mu = array![0.08, 0.1, 0.12];
    let cov = array![
      [0.04, 0.01, 0.0],
      [0.01, 0.09, 0.02],
      [0.0, 0.02, 0.16]
    ];

    let a = maximize_sharpe(&mu, &cov, 0.02).unwrap();
    let b = maximize_sharpe(&mu, &cov, 0.02).unwrap();
    assert_eq!(a, b);

    let c = minimize_volatility(&cov).unwrap();
    let d = minimize_volatility(&cov).unwrap();
    assert_eq!(c, d);
  }

  #[test]
  fn clean_weights_zeroes_numerical_noise() {
    let w = clean_weights(array![0.6, 0.4, -1e-9, 5e-7]).unwrap();

    assert_eq!(w[2], 0.0);
    assert_eq!(w[3], 0.0);
    let sum: f64 = w.sum();
    assert!((sum - 1.0).abs() < 1e-12);
    assert_relative_eq!(w[0], 0.6, max_relative = 1e-9);
  }

  #[test]
  fn clean_weights_rejects_vanishing_mass() {
    let err = clean_weights(array![1e-9, -1e-8]).unwrap_err();
    assert!(matches!(err, PortfolioError::Optimization { .. }));
  }

  #[test]
  fn clean_weights_rejects_large_negative_weights() {
    let err = clean_weights(array![1.1, -0.1]).unwrap_err();
    assert!(matches!(err, PortfolioError::Optimization { .. }));
  }

  #[test]
  fn mismatched_dimensions_are_rejected() {
    let mu = array![0.1, 0.1, 0.1];
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    let err = maximize_sharpe(&mu, &cov, 0.02).unwrap_err();

    assert!(matches!(err, PortfolioError::InsufficientData { .. }));
  }
}
