//! # Performance Analysis
//!
//! $$
//! S=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Realized portfolio performance, cumulative growth factors and simplified
//! scenario stress testing.

use std::collections::BTreeMap;

use ndarray::Array1;
use tracing::debug;

use crate::data::ReturnTable;
use crate::error::PortfolioError;
use crate::types::DEGENERATE_VOL_EPS;
use crate::types::PerformanceMetrics;
use crate::types::STRESS_VOL_MULTIPLIER;
use crate::types::WeightVector;

/// Scenario key under which the unshocked metrics are always reported.
pub const BASE_CASE: &str = "Base Case";

/// Per-period portfolio returns: each table row dotted with the weights.
///
/// Weights align by ticker; assets in the table but outside the weight
/// universe contribute with weight zero.
pub fn portfolio_returns(weights: &WeightVector, table: &ReturnTable) -> Array1<f64> {
  let aligned: Array1<f64> = table.tickers().iter().map(|t| weights.weight(t)).collect();
  table.returns().dot(&aligned)
}

/// Annualized return, volatility and Sharpe ratio of `weights` on `table`.
pub fn evaluate(
  weights: &WeightVector,
  table: &ReturnTable,
  risk_free: f64,
  periods_per_year: u32,
) -> Result<PerformanceMetrics, PortfolioError> {
  let series = portfolio_returns(weights, table);
  let mean = series.mean().ok_or_else(|| PortfolioError::InsufficientData {
    detail: "empty portfolio return series".to_string(),
  })?;

  let scale = f64::from(periods_per_year);
  let annualized_return = mean * scale;
  let annualized_volatility = series.std(1.0) * scale.sqrt();

  if annualized_volatility < DEGENERATE_VOL_EPS {
    return Err(PortfolioError::DegenerateVolatility);
  }

  Ok(PerformanceMetrics {
    annualized_return,
    annualized_volatility,
    sharpe_ratio: (annualized_return - risk_free) / annualized_volatility,
  })
}

/// Cumulative growth factors: the running product of `1 + r_t`.
///
/// Pure and restartable; recomputation on identical inputs yields an
/// identical sequence, aligned with the table's period index.
pub fn cumulative_returns(weights: &WeightVector, table: &ReturnTable) -> Array1<f64> {
  let series = portfolio_returns(weights, table);
  let mut growth = 1.0;
  series.mapv(|r| {
    growth *= 1.0 + r;
    growth
  })
}

/// Metrics under named multiplicative shocks, always including
/// [`BASE_CASE`].
///
/// Shocked return is `base * (1 + factor)`; shocked volatility is the base
/// volatility times [`STRESS_VOL_MULTIPLIER`] for adverse (negative)
/// shocks, unchanged otherwise. This is a linear shock on annualized
/// metrics that assumes the correlation structure holds, not a replay of
/// historical crisis periods.
pub fn stress_test(
  weights: &WeightVector,
  table: &ReturnTable,
  risk_free: f64,
  periods_per_year: u32,
  scenarios: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, PerformanceMetrics>, PortfolioError> {
  let base = evaluate(weights, table, risk_free, periods_per_year)?;
  let mut results = BTreeMap::new();
  results.insert(BASE_CASE.to_string(), base);

  for (name, &factor) in scenarios {
    let annualized_return = base.annualized_return * (1.0 + factor);
    let annualized_volatility = base.annualized_volatility
      * if factor < 0.0 { STRESS_VOL_MULTIPLIER } else { 1.0 };

    if annualized_volatility < DEGENERATE_VOL_EPS {
      return Err(PortfolioError::DegenerateVolatility);
    }

    results.insert(
      name.clone(),
      PerformanceMetrics {
        annualized_return,
        annualized_volatility,
        sharpe_ratio: (annualized_return - risk_free) / annualized_volatility,
      },
    );
  }

  debug!(scenarios = results.len(), "stress test complete");
  Ok(results)
}
