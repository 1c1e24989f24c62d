//! # Portfolio Engine
//!
//! $$
//! (\hat\mu,\hat\Sigma)\ \text{cached}\ \Rightarrow\ \mathbf{w}^\*,\ \text{metrics}
//! $$
//!
//! Facade tying estimation, optimization and evaluation together.
//! Statistics are computed eagerly at construction and cached immutably;
//! new price data means constructing a new engine.

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::analysis::evaluate;
use crate::data::PriceTable;
use crate::data::ReturnTable;
use crate::error::PortfolioError;
use crate::estimator::estimate;
use crate::optimizer::maximize_sharpe;
use crate::optimizer::minimize_volatility;
use crate::types::PerformanceMetrics;
use crate::types::TRADING_DAYS_PER_YEAR;
use crate::types::WeightVector;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Copy, Debug)]
pub struct PortfolioConfig {
  /// Risk-free rate used by the Sharpe objective and all Sharpe ratios.
  pub risk_free: f64,
  /// Annualization factor.
  pub periods_per_year: u32,
}

impl Default for PortfolioConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.02,
      periods_per_year: TRADING_DAYS_PER_YEAR,
    }
  }
}

/// Single entry point over estimator, optimizer and evaluator.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioConfig,
  table: ReturnTable,
  mu: Array1<f64>,
  cov: Array2<f64>,
}

impl PortfolioEngine {
  /// Build an engine over a return table, eagerly estimating `(mu, sigma)`.
  pub fn new(table: ReturnTable, config: PortfolioConfig) -> Result<Self, PortfolioError> {
    let (mu, cov) = estimate(&table, config.periods_per_year)?;
    debug!(
      assets = table.n_assets(),
      periods = table.n_periods(),
      "portfolio engine ready"
    );

    Ok(Self {
      config,
      table,
      mu,
      cov,
    })
  }

  /// Build an engine from adjusted close prices.
  pub fn from_prices(prices: &PriceTable, config: PortfolioConfig) -> Result<Self, PortfolioError> {
    Self::new(ReturnTable::from_prices(prices), config)
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioConfig {
    &self.config
  }

  /// Underlying return table.
  pub fn table(&self) -> &ReturnTable {
    &self.table
  }

  /// Cached annualized expected returns in canonical asset order.
  pub fn expected_returns(&self) -> &Array1<f64> {
    &self.mu
  }

  /// Cached annualized covariance matrix.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.cov
  }

  /// Max-Sharpe weights and their realized performance.
  pub fn optimize_max_sharpe(&self) -> Result<(WeightVector, PerformanceMetrics), PortfolioError> {
    let raw = maximize_sharpe(&self.mu, &self.cov, self.config.risk_free)?;
    self.finish(raw, "max-sharpe")
  }

  /// Minimum-volatility weights and their realized performance.
  pub fn optimize_min_volatility(
    &self,
  ) -> Result<(WeightVector, PerformanceMetrics), PortfolioError> {
    let raw = minimize_volatility(&self.cov)?;
    self.finish(raw, "min-volatility")
  }

  fn finish(
    &self,
    raw: Array1<f64>,
    objective: &str,
  ) -> Result<(WeightVector, PerformanceMetrics), PortfolioError> {
    let weights = WeightVector::new(self.table.tickers().to_vec(), raw);
    let metrics = evaluate(
      &weights,
      &self.table,
      self.config.risk_free,
      self.config.periods_per_year,
    )?;
    debug!(objective, sharpe = metrics.sharpe_ratio, "optimization complete");

    Ok((weights, metrics))
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use tracing_test::traced_test;

  use super::*;
  use crate::analysis::BASE_CASE;
  use crate::analysis::stress_test;
  use crate::data::synthetic_prices;
  use crate::types::STRESS_VOL_MULTIPLIER;

  fn seeded_engine() -> PortfolioEngine {
    let prices = synthetic_prices(5, 500, 42);
    PortfolioEngine::from_prices(&prices, PortfolioConfig::default()).unwrap()
  }

  fn baseline_metrics(engine: &PortfolioEngine) -> PerformanceMetrics {
    let baseline = WeightVector::equal(engine.table().tickers());
    evaluate(
      &baseline,
      engine.table(),
      engine.config().risk_free,
      engine.config().periods_per_year,
    )
    .unwrap()
  }

  #[test]
  fn max_sharpe_beats_the_equal_weight_baseline() {
    let engine = seeded_engine();
    let (weights, metrics) = engine.optimize_max_sharpe().unwrap();

    let sum: f64 = weights.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(weights.values().iter().all(|&w| w >= 0.0));
    assert!(metrics.sharpe_ratio >= baseline_metrics(&engine).sharpe_ratio);
  }

  #[test]
  fn min_volatility_beats_the_equal_weight_baseline() {
    let engine = seeded_engine();
    let (weights, metrics) = engine.optimize_min_volatility().unwrap();

    let sum: f64 = weights.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(metrics.annualized_volatility <= baseline_metrics(&engine).annualized_volatility);
  }

  #[test]
  fn cached_statistics_and_results_are_deterministic() {
    let a = seeded_engine();
    let b = seeded_engine();

    assert_eq!(a.expected_returns(), b.expected_returns());
    assert_eq!(a.covariance(), b.covariance());

    let (wa, ma) = a.optimize_max_sharpe().unwrap();
    let (wb, mb) = b.optimize_max_sharpe().unwrap();
    assert_eq!(wa.values(), wb.values());
    assert_eq!(ma, mb);
  }

  #[traced_test]
  #[test]
  fn engine_output_feeds_the_stress_test() {
    let engine = seeded_engine();
    let (weights, _) = engine.optimize_max_sharpe().unwrap();

    let mut scenarios = BTreeMap::new();
    scenarios.insert("Crash".to_string(), -0.20);
    let results = stress_test(
      &weights,
      engine.table(),
      engine.config().risk_free,
      engine.config().periods_per_year,
      &scenarios,
    )
    .unwrap();

    assert!(results.contains_key(BASE_CASE));
    let base = &results[BASE_CASE];
    let crash = &results["Crash"];
    assert!(
      (crash.annualized_volatility - base.annualized_volatility * STRESS_VOL_MULTIPLIER).abs()
        < 1e-12
    );
  }
}
