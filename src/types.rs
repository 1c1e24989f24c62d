//! # Portfolio Types
//!
//! $$
//! \mathbf{w}\in[0,1]^n,\qquad \mathbf{1}^\top\mathbf{w}=1
//! $$
//!
//! Shared result containers and the fixed numeric constants of the core.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;

/// Trading periods per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Weights with magnitude below this are zeroed during cleaning; the weight
/// sum is considered unit within the same tolerance.
pub const WEIGHT_CLIP_TOLERANCE: f64 = 1e-6;

/// Ridge added to the covariance diagonal when the KKT system is singular.
pub const RIDGE_REGULARIZATION: f64 = 1e-8;

/// Active-set iteration budget of the QP solver.
pub const MAX_ACTIVE_SET_ITERS: usize = 1000;

/// Volatility multiplier applied under adverse (negative) shocks.
///
/// A fixed modeling simplification, not a quantity estimated from crisis
/// data: adverse scenarios scale volatility by 1.5, benign scenarios leave
/// it unchanged.
pub const STRESS_VOL_MULTIPLIER: f64 = 1.5;

/// Annualized volatility below this is treated as degenerate.
pub const DEGENERATE_VOL_EPS: f64 = 1e-12;

/// Long-only portfolio weights over a fixed canonical asset ordering.
#[derive(Clone, Debug)]
pub struct WeightVector {
  tickers: Vec<String>,
  weights: Array1<f64>,
}

impl WeightVector {
  pub(crate) fn new(tickers: Vec<String>, weights: Array1<f64>) -> Self {
    debug_assert_eq!(tickers.len(), weights.len());
    Self { tickers, weights }
  }

  /// Equal-weight allocation over `tickers`, the classic baseline.
  pub fn equal(tickers: &[String]) -> Self {
    let n = tickers.len();
    let w = if n == 0 { 0.0 } else { 1.0 / n as f64 };
    Self {
      tickers: tickers.to_vec(),
      weights: Array1::from_elem(n, w),
    }
  }

  /// Build from a ticker-keyed map; ordering follows the sorted keys.
  pub fn from_map(weights: &BTreeMap<String, f64>) -> Self {
    Self {
      tickers: weights.keys().cloned().collect(),
      weights: weights.values().copied().collect(),
    }
  }

  /// Asset identifiers in canonical order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Weights aligned with [`WeightVector::tickers`].
  pub fn values(&self) -> &Array1<f64> {
    &self.weights
  }

  /// Weight of `ticker`; assets outside the universe carry weight zero.
  pub fn weight(&self, ticker: &str) -> f64 {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.weights[i])
      .unwrap_or(0.0)
  }

  /// Weights as a ticker-keyed map for reporting consumers.
  pub fn to_map(&self) -> BTreeMap<String, f64> {
    self
      .tickers
      .iter()
      .cloned()
      .zip(self.weights.iter().copied())
      .collect()
  }

  /// Number of assets in the universe.
  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  /// True when the universe is empty.
  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }
}

/// Annualized performance summary of a portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceMetrics {
  /// Mean period return scaled by periods per year.
  pub annualized_return: f64,
  /// Period return standard deviation scaled by the square root of
  /// periods per year.
  pub annualized_volatility: f64,
  /// `(annualized_return - risk_free) / annualized_volatility`.
  pub sharpe_ratio: f64,
}

impl fmt::Display for PerformanceMetrics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Annualized Return: {:.4}, Annualized Volatility: {:.4}, Sharpe Ratio: {:.4}",
      self.annualized_return, self.annualized_volatility, self.sharpe_ratio
    )
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[test]
  fn equal_weights_split_evenly() {
    let tickers = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
    let w = WeightVector::equal(&tickers);

    assert_eq!(w.len(), 3);
    let sum: f64 = w.values().sum();
    assert!((sum - 1.0).abs() < 1e-12);
    for t in w.tickers() {
      assert!((w.weight(t) - 1.0 / 3.0).abs() < 1e-12);
    }
  }

  #[test]
  fn unknown_ticker_has_zero_weight() {
    let mut map = BTreeMap::new();
    map.insert("AAA".to_string(), 0.7);
    map.insert("BBB".to_string(), 0.3);
    let w = WeightVector::from_map(&map);

    assert_eq!(w.weight("ZZZ"), 0.0);
    assert!((w.weight("AAA") - 0.7).abs() < 1e-12);
  }

  #[test]
  fn map_round_trip_preserves_entries() {
    let mut map = BTreeMap::new();
    map.insert("BBB".to_string(), 0.4);
    map.insert("AAA".to_string(), 0.6);
    let w = WeightVector::from_map(&map);

    assert_eq!(w.tickers(), ["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(w.to_map(), map);
  }

  #[test]
  fn metrics_display_uses_report_labels() {
    let m = PerformanceMetrics {
      annualized_return: 0.12,
      annualized_volatility: 0.2,
      sharpe_ratio: 0.5,
    };
    let text = m.to_string();

    assert!(text.contains("Annualized Return"));
    assert!(text.contains("Annualized Volatility"));
    assert!(text.contains("Sharpe Ratio"));
  }
}
