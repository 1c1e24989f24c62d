//! # Market Data Tables
//!
//! $$
//! r_t=\frac{p_t}{p_{t-1}}-1
//! $$
//!
//! Validated price and return tables over a canonical (sorted) asset
//! ordering, plus a seeded synthetic price generator for reproducible
//! verification runs. Gaps must be filled or dropped upstream; non-finite
//! values are rejected at construction.

use std::collections::BTreeMap;

use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::PortfolioError;

/// Minimum return observations per asset for the estimator to be defined.
///
/// This is the hard invariant; covariance estimates only become meaningful
/// from roughly 30 observations upward.
pub const MIN_RETURN_OBSERVATIONS: usize = 2;

/// Mean of the synthetic per-period returns.
const SYNTHETIC_RETURN_MEAN: f64 = 5e-4;
/// Standard deviation of the synthetic per-period returns.
const SYNTHETIC_RETURN_STD: f64 = 1e-2;
/// Initial level of every synthetic price series.
const SYNTHETIC_START_PRICE: f64 = 100.0;

fn columns_from_series(
  series: &BTreeMap<String, Vec<f64>>,
  min_rows: usize,
) -> Result<(Vec<String>, Array2<f64>), PortfolioError> {
  let Some(n_rows) = series.values().next().map(Vec::len) else {
    return Err(PortfolioError::InsufficientData {
      detail: "empty asset universe".to_string(),
    });
  };

  if n_rows < min_rows {
    return Err(PortfolioError::InsufficientData {
      detail: format!("need at least {min_rows} aligned observations, got {n_rows}"),
    });
  }

  for (ticker, xs) in series {
    if xs.len() != n_rows {
      return Err(PortfolioError::InsufficientData {
        detail: format!(
          "series for '{ticker}' has {} observations, expected {n_rows}",
          xs.len()
        ),
      });
    }

    for (row, &x) in xs.iter().enumerate() {
      if !x.is_finite() {
        return Err(PortfolioError::InsufficientData {
          detail: format!("non-finite value for '{ticker}' at period {row}; fill gaps upstream"),
        });
      }
    }
  }

  let tickers: Vec<String> = series.keys().cloned().collect();
  let mut data = Array2::zeros((n_rows, tickers.len()));
  for (col, xs) in series.values().enumerate() {
    for (row, &x) in xs.iter().enumerate() {
      data[[row, col]] = x;
    }
  }

  Ok((tickers, data))
}

/// Adjusted close prices, one column per asset, rows aligned on time.
#[derive(Clone, Debug)]
pub struct PriceTable {
  tickers: Vec<String>,
  prices: Array2<f64>,
}

impl PriceTable {
  /// Build from per-asset price series keyed by ticker.
  ///
  /// Rejects an empty universe, misaligned or too-short series, and
  /// non-finite or non-positive prices.
  pub fn new(series: &BTreeMap<String, Vec<f64>>) -> Result<Self, PortfolioError> {
    let (tickers, prices) = columns_from_series(series, MIN_RETURN_OBSERVATIONS + 1)?;

    for ((row, col), &p) in prices.indexed_iter() {
      if p <= 0.0 {
        return Err(PortfolioError::InsufficientData {
          detail: format!("non-positive price {p} for '{}' at period {row}", tickers[col]),
        });
      }
    }

    Ok(Self { tickers, prices })
  }

  /// Asset identifiers in canonical order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Price matrix, periods by assets.
  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of periods.
  pub fn n_periods(&self) -> usize {
    self.prices.nrows()
  }

  /// Number of assets.
  pub fn n_assets(&self) -> usize {
    self.prices.ncols()
  }
}

/// Aligned per-period simple returns, one column per asset.
#[derive(Clone, Debug)]
pub struct ReturnTable {
  tickers: Vec<String>,
  returns: Array2<f64>,
}

impl ReturnTable {
  /// Build from per-asset return series keyed by ticker.
  pub fn new(series: &BTreeMap<String, Vec<f64>>) -> Result<Self, PortfolioError> {
    let (tickers, returns) = columns_from_series(series, MIN_RETURN_OBSERVATIONS)?;
    Ok(Self { tickers, returns })
  }

  /// Derive simple per-period returns `p[t]/p[t-1] - 1` from prices.
  ///
  /// Infallible: [`PriceTable`] invariants already guarantee enough rows
  /// and strictly positive, finite prices.
  pub fn from_prices(prices: &PriceTable) -> Self {
    let raw = prices.prices();
    let mut returns = Array2::zeros((raw.nrows() - 1, raw.ncols()));
    for col in 0..raw.ncols() {
      for row in 1..raw.nrows() {
        returns[[row - 1, col]] = raw[[row, col]] / raw[[row - 1, col]] - 1.0;
      }
    }

    Self {
      tickers: prices.tickers().to_vec(),
      returns,
    }
  }

  /// Asset identifiers in canonical order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Return matrix, periods by assets.
  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  /// Number of periods.
  pub fn n_periods(&self) -> usize {
    self.returns.nrows()
  }

  /// Number of assets.
  pub fn n_assets(&self) -> usize {
    self.returns.ncols()
  }
}

/// Generate a reproducible synthetic price table.
///
/// Period returns are i.i.d. normal draws (mean 5e-4, std 1e-2) cumulated
/// from a price level of 100. The seed is an explicit parameter so callers
/// never depend on process-wide random state.
///
/// # Panics
///
/// Panics if the requested universe violates the price table invariants
/// (no assets, or fewer than 3 periods).
pub fn synthetic_prices(n_assets: usize, n_periods: usize, seed: u64) -> PriceTable {
  let mut rng = StdRng::seed_from_u64(seed);
  let dist = Normal::new(SYNTHETIC_RETURN_MEAN, SYNTHETIC_RETURN_STD)
    .expect("synthetic return distribution parameters are valid");
  let shocks = Array2::random_using((n_periods, n_assets), dist, &mut rng);

  let mut series = BTreeMap::new();
  for (idx, column) in shocks.columns().into_iter().enumerate() {
    let mut level = SYNTHETIC_START_PRICE;
    let prices: Vec<f64> = column
      .iter()
      .map(|&r| {
        level *= 1.0 + r;
        level
      })
      .collect();
    series.insert(format!("ASSET_{}", idx + 1), prices);
  }

  PriceTable::new(&series).expect("synthetic series satisfy price table invariants")
}
