//! # Statistics Estimator
//!
//! $$
//! \hat\mu=\bar{\mathbf{r}}\,P,\qquad \hat\Sigma=\operatorname{Cov}(\mathbf{r})\,P
//! $$
//!
//! Annualized expected-return vector and unbiased sample covariance matrix
//! from a historical return table. Pure functions of their input; repeated
//! calls on the same table are bit-identical.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use crate::data::ReturnTable;
use crate::error::PortfolioError;

/// Estimate annualized mean returns and sample covariance.
///
/// The arithmetic mean of each asset's period returns is scaled by
/// `periods_per_year`; the unbiased (N-1) covariance of the period-return
/// columns is scaled by the same factor under the i.i.d.-period assumption.
pub fn estimate(
  table: &ReturnTable,
  periods_per_year: u32,
) -> Result<(Array1<f64>, Array2<f64>), PortfolioError> {
  let scale = f64::from(periods_per_year);

  let mu = table
    .returns()
    .mean_axis(Axis(0))
    .ok_or_else(|| PortfolioError::InsufficientData {
      detail: "return table has no observations".to_string(),
    })?
    * scale;

  // `cov` expects variables per row, observations per column.
  let cov = table
    .returns()
    .t()
    .cov(1.0)
    .map_err(|e| PortfolioError::InsufficientData {
      detail: format!("covariance estimation failed: {e}"),
    })?
    * scale;

  debug!(
    assets = table.n_assets(),
    periods = table.n_periods(),
    "estimated annualized moments"
  );

  Ok((mu, cov))
}
