//! # Errors
//!
//! $$
//! \text{fail fast:}\quad \mathcal{E}\to\text{caller}
//! $$
//!
//! Typed failure taxonomy of the portfolio core. Every error is surfaced
//! immediately to the caller; the core never retries internally and never
//! substitutes a default for an undefined quantity.

use thiserror::Error;

/// Errors produced by estimation, optimization and performance evaluation.
#[derive(Debug, Error)]
pub enum PortfolioError {
  /// Return series too short, misaligned or containing non-finite values.
  #[error("insufficient data: {detail}")]
  InsufficientData {
    /// Description of the violated input invariant.
    detail: String,
  },

  /// No asset's expected return exceeds the risk-free rate, so the
  /// max-Sharpe variable change has no feasible point. The caller may
  /// lower the risk-free rate or fall back to minimum volatility.
  #[error("no feasible max-Sharpe solution: no expected return exceeds the risk-free rate {risk_free}")]
  NoFeasibleSharpeSolution {
    /// Risk-free rate the expected returns were tested against.
    risk_free: f64,
  },

  /// The QP solver found no feasible point or exhausted its iteration
  /// budget.
  #[error("optimization failed after {iterations} iterations (residual {residual:.3e}): {detail}")]
  Optimization {
    /// Active-set iterations performed before giving up.
    iterations: usize,
    /// Residual of the violated feasibility or optimality condition.
    residual: f64,
    /// Solver diagnostic.
    detail: String,
  },

  /// A zero-volatility portfolio makes the Sharpe ratio undefined.
  #[error("degenerate volatility: Sharpe ratio is undefined for a zero-volatility portfolio")]
  DegenerateVolatility,
}
