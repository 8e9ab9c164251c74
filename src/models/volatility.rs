use crate::market::types::PriceSeries;
use serde::Serialize;

/// Trading days per year for annualizing daily returns.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// EWMA decay factor (RiskMetrics daily lambda)
const EWMA_LAMBDA: f64 = 0.94;

/// Default lookback for close-to-close volatility, in returns.
pub const DEFAULT_WINDOW: usize = 30;

/// Volatility estimates derived from daily closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolatilityEstimate {
    /// Annualized sample stdev of the last `window` log returns
    pub historical: f64,
    /// Annualized EWMA volatility over the whole series
    pub ewma: f64,
    pub window: usize,
    pub sample_count: usize,
}

/// Daily log returns, skipping non-positive or non-finite closes.
fn log_returns(closes: &[f64]) -> Vec<f64> {
    let valid: Vec<f64> = closes
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();

    valid
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite())
        .collect()
}

/// Annualized close-to-close volatility over the last `window` returns.
/// None with fewer than two usable returns.
pub fn historical_volatility(closes: &[f64], window: usize) -> Option<f64> {
    let returns = log_returns(closes);
    let var = variance_of_last(&returns, window)?;
    Some((var * TRADING_DAYS_PER_YEAR).sqrt())
}

/// Annualized EWMA volatility, seeded with the first squared return.
pub fn ewma_volatility(closes: &[f64]) -> Option<f64> {
    let returns = log_returns(closes);
    let (first, rest) = returns.split_first()?;

    let mut var = first * first;
    for r in rest {
        var = EWMA_LAMBDA * var + (1.0 - EWMA_LAMBDA) * r * r;
    }
    Some((var * TRADING_DAYS_PER_YEAR).sqrt())
}

pub fn estimate(series: &PriceSeries, window: usize) -> Option<VolatilityEstimate> {
    let historical = historical_volatility(&series.closes, window)?;
    let ewma = ewma_volatility(&series.closes).unwrap_or(historical);
    let sample_count = log_returns(&series.closes).len();

    tracing::debug!(
        symbol = %series.symbol,
        historical = historical,
        ewma = ewma,
        samples = sample_count,
        "volatility estimated"
    );

    Some(VolatilityEstimate {
        historical,
        ewma,
        window,
        sample_count,
    })
}

/// Sample variance of the last `window` elements. None below two samples.
fn variance_of_last(data: &[f64], window: usize) -> Option<f64> {
    let n = data.len().min(window);
    if n < 2 {
        return None;
    }

    let tail = &data[data.len() - n..];
    let nf = n as f64;
    let mean = tail.iter().sum::<f64>() / nf;
    let var_sum: f64 = tail.iter().map(|r| (r - mean) * (r - mean)).sum();

    Some(var_sum / (nf - 1.0))
}
