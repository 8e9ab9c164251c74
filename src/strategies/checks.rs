//! Data-quality checks for a single contract.
//! Each returns the warning text when the check trips. Warnings never block an analysis.

use crate::config::AnalyzerThresholds;
use crate::market::calendar;
use crate::market::types::OptionContract;
use chrono::NaiveDate;

pub fn missing_bid(contract: &OptionContract) -> Option<String> {
    (!contract.has_bid()).then(|| {
        format!(
            "No bid for ${:.2} {}: contract may not be tradable",
            contract.strike, contract.option_type
        )
    })
}

pub fn low_premium(premium: f64, thresholds: &AnalyzerThresholds) -> Option<String> {
    (premium < thresholds.min_bid_price).then(|| {
        format!(
            "Low premium: ${premium:.2} is below the ${:.2} minimum",
            thresholds.min_bid_price
        )
    })
}

pub fn low_open_interest(contract: &OptionContract, thresholds: &AnalyzerThresholds) -> Option<String> {
    (contract.open_interest < thresholds.min_open_interest).then(|| {
        format!(
            "Low open interest: {} contracts (minimum {})",
            contract.open_interest, thresholds.min_open_interest
        )
    })
}

pub fn wide_spread(contract: &OptionContract, thresholds: &AnalyzerThresholds) -> Option<String> {
    let pct = contract.spread_pct()?;
    (pct > thresholds.max_bid_ask_spread_pct).then(|| {
        format!(
            "Wide bid-ask spread: {pct:.1}% of mid (maximum {:.1}%)",
            thresholds.max_bid_ask_spread_pct
        )
    })
}

/// Liquidity checks in reporting order.
pub fn liquidity(contract: &OptionContract, premium: f64, thresholds: &AnalyzerThresholds) -> Vec<String> {
    [
        missing_bid(contract),
        low_premium(premium, thresholds),
        low_open_interest(contract, thresholds),
        wide_spread(contract, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn earnings_in_window(
    earnings_dates: &[NaiveDate],
    as_of: NaiveDate,
    expiration: NaiveDate,
) -> Option<String> {
    calendar::first_date_in_window(earnings_dates, as_of, expiration).map(|d| {
        format!("Earnings on {d} before expiration {expiration}: expect a volatility move")
    })
}

pub fn high_assignment(probability: Option<f64>, thresholds: &AnalyzerThresholds) -> Option<String> {
    let p = probability?;
    (p >= thresholds.high_assignment_probability).then(|| {
        format!("High assignment probability: {:.0}%", p * 100.0)
    })
}

/// Ex-dividend date inside the window on a put trading near the money.
/// Near the money: within the configured distance of spot, or already likely to be assigned.
pub fn ex_dividend_early_assignment(
    ex_dividend_dates: &[NaiveDate],
    as_of: NaiveDate,
    contract: &OptionContract,
    current_price: f64,
    probability: Option<f64>,
    thresholds: &AnalyzerThresholds,
) -> Option<String> {
    let ex_date = calendar::first_date_in_window(ex_dividend_dates, as_of, contract.expiration_date)?;

    let distance_pct = if current_price > 0.0 {
        (current_price - contract.strike) / current_price * 100.0
    } else {
        0.0
    };
    let near_money = distance_pct <= thresholds.ex_dividend_near_money_pct
        || probability.is_some_and(|p| p >= thresholds.high_assignment_probability);

    near_money.then(|| {
        format!(
            "Early assignment risk: ex-dividend {ex_date} falls before expiration with strike {:.1}% from spot",
            distance_pct
        )
    })
}
