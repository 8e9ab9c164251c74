/// Income, risk and scenario calculators for covered calls and cash-secured puts.
///
/// Covered call (S = spot, K = strike, P = premium, n = shares):
///   breakeven  = S - P
///   max_profit = P*n + (K - basis)*n
///   max_loss   = S*n - P*n
///   payoff(p)  = (min(p, K) - S)*n + P*n
///
/// Cash-secured put:
///   breakeven  = K - P
///   collateral = K*n
///   max_profit = P*n
///   max_loss   = K*n - P*n
///   payoff(p)  = P*n                  if p >= K
///              = (p - K)*n + P*n      otherwise
///
/// Expected value weights an OTM branch (premium only) and an ITM branch by
/// (1 - p_itm) and p_itm. Every function here is pure: the only state is the
/// configured risk-free rate.
use crate::market::types::OptionType;
use crate::models::strike_optimizer::StrikeOptimizer;
use crate::risk::metrics::{
    CombinedAnalysis, IncomeMetrics, RiskMetrics, ScenarioOutcome, ScenarioResult,
    StrategyComparison, StrategyKind, StrategyPick,
};

const DAYS_PER_YEAR: f64 = 365.0;

pub const DEFAULT_SHARES: u32 = 100;
pub const DEFAULT_EXPECTED_VOLATILITY: f64 = 0.20;

/// Default scenario grid, as moves relative to spot (spot and strike are added).
const SCENARIO_MOVES: [f64; 6] = [-0.20, -0.10, -0.05, 0.05, 0.10, 0.20];

/// Opportunity cost above this fraction of the position is flagged
const HIGH_OPPORTUNITY_COST_FRACTION: f64 = 0.05;
/// Annualized premium yield below this (%) is flagged
const LOW_ANNUALIZED_YIELD_PCT: f64 = 5.0;
/// Put discount below this (%) is flagged when assignment is also likely
const SMALL_DISCOUNT_PCT: f64 = 3.0;
const SMALL_DISCOUNT_PROBABILITY: f64 = 0.20;

/// One candidate position for the combined analyses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionInputs {
    pub current_price: f64,
    pub strike: f64,
    pub premium: f64,
    pub days_to_expiry: i64,
    pub probability_itm: f64,
    pub shares: u32,
    pub cost_basis: Option<f64>,
    pub price_target: Option<f64>,
    pub expected_volatility: f64,
}

impl PositionInputs {
    pub fn new(
        current_price: f64,
        strike: f64,
        premium: f64,
        days_to_expiry: i64,
        probability_itm: f64,
    ) -> Self {
        Self {
            current_price,
            strike,
            premium,
            days_to_expiry,
            probability_itm,
            shares: DEFAULT_SHARES,
            cost_basis: None,
            price_target: None,
            expected_volatility: DEFAULT_EXPECTED_VOLATILITY,
        }
    }

    pub fn with_shares(mut self, shares: u32) -> Self {
        self.shares = shares;
        self
    }

    pub fn with_cost_basis(mut self, cost_basis: Option<f64>) -> Self {
        self.cost_basis = cost_basis;
        self
    }

    pub fn with_price_target(mut self, price_target: Option<f64>) -> Self {
        self.price_target = price_target;
        self
    }

    pub fn with_expected_volatility(mut self, expected_volatility: f64) -> Self {
        self.expected_volatility = expected_volatility;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    risk_free_rate: f64,
    optimizer: StrikeOptimizer,
}

impl Default for RiskAnalyzer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl RiskAnalyzer {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            optimizer: StrikeOptimizer::new(),
        }
    }

    #[inline]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    #[allow(clippy::too_many_arguments)]
    pub fn calculate_income_metrics(
        &self,
        current_price: f64,
        strike: f64,
        premium: f64,
        days_to_expiry: i64,
        option_type: OptionType,
        shares: u32,
        cost_basis: Option<f64>,
    ) -> IncomeMetrics {
        let n = shares as f64;
        let total_premium = premium * n;
        let premium_pct = safe_pct(premium, current_price);

        match option_type {
            OptionType::Call => {
                let basis = cost_basis.unwrap_or(current_price);
                let position_value = current_price * n;
                let max_profit = total_premium + (strike - basis) * n;
                let return_if_flat_pct = safe_pct(total_premium, position_value);
                let return_if_called_pct = safe_pct(max_profit, basis * n);

                IncomeMetrics {
                    option_type,
                    shares,
                    days_to_expiry,
                    total_premium,
                    premium_pct,
                    position_value,
                    cost_basis: basis,
                    breakeven: current_price - premium,
                    max_profit,
                    max_loss: current_price * n - total_premium,
                    return_if_flat_pct,
                    return_if_called_pct,
                    annualized_yield_pct: annualize(return_if_flat_pct, days_to_expiry),
                    annualized_if_called_pct: annualize(return_if_called_pct, days_to_expiry),
                    downside_protection_pct: premium_pct,
                }
            }
            OptionType::Put => {
                let collateral = strike * n;
                let breakeven = strike - premium;
                let return_if_flat_pct = safe_pct(total_premium, collateral);
                let return_if_called_pct =
                    safe_pct(-(strike - current_price) * n + total_premium, collateral);

                IncomeMetrics {
                    option_type,
                    shares,
                    days_to_expiry,
                    total_premium,
                    premium_pct,
                    position_value: collateral,
                    cost_basis: breakeven,
                    breakeven,
                    max_profit: total_premium,
                    max_loss: collateral - total_premium,
                    return_if_flat_pct,
                    return_if_called_pct,
                    annualized_yield_pct: annualize(return_if_flat_pct, days_to_expiry),
                    annualized_if_called_pct: annualize(return_if_called_pct, days_to_expiry),
                    downside_protection_pct: safe_pct(current_price - breakeven, current_price),
                }
            }
        }
    }

    /// Probability-weighted outcome, opportunity cost and reward ratios.
    ///
    /// Puts only carry an opportunity cost when a target below spot is given;
    /// calls fall back to a one-sigma expected move when no usable target exists.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_risk_metrics(
        &self,
        current_price: f64,
        strike: f64,
        premium: f64,
        probability_itm: f64,
        days_to_expiry: i64,
        option_type: OptionType,
        shares: u32,
        price_target: Option<f64>,
        expected_volatility: f64,
    ) -> RiskMetrics {
        let p_itm = if probability_itm.is_nan() {
            0.0
        } else {
            probability_itm.clamp(0.0, 1.0)
        };
        let p_otm = 1.0 - p_itm;
        let n = shares as f64;

        let income = self.calculate_income_metrics(
            current_price,
            strike,
            premium,
            days_to_expiry,
            option_type,
            shares,
            None,
        );
        let total_premium = income.total_premium;

        let (itm_pnl, opportunity_cost, probability_max_profit) = match option_type {
            OptionType::Call => {
                let itm_pnl = total_premium + (strike - current_price) * n;
                let opportunity_cost = match price_target {
                    Some(target) if target > strike => (target - strike) * n * p_itm,
                    _ => {
                        let expected_move =
                            expected_move(current_price, expected_volatility, days_to_expiry);
                        (current_price + expected_move - strike).max(0.0) * n * p_itm
                    }
                };
                (itm_pnl, opportunity_cost, p_itm)
            }
            OptionType::Put => {
                let itm_pnl = total_premium - (current_price - strike).abs() * n;
                let opportunity_cost = match price_target {
                    Some(target) if target < current_price => (current_price - target) * n * p_otm,
                    _ => 0.0,
                };
                (itm_pnl, opportunity_cost, p_otm)
            }
        };

        let expected_value = p_otm * total_premium + p_itm * itm_pnl;
        let expected_return_pct = safe_pct(expected_value, income.position_value);
        let annualized_expected_return_pct = annualize(expected_return_pct, days_to_expiry);

        let probability_profit = self.probability_above(
            income.breakeven,
            current_price,
            expected_volatility,
            days_to_expiry,
        );

        let risk_reward_ratio = if income.max_loss <= 0.0 {
            f64::INFINITY
        } else {
            income.max_profit / income.max_loss
        };

        let sharpe_ratio = if days_to_expiry <= 0 || expected_volatility <= 0.0 {
            0.0
        } else {
            (annualized_expected_return_pct / 100.0 - self.risk_free_rate) / expected_volatility
        };

        RiskMetrics {
            probability_itm: p_itm,
            probability_otm: p_otm,
            probability_profit,
            probability_max_profit,
            probability_loss: 1.0 - probability_profit,
            expected_value,
            expected_return_pct,
            annualized_expected_return_pct,
            opportunity_cost,
            max_profit: income.max_profit,
            max_loss: income.max_loss,
            risk_reward_ratio,
            sharpe_ratio,
        }
    }

    /// Payoff table at expiry. Default grid is spot -20/-10/-5/0/+5/+10/+20% plus the strike.
    pub fn calculate_scenarios(
        &self,
        current_price: f64,
        strike: f64,
        premium: f64,
        option_type: OptionType,
        shares: u32,
        custom_levels: Option<&[f64]>,
    ) -> ScenarioResult {
        let levels = match custom_levels {
            Some(levels) => normalize_levels(levels.to_vec()),
            None => default_levels(current_price, strike),
        };

        let n = shares as f64;
        let premium_income = premium * n;

        let outcomes = levels
            .into_iter()
            .map(|price| {
                let (assigned, stock_pnl, capital) = match option_type {
                    OptionType::Call => (
                        price > strike,
                        (price.min(strike) - current_price) * n,
                        current_price * n,
                    ),
                    OptionType::Put => {
                        let assigned = price < strike;
                        let stock_pnl = if assigned { (price - strike) * n } else { 0.0 };
                        (assigned, stock_pnl, strike * n)
                    }
                };
                let total_pnl = stock_pnl + premium_income;
                let buy_hold_pnl = (price - current_price) * n;

                ScenarioOutcome {
                    price,
                    price_change_pct: safe_pct(price - current_price, current_price),
                    assigned,
                    stock_pnl,
                    premium_income,
                    total_pnl,
                    total_return_pct: safe_pct(total_pnl, capital),
                    buy_hold_pnl,
                    vs_buy_hold: total_pnl - buy_hold_pnl,
                }
            })
            .collect();

        let breakeven = match option_type {
            OptionType::Call => current_price - premium,
            OptionType::Put => strike - premium,
        };

        ScenarioResult::from_outcomes(option_type, breakeven, outcomes)
    }

    pub fn analyze_covered_call(
        &self,
        inputs: &PositionInputs,
        include_scenarios: bool,
    ) -> CombinedAnalysis {
        let mut warnings = Vec::new();
        if inputs.strike <= inputs.current_price {
            warnings.push(format!(
                "Strike {:.2} is not out-of-the-money (current price {:.2}); shares are likely to be called away",
                inputs.strike, inputs.current_price
            ));
        }
        if inputs.premium <= 0.0 {
            warnings.push(format!("Zero or negative premium: {:.2}", inputs.premium));
        }

        let income = self.calculate_income_metrics(
            inputs.current_price,
            inputs.strike,
            inputs.premium,
            inputs.days_to_expiry,
            OptionType::Call,
            inputs.shares,
            inputs.cost_basis,
        );
        let risk = self.risk_for(inputs, OptionType::Call);
        let scenarios = include_scenarios.then(|| {
            self.calculate_scenarios(
                inputs.current_price,
                inputs.strike,
                inputs.premium,
                OptionType::Call,
                inputs.shares,
                None,
            )
        });

        push_common_warnings(&mut warnings, &income, &risk);

        CombinedAnalysis {
            strategy: StrategyKind::CoveredCall,
            income,
            risk,
            scenarios,
            warnings,
        }
    }

    pub fn analyze_cash_secured_put(
        &self,
        inputs: &PositionInputs,
        include_scenarios: bool,
    ) -> CombinedAnalysis {
        let mut warnings = Vec::new();
        if inputs.strike >= inputs.current_price {
            warnings.push(format!(
                "Strike {:.2} is not out-of-the-money (current price {:.2}); assignment is likely",
                inputs.strike, inputs.current_price
            ));
        }
        if inputs.premium <= 0.0 {
            warnings.push(format!("Zero or negative premium: {:.2}", inputs.premium));
        }

        let income = self.calculate_income_metrics(
            inputs.current_price,
            inputs.strike,
            inputs.premium,
            inputs.days_to_expiry,
            OptionType::Put,
            inputs.shares,
            None,
        );
        let risk = self.risk_for(inputs, OptionType::Put);
        let scenarios = include_scenarios.then(|| {
            self.calculate_scenarios(
                inputs.current_price,
                inputs.strike,
                inputs.premium,
                OptionType::Put,
                inputs.shares,
                None,
            )
        });

        push_common_warnings(&mut warnings, &income, &risk);

        let discount_pct = safe_pct(inputs.current_price - inputs.strike, inputs.current_price);
        if discount_pct < SMALL_DISCOUNT_PCT && risk.probability_itm > SMALL_DISCOUNT_PROBABILITY {
            warnings.push(format!(
                "Small discount: strike is only {:.1}% below current price with {:.0}% assignment probability",
                discount_pct,
                risk.probability_itm * 100.0
            ));
        }

        CombinedAnalysis {
            strategy: StrategyKind::CashSecuredPut,
            income,
            risk,
            scenarios,
            warnings,
        }
    }

    /// Compares the two income trades by expected value. Scenarios are skipped.
    pub fn compare_strategies(
        &self,
        call: &PositionInputs,
        put: &PositionInputs,
    ) -> StrategyComparison {
        let covered_call = self.analyze_covered_call(call, false);
        let cash_secured_put = self.analyze_cash_secured_put(put, false);

        let call_ev = covered_call.risk.expected_value;
        let put_ev = cash_secured_put.risk.expected_value;
        let ev_difference = call_ev - put_ev;

        let (recommendation, reason) = if ev_difference > 0.0 {
            (
                StrategyPick::CoveredCall,
                format!(
                    "Covered call expected value ${call_ev:.2} exceeds cash-secured put ${put_ev:.2} by ${:.2}",
                    ev_difference
                ),
            )
        } else if ev_difference < 0.0 {
            (
                StrategyPick::CashSecuredPut,
                format!(
                    "Cash-secured put expected value ${put_ev:.2} exceeds covered call ${call_ev:.2} by ${:.2}",
                    -ev_difference
                ),
            )
        } else {
            (
                StrategyPick::Either,
                format!("Both strategies have the same expected value ${call_ev:.2}"),
            )
        };

        tracing::debug!(
            call_ev = call_ev,
            put_ev = put_ev,
            pick = %recommendation,
            "strategies compared"
        );

        StrategyComparison {
            covered_call,
            cash_secured_put,
            recommendation,
            ev_difference,
            reason,
        }
    }

    fn risk_for(&self, inputs: &PositionInputs, option_type: OptionType) -> RiskMetrics {
        self.calculate_risk_metrics(
            inputs.current_price,
            inputs.strike,
            inputs.premium,
            inputs.probability_itm,
            inputs.days_to_expiry,
            option_type,
            inputs.shares,
            inputs.price_target,
            inputs.expected_volatility,
        )
    }

    /// P(S_T > level) under a driftless lognormal, over at least one day.
    fn probability_above(&self, level: f64, current_price: f64, volatility: f64, days: i64) -> f64 {
        if level <= 0.0 {
            return 1.0;
        }
        if current_price <= 0.0 {
            return 0.0;
        }
        if !volatility.is_finite() || volatility <= 0.0 {
            return if current_price > level { 1.0 } else { 0.0 };
        }

        let t = days.max(1) as f64 / DAYS_PER_YEAR;
        let z = (current_price / level).ln() / (volatility * t.sqrt());
        self.optimizer.cdf(z).clamp(0.0, 1.0)
    }
}

fn push_common_warnings(warnings: &mut Vec<String>, income: &IncomeMetrics, risk: &RiskMetrics) {
    if income.position_value > 0.0
        && risk.opportunity_cost > HIGH_OPPORTUNITY_COST_FRACTION * income.position_value
    {
        warnings.push(format!(
            "High opportunity cost: ${:.2} ({:.1}% of position)",
            risk.opportunity_cost,
            risk.opportunity_cost / income.position_value * 100.0
        ));
    }
    if income.annualized_yield_pct < LOW_ANNUALIZED_YIELD_PCT {
        warnings.push(format!(
            "Low annualized yield: {:.2}%",
            income.annualized_yield_pct
        ));
    }
}

/// numerator / denominator * 100, zero when the denominator is not positive.
#[inline]
pub(crate) fn safe_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// Scales a period return to a 365-day year. Zero for degenerate periods.
#[inline]
pub(crate) fn annualize(period_pct: f64, days_to_expiry: i64) -> f64 {
    if days_to_expiry <= 0 {
        0.0
    } else {
        period_pct * DAYS_PER_YEAR / days_to_expiry as f64
    }
}

/// One-sigma price move over the option's life.
fn expected_move(current_price: f64, volatility: f64, days_to_expiry: i64) -> f64 {
    if days_to_expiry <= 0 || volatility <= 0.0 {
        return 0.0;
    }
    current_price * volatility * (days_to_expiry as f64 / DAYS_PER_YEAR).sqrt()
}

fn default_levels(current_price: f64, strike: f64) -> Vec<f64> {
    let mut levels: Vec<f64> = SCENARIO_MOVES
        .iter()
        .map(|m| current_price * (1.0 + m))
        .collect();
    levels.push(current_price);
    levels.push(strike);
    normalize_levels(levels)
}

/// Positive finite levels, ascending, without duplicates.
fn normalize_levels(mut levels: Vec<f64>) -> Vec<f64> {
    levels.retain(|p| p.is_finite() && *p > 0.0);
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_breakeven_consistent_across_calculators() {
        let ra = RiskAnalyzer::default();
        let income = ra.calculate_income_metrics(100.0, 105.0, 2.50, 30, OptionType::Call, 100, None);
        let scenarios = ra.calculate_scenarios(100.0, 105.0, 2.50, OptionType::Call, 100, None);
        assert!(close(income.breakeven, 97.50), "income breakeven={}", income.breakeven);
        assert!(close(scenarios.breakeven, 97.50), "scenario breakeven={}", scenarios.breakeven);

        let put_income = ra.calculate_income_metrics(100.0, 95.0, 2.0, 30, OptionType::Put, 100, None);
        let put_scen = ra.calculate_scenarios(100.0, 95.0, 2.0, OptionType::Put, 100, None);
        assert!(close(put_income.breakeven, put_scen.breakeven));
        assert!(close(put_income.breakeven, 93.0));
    }

    #[test]
    fn test_call_income_formulas() {
        let ra = RiskAnalyzer::default();
        let m = ra.calculate_income_metrics(100.0, 105.0, 2.50, 30, OptionType::Call, 100, None);
        assert!(close(m.total_premium, 250.0));
        assert!(close(m.max_profit, 750.0), "max_profit={}", m.max_profit);
        assert!(close(m.max_loss, 9_750.0), "max_loss={}", m.max_loss);
        assert!(close(m.return_if_flat_pct, 2.5));
        assert!(close(m.annualized_yield_pct, 2.5 * 365.0 / 30.0));

        let with_basis = ra.calculate_income_metrics(100.0, 105.0, 2.50, 30, OptionType::Call, 100, Some(90.0));
        assert!(close(with_basis.max_profit, 250.0 + 1_500.0));
    }

    #[test]
    fn test_put_income_formulas() {
        let ra = RiskAnalyzer::default();
        let m = ra.calculate_income_metrics(100.0, 95.0, 2.0, 30, OptionType::Put, 100, None);
        assert!(close(m.position_value, 9_500.0));
        assert!(close(m.max_profit, 200.0));
        assert!(close(m.max_loss, 9_300.0));
        let expected_called = (-(95.0 - 100.0) * 100.0 + 200.0) / 9_500.0 * 100.0;
        assert!(close(m.return_if_called_pct, expected_called), "called={}", m.return_if_called_pct);
    }

    #[test]
    fn test_zero_dte_annualization_guard() {
        let ra = RiskAnalyzer::default();
        for side in [OptionType::Call, OptionType::Put] {
            let m = ra.calculate_income_metrics(100.0, 105.0, 2.50, 0, side, 100, None);
            assert_eq!(m.annualized_yield_pct, 0.0);
            assert_eq!(m.annualized_if_called_pct, 0.0);
        }
        let r = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 0, OptionType::Call, 100, None, 0.2);
        assert_eq!(r.sharpe_ratio, 0.0);
        assert_eq!(r.annualized_expected_return_pct, 0.0);
    }

    #[test]
    fn test_call_payoff_capped_at_strike() {
        let ra = RiskAnalyzer::default();
        let s = ra.calculate_scenarios(100.0, 105.0, 2.50, OptionType::Call, 100, Some(&[90.0, 105.0, 110.0]));
        let at_110 = s.at_price(110.0).unwrap();
        let at_105 = s.at_price(105.0).unwrap();
        let at_90 = s.at_price(90.0).unwrap();
        assert!(close(at_110.total_pnl, 750.0), "pnl@110={}", at_110.total_pnl);
        assert!(close(at_105.total_pnl, 750.0), "pnl@105={}", at_105.total_pnl);
        assert!(close(at_90.total_pnl, -750.0), "pnl@90={}", at_90.total_pnl);
        assert!(at_110.assigned && !at_105.assigned);
        assert!(close(at_110.buy_hold_pnl, 1_000.0));
    }

    #[test]
    fn test_call_payoff_default_grid() {
        let ra = RiskAnalyzer::default();
        let s = ra.calculate_scenarios(100.0, 105.0, 2.50, OptionType::Call, 100, None);
        // 80, 90, 95, 100, 105 (strike and +5% collapse), 110, 120
        assert_eq!(s.outcomes.len(), 7, "levels={:?}", s.outcomes.iter().map(|o| o.price).collect::<Vec<_>>());
        assert!(close(s.at_price(105.0).unwrap().total_pnl, s.at_price(110.0).unwrap().total_pnl));
        let prices: Vec<f64> = s.outcomes.iter().map(|o| o.price).collect();
        assert!(prices.windows(2).all(|w| w[0] < w[1]), "grid must be sorted");
        // Capped payoff: the first level at the cap is the best
        assert_eq!(s.best().map(|o| o.price), Some(105.0));
        assert_eq!(s.worst().map(|o| o.price), Some(80.0));
    }

    #[test]
    fn test_default_grid_keeps_exact_percent_levels() {
        let ra = RiskAnalyzer::default();
        let s = ra.calculate_scenarios(33.33, 35.0, 1.0, OptionType::Call, 100, None);
        let prices: Vec<f64> = s.outcomes.iter().map(|o| o.price).collect();
        // six moves, spot and strike; none collide
        assert_eq!(prices.len(), 8, "levels={prices:?}");
        let minus_five = s.at_price(33.33 * 0.95).unwrap();
        assert!(close(minus_five.price_change_pct, -5.0), "pct={}", minus_five.price_change_pct);
        assert!(s.at_price(33.33 * 0.90).is_some(), "levels={prices:?}");
        assert!(s.at_price(30.0).is_none(), "levels={prices:?}");
        assert!(s.at_price(35.0).is_some());
    }

    #[test]
    fn test_put_payoff_branches() {
        let ra = RiskAnalyzer::default();
        let s = ra.calculate_scenarios(100.0, 95.0, 2.0, OptionType::Put, 100, Some(&[85.0, 105.0]));
        let otm = s.at_price(105.0).unwrap();
        let itm = s.at_price(85.0).unwrap();
        assert!(close(otm.total_pnl, 200.0), "otm={}", otm.total_pnl);
        assert!(close(itm.total_pnl, -800.0), "itm={}", itm.total_pnl);
        assert!(itm.assigned && !otm.assigned);
        assert!(close(itm.buy_hold_pnl, -1_500.0));
    }

    #[test]
    fn test_custom_levels_sorted_and_deduped() {
        let ra = RiskAnalyzer::default();
        let s = ra.calculate_scenarios(100.0, 95.0, 2.0, OptionType::Put, 100, Some(&[110.0, 90.0, 110.0, -5.0, f64::NAN]));
        let prices: Vec<f64> = s.outcomes.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![90.0, 110.0]);
    }

    #[test]
    fn test_deep_otm_ev_is_premium() {
        let ra = RiskAnalyzer::default();
        let r = ra.calculate_risk_metrics(100.0, 150.0, 0.25, 1e-9, 30, OptionType::Call, 100, None, 0.2);
        assert!((r.expected_value - 25.0).abs() < 1e-4, "ev={}", r.expected_value);
        assert!(r.opportunity_cost.abs() < 1e-6);
    }

    #[test]
    fn test_expected_value_weights_both_branches() {
        let ra = RiskAnalyzer::default();
        // Call: 0.7 * 250 + 0.3 * (250 + 5 * 100)
        let call = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 30, OptionType::Call, 100, None, 0.2);
        assert!(close(call.expected_value, 400.0), "call ev={}", call.expected_value);
        assert!(close(call.expected_return_pct, 4.0), "call ret={}", call.expected_return_pct);

        // Put: 0.7 * 200 + 0.3 * (200 - 5 * 100)
        let put = ra.calculate_risk_metrics(100.0, 95.0, 2.0, 0.3, 30, OptionType::Put, 100, None, 0.2);
        assert!(close(put.expected_value, 50.0), "put ev={}", put.expected_value);
        assert!(close(put.expected_return_pct, 50.0 / 9_500.0 * 100.0), "put ret={}", put.expected_return_pct);
    }

    #[test]
    fn test_call_opportunity_cost_uses_target() {
        let ra = RiskAnalyzer::default();
        let r = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 30, OptionType::Call, 100, Some(120.0), 0.2);
        assert!(close(r.opportunity_cost, 15.0 * 100.0 * 0.3), "opp={}", r.opportunity_cost);

        // No target: one-sigma move of 100*0.5*sqrt(365/365) = 50 beyond spot
        let r = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 365, OptionType::Call, 100, None, 0.5);
        assert!(close(r.opportunity_cost, 45.0 * 100.0 * 0.3), "opp={}", r.opportunity_cost);
    }

    #[test]
    fn test_put_opportunity_cost_needs_target_below_spot() {
        let ra = RiskAnalyzer::default();
        let none = ra.calculate_risk_metrics(100.0, 95.0, 2.0, 0.3, 30, OptionType::Put, 100, None, 0.2);
        assert_eq!(none.opportunity_cost, 0.0);
        let above = ra.calculate_risk_metrics(100.0, 95.0, 2.0, 0.3, 30, OptionType::Put, 100, Some(110.0), 0.2);
        assert_eq!(above.opportunity_cost, 0.0);
        let below = ra.calculate_risk_metrics(100.0, 95.0, 2.0, 0.3, 30, OptionType::Put, 100, Some(90.0), 0.2);
        assert!(close(below.opportunity_cost, 10.0 * 100.0 * 0.7));
    }

    #[test]
    fn test_risk_reward_and_probabilities() {
        let ra = RiskAnalyzer::default();
        let r = ra.calculate_risk_metrics(100.0, 95.0, 2.0, 0.25, 30, OptionType::Put, 100, None, 0.3);
        assert!(close(r.risk_reward_ratio, 200.0 / 9_300.0));
        assert!(close(r.probability_max_profit, 0.75));
        assert!(r.probability_profit > r.probability_max_profit, "profit={} max={}", r.probability_profit, r.probability_max_profit);
        assert!(close(r.probability_profit + r.probability_loss, 1.0));

        // Premium equal to spot: nothing left to lose
        let free = ra.calculate_risk_metrics(10.0, 12.0, 10.0, 0.1, 30, OptionType::Call, 100, None, 0.2);
        assert!(free.risk_reward_ratio.is_infinite());
    }

    #[test]
    fn test_sharpe_guards() {
        let ra = RiskAnalyzer::new(0.04);
        let zero_vol = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 30, OptionType::Call, 100, None, 0.0);
        assert_eq!(zero_vol.sharpe_ratio, 0.0);
        let r = ra.calculate_risk_metrics(100.0, 105.0, 2.5, 0.3, 30, OptionType::Call, 100, None, 0.25);
        let expected = (r.annualized_expected_return_pct / 100.0 - 0.04) / 0.25;
        assert!(close(r.sharpe_ratio, expected));
    }

    #[test]
    fn test_zero_premium_warning() {
        let ra = RiskAnalyzer::default();
        let a = ra.analyze_covered_call(&PositionInputs::new(100.0, 105.0, 0.0, 30, 0.2), true);
        assert!(a.warnings.iter().any(|w| w.contains("Zero or negative premium")), "warnings={:?}", a.warnings);
        assert!(a.scenarios.is_some());
    }

    #[test]
    fn test_call_not_otm_warning() {
        let ra = RiskAnalyzer::default();
        let a = ra.analyze_covered_call(&PositionInputs::new(100.0, 95.0, 6.0, 30, 0.7), false);
        assert!(a.warnings.iter().any(|w| w.contains("not out-of-the-money")));
        assert!(a.scenarios.is_none());
    }

    #[test]
    fn test_small_discount_warning() {
        let ra = RiskAnalyzer::default();
        let a = ra.analyze_cash_secured_put(&PositionInputs::new(100.0, 99.0, 2.0, 30, 0.45), false);
        assert!(a.warnings.iter().any(|w| w.contains("Small discount")), "warnings={:?}", a.warnings);

        let safe = ra.analyze_cash_secured_put(&PositionInputs::new(100.0, 90.0, 1.0, 30, 0.45), false);
        assert!(!safe.warnings.iter().any(|w| w.contains("Small discount")));
    }

    #[test]
    fn test_low_yield_and_opportunity_warnings() {
        let ra = RiskAnalyzer::default();
        // 0.05 premium over 90 days is ~0.2% annualized
        let a = ra.analyze_covered_call(
            &PositionInputs::new(100.0, 105.0, 0.05, 90, 0.6).with_price_target(Some(130.0)),
            false,
        );
        assert!(a.warnings.iter().any(|w| w.contains("Low annualized yield")));
        assert!(a.warnings.iter().any(|w| w.contains("High opportunity cost")), "warnings={:?}", a.warnings);
    }

    #[test]
    fn test_compare_flips_with_expected_value() {
        let ra = RiskAnalyzer::default();
        let call = PositionInputs::new(100.0, 105.0, 2.0, 30, 0.3);

        let weak_put = PositionInputs::new(100.0, 95.0, 1.0, 30, 0.3);
        let c = ra.compare_strategies(&call, &weak_put);
        assert_eq!(c.recommendation, StrategyPick::CoveredCall);
        assert!(c.ev_difference > 0.0);
        assert!(c.covered_call.scenarios.is_none() && c.cash_secured_put.scenarios.is_none());

        let rich_put = PositionInputs::new(100.0, 95.0, 8.0, 30, 0.3);
        let c = ra.compare_strategies(&call, &rich_put);
        assert_eq!(c.recommendation, StrategyPick::CashSecuredPut);
        assert!(c.ev_difference < 0.0, "diff={}", c.ev_difference);
    }

    #[test]
    fn test_compare_either_on_equal_ev() {
        let ra = RiskAnalyzer::default();
        let call = PositionInputs::new(100.0, 105.0, 2.0, 30, 0.0);
        let put = PositionInputs::new(100.0, 95.0, 2.0, 30, 0.0);
        let c = ra.compare_strategies(&call, &put);
        assert_eq!(c.recommendation, StrategyPick::Either);
        assert_eq!(c.ev_difference, 0.0);
    }
}
