use crate::config::{AnalyzerConfig, AnalyzerThresholds};
use crate::errors::{WheelError, WheelResult};
use crate::market::calendar;
use crate::market::types::{OptionContract, OptionType, OptionsChain};
use crate::models::strike_optimizer::StrikeOptimizer;
use crate::risk::analyzer::{safe_pct, RiskAnalyzer};
use crate::strategies::{checks, select_candidates, ProbabilityAssessment, RecommendationRequest};
use chrono::NaiveDate;
use serde::Serialize;

/// Analysis of selling one cash-secured put.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveredPutResult {
    pub contract: OptionContract,
    pub current_price: f64,
    pub premium: f64,
    pub shares: u32,
    pub days_to_expiry: i64,
    pub total_premium: f64,
    /// Cash held against assignment: strike * shares
    pub collateral: f64,
    /// Strike minus premium
    pub effective_purchase_price: f64,
    /// Effective purchase price below spot, as % of spot
    pub discount_pct: f64,
    pub return_if_otm_pct: f64,
    pub annualized_if_otm_pct: f64,
    /// Assigned, then the shares recover to today's price
    pub return_if_assigned_pct: f64,
    pub breakeven: f64,
    pub max_profit: f64,
    pub probability: ProbabilityAssessment,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CoveredPutAnalyzer {
    optimizer: StrikeOptimizer,
    income: RiskAnalyzer,
    thresholds: AnalyzerThresholds,
    as_of: NaiveDate,
}

impl CoveredPutAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            optimizer: StrikeOptimizer::new(),
            income: RiskAnalyzer::new(config.risk_free_rate),
            thresholds: config.thresholds,
            as_of: chrono::Utc::now().date_naive(),
        }
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    #[inline]
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Analyzes one put. Fails on a call or on a strike at or above spot.
    pub fn analyze(
        &self,
        contract: &OptionContract,
        current_price: f64,
        volatility: f64,
        shares: u32,
        earnings_dates: &[NaiveDate],
        ex_dividend_dates: &[NaiveDate],
    ) -> WheelResult<CoveredPutResult> {
        if contract.option_type != OptionType::Put {
            return Err(WheelError::Validation(format!(
                "cash-secured put analysis requires a put, got a {}",
                contract.option_type
            )));
        }
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(WheelError::Validation(format!(
                "current price must be positive, got {current_price}"
            )));
        }
        if contract.strike >= current_price {
            return Err(WheelError::Validation(format!(
                "put strike {:.2} must be below current price {:.2}",
                contract.strike, current_price
            )));
        }

        let premium = contract.bid;
        let days_to_expiry = calendar::days_to_expiry(contract.expiration_date, self.as_of).max(0);

        let income = self.income.calculate_income_metrics(
            current_price,
            contract.strike,
            premium,
            days_to_expiry,
            OptionType::Put,
            shares,
            None,
        );
        let effective_purchase_price = contract.strike - premium;

        let probability = ProbabilityAssessment::assess(
            &self.optimizer,
            contract.strike,
            current_price,
            volatility,
            days_to_expiry,
            OptionType::Put,
        );

        let mut warnings = checks::liquidity(contract, premium, &self.thresholds);
        warnings.extend(checks::earnings_in_window(
            earnings_dates,
            self.as_of,
            contract.expiration_date,
        ));
        warnings.extend(checks::high_assignment(probability.probability(), &self.thresholds));
        warnings.extend(checks::ex_dividend_early_assignment(
            ex_dividend_dates,
            self.as_of,
            contract,
            current_price,
            probability.probability(),
            &self.thresholds,
        ));
        if let ProbabilityAssessment::Unavailable { reason } = &probability {
            warnings.push(format!("Probability unavailable: {reason}"));
        }

        Ok(CoveredPutResult {
            contract: contract.clone(),
            current_price,
            premium,
            shares,
            days_to_expiry,
            total_premium: income.total_premium,
            collateral: income.position_value,
            effective_purchase_price,
            discount_pct: safe_pct(current_price - effective_purchase_price, current_price),
            return_if_otm_pct: income.return_if_flat_pct,
            annualized_if_otm_pct: income.annualized_yield_pct,
            return_if_assigned_pct: income.return_if_called_pct,
            breakeven: income.breakeven,
            max_profit: income.max_profit,
            probability,
            warnings,
        })
    }

    /// Ranks tradable OTM puts at one expiration by annualized return if they expire worthless.
    pub fn get_recommendations(
        &self,
        chain: &OptionsChain,
        current_price: f64,
        volatility: f64,
        request: &RecommendationRequest,
    ) -> WheelResult<Vec<CoveredPutResult>> {
        let candidates =
            select_candidates(chain, OptionType::Put, current_price, request, self.as_of);

        let mut results = candidates
            .into_iter()
            .map(|c| {
                self.analyze(
                    c,
                    current_price,
                    volatility,
                    request.shares,
                    &request.earnings_dates,
                    &request.ex_dividend_dates,
                )
            })
            .collect::<WheelResult<Vec<_>>>()?;

        if let Some(profile) = request.profile {
            results.retain(|r| r.probability.profile() == Some(profile));
        }

        results.sort_by(|a, b| b.annualized_if_otm_pct.total_cmp(&a.annualized_if_otm_pct));
        results.truncate(request.limit);

        tracing::debug!(
            symbol = %chain.symbol,
            profile = ?request.profile,
            count = results.len(),
            "cash-secured put recommendations ranked"
        );

        Ok(results)
    }
}
