use crate::config::{AnalyzerConfig, AnalyzerThresholds};
use crate::errors::{WheelError, WheelResult};
use crate::market::calendar;
use crate::market::types::{OptionContract, OptionType, OptionsChain};
use crate::models::strike_optimizer::StrikeOptimizer;
use crate::risk::analyzer::{safe_pct, RiskAnalyzer};
use crate::strategies::{checks, select_candidates, ProbabilityAssessment, RecommendationRequest};
use chrono::NaiveDate;
use serde::Serialize;

/// Analysis of selling one call against shares already held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveredCallResult {
    pub contract: OptionContract,
    pub current_price: f64,
    /// Bid: the price a sell order actually fills at
    pub premium: f64,
    pub shares: u32,
    pub cost_basis: f64,
    pub days_to_expiry: i64,
    pub total_premium: f64,
    pub max_profit: f64,
    pub breakeven: f64,
    pub return_if_flat_pct: f64,
    pub return_if_called_pct: f64,
    pub annualized_if_flat_pct: f64,
    pub annualized_if_called_pct: f64,
    pub downside_protection_pct: f64,
    pub upside_to_strike_pct: f64,
    pub probability: ProbabilityAssessment,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CoveredCallAnalyzer {
    optimizer: StrikeOptimizer,
    income: RiskAnalyzer,
    thresholds: AnalyzerThresholds,
    as_of: NaiveDate,
}

impl CoveredCallAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            optimizer: StrikeOptimizer::new(),
            income: RiskAnalyzer::new(config.risk_free_rate),
            thresholds: config.thresholds,
            as_of: chrono::Utc::now().date_naive(),
        }
    }

    /// Pins the valuation date used for days-to-expiry.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    #[inline]
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Analyzes one call. Fails on a put or on a strike at or below spot.
    pub fn analyze(
        &self,
        contract: &OptionContract,
        current_price: f64,
        volatility: f64,
        shares: u32,
        cost_basis: Option<f64>,
        earnings_dates: &[NaiveDate],
    ) -> WheelResult<CoveredCallResult> {
        if contract.option_type != OptionType::Call {
            return Err(WheelError::Validation(format!(
                "covered call analysis requires a call, got a {}",
                contract.option_type
            )));
        }
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(WheelError::Validation(format!(
                "current price must be positive, got {current_price}"
            )));
        }
        if contract.strike <= current_price {
            return Err(WheelError::Validation(format!(
                "call strike {:.2} must be above current price {:.2}",
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
            OptionType::Call,
            shares,
            cost_basis,
        );

        let probability = ProbabilityAssessment::assess(
            &self.optimizer,
            contract.strike,
            current_price,
            volatility,
            days_to_expiry,
            OptionType::Call,
        );

        let mut warnings = checks::liquidity(contract, premium, &self.thresholds);
        warnings.extend(checks::earnings_in_window(
            earnings_dates,
            self.as_of,
            contract.expiration_date,
        ));
        warnings.extend(checks::high_assignment(probability.probability(), &self.thresholds));
        if let ProbabilityAssessment::Unavailable { reason } = &probability {
            warnings.push(format!("Probability unavailable: {reason}"));
        }

        Ok(CoveredCallResult {
            contract: contract.clone(),
            current_price,
            premium,
            shares,
            cost_basis: income.cost_basis,
            days_to_expiry,
            total_premium: income.total_premium,
            max_profit: income.max_profit,
            breakeven: income.cost_basis - premium,
            return_if_flat_pct: income.return_if_flat_pct,
            return_if_called_pct: income.return_if_called_pct,
            annualized_if_flat_pct: income.annualized_yield_pct,
            annualized_if_called_pct: income.annualized_if_called_pct,
            downside_protection_pct: income.downside_protection_pct,
            upside_to_strike_pct: safe_pct(contract.strike - current_price, current_price),
            probability,
            warnings,
        })
    }

    /// Ranks tradable OTM calls at one expiration by annualized return if flat.
    pub fn get_recommendations(
        &self,
        chain: &OptionsChain,
        current_price: f64,
        volatility: f64,
        request: &RecommendationRequest,
    ) -> WheelResult<Vec<CoveredCallResult>> {
        let candidates =
            select_candidates(chain, OptionType::Call, current_price, request, self.as_of);

        let mut results = candidates
            .into_iter()
            .map(|c| {
                self.analyze(
                    c,
                    current_price,
                    volatility,
                    request.shares,
                    request.cost_basis,
                    &request.earnings_dates,
                )
            })
            .collect::<WheelResult<Vec<_>>>()?;

        if let Some(profile) = request.profile {
            results.retain(|r| r.probability.profile() == Some(profile));
        }

        results.sort_by(|a, b| b.annualized_if_flat_pct.total_cmp(&a.annualized_if_flat_pct));
        results.truncate(request.limit);

        tracing::debug!(
            symbol = %chain.symbol,
            profile = ?request.profile,
            count = results.len(),
            "covered call recommendations ranked"
        );

        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market::types::fixtures::contract;
    use crate::models::StrikeProfile;
    use chrono::Utc;

    pub(crate) fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn analyzer() -> CoveredCallAnalyzer {
        CoveredCallAnalyzer::new(&AnalyzerConfig::default()).with_as_of(as_of())
    }

    /// Spot 100, vol 0.30, 35 days: one sigma is about 9.3% in log terms.
    pub(crate) fn sample_chain() -> OptionsChain {
        let contracts = vec![
            contract(OptionType::Call, 95.0, 6.10, 6.30),
            contract(OptionType::Call, 102.0, 2.50, 2.60),
            contract(OptionType::Call, 107.0, 1.10, 1.20),
            contract(OptionType::Call, 115.0, 0.30, 0.33),
            contract(OptionType::Call, 125.0, 0.02, 0.05),
            contract(OptionType::Put, 105.0, 6.00, 6.20),
            contract(OptionType::Put, 98.0, 2.20, 2.30),
            contract(OptionType::Put, 93.0, 0.90, 1.00),
            contract(OptionType::Put, 85.0, 0.20, 0.22),
        ];
        OptionsChain::new("XYZ", contracts, Utc::now()).unwrap()
    }

    #[test]
    fn test_rejects_itm_or_atm_strike() {
        let a = analyzer();
        let itm = contract(OptionType::Call, 95.0, 6.0, 6.2);
        let atm = contract(OptionType::Call, 100.0, 3.0, 3.2);
        assert!(matches!(a.analyze(&itm, 100.0, 0.3, 100, None, &[]), Err(WheelError::Validation(_))));
        assert!(matches!(a.analyze(&atm, 100.0, 0.3, 100, None, &[]), Err(WheelError::Validation(_))));
        assert!(a.analyze(&contract(OptionType::Call, 105.0, 1.5, 1.6), 100.0, 0.3, 100, None, &[]).is_ok());
    }

    #[test]
    fn test_rejects_put_contract() {
        let a = analyzer();
        let put = contract(OptionType::Put, 105.0, 1.5, 1.6);
        assert!(matches!(a.analyze(&put, 100.0, 0.3, 100, None, &[]), Err(WheelError::Validation(_))));
    }

    #[test]
    fn test_premium_is_bid() {
        let a = analyzer();
        let r = a.analyze(&contract(OptionType::Call, 105.0, 1.50, 1.70), 100.0, 0.3, 100, None, &[]).unwrap();
        assert_eq!(r.premium, 1.50);
        assert!((r.total_premium - 150.0).abs() < 1e-9);
        assert!((r.max_profit - 650.0).abs() < 1e-9, "max_profit={}", r.max_profit);
        assert_eq!(r.days_to_expiry, 35);
        assert!((r.breakeven - 98.5).abs() < 1e-9);
    }

    #[test]
    fn test_cost_basis_changes_called_return() {
        let a = analyzer();
        let c = contract(OptionType::Call, 105.0, 1.50, 1.60);
        let r = a.analyze(&c, 100.0, 0.3, 100, Some(90.0), &[]).unwrap();
        assert!((r.max_profit - (150.0 + 1_500.0)).abs() < 1e-9);
        assert!((r.breakeven - 88.5).abs() < 1e-9);
    }

    #[test]
    fn test_bad_volatility_downgrades_to_warning() {
        let a = analyzer();
        let r = a.analyze(&contract(OptionType::Call, 105.0, 1.5, 1.6), 100.0, 0.0, 100, None, &[]).unwrap();
        assert!(matches!(r.probability, ProbabilityAssessment::Unavailable { .. }));
        assert!(r.probability.profile().is_none());
        assert!(r.warnings.iter().any(|w| w.contains("Probability unavailable")), "{:?}", r.warnings);
    }

    #[test]
    fn test_zero_dte_still_scores() {
        let a = CoveredCallAnalyzer::new(&AnalyzerConfig::default())
            .with_as_of(NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        let r = a.analyze(&contract(OptionType::Call, 105.0, 0.5, 0.55), 100.0, 0.3, 100, None, &[]).unwrap();
        assert_eq!(r.days_to_expiry, 0);
        assert_eq!(r.annualized_if_flat_pct, 0.0);
        assert!(r.probability.probability().is_some(), "optimizer gets at least one day");
    }

    #[test]
    fn test_earnings_and_liquidity_warnings() {
        let a = analyzer();
        let mut c = contract(OptionType::Call, 105.0, 1.0, 1.5);
        c.open_interest = 12;
        let earnings = [NaiveDate::from_ymd_opt(2026, 11, 3).unwrap()];
        let r = a.analyze(&c, 100.0, 0.3, 100, None, &earnings).unwrap();
        assert!(r.warnings.iter().any(|w| w.contains("Earnings")), "{:?}", r.warnings);
        assert!(r.warnings.iter().any(|w| w.contains("Low open interest")));
        assert!(r.warnings.iter().any(|w| w.contains("Wide bid-ask spread")));
    }

    #[test]
    fn test_recommendations_filter_and_rank() {
        let a = analyzer();
        let recs = a
            .get_recommendations(&sample_chain(), 100.0, 0.30, &RecommendationRequest::default())
            .unwrap();
        let strikes: Vec<f64> = recs.iter().map(|r| r.contract.strike).collect();
        // 95 is ITM, 125 bids below the minimum, puts are ignored
        assert_eq!(strikes, vec![102.0, 107.0, 115.0]);
        assert!(recs.windows(2).all(|w| w[0].annualized_if_flat_pct >= w[1].annualized_if_flat_pct));
    }

    #[test]
    fn test_recommendations_profile_and_limit() {
        let a = analyzer();
        let req = RecommendationRequest {
            profile: Some(StrikeProfile::Moderate),
            ..Default::default()
        };
        let recs = a.get_recommendations(&sample_chain(), 100.0, 0.30, &req).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].contract.strike, 107.0);

        let req = RecommendationRequest {
            limit: 2,
            ..Default::default()
        };
        assert_eq!(a.get_recommendations(&sample_chain(), 100.0, 0.30, &req).unwrap().len(), 2);
    }

    #[test]
    fn test_unusable_chain_is_empty_until_valid_call_added() {
        let a = analyzer();
        let mut contracts = vec![
            contract(OptionType::Call, 90.0, 10.0, 10.2),
            contract(OptionType::Call, 95.0, 5.5, 5.7),
            contract(OptionType::Call, 110.0, 0.03, 0.06),
            contract(OptionType::Call, 120.0, 0.0, 0.02),
        ];
        let chain = OptionsChain::new("XYZ", contracts.clone(), Utc::now()).unwrap();
        let req = RecommendationRequest::default();
        assert!(a.get_recommendations(&chain, 100.0, 0.3, &req).unwrap().is_empty());

        contracts.push(contract(OptionType::Call, 105.0, 1.25, 1.30));
        let chain = OptionsChain::new("XYZ", contracts, Utc::now()).unwrap();
        let recs = a.get_recommendations(&chain, 100.0, 0.3, &req).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].contract.strike, 105.0);
    }

    #[test]
    fn test_explicit_expiration() {
        let a = analyzer();
        let mut later = contract(OptionType::Call, 110.0, 2.0, 2.1);
        later.expiration_date = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let near = contract(OptionType::Call, 110.0, 0.8, 0.85);
        let chain = OptionsChain::new("XYZ", vec![near, later], Utc::now()).unwrap();

        let nearest = a.get_recommendations(&chain, 100.0, 0.3, &RecommendationRequest::default()).unwrap();
        assert_eq!(nearest.len(), 1);
        assert_eq!(nearest[0].premium, 0.8);

        let req = RecommendationRequest {
            expiration: NaiveDate::from_ymd_opt(2026, 12, 18),
            ..Default::default()
        };
        let dec = a.get_recommendations(&chain, 100.0, 0.3, &req).unwrap();
        assert_eq!(dec.len(), 1);
        assert_eq!(dec[0].premium, 2.0);
    }
}
