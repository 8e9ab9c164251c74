use crate::config::AnalyzerConfig;
use crate::errors::{WheelError, WheelResult};
use crate::market::types::OptionsChain;
use crate::models::StrikeProfile;
use crate::strategies::covered_call::{CoveredCallAnalyzer, CoveredCallResult};
use crate::strategies::covered_put::{CoveredPutAnalyzer, CoveredPutResult};
use crate::strategies::RecommendationRequest;
use chrono::NaiveDate;
use serde::Serialize;

/// Shares per standard contract; cycle cost basis assumes exactly one lot.
const CONTRACT_MULTIPLIER: f64 = 100.0;

/// What the caller holds. Transitions happen outside this module on assignment or call-away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WheelState {
    Cash,
    Shares,
}

impl std::fmt::Display for WheelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "CASH"),
            Self::Shares => write!(f, "SHARES"),
        }
    }
}

impl std::str::FromStr for WheelState {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "shares" => Ok(Self::Shares),
            other => Err(WheelError::Validation(format!("unknown wheel state: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelAction {
    SellPut,
    SellCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum WheelAnalysis {
    Put(CoveredPutResult),
    Call(CoveredCallResult),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelRecommendation {
    pub state: WheelState,
    pub action: WheelAction,
    pub analysis: WheelAnalysis,
    pub rationale: String,
}

/// Premium and P&L summary over one put-to-call cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WheelCycleMetrics {
    pub total_premium: f64,
    pub num_puts: u32,
    pub num_calls: u32,
    pub acquisition_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub average_cost_basis: Option<f64>,
    pub net_profit: Option<f64>,
    pub return_on_acquisition_pct: Option<f64>,
    pub cycle_complete: bool,
}

/// Stateless wheel step: the caller says what it holds, this picks the next option to sell.
#[derive(Debug, Clone)]
pub struct WheelStrategy {
    calls: CoveredCallAnalyzer,
    puts: CoveredPutAnalyzer,
}

impl WheelStrategy {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            calls: CoveredCallAnalyzer::new(config),
            puts: CoveredPutAnalyzer::new(config),
        }
    }

    pub fn with_as_of(self, as_of: NaiveDate) -> Self {
        Self {
            calls: self.calls.with_as_of(as_of),
            puts: self.puts.with_as_of(as_of),
        }
    }

    /// Best single contract for the current state, or None when nothing qualifies.
    /// The profile defaults to Moderate.
    pub fn get_recommendation(
        &self,
        state: WheelState,
        chain: &OptionsChain,
        current_price: f64,
        volatility: f64,
        request: &RecommendationRequest,
    ) -> WheelResult<Option<WheelRecommendation>> {
        let request = RecommendationRequest {
            profile: Some(request.profile.unwrap_or(StrikeProfile::Moderate)),
            limit: 1,
            ..request.clone()
        };

        let recommendation = match state {
            WheelState::Cash => self
                .puts
                .get_recommendations(chain, current_price, volatility, &request)?
                .into_iter()
                .next()
                .map(|put| WheelRecommendation {
                    state,
                    action: WheelAction::SellPut,
                    rationale: put_rationale(&put),
                    analysis: WheelAnalysis::Put(put),
                }),
            WheelState::Shares => self
                .calls
                .get_recommendations(chain, current_price, volatility, &request)?
                .into_iter()
                .next()
                .map(|call| WheelRecommendation {
                    state,
                    action: WheelAction::SellCall,
                    rationale: call_rationale(&call),
                    analysis: WheelAnalysis::Call(call),
                }),
        };

        match &recommendation {
            Some(rec) => tracing::info!(
                symbol = %chain.symbol,
                state = %state,
                action = ?rec.action,
                "wheel recommendation"
            ),
            None => tracing::info!(
                symbol = %chain.symbol,
                state = %state,
                profile = ?request.profile,
                "no eligible contract"
            ),
        }

        Ok(recommendation)
    }

    /// Rolls up a cycle. Cost basis spreads premium over a single 100-share lot.
    pub fn calculate_cycle_metrics(
        premiums: &[f64],
        acquisition_price: Option<f64>,
        sale_price: Option<f64>,
        num_puts: u32,
        num_calls: u32,
    ) -> WheelCycleMetrics {
        let total_premium: f64 = premiums.iter().sum();
        let average_cost_basis = acquisition_price.map(|p| p - total_premium / CONTRACT_MULTIPLIER);

        let (net_profit, return_on_acquisition_pct) = match (acquisition_price, average_cost_basis, sale_price) {
            (Some(acquisition), Some(basis), Some(sale)) => {
                let profit = (sale - basis) * CONTRACT_MULTIPLIER;
                let invested = acquisition * CONTRACT_MULTIPLIER;
                let pct = if invested > 0.0 { profit / invested * 100.0 } else { 0.0 };
                (Some(profit), Some(pct))
            }
            _ => (None, None),
        };

        WheelCycleMetrics {
            total_premium,
            num_puts,
            num_calls,
            acquisition_price,
            sale_price,
            average_cost_basis,
            net_profit,
            return_on_acquisition_pct,
            cycle_complete: net_profit.is_some(),
        }
    }
}

fn put_rationale(put: &CoveredPutResult) -> String {
    format!(
        "Sell the ${:.2} put for ${:.2}: effective purchase price ${:.2} ({:.1}% below spot), {:.1}% annualized if it expires worthless",
        put.contract.strike,
        put.premium,
        put.effective_purchase_price,
        put.discount_pct,
        put.annualized_if_otm_pct
    )
}

fn call_rationale(call: &CoveredCallResult) -> String {
    format!(
        "Sell the ${:.2} call for ${:.2}: max profit ${:.2} if called away, {:.1}% annualized if the stock stays flat",
        call.contract.strike, call.premium, call.max_profit, call.annualized_if_flat_pct
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::fixtures::contract;
    use crate::market::types::OptionType;
    use crate::strategies::covered_call::tests::{as_of, sample_chain};
    use chrono::Utc;

    fn strategy() -> WheelStrategy {
        WheelStrategy::new(&AnalyzerConfig::default()).with_as_of(as_of())
    }

    #[test]
    fn test_cash_sells_moderate_put() {
        let rec = strategy()
            .get_recommendation(WheelState::Cash, &sample_chain(), 100.0, 0.30, &RecommendationRequest::default())
            .unwrap()
            .unwrap();
        assert_eq!(rec.action, WheelAction::SellPut);
        let WheelAnalysis::Put(put) = &rec.analysis else {
            panic!("expected a put, got {:?}", rec.analysis);
        };
        assert_eq!(put.contract.strike, 93.0);
        assert!(rec.rationale.contains("$93.00 put"), "{}", rec.rationale);
        assert!(rec.rationale.contains("$92.10"), "{}", rec.rationale);
    }

    #[test]
    fn test_shares_sells_moderate_call() {
        let rec = strategy()
            .get_recommendation(WheelState::Shares, &sample_chain(), 100.0, 0.30, &RecommendationRequest::default())
            .unwrap()
            .unwrap();
        assert_eq!(rec.action, WheelAction::SellCall);
        let WheelAnalysis::Call(call) = &rec.analysis else {
            panic!("expected a call, got {:?}", rec.analysis);
        };
        assert_eq!(call.contract.strike, 107.0);
        assert!(rec.rationale.contains("$107.00 call"), "{}", rec.rationale);
        assert!(rec.rationale.contains("max profit $810.00"), "{}", rec.rationale);
    }

    #[test]
    fn test_explicit_profile_overrides_default() {
        let req = RecommendationRequest {
            profile: Some(StrikeProfile::Conservative),
            ..Default::default()
        };
        let rec = strategy()
            .get_recommendation(WheelState::Shares, &sample_chain(), 100.0, 0.30, &req)
            .unwrap()
            .unwrap();
        let WheelAnalysis::Call(call) = rec.analysis else {
            panic!("expected a call");
        };
        assert_eq!(call.contract.strike, 115.0);
    }

    #[test]
    fn test_no_eligible_contract_is_none() {
        let chain = OptionsChain::new(
            "XYZ",
            vec![contract(OptionType::Call, 95.0, 6.0, 6.2)],
            Utc::now(),
        )
        .unwrap();
        let s = strategy();
        let req = RecommendationRequest::default();
        assert!(s.get_recommendation(WheelState::Shares, &chain, 100.0, 0.3, &req).unwrap().is_none());
        assert!(s.get_recommendation(WheelState::Cash, &chain, 100.0, 0.3, &req).unwrap().is_none());
    }

    #[test]
    fn test_state_parse_and_serialize() {
        assert_eq!("cash".parse::<WheelState>().unwrap(), WheelState::Cash);
        assert_eq!("SHARES".parse::<WheelState>().unwrap(), WheelState::Shares);
        assert!("margin".parse::<WheelState>().is_err());
        assert_eq!(serde_json::to_string(&WheelState::Shares).unwrap(), "\"SHARES\"");
        assert_eq!(serde_json::to_string(&WheelAction::SellPut).unwrap(), "\"sell_put\"");
    }

    #[test]
    fn test_cycle_metrics_complete() {
        let m = WheelStrategy::calculate_cycle_metrics(&[150.0, 120.0, 130.0], Some(50.0), Some(55.0), 2, 1);
        assert!((m.total_premium - 400.0).abs() < 1e-9);
        assert_eq!(m.average_cost_basis, Some(46.0));
        let profit = m.net_profit.unwrap();
        assert!((profit - 900.0).abs() < 1e-9, "profit={profit}");
        assert!((m.return_on_acquisition_pct.unwrap() - 18.0).abs() < 1e-9);
        assert!(m.cycle_complete);
        assert_eq!((m.num_puts, m.num_calls), (2, 1));
    }

    #[test]
    fn test_cycle_metrics_open() {
        let m = WheelStrategy::calculate_cycle_metrics(&[150.0], Some(50.0), None, 1, 0);
        assert_eq!(m.average_cost_basis, Some(48.5));
        assert!(m.net_profit.is_none());
        assert!(!m.cycle_complete);

        let m = WheelStrategy::calculate_cycle_metrics(&[], None, Some(55.0), 0, 0);
        assert_eq!(m.total_premium, 0.0);
        assert!(m.average_cost_basis.is_none() && !m.cycle_complete);
    }
}
