use crate::market::types::OptionType;
use serde::Serialize;

/// Premium economics of one short option position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IncomeMetrics {
    pub option_type: OptionType,
    pub shares: u32,
    pub days_to_expiry: i64,
    pub total_premium: f64,
    /// Premium per share as % of spot
    pub premium_pct: f64,
    /// Stock value (call) or cash collateral (put)
    pub position_value: f64,
    /// Share cost basis (call) or effective purchase price if assigned (put)
    pub cost_basis: f64,
    pub breakeven: f64,
    pub max_profit: f64,
    pub max_loss: f64,
    pub return_if_flat_pct: f64,
    pub return_if_called_pct: f64,
    pub annualized_yield_pct: f64,
    pub annualized_if_called_pct: f64,
    pub downside_protection_pct: f64,
}

/// Probability-weighted view of the same position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub probability_itm: f64,
    pub probability_otm: f64,
    /// P(finish beyond breakeven on the profitable side)
    pub probability_profit: f64,
    /// P(max profit): called away (call) or expires worthless (put)
    pub probability_max_profit: f64,
    pub probability_loss: f64,
    pub expected_value: f64,
    pub expected_return_pct: f64,
    pub annualized_expected_return_pct: f64,
    pub opportunity_cost: f64,
    pub max_profit: f64,
    pub max_loss: f64,
    /// max_profit / max_loss; +inf when nothing can be lost
    pub risk_reward_ratio: f64,
    pub sharpe_ratio: f64,
}

/// Payoff at expiry for one hypothetical underlying price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub price: f64,
    pub price_change_pct: f64,
    pub assigned: bool,
    pub stock_pnl: f64,
    pub premium_income: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub buy_hold_pnl: f64,
    pub vs_buy_hold: f64,
}

/// Scenario table. Best/worst are indices into `outcomes`, never separate copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub option_type: OptionType,
    pub breakeven: f64,
    pub outcomes: Vec<ScenarioOutcome>,
    pub best_index: Option<usize>,
    pub worst_index: Option<usize>,
}

impl ScenarioResult {
    /// Picks best/worst by total_return_pct with a linear scan; first occurrence wins ties.
    pub(crate) fn from_outcomes(
        option_type: OptionType,
        breakeven: f64,
        outcomes: Vec<ScenarioOutcome>,
    ) -> Self {
        let mut best_index: Option<usize> = None;
        let mut worst_index: Option<usize> = None;

        for (i, o) in outcomes.iter().enumerate() {
            match best_index {
                Some(b) if o.total_return_pct <= outcomes[b].total_return_pct => {}
                _ => best_index = Some(i),
            }
            match worst_index {
                Some(w) if o.total_return_pct >= outcomes[w].total_return_pct => {}
                _ => worst_index = Some(i),
            }
        }

        Self {
            option_type,
            breakeven,
            outcomes,
            best_index,
            worst_index,
        }
    }

    pub fn best(&self) -> Option<&ScenarioOutcome> {
        self.best_index.and_then(|i| self.outcomes.get(i))
    }

    pub fn worst(&self) -> Option<&ScenarioOutcome> {
        self.worst_index.and_then(|i| self.outcomes.get(i))
    }

    pub fn at_price(&self, price: f64) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| (o.price - price).abs() < 1e-9)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CoveredCall,
    CashSecuredPut,
}

/// Income, risk and scenario detail for one candidate, plus warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedAnalysis {
    pub strategy: StrategyKind,
    pub income: IncomeMetrics,
    pub risk: RiskMetrics,
    pub scenarios: Option<ScenarioResult>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyPick {
    CoveredCall,
    CashSecuredPut,
    Either,
}

impl std::fmt::Display for StrategyPick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoveredCall => write!(f, "covered_call"),
            Self::CashSecuredPut => write!(f, "cash_secured_put"),
            Self::Either => write!(f, "either"),
        }
    }
}

/// Side-by-side expected-value comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub covered_call: CombinedAnalysis,
    pub cash_secured_put: CombinedAnalysis,
    pub recommendation: StrategyPick,
    /// Call EV minus put EV; positive favours the covered call
    pub ev_difference: f64,
    pub reason: String,
}
