pub mod checks;
pub mod covered_call;
pub mod covered_put;
pub mod wheel;

use crate::market::types::{OptionContract, OptionType, OptionsChain};
use crate::models::strike_optimizer::StrikeOptimizer;
use crate::models::StrikeProfile;
use chrono::NaiveDate;
use serde::Serialize;

/// Probability context for one contract.
/// Missing volatility or a degenerate horizon leaves it unavailable instead of failing the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbabilityAssessment {
    Computed {
        probability: f64,
        sigma_distance: f64,
        profile: StrikeProfile,
    },
    Unavailable {
        reason: String,
    },
}

impl ProbabilityAssessment {
    /// Runs the optimizer with days floored at 1.
    pub fn assess(
        optimizer: &StrikeOptimizer,
        strike: f64,
        current_price: f64,
        volatility: f64,
        days_to_expiry: i64,
        option_type: OptionType,
    ) -> Self {
        match optimizer.calculate_assignment_probability(
            strike,
            current_price,
            volatility,
            days_to_expiry.max(1),
            option_type,
        ) {
            Ok(r) => Self::Computed {
                probability: r.probability,
                sigma_distance: r.sigma_distance,
                profile: optimizer.get_profile_for_sigma(r.sigma_distance),
            },
            Err(e) => {
                tracing::debug!(strike = strike, error = %e, "probability unavailable");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            Self::Computed { probability, .. } => Some(*probability),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn sigma_distance(&self) -> Option<f64> {
        match self {
            Self::Computed { sigma_distance, .. } => Some(*sigma_distance),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn profile(&self) -> Option<StrikeProfile> {
        match self {
            Self::Computed { profile, .. } => Some(*profile),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Options for ranking a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub shares: u32,
    pub cost_basis: Option<f64>,
    /// Expiration to consider; the chain's nearest when unset
    pub expiration: Option<NaiveDate>,
    pub profile: Option<StrikeProfile>,
    /// Tradability gate: contracts bidding below this are never candidates
    pub min_premium: f64,
    pub limit: usize,
    pub earnings_dates: Vec<NaiveDate>,
    pub ex_dividend_dates: Vec<NaiveDate>,
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            shares: 100,
            cost_basis: None,
            expiration: None,
            profile: None,
            min_premium: 0.05,
            limit: 5,
            earnings_dates: Vec::new(),
            ex_dividend_dates: Vec::new(),
        }
    }
}

/// Tradable out-of-the-money contracts of one side at a single expiration.
/// Everything returned passes the analyzers' validation.
pub(crate) fn select_candidates<'a>(
    chain: &'a OptionsChain,
    option_type: OptionType,
    current_price: f64,
    request: &RecommendationRequest,
    as_of: NaiveDate,
) -> Vec<&'a OptionContract> {
    let expiration = request
        .expiration
        .or_else(|| chain.nearest_expiration_of(option_type, as_of));
    let Some(expiration) = expiration else {
        return Vec::new();
    };

    let candidates: Vec<&OptionContract> = chain
        .contracts_of(option_type)
        .filter(|c| c.expiration_date == expiration)
        .filter(|c| c.is_otm(current_price))
        .filter(|c| c.has_bid() && c.bid >= request.min_premium)
        .collect();

    tracing::debug!(
        symbol = %chain.symbol,
        side = %option_type,
        expiration = %expiration,
        candidates = candidates.len(),
        "chain filtered"
    );

    candidates
}
