pub mod strike_optimizer;
pub mod volatility;

use crate::errors::WheelError;
use serde::{Deserialize, Serialize};

/// Risk tier of a strike, derived purely from its sigma distance to spot.
/// Variants are ordered from closest to spot to farthest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrikeProfile {
    Aggressive,
    Moderate,
    Conservative,
    FarOutOfRange,
}

impl std::fmt::Display for StrikeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggressive => write!(f, "aggressive"),
            Self::Moderate => write!(f, "moderate"),
            Self::Conservative => write!(f, "conservative"),
            Self::FarOutOfRange => write!(f, "far_out_of_range"),
        }
    }
}

impl std::str::FromStr for StrikeProfile {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "moderate" => Ok(Self::Moderate),
            "conservative" => Ok(Self::Conservative),
            "far_out_of_range" | "far" => Ok(Self::FarOutOfRange),
            other => Err(WheelError::Validation(format!("unknown strike profile: {other}"))),
        }
    }
}

/// How a probability was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityMethod {
    /// Driftless lognormal terminal price, standard normal CDF over the sigma distance.
    LognormalCdf,
}

/// Assignment probability for one strike. Produced fresh per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    /// P(option finishes in the money), in [0, 1]
    pub probability: f64,
    /// Standard deviations between strike and spot, positive when out of the money
    pub sigma_distance: f64,
    pub method: ProbabilityMethod,
    pub volatility: f64,
    pub days_to_expiry: i64,
}
