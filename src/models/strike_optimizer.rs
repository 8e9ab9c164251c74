use crate::errors::{WheelError, WheelResult};
use crate::market::types::OptionType;
use crate::models::{ProbabilityMethod, ProbabilityResult, StrikeProfile};
use statrs::distribution::{ContinuousCDF, Normal};

/// Calendar days per year used to scale volatility to the option's life.
const DAYS_PER_YEAR: f64 = 365.0;

/// Upper bounds (exclusive) of |sigma| for each profile band.
const AGGRESSIVE_MAX_SIGMA: f64 = 0.5;
const MODERATE_MAX_SIGMA: f64 = 1.0;
const CONSERVATIVE_MAX_SIGMA: f64 = 2.0;

/// Strike probability engine.
///
/// sigma_distance = ln(K/S) / (vol * sqrt(T))   for calls
/// sigma_distance = ln(S/K) / (vol * sqrt(T))   for puts
/// P(ITM)         = Phi(-sigma_distance)
///
/// where T = days_to_expiry / 365. The distance is positive for out-of-the-money
/// strikes on either side, so both sides share one banding policy.
/// Holds only the standard normal; safe to share across threads.
#[derive(Debug, Clone)]
pub struct StrikeOptimizer {
    normal: Normal,
}

impl Default for StrikeOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StrikeOptimizer {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    /// Number of standard deviations the strike sits from spot.
    /// Callers pass `max(1, dte)`; this function does not clamp.
    pub fn get_sigma_for_strike(
        &self,
        strike: f64,
        current_price: f64,
        volatility: f64,
        days_to_expiry: i64,
        option_type: OptionType,
    ) -> WheelResult<f64> {
        if !volatility.is_finite() || volatility <= 0.0 {
            return Err(WheelError::Model(format!(
                "volatility must be positive, got {volatility}"
            )));
        }
        if days_to_expiry <= 0 {
            return Err(WheelError::Model(format!(
                "days to expiry must be positive, got {days_to_expiry}"
            )));
        }
        if !(strike.is_finite() && strike > 0.0 && current_price.is_finite() && current_price > 0.0) {
            return Err(WheelError::Model(format!(
                "strike and price must be positive, got strike={strike} price={current_price}"
            )));
        }

        let sigma_sqrt_t = volatility * (days_to_expiry as f64 / DAYS_PER_YEAR).sqrt();
        let ln_k_s = (strike / current_price).ln();

        let distance = match option_type {
            OptionType::Call => ln_k_s / sigma_sqrt_t,
            OptionType::Put => -ln_k_s / sigma_sqrt_t,
        };
        Ok(distance)
    }

    /// Probability that the option finishes in the money at expiry.
    pub fn calculate_assignment_probability(
        &self,
        strike: f64,
        current_price: f64,
        volatility: f64,
        days_to_expiry: i64,
        option_type: OptionType,
    ) -> WheelResult<ProbabilityResult> {
        let sigma_distance =
            self.get_sigma_for_strike(strike, current_price, volatility, days_to_expiry, option_type)?;

        let probability = self.normal.cdf(-sigma_distance).clamp(0.0, 1.0);

        Ok(ProbabilityResult {
            probability,
            sigma_distance,
            method: ProbabilityMethod::LognormalCdf,
            volatility,
            days_to_expiry,
        })
    }

    /// Bands |sigma| into a profile. Total over f64: non-finite input is far out of range.
    pub fn get_profile_for_sigma(&self, sigma_distance: f64) -> StrikeProfile {
        let s = sigma_distance.abs();
        if s < AGGRESSIVE_MAX_SIGMA {
            StrikeProfile::Aggressive
        } else if s < MODERATE_MAX_SIGMA {
            StrikeProfile::Moderate
        } else if s < CONSERVATIVE_MAX_SIGMA {
            StrikeProfile::Conservative
        } else {
            StrikeProfile::FarOutOfRange
        }
    }

    /// Standard normal CDF, shared with the risk analyzer's profit probabilities.
    #[inline]
    pub fn cdf(&self, x: f64) -> f64 {
        self.normal.cdf(x)
    }
}
