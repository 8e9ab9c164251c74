use crate::errors::{WheelError, WheelResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Option side ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            other => Err(WheelError::Validation(format!("unknown option type: {other}"))),
        }
    }
}

// ── Contract snapshot ──

/// One listed option as quoted by the market data source.
/// A zero bid means nobody is bidding (illiquid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub expiration_date: NaiveDate,
    pub strike: f64,
    pub option_type: OptionType,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(default)]
    pub implied_volatility: f64,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub gamma: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub vega: f64,
}

impl OptionContract {
    #[inline]
    pub fn has_bid(&self) -> bool {
        self.bid.is_finite() && self.bid > 0.0
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Bid-ask spread as a percentage of the midpoint. None without a usable mid.
    pub fn spread_pct(&self) -> Option<f64> {
        let mid = self.mid();
        if mid <= 0.0 || !mid.is_finite() || self.ask < self.bid {
            return None;
        }
        Some((self.ask - self.bid) / mid * 100.0)
    }

    /// Strictly out of the money: calls above spot, puts below.
    #[inline]
    pub fn is_otm(&self, spot: f64) -> bool {
        match self.option_type {
            OptionType::Call => self.strike > spot,
            OptionType::Put => self.strike < spot,
        }
    }
}

// ── Chain ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsChain {
    pub symbol: String,
    pub contracts: Vec<OptionContract>,
    pub retrieved_at: DateTime<Utc>,
}

impl OptionsChain {
    /// Builds a chain, rejecting contracts written on another underlying.
    pub fn new(
        symbol: impl Into<String>,
        contracts: Vec<OptionContract>,
        retrieved_at: DateTime<Utc>,
    ) -> WheelResult<Self> {
        let symbol = symbol.into();
        if let Some(stray) = contracts.iter().find(|c| !c.symbol.eq_ignore_ascii_case(&symbol)) {
            return Err(WheelError::Validation(format!(
                "contract on {} does not belong to chain {symbol}",
                stray.symbol
            )));
        }
        Ok(Self {
            symbol,
            contracts,
            retrieved_at,
        })
    }

    /// Distinct expirations, ascending.
    pub fn expirations(&self) -> Vec<NaiveDate> {
        self.expirations_where(|_| true)
    }

    /// Earliest expiration on or after `as_of`; the earliest overall when all have passed.
    pub fn nearest_expiration(&self, as_of: NaiveDate) -> Option<NaiveDate> {
        nearest_on_or_after(&self.expirations(), as_of)
    }

    /// Same as `nearest_expiration`, looking only at one side of the chain.
    pub fn nearest_expiration_of(&self, option_type: OptionType, as_of: NaiveDate) -> Option<NaiveDate> {
        nearest_on_or_after(&self.expirations_where(|c| c.option_type == option_type), as_of)
    }

    fn expirations_where(&self, keep: impl Fn(&OptionContract) -> bool) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .contracts
            .iter()
            .filter(|c| keep(c))
            .map(|c| c.expiration_date)
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    pub fn contracts_of(&self, option_type: OptionType) -> impl Iterator<Item = &OptionContract> {
        self.contracts.iter().filter(move |c| c.option_type == option_type)
    }
}

/// `dates` must be ascending.
fn nearest_on_or_after(dates: &[NaiveDate], as_of: NaiveDate) -> Option<NaiveDate> {
    dates
        .iter()
        .copied()
        .find(|d| *d >= as_of)
        .or_else(|| dates.first().copied())
}

// ── Underlying quote / history ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Last trade, falling back to the midpoint when no trade printed.
    pub fn price(&self) -> f64 {
        if self.last > 0.0 {
            self.last
        } else {
            (self.bid + self.ask) / 2.0
        }
    }
}

/// Daily closes, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::contract;
    use super::*;

    #[test]
    fn test_spread_pct() {
        let c = contract(OptionType::Call, 105.0, 1.90, 2.10);
        let pct = c.spread_pct().unwrap();
        assert!((pct - 10.0).abs() < 1e-9, "spread pct={pct}");

        let empty = contract(OptionType::Call, 105.0, 0.0, 0.0);
        assert!(empty.spread_pct().is_none());
    }

    #[test]
    fn test_otm_by_side() {
        assert!(contract(OptionType::Call, 105.0, 1.0, 1.1).is_otm(100.0));
        assert!(!contract(OptionType::Call, 100.0, 1.0, 1.1).is_otm(100.0));
        assert!(contract(OptionType::Put, 95.0, 1.0, 1.1).is_otm(100.0));
        assert!(!contract(OptionType::Put, 100.0, 1.0, 1.1).is_otm(100.0));
    }

    #[test]
    fn test_chain_rejects_foreign_symbol() {
        let mut stray = contract(OptionType::Call, 105.0, 1.0, 1.1);
        stray.symbol = "ABC".into();
        let result = OptionsChain::new("XYZ", vec![stray], Utc::now());
        assert!(matches!(result, Err(WheelError::Validation(_))));
    }

    #[test]
    fn test_nearest_expiration_skips_expired() {
        let mut old = contract(OptionType::Call, 105.0, 1.0, 1.1);
        old.expiration_date = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        let mut near = contract(OptionType::Call, 105.0, 1.0, 1.1);
        near.expiration_date = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        let far = contract(OptionType::Call, 110.0, 1.0, 1.1);

        let chain = OptionsChain::new("XYZ", vec![far, near, old], Utc::now()).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(chain.nearest_expiration(as_of), NaiveDate::from_ymd_opt(2026, 10, 23));
        assert_eq!(chain.expirations().len(), 3);

        let later = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(chain.nearest_expiration(later), NaiveDate::from_ymd_opt(2026, 10, 9));
    }

    #[test]
    fn test_nearest_expiration_per_side() {
        let mut put = contract(OptionType::Put, 95.0, 1.0, 1.1);
        put.expiration_date = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        let call = contract(OptionType::Call, 105.0, 1.0, 1.1);

        let chain = OptionsChain::new("XYZ", vec![put, call], Utc::now()).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(chain.nearest_expiration(as_of), NaiveDate::from_ymd_opt(2026, 10, 23));
        assert_eq!(chain.nearest_expiration_of(OptionType::Put, as_of), NaiveDate::from_ymd_opt(2026, 10, 23));
        assert_eq!(chain.nearest_expiration_of(OptionType::Call, as_of), NaiveDate::from_ymd_opt(2026, 11, 20));

        let empty = OptionsChain::new("XYZ", Vec::new(), Utc::now()).unwrap();
        assert!(empty.nearest_expiration_of(OptionType::Call, as_of).is_none());
    }

    #[test]
    fn test_option_type_parse() {
        assert_eq!("CALL".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("p".parse::<OptionType>().unwrap(), OptionType::Put);
        assert!("straddle".parse::<OptionType>().is_err());
    }
}
