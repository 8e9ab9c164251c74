use crate::errors::{WheelError, WheelResult};
use std::path::PathBuf;
use std::str::FromStr;

/// Data-quality thresholds shared by every analyzer.
/// Built once and handed to each analyzer at construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AnalyzerThresholds {
    /// Premium (bid) below this triggers a low-premium warning.
    pub min_bid_price: f64,
    /// Open interest below this triggers a liquidity warning.
    pub min_open_interest: u64,
    /// Bid-ask spread above this (% of mid) triggers a wide-spread warning.
    pub max_bid_ask_spread_pct: f64,
    /// Assignment probability at or above this is flagged.
    pub high_assignment_probability: f64,
    /// Put strikes within this % of spot count as near the money for ex-dividend risk.
    pub ex_dividend_near_money_pct: f64,
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self {
            min_bid_price: 0.10,
            min_open_interest: 100,
            max_bid_ask_spread_pct: 10.0,
            high_assignment_probability: 0.40,
            ex_dividend_near_money_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AnalyzerConfig {
    pub risk_free_rate: f64,
    pub thresholds: AnalyzerThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            thresholds: AnalyzerThresholds::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> WheelResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = AnalyzerThresholds::default();
        let thresholds = AnalyzerThresholds {
            min_bid_price: env_parse("MIN_BID_PRICE", defaults.min_bid_price)?,
            min_open_interest: env_parse("MIN_OPEN_INTEREST", defaults.min_open_interest)?,
            max_bid_ask_spread_pct: env_parse(
                "MAX_BID_ASK_SPREAD_PCT",
                defaults.max_bid_ask_spread_pct,
            )?,
            high_assignment_probability: env_parse(
                "HIGH_ASSIGNMENT_PROBABILITY",
                defaults.high_assignment_probability,
            )?,
            ex_dividend_near_money_pct: env_parse(
                "EX_DIVIDEND_NEAR_MONEY_PCT",
                defaults.ex_dividend_near_money_pct,
            )?,
        };

        if !(0.0..=1.0).contains(&thresholds.high_assignment_probability) {
            return Err(WheelError::Config(
                "HIGH_ASSIGNMENT_PROBABILITY must be within [0, 1]".into(),
            ));
        }

        Ok(Self {
            risk_free_rate: env_parse("RISK_FREE_RATE", 0.05)?,
            thresholds,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub base_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_path: PathBuf,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl BrokerConfig {
    pub fn from_env() -> WheelResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            base_url: env_var_or("BROKER_BASE_URL", "https://api.schwabapi.com"),
            auth_url: env_var_or(
                "BROKER_AUTH_URL",
                "https://api.schwabapi.com/v1/oauth/authorize",
            ),
            token_url: env_var_or(
                "BROKER_TOKEN_URL",
                "https://api.schwabapi.com/v1/oauth/token",
            ),
            client_id: env_var("BROKER_CLIENT_ID")?,
            client_secret: env_var("BROKER_CLIENT_SECRET")?,
            redirect_uri: env_var_or("BROKER_REDIRECT_URI", "https://127.0.0.1"),
            token_path: PathBuf::from(env_var_or("BROKER_TOKEN_PATH", "tokens.json")),
            timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 10)?,
            max_retries: env_parse("HTTP_MAX_RETRIES", 3)?,
        })
    }
}

fn env_var(key: &str) -> WheelResult<String> {
    std::env::var(key).map_err(|_| WheelError::Config(format!("missing env var: {key}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> WheelResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| WheelError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let t = AnalyzerThresholds::default();
        assert_eq!(t.min_open_interest, 100);
        assert!((t.min_bid_price - 0.10).abs() < 1e-12);
        assert!((t.max_bid_ask_spread_pct - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_env_parse_reports_variable() {
        std::env::set_var("WHEELHOUSE_TEST_BAD_FLOAT", "not-a-number");
        let err = env_parse::<f64>("WHEELHOUSE_TEST_BAD_FLOAT", 1.0).unwrap_err();
        assert!(err.to_string().contains("WHEELHOUSE_TEST_BAD_FLOAT"), "got {err}");
        std::env::remove_var("WHEELHOUSE_TEST_BAD_FLOAT");
    }

    #[test]
    fn test_env_parse_falls_back_to_default() {
        let v = env_parse::<u32>("WHEELHOUSE_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(v, 7);
    }
}
