use crate::errors::{WheelError, WheelResult};
use crate::market::calendar;
use crate::market::types::{OptionContract, OptionType, OptionsChain, PriceSeries, Quote};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Expiration key ("2026-11-20:35") -> strike key ("105.0") -> contracts.
pub type ExpDateMap = BTreeMap<String, BTreeMap<String, Vec<WireOptionContract>>>;

// ── Option chain ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub symbol: Option<String>,
    pub status: Option<String>,
    pub underlying_price: Option<f64>,
    #[serde(default)]
    pub call_exp_date_map: ExpDateMap,
    #[serde(default)]
    pub put_exp_date_map: ExpDateMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOptionContract {
    pub put_call: Option<String>,
    pub symbol: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub total_volume: Option<u64>,
    pub open_interest: Option<u64>,
    /// Percent, with -999 standing in for "not computed"
    pub volatility: Option<f64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub strike_price: Option<f64>,
    pub expiration_date: Option<String>,
    pub days_to_expiration: Option<i64>,
}

/// Broker sentinels (-999, NaN) become zero in the domain.
#[inline]
fn finite_or_zero(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite() && *x > -999.0).unwrap_or(0.0)
}

impl WireOptionContract {
    fn into_contract(
        self,
        underlying: &str,
        option_type: OptionType,
        exp_key: &str,
        strike_key: &str,
    ) -> WheelResult<OptionContract> {
        let expiration_date = match self.expiration_date.as_deref() {
            Some(s) => calendar::parse_expiration(s)?,
            None => calendar::parse_expiration(exp_key)?,
        };
        let strike = match self.strike_price {
            Some(k) => k,
            None => strike_key
                .parse::<f64>()
                .map_err(|e| WheelError::Parse(format!("strike key {strike_key}: {e}")))?,
        };
        let iv = finite_or_zero(self.volatility);

        Ok(OptionContract {
            symbol: underlying.to_string(),
            expiration_date,
            strike,
            option_type,
            bid: finite_or_zero(self.bid).max(0.0),
            ask: finite_or_zero(self.ask).max(0.0),
            last: finite_or_zero(self.last).max(0.0),
            volume: self.total_volume.unwrap_or(0),
            open_interest: self.open_interest.unwrap_or(0),
            implied_volatility: if iv > 0.0 { iv / 100.0 } else { 0.0 },
            delta: finite_or_zero(self.delta),
            gamma: finite_or_zero(self.gamma),
            theta: finite_or_zero(self.theta),
            vega: finite_or_zero(self.vega),
        })
    }
}

impl ChainResponse {
    pub fn into_chain(self, requested: &str, retrieved_at: DateTime<Utc>) -> WheelResult<OptionsChain> {
        if matches!(self.status.as_deref(), Some("FAILED")) {
            return Err(WheelError::Parse(format!("chain request for {requested} failed")));
        }
        let symbol = self.symbol.unwrap_or_else(|| requested.to_string()).to_ascii_uppercase();

        let mut contracts = Vec::new();
        for (option_type, map) in [
            (OptionType::Call, self.call_exp_date_map),
            (OptionType::Put, self.put_exp_date_map),
        ] {
            for (exp_key, strikes) in map {
                for (strike_key, wires) in strikes {
                    for wire in wires {
                        contracts.push(wire.into_contract(&symbol, option_type, &exp_key, &strike_key)?);
                    }
                }
            }
        }

        tracing::debug!(symbol = %symbol, contracts = contracts.len(), "chain decoded");
        OptionsChain::new(symbol, contracts, retrieved_at)
    }
}

// ── Quotes ──

/// Keyed by symbol.
pub type QuotesResponse = HashMap<String, QuoteEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteEntry {
    pub symbol: Option<String>,
    pub quote: Option<WireQuote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuote {
    pub last_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub close_price: Option<f64>,
}

pub fn quote_from_response(mut resp: QuotesResponse, symbol: &str) -> WheelResult<Quote> {
    let key = resp
        .keys()
        .find(|k| k.eq_ignore_ascii_case(symbol))
        .cloned()
        .ok_or_else(|| WheelError::Parse(format!("no quote returned for {symbol}")))?;
    let wire = resp
        .remove(&key)
        .and_then(|e| e.quote)
        .ok_or_else(|| WheelError::Parse(format!("quote for {symbol} has no price block")))?;

    let last = finite_or_zero(wire.last_price);
    Ok(Quote {
        symbol: key,
        last: if last > 0.0 { last } else { finite_or_zero(wire.close_price) },
        bid: finite_or_zero(wire.bid_price),
        ask: finite_or_zero(wire.ask_price),
    })
}

// ── Price history ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryResponse {
    pub symbol: Option<String>,
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    /// Epoch milliseconds
    pub datetime: i64,
}

impl PriceHistoryResponse {
    /// Daily closes, oldest first. Candles without a close are skipped.
    pub fn into_series(self, requested: &str) -> WheelResult<PriceSeries> {
        let mut points: Vec<(NaiveDate, f64)> = self
            .candles
            .iter()
            .filter_map(|c| {
                let close = c.close.filter(|x| x.is_finite() && *x > 0.0)?;
                let date = DateTime::<Utc>::from_timestamp_millis(c.datetime)?.date_naive();
                Some((date, close))
            })
            .collect();
        points.sort_by_key(|(d, _)| *d);

        if points.is_empty() {
            return Err(WheelError::Parse(format!("no price history for {requested}")));
        }

        let (dates, closes) = points.into_iter().unzip();
        Ok(PriceSeries {
            symbol: self.symbol.unwrap_or_else(|| requested.to_string()),
            dates,
            closes,
        })
    }
}

// ── OAuth ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}
