use super::auth::TokenProvider;
use super::types::*;
use crate::config::BrokerConfig;
use crate::errors::{WheelError, WheelResult};
use crate::market::types::{OptionsChain, PriceSeries, Quote};
use crate::market::MarketDataSource;
use reqwest::Client;
use std::time::Duration;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;

/// Delay before retry number `attempt` (0-based): 500 ms doubling, capped at 8 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

/// Throttling and server-side failures are worth another attempt.
#[inline]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Brokerage market-data client. All methods return Result, never panic.
#[derive(Clone)]
pub struct BrokerClient<P: TokenProvider> {
    client: Client,
    base_url: String,
    tokens: P,
    max_retries: u32,
}

impl<P: TokenProvider> BrokerClient<P> {
    pub fn new(config: &BrokerConfig, tokens: P) -> WheelResult<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .pool_max_idle_per_host(4)
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            max_retries: config.max_retries,
        })
    }

    /// Bearer-authenticated GET. Retries network errors, 429 and 5xx with backoff;
    /// any other failure status is returned immediately.
    async fn auth_get<T: serde::de::DeserializeOwned>(&self, path: &str) -> WheelResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let token = self.tokens.get_access_token().await?;
            let result = self.client.get(&url).bearer_auth(&token).send().await;

            let err = match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<T>()
                            .await
                            .map_err(|e| WheelError::Parse(format!("GET {path}: {e}")));
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = WheelError::BrokerApi {
                        status: status.as_u16(),
                        body,
                    };
                    if !is_retryable_status(status.as_u16()) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => WheelError::from(e),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            let delay = backoff_delay(attempt);
            tracing::warn!(
                path = %path,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "broker request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get_chain_response(&self, symbol: &str) -> WheelResult<ChainResponse> {
        let mut parts: smallvec::SmallVec<[String; 3]> = smallvec::SmallVec::new();
        parts.push(format!("symbol={}", symbol.to_ascii_uppercase()));
        parts.push("contractType=ALL".into());
        parts.push("includeUnderlyingQuote=true".into());
        self.auth_get(&format!("/marketdata/v1/chains?{}", parts.join("&"))).await
    }

    pub async fn get_quotes_response(&self, symbol: &str) -> WheelResult<QuotesResponse> {
        self.auth_get(&format!(
            "/marketdata/v1/quotes?symbols={}&fields=quote",
            symbol.to_ascii_uppercase()
        ))
        .await
    }

    pub async fn get_price_history_response(&self, symbol: &str) -> WheelResult<PriceHistoryResponse> {
        let mut parts: smallvec::SmallVec<[String; 5]> = smallvec::SmallVec::new();
        parts.push(format!("symbol={}", symbol.to_ascii_uppercase()));
        parts.push("periodType=month".into());
        parts.push("period=3".into());
        parts.push("frequencyType=daily".into());
        parts.push("frequency=1".into());
        self.auth_get(&format!("/marketdata/v1/pricehistory?{}", parts.join("&"))).await
    }
}

impl<P: TokenProvider> MarketDataSource for BrokerClient<P> {
    async fn get_option_chain(&self, symbol: &str) -> WheelResult<OptionsChain> {
        let chain = self
            .get_chain_response(symbol)
            .await?
            .into_chain(symbol, chrono::Utc::now())?;
        tracing::info!(symbol = %chain.symbol, contracts = chain.contracts.len(), "chain fetched");
        Ok(chain)
    }

    async fn get_quote(&self, symbol: &str) -> WheelResult<Quote> {
        quote_from_response(self.get_quotes_response(symbol).await?, symbol)
    }

    async fn get_price_history(&self, symbol: &str) -> WheelResult<PriceSeries> {
        self.get_price_history_response(symbol).await?.into_series(symbol)
    }
}
