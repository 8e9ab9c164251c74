pub mod calendar;
pub mod types;

use crate::errors::WheelResult;
use std::future::Future;
use types::{OptionsChain, PriceSeries, Quote};

/// Anything that can supply chains, quotes and daily history for an underlying.
/// The analytics core never calls this directly; the binary wires it in.
pub trait MarketDataSource: Send + Sync {
    fn get_option_chain(&self, symbol: &str) -> impl Future<Output = WheelResult<OptionsChain>> + Send;

    fn get_quote(&self, symbol: &str) -> impl Future<Output = WheelResult<Quote>> + Send;

    fn get_price_history(&self, symbol: &str) -> impl Future<Output = WheelResult<PriceSeries>> + Send;
}
