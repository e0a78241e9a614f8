//! CoinPaprika ticker.

use super::{get_json, usable, DataSourceError, PriceSource};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://api.coinpaprika.com/v1/tickers/smh-spacemesh";

#[derive(Debug, Clone)]
pub struct CoinPaprikaSource {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl CoinPaprikaSource {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn default_url() -> Self {
        Self::new(DEFAULT_URL.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    quotes: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<f64>,
}

fn extract_price(response: &TickerResponse) -> Option<Decimal> {
    response
        .quotes
        .get("USD")
        .and_then(|q| q.price)
        .and_then(Decimal::from_f64)
        .and_then(usable)
}

#[async_trait]
impl PriceSource for CoinPaprikaSource {
    fn name(&self) -> &'static str {
        "coinpaprika"
    }

    async fn fetch_usd_price(&self) -> Result<Option<Decimal>, DataSourceError> {
        debug!(url = %self.url, "Fetching price from coinpaprika");
        let response: TickerResponse = get_json(&self.client, &self.url, self.max_elapsed).await?;
        Ok(extract_price(&response))
    }
}
