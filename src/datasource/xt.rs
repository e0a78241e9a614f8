//! XT exchange 24h ticker.

use super::{get_json, usable, DataSourceError, PriceSource};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://www.xt.com/sapi/v4/market/public/ticker/24h?symbol=smh_usdt";

#[derive(Debug, Clone)]
pub struct XtSource {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl XtSource {
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
    result: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    /// Last traded price, as a decimal string.
    c: Option<String>,
}

fn extract_price(response: &TickerResponse) -> Option<Decimal> {
    response
        .result
        .first()
        .and_then(|t| t.c.as_deref())
        .and_then(|c| Decimal::from_str(c.trim()).ok())
        .and_then(usable)
}

#[async_trait]
impl PriceSource for XtSource {
    fn name(&self) -> &'static str {
        "xt"
    }

    async fn fetch_usd_price(&self) -> Result<Option<Decimal>, DataSourceError> {
        debug!(url = %self.url, "Fetching price from xt");
        let response: TickerResponse = get_json(&self.client, &self.url, self.max_elapsed).await?;
        Ok(extract_price(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_ticker() {
        let response: TickerResponse =
            serde_json::from_str(r#"{"rc":0,"result":[{"s":"smh_usdt","c":"0.812"}]}"#).unwrap();
        assert_eq!(
            extract_price(&response),
            Some(Decimal::from_str("0.812").unwrap())
        );
    }

    #[test]
    fn test_unparseable_or_empty_is_none() {
        let response: TickerResponse =
            serde_json::from_str(r#"{"result":[{"c":"n/a"}]}"#).unwrap();
        assert_eq!(extract_price(&response), None);

        let response: TickerResponse = serde_json::from_str(r#"{"result":[]}"#).unwrap();
        assert_eq!(extract_price(&response), None);
    }
}
