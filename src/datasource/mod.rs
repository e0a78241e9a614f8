//! External USD price sources.

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

pub mod coinpaprika;
pub mod mock;
pub mod xt;

pub use coinpaprika::CoinPaprikaSource;
pub use mock::MockPriceSource;
pub use xt::XtSource;

/// A provider of the token's USD price.
///
/// Implementations retry transient failures themselves.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Provider name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the current USD price.
    ///
    /// # Returns
    /// `None` when the provider answered but carried no usable price.
    async fn fetch_usd_price(&self) -> Result<Option<Decimal>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 404 unknown ticker, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

/// GET `url` and decode the JSON body, retrying rate limits, server errors
/// and network failures with exponential backoff.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    max_elapsed: Duration,
) -> Result<T, DataSourceError> {
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    retry(backoff, || async {
        let response = client.get(url).send().await.map_err(|e| {
            backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
        })?;

        let status = response.status();
        if status == 429 {
            return Err(backoff::Error::transient(DataSourceError::RateLimited));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            }));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Client error".to_string(),
            }));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
    })
    .await
}

/// Only strictly positive prices are usable.
pub(crate) fn usable(price: Decimal) -> Option<Decimal> {
    (price > Decimal::ZERO).then_some(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 404,
            message: "Client error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 404: Client error");

        assert_eq!(DataSourceError::RateLimited.to_string(), "Rate limited");
    }

    #[test]
    fn test_usable_price() {
        assert_eq!(usable(Decimal::new(12, 1)), Some(Decimal::new(12, 1)));
        assert_eq!(usable(Decimal::ZERO), None);
        assert_eq!(usable(Decimal::new(-1, 0)), None);
    }
}
