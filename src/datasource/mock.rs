//! Mock price source for testing without network calls.

use super::{DataSourceError, PriceSource};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock price source that returns a predefined answer and counts calls.
#[derive(Debug, Clone)]
pub struct MockPriceSource {
    name: &'static str,
    result: Result<Option<Decimal>, DataSourceError>,
    calls: Arc<AtomicUsize>,
}

impl MockPriceSource {
    /// Create a mock that answers with no usable price.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            result: Ok(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer with `price`.
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.result = Ok(Some(price));
        self
    }

    /// Fail every fetch with `error`.
    pub fn with_error(mut self, error: DataSourceError) -> Self {
        self.result = Err(error);
        self
    }

    /// Number of fetches so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPriceSource {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_usd_price(&self) -> Result<Option<Decimal>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
