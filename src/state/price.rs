//! Periodically refreshed USD price with provider fallback.

use crate::datasource::{DataSourceError, PriceSource};
use crate::orchestration::BackgroundTask;
use arc_swap::ArcSwap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Last resolved price. Never zero: a missing price is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceQuote {
    Known(Decimal),
    #[default]
    Unknown,
}

impl PriceQuote {
    pub fn usd(&self) -> Option<Decimal> {
        match self {
            PriceQuote::Known(p) => Some(*p),
            PriceQuote::Unknown => None,
        }
    }
}

#[derive(Debug)]
pub struct PriceResolver {
    primary: Arc<dyn PriceSource>,
    fallback: Option<Arc<dyn PriceSource>>,
    current: ArcSwap<PriceQuote>,
}

impl PriceResolver {
    pub fn new(primary: Arc<dyn PriceSource>, fallback: Option<Arc<dyn PriceSource>>) -> Self {
        Self {
            primary,
            fallback,
            current: ArcSwap::from_pointee(PriceQuote::Unknown),
        }
    }

    pub fn current(&self) -> PriceQuote {
        **self.current.load()
    }

    /// Query the primary provider, then the fallback.
    ///
    /// A provider that answers without a usable price clears the quote. When
    /// every provider fails outright the previous quote is kept.
    pub async fn refresh(&self) -> PriceQuote {
        let mut answered = false;
        let sources = std::iter::once(&self.primary).chain(self.fallback.iter());

        for source in sources {
            match source.fetch_usd_price().await {
                Ok(Some(price)) => {
                    debug!(source = source.name(), price = %price, "Price resolved");
                    let quote = PriceQuote::Known(price);
                    self.current.store(Arc::new(quote));
                    return quote;
                }
                Ok(None) => {
                    answered = true;
                    warn!(source = source.name(), "Provider returned no usable price");
                }
                Err(e) => log_failure(source.name(), &e),
            }
        }

        if answered {
            self.current.store(Arc::new(PriceQuote::Unknown));
        }
        self.current()
    }

    /// Refresh now, then every `interval` until stopped.
    pub fn start(self: &Arc<Self>, interval: Duration) -> BackgroundTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let resolver = Arc::clone(self);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Price refresh started");
            loop {
                resolver.refresh().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Price refresh stopped");
        });

        BackgroundTask::new("price", shutdown_tx, vec![handle])
    }
}

fn log_failure(source: &str, error: &DataSourceError) {
    warn!(source, error = %error, "Price fetch failed");
}
