use anyhow::Context;
use meshstate::config::PriceProvider;
use meshstate::datasource::{CoinPaprikaSource, PriceSource, XtSource};
use meshstate::orchestration::seed_from_file;
use meshstate::{
    api, db::init_db, Broker, Config, EventDecoder, EventProcessor, JetStreamBroker,
    MemoryBroker, NetworkStateCache, PriceResolver, Repository, Subject, SubscriptionManager,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    if let Some(path) = &config.genesis_accounts_file {
        let seeded = seed_from_file(&repo, path, &config.network_hrp)
            .await
            .with_context(|| format!("Failed to seed genesis accounts from {}", path))?;
        tracing::info!(path = %path, seeded, "Genesis accounts seeded");
    }

    let broker: Arc<dyn Broker> = match &config.nats_url {
        Some(url) => Arc::new(
            JetStreamBroker::connect(url)
                .await
                .with_context(|| format!("Failed to connect to {}", url))?,
        ),
        None => {
            tracing::warn!("NATS_URL not set, using in-memory broker");
            Arc::new(MemoryBroker::new())
        }
    };

    let processor = EventProcessor::new(
        EventDecoder::new(config.network_hrp.clone()),
        Arc::clone(&repo),
        config.poison_redelivery_threshold,
    );
    let subscriptions =
        SubscriptionManager::new(broker, processor, config.subscription_config())
            .start(&Subject::ALL)
            .await
            .context("Failed to start subscriptions")?;

    let paprika: Arc<dyn PriceSource> = Arc::new(CoinPaprikaSource::default_url());
    let xt: Arc<dyn PriceSource> = Arc::new(XtSource::default_url());
    let (primary, fallback) = match config.price_provider {
        PriceProvider::CoinPaprika => (paprika, xt),
        PriceProvider::Xt => (xt, paprika),
    };
    let price = Arc::new(PriceResolver::new(primary, Some(fallback)));
    let price_task = price.start(Duration::from_secs(config.price_refresh_secs));

    let network = Arc::new(NetworkStateCache::new(
        Arc::clone(&repo),
        price,
        config.network_params(),
    ));
    let network_task = network.start(Duration::from_secs(config.state_refresh_secs));

    let app = api::create_router(api::AppState::new(
        Arc::clone(&repo),
        network,
        config.network_hrp.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down background tasks");
    subscriptions.stop().await;
    network_task.stop().await;
    price_task.stop().await;
    repo.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
