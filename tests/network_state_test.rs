use meshstate::datasource::{DataSourceError, MockPriceSource};
use meshstate::db::init_db;
use meshstate::domain::{Epoch, LayerStatusEvent};
use meshstate::engine::SubsidySchedule;
use meshstate::state::{NetworkParams, NetworkStateCache, PriceQuote, PriceResolver};
use meshstate::Repository;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_background_refresh_publishes_and_stops() {
    let (repo, _temp) = setup_repo().await;
    let price = Arc::new(PriceResolver::new(Arc::new(MockPriceSource::default()), None));
    let cache = Arc::new(NetworkStateCache::new(
        Arc::clone(&repo),
        price,
        NetworkParams::default(),
    ));

    let task = cache.start(Duration::from_millis(20));
    assert_eq!(task.name(), "network-state");

    // Nothing processed yet: the slot stays empty.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.snapshot().is_none());

    repo.apply_layer_status(&LayerStatusEvent {
        layer: 8064,
        status: 3,
    })
    .await
    .unwrap();
    wait_for(|| cache.snapshot().is_some()).await;
    task.stop().await;

    let snapshot = cache.snapshot().unwrap();
    assert_eq!(snapshot.layer, 8064);
    assert_eq!(snapshot.epoch, 2);
    assert_eq!(snapshot.total_slots, None);
    assert_eq!(snapshot.highest_activation, None);

    let schedule = SubsidySchedule::new(NetworkParams::default().subsidy);
    assert_eq!(snapshot.epoch_subsidy, schedule.epoch_subsidy(Epoch::new(2)));
    assert_eq!(snapshot.circulating_supply, schedule.vested(8064));
}

#[tokio::test]
async fn test_snapshots_are_replaced_whole() {
    let (repo, _temp) = setup_repo().await;
    let price = Arc::new(PriceResolver::new(Arc::new(MockPriceSource::default()), None));
    let cache = NetworkStateCache::new(Arc::clone(&repo), price, NetworkParams::default());

    repo.apply_layer_status(&LayerStatusEvent { layer: 1, status: 3 })
        .await
        .unwrap();
    let first = cache.refresh().await.unwrap();

    repo.apply_layer_status(&LayerStatusEvent { layer: 2, status: 3 })
        .await
        .unwrap();
    let second = cache.refresh().await.unwrap();

    assert_eq!(first.layer, 1);
    assert_eq!(second.layer, 2);
    assert!(Arc::ptr_eq(&cache.snapshot().unwrap(), &second));
}

#[tokio::test]
async fn test_price_refresh_loop_uses_fallback() {
    let primary =
        MockPriceSource::new("primary").with_error(DataSourceError::NetworkError("down".into()));
    let fallback = MockPriceSource::new("fallback").with_price(Decimal::new(42, 2));
    let resolver = Arc::new(PriceResolver::new(
        Arc::new(primary.clone()),
        Some(Arc::new(fallback.clone())),
    ));

    let task = resolver.start(Duration::from_secs(3600));
    wait_for(|| resolver.current() != PriceQuote::Unknown).await;
    task.stop().await;

    assert_eq!(resolver.current(), PriceQuote::Known(Decimal::new(42, 2)));
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}
