use crate::engine::{EligibilityParams, SubsidyParams};
use crate::orchestration::SubscriptionConfig;
use crate::state::NetworkParams;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// JetStream server. `None` runs on the in-memory broker.
    pub nats_url: Option<String>,
    pub fetch_batch_size: usize,
    pub fetch_wait_ms: u64,
    pub worker_concurrency: usize,
    pub poison_redelivery_threshold: u64,
    pub state_refresh_secs: u64,
    pub price_provider: PriceProvider,
    pub price_refresh_secs: u64,
    pub network_hrp: String,
    pub layers_per_epoch: u32,
    pub layer_duration_secs: u64,
    pub genesis_time_secs: i64,
    pub layer_size: u32,
    pub min_active_weight: u64,
    pub min_active_weight_early: u64,
    pub min_active_weight_cutoff_epoch: u32,
    pub genesis_accounts_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceProvider {
    CoinPaprika,
    Xt,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or::<u16>(&env_map, "PORT", "8080", "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let nats_url = non_empty(&env_map, "NATS_URL");

        let fetch_batch_size =
            parse_or::<usize>(&env_map, "FETCH_BATCH_SIZE", "10", "must be a valid usize")?;
        let fetch_wait_ms =
            parse_or::<u64>(&env_map, "FETCH_WAIT_MS", "5000", "must be a valid u64")?;
        let worker_concurrency =
            parse_or::<usize>(&env_map, "WORKER_CONCURRENCY", "4", "must be a valid usize")?;
        if fetch_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_BATCH_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_CONCURRENCY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let poison_redelivery_threshold = parse_or::<u64>(
            &env_map,
            "POISON_REDELIVERY_THRESHOLD",
            "20",
            "must be a valid u64",
        )?;
        let state_refresh_secs =
            parse_or::<u64>(&env_map, "STATE_REFRESH_SECS", "60", "must be a valid u64")?;

        let price_provider = match env_map
            .get("PRICE_PROVIDER")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
            .unwrap_or("coinpaprika")
        {
            "coinpaprika" => PriceProvider::CoinPaprika,
            "xt" => PriceProvider::Xt,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PRICE_PROVIDER".to_string(),
                    format!("must be coinpaprika or xt, got {}", other),
                ))
            }
        };
        let price_refresh_secs =
            parse_or::<u64>(&env_map, "PRICE_REFRESH_SECS", "900", "must be a valid u64")?;

        let network_hrp = env_map
            .get("NETWORK_HRP")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "sm".to_string());
        if network_hrp.is_empty() {
            return Err(ConfigError::InvalidValue(
                "NETWORK_HRP".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let layers_per_epoch =
            parse_or::<u32>(&env_map, "LAYERS_PER_EPOCH", "4032", "must be a valid u32")?;
        if layers_per_epoch == 0 {
            return Err(ConfigError::InvalidValue(
                "LAYERS_PER_EPOCH".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let layer_duration_secs =
            parse_or::<u64>(&env_map, "LAYER_DURATION_SECS", "300", "must be a valid u64")?;
        let genesis_time_secs =
            parse_or::<i64>(&env_map, "GENESIS_TIME_SECS", "1689321600", "must be a valid i64")?;
        let layer_size = parse_or::<u32>(&env_map, "LAYER_SIZE", "50", "must be a valid u32")?;
        let min_active_weight = parse_or::<u64>(
            &env_map,
            "MIN_ACTIVE_WEIGHT",
            "7879129244",
            "must be a valid u64",
        )?;
        let min_active_weight_early = parse_or::<u64>(
            &env_map,
            "MIN_ACTIVE_WEIGHT_EARLY",
            "107467138",
            "must be a valid u64",
        )?;
        let min_active_weight_cutoff_epoch = parse_or::<u32>(
            &env_map,
            "MIN_ACTIVE_WEIGHT_CUTOFF_EPOCH",
            "8",
            "must be a valid u32",
        )?;

        let genesis_accounts_file = non_empty(&env_map, "GENESIS_ACCOUNTS_FILE");

        Ok(Config {
            port,
            database_path,
            nats_url,
            fetch_batch_size,
            fetch_wait_ms,
            worker_concurrency,
            poison_redelivery_threshold,
            state_refresh_secs,
            price_provider,
            price_refresh_secs,
            network_hrp,
            layers_per_epoch,
            layer_duration_secs,
            genesis_time_secs,
            layer_size,
            min_active_weight,
            min_active_weight_early,
            min_active_weight_cutoff_epoch,
            genesis_accounts_file,
        })
    }

    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            batch_size: self.fetch_batch_size,
            fetch_wait: Duration::from_millis(self.fetch_wait_ms),
            concurrency: self.worker_concurrency,
        }
    }

    pub fn network_params(&self) -> NetworkParams {
        NetworkParams {
            layers_per_epoch: self.layers_per_epoch,
            layer_duration_secs: self.layer_duration_secs,
            genesis_time_secs: self.genesis_time_secs,
            eligibility: EligibilityParams {
                layer_size: self.layer_size,
                layers_per_epoch: self.layers_per_epoch,
                min_active_weight: self.min_active_weight,
                min_active_weight_early: self.min_active_weight_early,
                min_weight_cutoff_epoch: self.min_active_weight_cutoff_epoch,
            },
            subsidy: SubsidyParams {
                layers_per_epoch: self.layers_per_epoch,
                ..SubsidyParams::default()
            },
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), expected.to_string()))
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
