use crate::api::pagination::{paged, CompleteQuery, LayerRangeQuery, PageQuery};
use crate::api::{epoch_layers, parse_epoch, AppState, Eligibility};
use crate::db::{RewardFilter, TransactionFilter};
use crate::domain::{Account, Address, Epoch};
use crate::engine::ONE_COIN;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub reward_count: i64,
    pub transaction_count: i64,
    /// Balance in USD at the last resolved price; absent while the price is unknown.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub usd_value: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDetailsResponse {
    pub address: String,
    pub total_rewards: i64,
    pub total_count: i64,
    /// Rewards earned in the current epoch so far.
    pub epoch_rewards: i64,
    pub epoch_count: i64,
    pub eligibility: Eligibility,
}

fn parse_address(state: &AppState, raw: &str) -> Result<Address, AppError> {
    Address::parse(raw, &state.hrp)
        .map_err(|e| AppError::BadRequest(format!("invalid address: {}", e)))
}

fn usd_value(balance: i64, price: Option<Decimal>) -> Option<Decimal> {
    let coins = Decimal::from(balance).checked_div(Decimal::from(ONE_COIN))?;
    coins.checked_mul(price?)
}

pub async fn get_account(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, AppError> {
    let address = parse_address(&state, &address)?;

    let account = state
        .repo
        .get_account(address.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {} not found", address)))?;

    let reward_count = state
        .repo
        .count_rewards(&RewardFilter::coinbase(address.as_str()))
        .await?;
    let transaction_count = state
        .repo
        .count_transactions(&TransactionFilter::account(address.as_str()))
        .await?;
    let price = state.network.price().current().usd();

    Ok(Json(AccountResponse {
        usd_value: usd_value(account.balance, price),
        account,
        reward_count,
        transaction_count,
    }))
}

pub async fn get_rewards(
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
    Query(range): Query<LayerRangeQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let address = parse_address(&state, &address)?;
    let page = page.page()?;
    let (first, last) = range.bounds()?;

    let filter = RewardFilter::coinbase(address.as_str()).layers(first, last);
    let total = state.repo.count_rewards(&filter).await?;
    let rewards = state.repo.list_rewards(&filter, page).await?;

    Ok(paged(total, rewards))
}

pub async fn get_reward_details(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RewardDetailsResponse>, AppError> {
    let address = parse_address(&state, &address)?;
    let snapshot = state.snapshot()?;
    let epoch = Epoch::new(snapshot.epoch);
    let (first, last) = epoch_layers(&state, epoch)?;

    let all = RewardFilter::coinbase(address.as_str());
    let (total_rewards, total_count) = state.repo.sum_rewards(&all).await?;
    let (epoch_rewards, epoch_count) = state
        .repo
        .sum_rewards(&all.clone().layers(Some(first), Some(last)))
        .await?;

    let (weight, units, _) = state
        .repo
        .account_epoch_weight(address.as_str(), epoch.prev().as_u32())
        .await?;

    Ok(Json(RewardDetailsResponse {
        address: address.to_string(),
        total_rewards,
        total_count,
        epoch_rewards,
        epoch_count,
        eligibility: Eligibility::for_snapshot(&state, &snapshot, weight, units),
    }))
}

pub async fn get_transactions(
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
    Query(complete): Query<CompleteQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let address = parse_address(&state, &address)?;
    let page = page.page()?;
    let filter = TransactionFilter::account(address.as_str()).complete(complete.filter()?);

    let total = state.repo.count_transactions(&filter).await?;
    let transactions = state.repo.list_transactions(&filter, page).await?;

    Ok(paged(total, transactions))
}

/// Activations of the account that are active in `epoch`, i.e. published
/// in the epoch before it.
pub async fn get_activations(
    Path((address, epoch)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let address = parse_address(&state, &address)?;
    let epoch = parse_epoch(&epoch)?;
    let page = page.page()?;

    let publish_epoch = epoch.prev().as_u32();
    let total = state
        .repo
        .count_activations(publish_epoch, Some(address.as_str()))
        .await?;
    let activations = state
        .repo
        .list_activations(publish_epoch, Some(address.as_str()), page)
        .await?;

    Ok(paged(total, activations))
}
