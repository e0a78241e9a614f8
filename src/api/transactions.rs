use crate::api::pagination::{paged, CompleteQuery, PageQuery};
use crate::api::AppState;
use crate::db::TransactionFilter;
use crate::domain::Transaction;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;

pub async fn list_transactions(
    Query(page): Query<PageQuery>,
    Query(complete): Query<CompleteQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let page = page.page()?;
    let filter = TransactionFilter::default().complete(complete.filter()?);

    let total = state.repo.count_transactions(&filter).await?;
    let transactions = state.repo.list_transactions(&filter, page).await?;

    Ok(paged(total, transactions))
}

pub async fn get_transaction(
    Path(tx_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Transaction>, AppError> {
    state
        .repo
        .get_transaction(&tx_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", tx_id)))
}
