//! Offset/limit/sort query parameters and the `total` response header.

use crate::db::{Page, SortOrder};
use crate::error::AppError;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Header carrying the total count behind a paginated list.
pub const TOTAL_HEADER: HeaderName = HeaderName::from_static("total");

/// Raw pagination parameters. Kept as strings so malformed values produce a
/// JSON 400 instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> Result<Page, AppError> {
        let offset = match self.offset.as_deref() {
            None | Some("") => 0,
            Some(s) => s
                .parse::<i64>()
                .ok()
                .filter(|o| *o >= 0)
                .ok_or_else(|| AppError::BadRequest("offset must be an integer >= 0".into()))?,
        };

        let limit = match self.limit.as_deref() {
            None | Some("") => DEFAULT_LIMIT,
            Some(s) => s
                .parse::<i64>()
                .ok()
                .filter(|l| (1..=MAX_LIMIT).contains(l))
                .ok_or_else(|| {
                    AppError::BadRequest(format!("limit must be between 1 and {}", MAX_LIMIT))
                })?,
        };

        let sort = match self.sort.as_deref() {
            None | Some("") | Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "sort must be asc or desc, got {}",
                    other
                )))
            }
        };

        Ok(Page {
            offset,
            limit,
            sort,
        })
    }
}

/// Optional inclusive layer bounds on reward lists.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRangeQuery {
    pub first_layer: Option<String>,
    pub last_layer: Option<String>,
}

impl LayerRangeQuery {
    pub fn bounds(&self) -> Result<(Option<u32>, Option<u32>), AppError> {
        let parse = |name: &str, value: Option<&str>| -> Result<Option<u32>, AppError> {
            match value {
                None | Some("") => Ok(None),
                Some(s) => s
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| AppError::BadRequest(format!("{} must be a layer number", name))),
            }
        };

        let first = parse("firstLayer", self.first_layer.as_deref())?;
        let last = parse("lastLayer", self.last_layer.as_deref())?;
        if let (Some(f), Some(l)) = (first, last) {
            if f > l {
                return Err(AppError::BadRequest(
                    "firstLayer must not exceed lastLayer".into(),
                ));
            }
        }
        Ok((first, last))
    }
}

/// `complete=true|false` filter on transaction lists; absent matches both.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteQuery {
    pub complete: Option<String>,
}

impl CompleteQuery {
    pub fn filter(&self) -> Result<Option<bool>, AppError> {
        match self.complete.as_deref() {
            None | Some("") => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(other) => Err(AppError::BadRequest(format!(
                "complete must be true or false, got {}",
                other
            ))),
        }
    }
}

/// JSON list response with the `total` header set.
pub fn paged<T: Serialize>(total: i64, items: Vec<T>) -> Response {
    let mut response = Json(items).into_response();
    response
        .headers_mut()
        .insert(TOTAL_HEADER, HeaderValue::from(total));
    response
}
