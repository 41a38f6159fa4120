//! History handlers: time-ranged, limit-bounded reads from the sink.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::acquisition::parse_timestamp;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::HISTORY_DEFAULT_LIMIT;
use crate::pipeline::AppState;
use crate::storage::{HistoryQuery, PersistenceError};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// RFC 3339 (or unix seconds), inclusive
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub source: Option<String>,
    /// Events only
    pub resolved: Option<bool>,
}

impl HistoryParams {
    fn to_query(&self) -> Result<HistoryQuery, String> {
        let from = self
            .from
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| format!("from: {e}"))?;
        let to = self
            .to
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| format!("to: {e}"))?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err("'from' must not be after 'to'".to_string());
            }
        }
        Ok(HistoryQuery {
            from,
            to,
            limit: self.limit.unwrap_or(HISTORY_DEFAULT_LIMIT),
            source: self.source.clone(),
            resolved: self.resolved,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryPage<T: Serialize> {
    pub count: usize,
    pub limit: usize,
    pub items: Vec<T>,
}

fn page<T: Serialize>(query: &HistoryQuery, result: Result<Vec<T>, PersistenceError>) -> Response {
    match result {
        Ok(items) => ApiResponse::ok(HistoryPage {
            count: items.len(),
            limit: query.effective_limit(),
            items,
        }),
        Err(e) => {
            tracing::error!(error = %e, "History query failed");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

/// GET /api/v2/history/readings
pub async fn history_readings(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(msg) => return ApiErrorResponse::bad_request(msg),
    };
    page(&query, state.sink.list_readings(&query))
}

/// GET /api/v2/history/inferences
pub async fn history_inferences(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(msg) => return ApiErrorResponse::bad_request(msg),
    };
    page(&query, state.sink.list_inferences(&query))
}

/// GET /api/v2/history/events
pub async fn history_events(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(msg) => return ApiErrorResponse::bad_request(msg),
    };
    page(&query, state.sink.list_events(&query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_to_query() {
        let params = HistoryParams {
            from: Some("2024-01-01T00:00:00Z".into()),
            to: Some("2024-01-02T00:00:00Z".into()),
            limit: Some(5000),
            source: None,
            resolved: Some(false),
        };
        let q = params.to_query().unwrap();
        assert!(q.from.is_some() && q.to.is_some());
        assert_eq!(q.effective_limit(), 1000);
        assert_eq!(q.resolved, Some(false));
    }

    #[test]
    fn test_params_reject_inverted_range() {
        let params = HistoryParams {
            from: Some("2024-01-02T00:00:00Z".into()),
            to: Some("2024-01-01T00:00:00Z".into()),
            ..HistoryParams::default()
        };
        assert!(params.to_query().is_err());
    }

    #[test]
    fn test_params_reject_bad_timestamp() {
        let params = HistoryParams {
            from: Some("yesterday".into()),
            ..HistoryParams::default()
        };
        assert!(params.to_query().unwrap_err().starts_with("from:"));
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(HistoryParams::default().to_query().unwrap().limit, HISTORY_DEFAULT_LIMIT);
    }
}
