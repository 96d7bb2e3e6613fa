use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use crate::utils::http::error_response;
use crate::AppContext;

pub fn stats_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .with_state(ctx)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_requests: u64,
    pub stats: BTreeMap<String, u64>,
}

pub async fn stats(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    match ctx.usage.summarize().await {
        Ok(summary) => {
            let response = StatsResponse {
                total_requests: summary.total_requests,
                stats: summary.counts_by_tier,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to summarize usage log: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
