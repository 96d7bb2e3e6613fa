use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::pipeline::PipelineError;
use crate::utils::http::error_response;
use crate::AppContext;

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn ask_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

pub async fn ask(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Option<Json<AskRequest>>,
) -> impl IntoResponse {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    // An unreadable body is treated the same as a missing question.
    let question = body.as_ref().and_then(|Json(req)| req.question.as_deref());

    match ctx.pipeline.handle(api_key, question).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            if let PipelineError::Upstream(ref upstream) = e {
                error!("Upstream failure: {}", upstream);
            }
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, e.to_string())
        }
    }
}
