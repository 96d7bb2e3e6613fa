pub mod handlers;


use anyhow::Result;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::AppContext;
use handlers::{ask::ask_router, home::home_router, stats::stats_router};

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(home_router())
        .merge(ask_router(Arc::clone(&ctx)))
        .merge(stats_router(ctx))
}

pub async fn start_server<F>(ctx: Arc<AppContext>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on {}", listener.local_addr()?);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
