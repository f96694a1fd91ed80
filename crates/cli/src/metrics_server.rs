//! Prometheus scrape endpoint.

use std::net::SocketAddr;

use {
    anyhow::Context,
    axum::{
        Router,
        extract::State,
        http::header,
        response::IntoResponse,
        routing::get,
    },
    quietrelay_metrics::MetricsHandle,
    tokio::{net::TcpListener, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn router(handle: MetricsHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(handle)
}

async fn metrics_handler(State(handle): State<MetricsHandle>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], handle.render())
}

/// Bind `addr` and serve `/metrics` until `cancel` fires. Binding happens
/// before this returns, so a taken port fails startup.
pub async fn start(
    addr: SocketAddr,
    handle: MetricsHandle,
    cancel: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint on {addr}"))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "serving prometheus metrics on /metrics");

    let task = tokio::spawn(async move {
        let served = axum::serve(listener, router(handle))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "metrics endpoint stopped");
        }
    });
    Ok((local, task))
}
