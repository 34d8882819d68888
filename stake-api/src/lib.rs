//! HTTP surface of the LABS staking ledger
//!
//! Thin axum layer over [`stake_ledger::Ledger`]: request bodies are
//! validated here, every state change is delegated to the ledger, and ledger
//! errors are rendered as `{"success": false, "error": {code, type, message}}`.

pub mod errors;
pub mod handlers;
pub mod models;

use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use stake_ledger::Ledger;
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use errors::{ApiError, Result};

/// Build the application router
pub fn router(ledger: Arc<Ledger>) -> Router {
    let state: AppState = ledger;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/api/users/connect", post(handlers::connect_wallet))
        .route("/api/users/update-balances", post(handlers::update_balances))
        .route("/api/users/update-pending", post(handlers::update_pending))
        .route("/api/users/:wallet", get(handlers::get_wallet))
        .route("/api/activity/stake", post(handlers::record_stake))
        .route("/api/activity/claim", post(handlers::record_claim))
        .route("/api/analytics/labs-staking", get(handlers::staking_series))
        .route("/api/analytics/xlabs-rewards", get(handlers::rewards_series))
        .route("/api/admin/update-apy", post(handlers::update_apy))
        .route("/api/config/reward-rate", get(handlers::get_reward_rate))
        .route("/api/stats/global", get(handlers::global_stats))
        .route("/api/stats/consistency", get(handlers::consistency))
        .route("/api/leaderboard/claimers", get(handlers::top_claimers))
        .route("/api/leaderboard/pending", get(handlers::top_pending))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain the ledger
///
/// In-flight requests finish first. Queued activity events are then flushed
/// and the writer is stopped, so a graceful stop never drops a batch.
pub async fn serve<F>(listener: TcpListener, ledger: Arc<Ledger>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(ledger.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Draining ledger");
    ledger.flush_batch().await?;
    ledger.shutdown().await?;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
