// =============================================================================
// Pivot Monitor — Main Entry Point
// =============================================================================
//
// Wires together the Feed Client, the per-period Refreshers, the HTTP/SSE
// server, and an optional heartbeat ticker, then waits for Ctrl-C to shut
// everything down via a shared cancellation token.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod broker;
mod config;
mod pivot;
mod signals;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::Config;
use crate::types::Period;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("pivot monitor starting up");

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    info!(
        bind_addr = %config.bind_addr,
        base_url = %config.base_url,
        history_cap = config.history_cap,
        "configuration loaded"
    );

    let state = AppState::new(config);
    let cancel = CancellationToken::new();

    // ── Pivot refreshers, one per period ──────────────────────────────────
    for period in Period::ALL {
        let client = state.binance.clone();
        let store = state.store.clone();
        let interval = match period {
            Period::Daily => state.config.refresh_interval_daily,
            Period::Weekly => state.config.refresh_interval_weekly,
        };
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pivot::refresher::run_refresher(client, store, period, interval, cancel).await;
        });
    }

    // ── Feed client ────────────────────────────────────────────────────────
    let telemetry = Arc::new(binance::feed::FeedTelemetry::new());
    {
        let telemetry = telemetry.clone();
        let detector_state = state.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            binance::feed::run_feed(cancel, telemetry, move |event| {
                let mut detector = detector_state.detector.lock().unwrap();
                let ts = chrono::DateTime::from_timestamp_millis(event.event_time_ms)
                    .unwrap_or_else(chrono::Utc::now);
                detector.on_price(&event.symbol, event.mark_price, ts);
            })
            .await;
        });
    }

    // ── Optional heartbeat telemetry ──────────────────────────────────────
    if let Some(heartbeat_interval) = state.config.heartbeat_interval {
        let telemetry = telemetry.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        use std::sync::atomic::Ordering;
                        let last_msg_ago_ms = chrono::Utc::now().timestamp_millis()
                            - telemetry.last_msg_at_ms.load(Ordering::Relaxed);
                        info!(
                            msgs = telemetry.msgs.load(Ordering::Relaxed),
                            events = telemetry.events.load(Ordering::Relaxed),
                            decode_failures = telemetry.decode_failures.load(Ordering::Relaxed),
                            last_msg_ago_ms,
                            distinct_symbols = telemetry.distinct_symbol_count(),
                            "feed heartbeat"
                        );
                    }
                }
            }
        });
    }

    // ── HTTP/SSE server ────────────────────────────────────────────────────
    let bind_addr = state.config.bind_addr.clone();
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "http server listening");

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_cancel.cancelled().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping gracefully");
    cancel.cancel();

    if let Err(e) = server.await {
        error!(error = %e, "http server task panicked during shutdown");
    }

    Ok(())
}
