// =============================================================================
// Pivot Refresher — periodic rebuild of a period's snapshot
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::binance::client::BinanceClient;
use crate::pivot::calculator::Levels;
use crate::pivot::store::{Snapshot, Store};
use crate::types::Period;

const MAX_CONCURRENT_FETCHES: usize = 8;

/// Runs one refresh pass for `period`: enumerate the tradable universe, fetch
/// each symbol's prior completed bar, compute levels, and install whatever
/// succeeded as a new Snapshot. A per-symbol failure is logged and skipped;
/// it never aborts the whole pass.
pub async fn refresh_once(client: &BinanceClient, store: &Store, period: Period) {
    let symbols = match client.exchange_info_usdt_perp().await {
        Ok(symbols) => symbols,
        Err(e) => {
            warn!(error = %e, ?period, "failed to fetch symbol universe, skipping refresh");
            return;
        }
    };

    if symbols.is_empty() {
        warn!(?period, "symbol universe was empty, keeping previous snapshot");
        return;
    }

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
    let mut tasks = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let client = client.clone();
        let semaphore = semaphore.clone();
        let interval = period.interval();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            match client.prior_bar(&symbol, interval).await {
                Ok(bar) => match Levels::calculate(bar.high, bar.low, bar.close) {
                    Ok(levels) => Some((symbol, levels)),
                    Err(e) => {
                        warn!(symbol, ?period, error = %e, "invalid OHLC range, skipping symbol");
                        None
                    }
                },
                Err(e) => {
                    debug!(symbol, ?period, error = %e, "failed to fetch prior bar, skipping symbol");
                    None
                }
            }
        }));
    }

    let mut symbols_map = HashMap::with_capacity(tasks.len());
    for task in tasks {
        if let Ok(Some((symbol, levels))) = task.await {
            symbols_map.insert(symbol, levels);
        }
    }

    if symbols_map.is_empty() {
        warn!(?period, "refresh produced no usable symbols, keeping previous snapshot");
        return;
    }

    let count = symbols_map.len();
    match store.swap(Snapshot::new(period, symbols_map)) {
        Ok(()) => debug!(?period, symbol_count = count, "pivot snapshot refreshed"),
        Err(e) => warn!(?period, error = e, "failed to install refreshed snapshot"),
    }
}

/// Runs `refresh_once` on a fixed interval until `cancel` fires, performing
/// one refresh immediately on start.
pub async fn run_refresher(
    client: BinanceClient,
    store: Arc<Store>,
    period: Period,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                refresh_once(&client, &store, period).await;
            }
        }
    }
}
