// =============================================================================
// Feed Client — mark-price WebSocket with reconnect, liveness, heartbeat
// =============================================================================
//
// Shape mirrors market_data::trade_stream's connect/read-loop/reconnect
// pattern: split the socket, loop on read.next(), treat a clean stream end
// the same as an error for reconnection purposes. On top of that this client
// adds a read-deadline, a periodic ping, and exponential backoff.
// =============================================================================

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binance::decoder::{decode_frame, MarkPriceEvent};

const MARK_PRICE_URL: &str = "wss://fstream.binance.com/ws/!markPrice@arr@1s";
const READ_DEADLINE: Duration = Duration::from_secs(60);
const PING_INTERVAL: Duration = Duration::from_secs(20);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_DECODE_FAILURE_SAMPLES: u32 = 3;

/// Aggregate counters surfaced by the optional heartbeat ticker.
#[derive(Default)]
pub struct FeedTelemetry {
    pub msgs: AtomicU64,
    pub events: AtomicU64,
    pub decode_failures: AtomicU64,
    pub last_msg_at_ms: AtomicI64,
    distinct_symbols: parking_lot::Mutex<std::collections::HashSet<String>>,
}

impl FeedTelemetry {
    pub fn new() -> Self {
        Self {
            last_msg_at_ms: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
            ..Default::default()
        }
    }

    fn note_message(&self) {
        self.msgs.fetch_add(1, Ordering::Relaxed);
        self.last_msg_at_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn note_events(&self, events: &[MarkPriceEvent]) {
        self.events.fetch_add(events.len() as u64, Ordering::Relaxed);
        let mut seen = self.distinct_symbols.lock();
        for e in events {
            seen.insert(e.symbol.clone());
        }
    }

    fn note_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn distinct_symbol_count(&self) -> usize {
        self.distinct_symbols.lock().len()
    }
}

/// Runs the mark-price feed until `cancel` fires, reconnecting with
/// exponential backoff on any disconnect. Decoded events are handed to
/// `on_event`.
pub async fn run_feed<F>(
    cancel: CancellationToken,
    telemetry: Arc<FeedTelemetry>,
    mut on_event: F,
) where
    F: FnMut(MarkPriceEvent),
{
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match run_once(&cancel, &telemetry, &mut on_event).await {
            Ok(()) => {
                backoff = INITIAL_BACKOFF;
            }
            Err(e) => {
                warn!(error = %e, backoff_secs = backoff.as_secs(), "mark price feed disconnected, backing off");
            }
        }

        if cancel.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn run_once<F>(
    cancel: &CancellationToken,
    telemetry: &Arc<FeedTelemetry>,
    on_event: &mut F,
) -> Result<()>
where
    F: FnMut(MarkPriceEvent),
{
    info!(url = MARK_PRICE_URL, "connecting to mark price feed");
    let (ws_stream, _response) = connect_async(MARK_PRICE_URL)
        .await
        .context("failed to connect to mark price websocket")?;
    info!("mark price feed connected");

    let (mut write, mut read) = ws_stream.split();

    let mut ping_ticker = interval(PING_INTERVAL);
    ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut decode_failure_samples = 0u32;
    let mut deadline = Instant::now() + READ_DEADLINE;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep_until(deadline) => {
                anyhow::bail!("no frames received within read deadline");
            }
            _ = ping_ticker.tick() => {
                if write.send(Message::Ping(Vec::new())).await.is_err() {
                    anyhow::bail!("failed to send application ping");
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        deadline = Instant::now() + READ_DEADLINE;
                        telemetry.note_message();
                        handle_frame(text.as_bytes(), telemetry, &mut decode_failure_samples, on_event);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        deadline = Instant::now() + READ_DEADLINE;
                        telemetry.note_message();
                        handle_frame(&bytes, telemetry, &mut decode_failure_samples, on_event);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        deadline = Instant::now() + READ_DEADLINE;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        deadline = Instant::now() + READ_DEADLINE;
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "mark price feed received close frame");
                        return Ok(());
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        anyhow::bail!("mark price feed read error: {e}");
                    }
                    None => {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn handle_frame<F>(
    bytes: &[u8],
    telemetry: &Arc<FeedTelemetry>,
    decode_failure_samples: &mut u32,
    on_event: &mut F,
) where
    F: FnMut(MarkPriceEvent),
{
    match decode_frame(bytes) {
        Ok(events) => {
            telemetry.note_events(&events);
            for event in events {
                on_event(event);
            }
        }
        Err(e) => {
            telemetry.note_decode_failure();
            if *decode_failure_samples < MAX_DECODE_FAILURE_SAMPLES {
                *decode_failure_samples += 1;
                let head: Vec<u8> = bytes.iter().take(32).copied().collect();
                let tail: Vec<u8> = bytes.iter().rev().take(32).rev().copied().collect();
                warn!(
                    error = %e,
                    head = %hex_preview(&head),
                    tail = %hex_preview(&tail),
                    "failed to decode mark price frame"
                );
            }
        }
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_tracks_distinct_symbols() {
        let telemetry = FeedTelemetry::new();
        telemetry.note_events(&[
            MarkPriceEvent { event_time_ms: 1, symbol: "BTCUSDT".into(), mark_price: 1.0 },
            MarkPriceEvent { event_time_ms: 2, symbol: "BTCUSDT".into(), mark_price: 1.1 },
            MarkPriceEvent { event_time_ms: 3, symbol: "ETHUSDT".into(), mark_price: 2.0 },
        ]);
        assert_eq!(telemetry.distinct_symbol_count(), 2);
        assert_eq!(telemetry.events.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn hex_preview_formats_bytes() {
        assert_eq!(hex_preview(&[0x1f, 0x8b]), "1f8b");
    }
}
