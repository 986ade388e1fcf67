// =============================================================================
// SSE Surface — GET /api/sse
// =============================================================================
//
// Shape mirrors api::ws's connect/select!/cleanup pattern, adapted to a
// text/event-stream body instead of a binary WebSocket: a keep-alive comment
// every 15s, and a forwarded `event: signal` line per published Signal.
// =============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{extract::State, response::IntoResponse};
use futures_util::stream;
use tracing::debug;

use crate::app_state::AppState;

const SSE_BUFFER: usize = 256;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub async fn sse_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let subscription = state.broker.subscribe(SSE_BUFFER);

    let greeting = Event::default().comment(format!("connected {}", chrono::Utc::now().to_rfc3339()));
    let hello = stream::once(async move { Ok::<_, Infallible>(greeting) });

    let signals = stream::unfold(subscription, move |mut sub| async move {
        match sub.recv().await {
            Some(signal) => {
                let payload = serde_json::to_string(&signal).unwrap_or_default();
                let event = Event::default().event("signal").data(payload);
                Some((Ok::<_, Infallible>(event), sub))
            }
            None => {
                debug!("sse broker channel closed, ending stream");
                None
            }
        }
    });

    let stream = hello.chain(signals);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("ping"),
    )
}
