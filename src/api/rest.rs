// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Routes: `/`, `/healthz`, `/api/history`, `/api/pivot-status`, `/api/sse`,
// `/static/*`. CORS echoes the request origin when it is in the configured
// allow-list (or sends `*` when the list is the wildcard); `OPTIONS` gets a
// bare 204.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::api::sse::sse_handler;
use crate::app_state::AppState;
use crate::signals::history::HistoryQuery;
use crate::types::{Direction, Level, Period};

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>pivot monitor</title></head>
<body>
<h1>pivot monitor</h1>
<p>Live signals: <code>GET /api/sse</code></p>
<p>History: <code>GET /api/history</code></p>
<p>Pivot status: <code>GET /api/pivot-status</code></p>
</body>
</html>"#;

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state.config.allowed_origins);

    Router::new()
        .route("/", get(dashboard))
        .route("/healthz", get(healthz))
        .route("/api/history", get(history))
        .route("/api/pivot-status", get(pivot_status))
        .route("/api/sse", get(sse_handler))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(cors)
        .with_state(state)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let allowed: Vec<String> = allowed_origins.to_vec();
    let wildcard = allowed.iter().any(|o| o == "*");

    let allow_origin = if wildcard {
        tower_http::cors::AllowOrigin::exact(HeaderValue::from_static("*"))
    } else {
        let origin_fn = move |origin: &HeaderValue, _req: &axum::http::request::Parts| {
            origin
                .to_str()
                .map(|o| allowed.iter().any(|a| a == o))
                .unwrap_or(false)
        };
        tower_http::cors::AllowOrigin::predicate(origin_fn)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .vary([axum::http::header::ORIGIN])
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true}))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub symbol: Option<String>,
    pub period: Option<String>,
    #[serde(default)]
    pub level: Vec<String>,
    pub levels: Option<String>,
    pub direction: Option<String>,
    pub source: Option<String>,
    pub limit: Option<i64>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let period = params.period.as_deref().and_then(|p| p.parse::<Period>().ok());

    let mut level_strs: Vec<String> = params.level.clone();
    if level_strs.is_empty() {
        if let Some(csv) = &params.levels {
            level_strs = csv.split(',').map(|s| s.trim().to_string()).collect();
        }
    }
    let levels: Vec<Level> = level_strs
        .iter()
        .filter_map(|s| {
            let parsed = s.parse::<Level>().ok();
            if parsed.is_none() && !s.is_empty() {
                warn!(level = %s, "ignoring unrecognised level filter");
            }
            parsed
        })
        .collect();

    let direction = params.direction.as_deref().and_then(|d| match d.to_ascii_lowercase().as_str() {
        "up" => Some(Direction::Up),
        "down" => Some(Direction::Down),
        _ => None,
    });

    let query = HistoryQuery {
        symbol: params.symbol,
        period,
        levels: if levels.is_empty() { None } else { Some(levels) },
        direction,
        source: params.source,
        limit: params.limit.unwrap_or(0),
    };

    Json(state.history.query(&query)).into_response()
}

async fn pivot_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let daily = state.store.status(Period::Daily);
    let weekly = state.store.status(Period::Weekly);
    Json(serde_json::json!({ "daily": daily, "weekly": weekly }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_params_default_to_none() {
        let params = HistoryParams::default();
        assert!(params.symbol.is_none());
        assert!(params.level.is_empty());
    }
}
