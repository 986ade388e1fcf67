// =============================================================================
// Config — environment-driven startup configuration
// =============================================================================
//
// Every tunable lives in one place so startup failure is a single, early,
// fatal `EngineError::ConfigError` rather than a panic deep in some task.
// Mirrors the defaulting discipline of the old file-based runtime config:
// every field has a sane default and an explicit override variable.
//
// =============================================================================

use std::time::Duration;

use tracing::warn;

use crate::types::{EngineError, EngineResult};

fn default_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_history_cap() -> usize {
    2000
}

fn default_cooldown_secs() -> u64 {
    30 * 60
}

fn default_refresh_daily_secs() -> u64 {
    3600
}

fn default_refresh_weekly_secs() -> u64 {
    3600
}

/// Engine-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub history_cap: usize,
    pub cooldown: Duration,
    pub refresh_interval_daily: Duration,
    pub refresh_interval_weekly: Duration,
    pub heartbeat_interval: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables, applying defaults and
    /// validating anything the operator supplied. A malformed value is
    /// treated as a fatal startup error rather than silently ignored.
    pub fn from_env() -> EngineResult<Self> {
        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| default_base_url());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| default_bind_addr());

        let allowed_origins = match std::env::var("ALLOWED_ORIGINS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => vec!["*".to_string()],
        };

        let history_cap = parse_env_or("HISTORY_CAP", default_history_cap())?;
        if history_cap == 0 {
            return Err(EngineError::ConfigError(
                "HISTORY_CAP must be greater than zero".to_string(),
            ));
        }

        let cooldown_secs: u64 = parse_env_or("COOLDOWN", default_cooldown_secs())?;
        let cooldown = if cooldown_secs == 0 {
            warn!("COOLDOWN was 0, coercing to default of 1800s");
            Duration::from_secs(default_cooldown_secs())
        } else {
            Duration::from_secs(cooldown_secs)
        };

        let refresh_daily: u64 = parse_env_or("REFRESH_INTERVAL_DAILY", default_refresh_daily_secs())?;
        let refresh_weekly: u64 =
            parse_env_or("REFRESH_INTERVAL_WEEKLY", default_refresh_weekly_secs())?;
        if refresh_daily == 0 || refresh_weekly == 0 {
            return Err(EngineError::ConfigError(
                "refresh intervals must be greater than zero".to_string(),
            ));
        }

        let heartbeat_secs: i64 = parse_env_or("HEARTBEAT_INTERVAL", 0i64)?;
        let heartbeat_interval = if heartbeat_secs > 0 {
            Some(Duration::from_secs(heartbeat_secs as u64))
        } else {
            None
        };

        if bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(EngineError::ConfigError(format!(
                "BIND_ADDR is not a valid socket address: {bind_addr}"
            )));
        }

        Ok(Self {
            base_url,
            bind_addr,
            allowed_origins,
            history_cap,
            cooldown,
            refresh_interval_daily: Duration::from_secs(refresh_daily),
            refresh_interval_weekly: Duration::from_secs(refresh_weekly),
            heartbeat_interval,
        })
    }

    /// True if the allow-list is the wildcard (empty input is normalised to `["*"]`).
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_env_or<T>(key: &str, default: T) -> EngineResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| EngineError::ConfigError(format!("{key}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
