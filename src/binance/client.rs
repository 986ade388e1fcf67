// =============================================================================
// Binance REST API Client — read-only usdt-perpetual endpoints
// =============================================================================
//
// Unlike a trading bot's client, this one never signs a request: it only
// reads the public `exchangeInfo` and `klines` endpoints needed to keep the
// pivot store up to date.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

/// A single prior completed bar's OHLC, as read from `klines`.
#[derive(Debug, Clone, Copy)]
pub struct PriorBar {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Binance USDT-M futures REST client, public endpoints only.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// GET /fapi/v1/exchangeInfo filtered to tradable USDT perpetuals.
    #[instrument(skip(self), name = "binance::exchange_info_usdt_perp")]
    pub async fn exchange_info_usdt_perp(&self) -> Result<Vec<String>> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v1/exchangeInfo request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse exchangeInfo response")?;

        if !status.is_success() {
            anyhow::bail!(
                "Binance GET /fapi/v1/exchangeInfo returned {}: {}",
                status,
                body
            );
        }

        let symbols = body["symbols"]
            .as_array()
            .context("exchangeInfo response missing symbols array")?;

        let mut out = Vec::with_capacity(symbols.len());
        for entry in symbols {
            let status = entry["status"].as_str().unwrap_or_default();
            let contract_type = entry["contractType"].as_str().unwrap_or_default();
            let quote_asset = entry["quoteAsset"].as_str().unwrap_or_default();
            let symbol = entry["symbol"].as_str().unwrap_or_default();

            if status == "TRADING" && contract_type == "PERPETUAL" && quote_asset == "USDT" {
                out.push(symbol.to_string());
            }
        }

        debug!(count = out.len(), "usdt perpetual universe refreshed");
        Ok(out)
    }

    /// GET /fapi/v1/klines?limit=2, returning the last *completed* bar (the
    /// second-to-last element; the last element is still in progress).
    #[instrument(skip(self), name = "binance::prior_bar")]
    pub async fn prior_bar(&self, symbol: &str, interval: &str) -> Result<PriorBar> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit=2",
            self.base_url, symbol, interval
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v1/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /fapi/v1/klines returned {}: {}", status, body);
        }

        let raw = body.as_array().context("klines response is not an array")?;
        if raw.len() < 2 {
            anyhow::bail!("not enough klines returned for {symbol} ({interval})");
        }

        let bar = &raw[raw.len() - 2];
        let arr = bar.as_array().context("kline entry is not an array")?;
        if arr.len() < 5 {
            warn!(symbol, interval, "malformed kline entry, too few fields");
            anyhow::bail!("malformed kline entry for {symbol}");
        }

        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;

        Ok(PriorBar { high, low, close })
    }
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_str_f64_accepts_string_and_number() {
        assert_eq!(parse_str_f64(&serde_json::json!("1.5")).unwrap(), 1.5);
        assert_eq!(parse_str_f64(&serde_json::json!(2.5)).unwrap(), 2.5);
        assert!(parse_str_f64(&serde_json::json!(null)).is_err());
    }
}
