// =============================================================================
// Feed Decoder — tolerant parsing of mark-price frames
// =============================================================================
//
// The live `!markPrice@arr@1s` stream is mostly well-formed JSON, but in the
// wild frames show up compressed, wrapped, single-object, or with trailing
// garbage. This module tries, in order, the cheap interpretations first and
// falls back to decompression and truncation recovery before giving up.
// =============================================================================

use std::io::Read;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::EngineError;

/// One decoded mark-price update.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkPriceEvent {
    pub event_time_ms: i64,
    pub symbol: String,
    pub mark_price: f64,
}

/// Output cap for decompression, defending against a hostile or corrupt frame
/// expanding without bound.
const MAX_DECOMPRESSED_BYTES: usize = 10 * 1024 * 1024;

/// Decodes one raw WebSocket frame into zero or more mark-price events.
pub fn decode_frame(raw: &[u8]) -> Result<Vec<MarkPriceEvent>, EngineError> {
    let trimmed = trim_control_bytes(raw);

    let bytes = if looks_like_json(trimmed) {
        trimmed.to_vec()
    } else {
        decompress_cascade(trimmed)?
    };

    parse_events(&bytes).or_else(|_| {
        let salvaged = trim_to_last_bracket(&bytes);
        parse_events(salvaged)
    })
}

fn trim_control_bytes(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(0);
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace() && *b != 0)
        .map(|i| i + 1)
        .unwrap_or(raw.len());
    if start >= end {
        &[]
    } else {
        &raw[start..end]
    }
}

fn looks_like_json(bytes: &[u8]) -> bool {
    matches!(bytes.first(), Some(b'{') | Some(b'['))
}

fn decompress_cascade(bytes: &[u8]) -> Result<Vec<u8>, EngineError> {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        return read_capped(flate2::read::GzDecoder::new(bytes))
            .map_err(|e| EngineError::DecodeFailure(format!("gzip decompress failed: {e}")));
    }
    if !bytes.is_empty() && bytes[0] == 0x78 {
        if let Ok(out) = read_capped(flate2::read::ZlibDecoder::new(bytes)) {
            return Ok(out);
        }
    }
    read_capped(flate2::read::DeflateDecoder::new(bytes))
        .map_err(|e| EngineError::DecodeFailure(format!("deflate decompress failed: {e}")))
}

fn read_capped<R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut limited = (&mut reader).take(MAX_DECOMPRESSED_BYTES as u64 + 1);
    limited.read_to_end(&mut out)?;
    out.truncate(MAX_DECOMPRESSED_BYTES);
    Ok(out)
}

fn trim_to_last_bracket(bytes: &[u8]) -> &[u8] {
    let pos = bytes
        .iter()
        .rposition(|b| *b == b']' || *b == b'}')
        .map(|i| i + 1);
    match pos {
        Some(i) => &bytes[..i],
        None => bytes,
    }
}

fn parse_events(bytes: &[u8]) -> Result<Vec<MarkPriceEvent>, EngineError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| EngineError::DecodeFailure(format!("invalid JSON: {e}")))?;

    let raw_events: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(ref map) if map.contains_key("data") => map["data"]
            .as_array()
            .cloned()
            .ok_or_else(|| EngineError::DecodeFailure("\"data\" is not an array".to_string()))?,
        Value::Object(_) => vec![value],
        other => {
            return Err(EngineError::DecodeFailure(format!(
                "unexpected top-level JSON shape: {other}"
            )))
        }
    };

    let mut events = Vec::with_capacity(raw_events.len());
    for v in raw_events {
        let parsed = serde_json::from_value::<RawMarkPriceEvent>(v)
            .map_err(|e| EngineError::DecodeFailure(format!("bad event shape: {e}")))
            .and_then(MarkPriceEvent::try_from);
        match parsed {
            Ok(event) => events.push(event),
            Err(e) => warn!(error = %e, "skipping malformed event in frame"),
        }
    }
    Ok(events)
}

/// Mirrors the wire shape: `E` and `p` may arrive as either JSON numbers or
/// numeric strings depending on which relay forwarded the frame.
#[derive(Debug, Deserialize)]
struct RawMarkPriceEvent {
    #[serde(rename = "E")]
    event_time: NumberOrString,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    mark_price: NumberOrString,
}

impl TryFrom<RawMarkPriceEvent> for MarkPriceEvent {
    type Error = EngineError;

    fn try_from(raw: RawMarkPriceEvent) -> Result<Self, Self::Error> {
        Ok(MarkPriceEvent {
            event_time_ms: raw.event_time.as_i64().ok_or_else(|| {
                EngineError::DecodeFailure("event time is not numeric".to_string())
            })?,
            symbol: raw.symbol,
            mark_price: raw
                .mark_price
                .as_f64()
                .ok_or_else(|| EngineError::DecodeFailure("mark price is not numeric".to_string()))?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n as i64),
            NumberOrString::Text(s) => s.parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_array_of_events() {
        let frame = br#"[{"E":1690000000000,"s":"BTCUSDT","p":"65000.12"}]"#;
        let events = decode_frame(frame).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, "BTCUSDT");
        assert!((events[0].mark_price - 65000.12).abs() < 1e-9);
    }

    #[test]
    fn decodes_wrapped_data_object() {
        let frame = br#"{"stream":"!markPrice@arr@1s","data":[{"E":1,"s":"ETHUSDT","p":3000.5}]}"#;
        let events = decode_frame(frame).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, "ETHUSDT");
    }

    #[test]
    fn decodes_single_event_object() {
        let frame = br#"{"E":1,"s":"SOLUSDT","p":150}"#;
        let events = decode_frame(frame).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, "SOLUSDT");
    }

    #[test]
    fn recovers_from_trailing_garbage() {
        let mut frame = br#"[{"E":1,"s":"BTCUSDT","p":"1.0"}]"#.to_vec();
        frame.extend_from_slice(b"\x00\x00garbage-after-the-array");
        let events = decode_frame(&frame).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn decodes_gzip_compressed_frame() {
        let inner = br#"{"data":[{"E":1,"s":"BNBUSDT","p":"500.0"}]}"#;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(inner).unwrap();
        let compressed = encoder.finish().unwrap();

        let events = decode_frame(&compressed).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, "BNBUSDT");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_frame(b"not json at all").is_err());
    }

    #[test]
    fn skips_one_malformed_event_but_keeps_the_rest() {
        let frame = br#"[{"E":1,"s":"BTCUSDT","p":"1.0"},{"s":"ETHUSDT","p":"2.0"},{"E":3,"s":"SOLUSDT","p":"3.0"}]"#;
        let events = decode_frame(frame).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].symbol, "BTCUSDT");
        assert_eq!(events[1].symbol, "SOLUSDT");
    }
}
