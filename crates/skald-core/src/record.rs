use serde::{Deserialize, Serialize};

use crate::timefmt;
use crate::types::Event;

/// One line of the trace wire format.
///
/// Everything except `type` is optional, and unknown extra fields are
/// ignored, so sources can carry their own metadata without breaking
/// older readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<TsValue>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

/// Timestamp as sources write it: RFC 3339 text or a bare epoch number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TsValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TsValue {
    /// Resolve to unix milliseconds; `None` for unparseable or out-of-range.
    pub fn to_ms(&self) -> Option<i64> {
        match self {
            TsValue::Int(n) => timefmt::epoch_to_ms(*n),
            TsValue::Float(n) => timefmt::epoch_f64_to_ms(*n),
            TsValue::Text(s) => timefmt::parse_rfc3339_ms(s),
        }
    }
}

impl TraceRecord {
    /// Wire form of an existing event, with a fresh sequence number.
    ///
    /// Depth hints are intentionally not carried: exported streams always
    /// describe structure through markers.
    pub fn from_event(seq: u64, ev: &Event) -> TraceRecord {
        TraceRecord {
            seq: Some(seq),
            ts: ev.ts.map(|ms| TsValue::Text(timefmt::format_rfc3339_ms(ms))),
            kind: ev.kind.as_wire().to_string(),
            agent: ev.agent.clone(),
            parent: ev.parent_hint.clone(),
            depth: None,
            payload: ev.payload.clone(),
        }
    }
}
