use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The record kinds a trace source can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Request,
    Response,
    ToolCall,
    ToolResult,
    Message,
    AgentStart,
    AgentEnd,
    Error,
}

impl EventKind {
    /// Wire name as it appears in a record's `type` field.
    pub fn as_wire(&self) -> &'static str {
        match self {
            EventKind::Request => "request",
            EventKind::Response => "response",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResult => "tool_result",
            EventKind::Message => "message",
            EventKind::AgentStart => "agent_start",
            EventKind::AgentEnd => "agent_end",
            EventKind::Error => "error",
        }
    }

    /// Parse a wire `type` value. Unknown kinds return `None`.
    pub fn from_wire(s: &str) -> Option<EventKind> {
        match s {
            "request" => Some(EventKind::Request),
            "response" => Some(EventKind::Response),
            "tool_call" => Some(EventKind::ToolCall),
            "tool_result" => Some(EventKind::ToolResult),
            "message" => Some(EventKind::Message),
            "agent_start" => Some(EventKind::AgentStart),
            "agent_end" => Some(EventKind::AgentEnd),
            "error" => Some(EventKind::Error),
            _ => None,
        }
    }

    /// True for the explicit sub-agent boundary markers.
    pub fn is_boundary(&self) -> bool {
        matches!(self, EventKind::AgentStart | EventKind::AgentEnd)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One decoded trace event.
///
/// Events are created by the decoder and not touched afterwards, except
/// that the reconstructor fills a missing `ts` by imputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Source sequence number. Non-decreasing in file order, not contiguous.
    pub id: u64,
    /// Unix milliseconds. `None` until imputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Agent name carried by boundary markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Advisory name of the enclosing agent invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hint: Option<String>,
    /// Nesting depth from sources without boundary markers. 0 = root level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_hint: Option<u32>,
    /// Opaque to the engine except for search tokenization.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl Event {
    /// Timestamp, or `fallback` for the pre-imputation case.
    pub fn ts_or(&self, fallback: i64) -> i64 {
        self.ts.unwrap_or(fallback)
    }
}

/// Dense engine-assigned span identifier; index into the timeline arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(pub u32);

/// The synthetic root span of every timeline.
pub const ROOT_SPAN: SpanId = SpanId(0);

impl SpanId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion state of a reconstructed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Opened and closed by matching evidence.
    Complete,
    /// Still open when the file ended.
    Unterminated,
    /// Closed out of declared order, or synthesized to bridge a depth jump.
    Malformed,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Complete => "complete",
            SpanStatus::Unterminated => "unterminated",
            SpanStatus::Malformed => "malformed",
        }
    }

    pub fn parse(s: &str) -> Option<SpanStatus> {
        match s {
            "complete" => Some(SpanStatus::Complete),
            "unterminated" => Some(SpanStatus::Unterminated),
            "malformed" => Some(SpanStatus::Malformed),
            _ => None,
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem absorbed during load and attached to the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// A record the decoder dropped or partially salvaged.
    Decode { line: usize, reason: String },
    /// Source metadata that contradicted the reconstruction stack.
    Consistency { event_id: u64, detail: String },
    /// A structural repair the reconstructor forced through.
    Repair { event_id: u64, detail: String },
}

impl Warning {
    pub fn label(&self) -> &'static str {
        match self {
            Warning::Decode { .. } => "decode",
            Warning::Consistency { .. } => "consistency",
            Warning::Repair { .. } => "repair",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Decode { line, reason } => write!(f, "decode (line {line}): {reason}"),
            Warning::Consistency { event_id, detail } => {
                write!(f, "consistency (event {event_id}): {detail}")
            }
            Warning::Repair { event_id, detail } => {
                write!(f, "repair (event {event_id}): {detail}")
            }
        }
    }
}

/// Provenance attached to a loaded timeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceMeta {
    pub source_path: PathBuf,
    /// `ld_`-prefixed ulid naming this load.
    pub load_id: String,
    /// RFC 3339 wall-clock time the load started.
    pub loaded_at: String,
    /// Time spent decoding and reconstructing, in milliseconds.
    pub load_duration_ms: u64,
    /// Events that made it into the timeline.
    pub event_count: usize,
    /// Records the decoder dropped.
    pub skipped_records: usize,
    /// Truncated blake3 hash of the raw source bytes.
    pub content_hash: String,
}
