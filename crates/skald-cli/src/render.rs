//! Shared text rendering for the subcommands.

use serde_json::Value;
use skald_core::timefmt;
use skald_timeline::Span;

/// "2026-03-01T10:00:05Z" -> "2026-03-01 10:00:05".
pub fn short_ts(ms: i64) -> String {
    let full = timefmt::format_rfc3339_ms(ms);
    if full.len() >= 19 {
        format!("{} {}", &full[..10], &full[11..19])
    } else {
        full
    }
}

pub fn fmt_duration(ms: i64) -> String {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;

    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < MINUTE {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < HOUR {
        format!("{}m {:02}s", ms / MINUTE, (ms % MINUTE) / 1000)
    } else {
        format!("{}h {:02}m", ms / HOUR, (ms % HOUR) / MINUTE)
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// One-line span summary used by show and search output.
pub fn span_line(span: &Span) -> String {
    format!(
        "#{} {:<12} {:<12} {} .. {}  ({}, {} events)",
        span.id,
        span.label(),
        span.status.as_str(),
        short_ts(span.start_ms),
        short_ts(span.end_ms),
        fmt_duration(span.duration_ms()),
        span.events.len()
    )
}

/// Span summary for `--json` output; events included on request.
pub fn span_json(span: &Span, with_events: bool) -> Value {
    let mut doc = serde_json::json!({
        "id": span.id,
        "label": span.label(),
        "agent": span.agent,
        "parent": span.parent,
        "children": span.children,
        "status": span.status,
        "start": timefmt::format_rfc3339_ms(span.start_ms),
        "end": timefmt::format_rfc3339_ms(span.end_ms),
        "duration_ms": span.duration_ms(),
        "event_count": span.events.len(),
    });
    if with_events {
        doc["events"] = serde_json::to_value(&span.events).unwrap_or_default();
    }
    doc
}

/// A short payload preview: the `text` field when present, else the
/// compact JSON, truncated to 60 characters.
pub fn payload_excerpt(payload: &Value) -> String {
    let text = match payload.get("text").and_then(|v| v.as_str()) {
        Some(t) => t.to_string(),
        None if payload.is_null() => String::new(),
        None => payload.to_string(),
    };
    if text.chars().count() > 60 {
        let cut: String = text.chars().take(57).collect();
        format!("{cut}...")
    } else {
        text
    }
}
