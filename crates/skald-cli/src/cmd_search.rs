use std::path::Path;

use skald_core::config::EngineConfig;
use skald_core::{timefmt, EventKind, SpanStatus};
use skald_engine::LoadOptions;
use skald_index::SpanFilter;

use crate::render;

pub struct SearchParams<'a> {
    pub file: &'a Path,
    pub tokens: &'a [String],
    pub kind: Option<&'a str>,
    pub status: Option<&'a str>,
    pub agent: Option<&'a str>,
    pub after: Option<&'a str>,
    pub before: Option<&'a str>,
    pub limit: usize,
    pub json: bool,
    pub config: &'a EngineConfig,
}

pub fn execute(params: &SearchParams<'_>) -> anyhow::Result<()> {
    let filter = build_filter(
        params.tokens,
        params.kind,
        params.status,
        params.agent,
        params.after,
        params.before,
    )?;
    let opts = LoadOptions {
        config: params.config.clone(),
        file_open_ms: None,
    };
    let trace = skald_engine::load_with_options(params.file, &opts)?;
    let tl = &trace.timeline;

    let mut result = trace.index.query(&filter);
    if params.limit > 0 {
        result.matches.truncate(params.limit);
    }

    if result.is_empty() {
        println!("No spans match the filter.");
        return Ok(());
    }

    if params.json {
        let matches: Vec<_> = result
            .matches
            .iter()
            .filter_map(|&id| tl.span(id))
            .map(|s| render::span_json(s, false))
            .collect();
        let context: Vec<_> = result
            .context
            .iter()
            .filter_map(|&id| tl.span(id))
            .map(|s| render::span_json(s, false))
            .collect();
        let doc = serde_json::json!({ "matches": matches, "context": context });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    for &id in &result.matches {
        if let Some(span) = tl.span(id) {
            println!("{}", render::span_line(span));
        }
    }
    if !result.context.is_empty() {
        println!("\ncontaining spans:");
        for &id in &result.context {
            if let Some(span) = tl.span(id) {
                println!("{}", render::span_line(span));
            }
        }
    }
    println!(
        "\n({} matches, {} containing)",
        result.matches.len(),
        result.context.len()
    );
    Ok(())
}

/// Build the AND-composed filter from raw CLI flag values.
pub fn build_filter(
    tokens: &[String],
    kind: Option<&str>,
    status: Option<&str>,
    agent: Option<&str>,
    after: Option<&str>,
    before: Option<&str>,
) -> anyhow::Result<SpanFilter> {
    let mut filter = SpanFilter::new();
    for t in tokens {
        filter = filter.with_token(t);
    }
    if let Some(k) = kind {
        let kind = EventKind::from_wire(k)
            .ok_or_else(|| anyhow::anyhow!("unknown event kind {k:?}"))?;
        filter = filter.with_kind(kind);
    }
    if let Some(s) = status {
        let status = SpanStatus::parse(s)
            .ok_or_else(|| anyhow::anyhow!("unknown span status {s:?}"))?;
        filter = filter.with_status(status);
    }
    if let Some(a) = agent {
        filter = filter.with_agent(a);
    }
    if after.is_some() || before.is_some() {
        let start = after.map(parse_ts).transpose()?.unwrap_or(0);
        let end = before.map(parse_ts).transpose()?.unwrap_or(i64::MAX);
        filter = filter.with_range(start, end);
    }
    Ok(filter)
}

/// Accept full RFC 3339 or a bare date, which reads as midnight UTC.
fn parse_ts(s: &str) -> anyhow::Result<i64> {
    if let Some(ms) = timefmt::parse_rfc3339_ms(s) {
        return Ok(ms);
    }
    timefmt::parse_rfc3339_ms(&format!("{s}T00:00:00Z"))
        .ok_or_else(|| anyhow::anyhow!("cannot parse time {s:?} (want RFC 3339 or YYYY-MM-DD)"))
}
