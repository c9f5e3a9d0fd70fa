//! Projection of a timeline subset back into the wire format.
//!
//! The exported stream is decodable by the regular decoder: re-loading it
//! reproduces exactly the exported spans and their events, with freshly
//! assigned sequence numbers. Spans whose boundaries came from physical
//! markers keep those marker events verbatim, so repairs and missing ends
//! replay the same way; spans that were synthesized from depth hints get
//! markers synthesized here instead, and depth hints never leave the house.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{bail, Result};
use skald_core::record::{TraceRecord, TsValue};
use skald_core::{timefmt, Event, EventKind, SpanId, SpanStatus};
use skald_timeline::{Span, Timeline};

/// Counters for one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Spans written, ancestor closure included.
    pub spans: usize,
    /// Source events written.
    pub events: usize,
    /// Markers synthesized for depth-derived spans.
    pub synthesized_markers: usize,
    pub bytes_written: usize,
}

enum Item<'a> {
    Start(&'a Span),
    Event(&'a Event),
    End(&'a Span),
}

/// Stream the selected spans, their ancestor chains, and every contained
/// event to `out` as trace records.
///
/// Selecting nothing writes nothing. An id the timeline does not know is
/// an error; everything else is a pure projection.
pub fn export_spans(
    timeline: &Timeline,
    selection: &BTreeSet<SpanId>,
    out: &mut impl Write,
) -> Result<ExportStats> {
    let mut included: BTreeSet<SpanId> = BTreeSet::new();
    for &id in selection {
        if timeline.span(id).is_none() {
            bail!("unknown span id {id}");
        }
        included.insert(id);
        for anc in timeline.ancestors(id) {
            if !included.insert(anc.id) {
                break;
            }
        }
    }

    // Depth per span, for ordering same-timestamp synthesized markers:
    // outer starts before inner, inner ends before outer.
    let mut depths = vec![0u32; timeline.span_count()];
    for span in timeline.spans() {
        if let Some(p) = span.parent {
            depths[span.id.index()] = depths[p.index()] + 1;
        }
    }

    let mut items: Vec<Item<'_>> = Vec::new();
    let mut stats = ExportStats::default();
    for &id in &included {
        let span = match timeline.span(id) {
            Some(s) => s,
            None => continue,
        };
        for ev in &span.events {
            items.push(Item::Event(ev));
        }
        if span.is_root() {
            continue;
        }
        // A span holding its own start marker is marker-origin: emit it
        // verbatim and let a reload repeat whatever happened, including a
        // missing end. Everything else gets its boundaries synthesized.
        let marker_origin = span.events.iter().any(|e| e.kind == EventKind::AgentStart);
        if !marker_origin {
            items.push(Item::Start(span));
            if span.status != SpanStatus::Unterminated {
                items.push(Item::End(span));
            }
        }
    }

    items.sort_by_key(|item| match item {
        Item::Start(s) => (s.start_ms, 0u8, depths[s.id.index()] as u64, s.id.0),
        Item::Event(e) => (e.ts_or(i64::MIN), 1, e.id, 0),
        Item::End(s) => (
            s.end_ms,
            2,
            (u32::MAX - depths[s.id.index()]) as u64,
            s.id.0,
        ),
    });

    stats.spans = included.len();
    for (rank, item) in items.iter().enumerate() {
        let seq = rank as u64 + 1;
        let record = match item {
            Item::Event(ev) => {
                stats.events += 1;
                TraceRecord::from_event(seq, ev)
            }
            Item::Start(span) => {
                stats.synthesized_markers += 1;
                synth_marker(seq, EventKind::AgentStart, span, timeline, span.start_ms)
            }
            Item::End(span) => {
                stats.synthesized_markers += 1;
                synth_marker(seq, EventKind::AgentEnd, span, timeline, span.end_ms)
            }
        };
        let line = serde_json::to_string(&record)?;
        writeln!(out, "{line}")?;
        stats.bytes_written += line.len() + 1;
    }

    Ok(stats)
}

fn synth_marker(
    seq: u64,
    kind: EventKind,
    span: &Span,
    timeline: &Timeline,
    ts_ms: i64,
) -> TraceRecord {
    let parent_agent = span
        .parent
        .and_then(|p| timeline.span(p))
        .and_then(|p| p.agent.clone());
    TraceRecord {
        seq: Some(seq),
        ts: Some(TsValue::Text(timefmt::format_rfc3339_ms(ts_ms))),
        kind: kind.as_wire().to_string(),
        agent: span.agent.clone(),
        parent: parent_agent,
        depth: None,
        payload: serde_json::Value::Null,
    }
}
