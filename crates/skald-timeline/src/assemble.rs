use skald_core::{SpanId, SpanStatus, TraceMeta, Warning};

use crate::reconstruct::Reconstruction;
use crate::timeline::{Span, Timeline};

/// Finalize a reconstruction into an immutable timeline.
///
/// Intervals are always derived: `start` is the minimum of a span's first
/// own event and its earliest child start, `end` the mirror image. The
/// rollup walks the arena in reverse, where every child sits after its
/// parent, so a single pass settles the whole tree. A closed span whose
/// children force its interval wider than its own events is flagged
/// malformed.
pub fn assemble(recon: Reconstruction, decode_warnings: Vec<Warning>, meta: TraceMeta) -> Timeline {
    let Reconstruction {
        spans: builds,
        warnings: recon_warnings,
        ..
    } = recon;

    let opened: Vec<i64> = builds.iter().map(|b| b.opened_ms).collect();
    let mut spans: Vec<Span> = builds
        .into_iter()
        .enumerate()
        .map(|(i, b)| Span {
            id: SpanId(i as u32),
            agent: b.agent,
            parent: b.parent,
            children: b.children,
            events: b.events,
            status: b.status,
            start_ms: 0,
            end_ms: 0,
        })
        .collect();

    // (ts, id) order inside every span.
    for (i, s) in spans.iter_mut().enumerate() {
        let fallback = opened[i];
        s.events.sort_by_key(|e| (e.ts_or(fallback), e.id));
    }

    for i in (0..spans.len()).rev() {
        let own_first = spans[i].events.first().map(|e| e.ts_or(opened[i]));
        let own_last = spans[i].events.last().map(|e| e.ts_or(opened[i]));
        let mut start = own_first.unwrap_or(opened[i]);
        let mut end = own_last.unwrap_or(opened[i]);
        for &c in &spans[i].children {
            start = start.min(spans[c.index()].start_ms);
            end = end.max(spans[c.index()].end_ms);
        }
        let widened = match (own_first, own_last) {
            (Some(f), Some(l)) => start < f || end > l,
            _ => false,
        };
        spans[i].start_ms = start;
        spans[i].end_ms = end;
        // Children outside a closed span's own extent break enclosure;
        // widening repairs it, the status records it. The root and open
        // spans have no declared extent to break.
        if widened && spans[i].parent.is_some() && spans[i].status == SpanStatus::Complete {
            spans[i].status = SpanStatus::Malformed;
        }
    }

    // Chronological sibling order.
    for i in 0..spans.len() {
        let mut kids = std::mem::take(&mut spans[i].children);
        kids.sort_by_key(|c| (spans[c.index()].start_ms, *c));
        spans[i].children = kids;
    }

    let mut warnings = decode_warnings;
    warnings.extend(recon_warnings);
    Timeline::new(spans, warnings, meta)
}
