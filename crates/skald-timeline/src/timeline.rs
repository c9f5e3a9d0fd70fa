use skald_core::{Event, SpanId, SpanStatus, TraceMeta, Warning, ROOT_SPAN};

/// One reconstructed span: a contiguous slice of the session owned by a
/// single agent invocation, or by the synthetic session root.
#[derive(Debug, Clone)]
pub struct Span {
    pub id: SpanId,
    pub agent: Option<String>,
    /// Non-owning back-reference; the arena owns every span.
    pub parent: Option<SpanId>,
    pub children: Vec<SpanId>,
    /// Ordered by (ts, id).
    pub events: Vec<Event>,
    pub status: SpanStatus,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Span {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Display name: the agent, or "session" for the root.
    pub fn label(&self) -> &str {
        match &self.agent {
            Some(a) => a.as_str(),
            None if self.is_root() => "session",
            None => "(anonymous)",
        }
    }
}

/// An immutable reconstructed session tree.
///
/// Spans live in a flat arena indexed by [`SpanId`]; the root is always
/// id 0 and a parent always sits at a lower index than its children, so
/// parent walks terminate. Nothing here changes after construction: a
/// reload builds a fresh timeline instead.
#[derive(Debug)]
pub struct Timeline {
    spans: Vec<Span>,
    warnings: Vec<Warning>,
    meta: TraceMeta,
}

impl Timeline {
    pub(crate) fn new(spans: Vec<Span>, warnings: Vec<Warning>, meta: TraceMeta) -> Timeline {
        debug_assert!(!spans.is_empty(), "arena always holds the root");
        Timeline {
            spans,
            warnings,
            meta,
        }
    }

    pub fn root(&self) -> &Span {
        &self.spans[ROOT_SPAN.index()]
    }

    pub fn span(&self, id: SpanId) -> Option<&Span> {
        self.spans.get(id.index())
    }

    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Total events across all spans.
    pub fn event_count(&self) -> usize {
        self.spans.iter().map(|s| s.events.len()).sum()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn meta(&self) -> &TraceMeta {
        &self.meta
    }

    /// Walk from a span towards the root, excluding the span itself.
    pub fn ancestors(&self, id: SpanId) -> Ancestors<'_> {
        Ancestors {
            timeline: self,
            next: self.span(id).and_then(|s| s.parent),
        }
    }

    /// Spans counted per status, in (complete, unterminated, malformed) order.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for s in &self.spans {
            match s.status {
                SpanStatus::Complete => counts.0 += 1,
                SpanStatus::Unterminated => counts.1 += 1,
                SpanStatus::Malformed => counts.2 += 1,
            }
        }
        counts
    }
}

pub struct Ancestors<'a> {
    timeline: &'a Timeline,
    next: Option<SpanId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<&'a Span> {
        let id = self.next?;
        let span = self.timeline.span(id)?;
        self.next = span.parent;
        Some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assemble, reconstruct};
    use skald_core::EventKind;

    const T0: i64 = 1_772_359_200_000;

    fn marker(id: u64, offset_ms: i64, kind: EventKind, agent: &str) -> Event {
        Event {
            id,
            ts: Some(T0 + offset_ms),
            kind,
            agent: Some(agent.to_string()),
            parent_hint: None,
            depth_hint: None,
            payload: serde_json::Value::Null,
        }
    }

    fn nested_timeline() -> Timeline {
        let events = vec![
            marker(1, 0, EventKind::AgentStart, "planner"),
            marker(2, 1_000, EventKind::AgentStart, "executor"),
            marker(3, 2_000, EventKind::AgentEnd, "executor"),
            marker(4, 3_000, EventKind::AgentEnd, "planner"),
        ];
        assemble(reconstruct(events, T0), Vec::new(), TraceMeta::default())
    }

    #[test]
    fn navigation_basics() {
        let tl = nested_timeline();
        assert_eq!(tl.span_count(), 3);
        assert_eq!(tl.root().label(), "session");
        assert!(tl.root().is_root());
        assert_eq!(tl.span(SpanId(2)).unwrap().label(), "executor");
        assert!(tl.span(SpanId(99)).is_none());
        assert_eq!(tl.event_count(), 4);
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let tl = nested_timeline();
        let chain: Vec<&str> = tl.ancestors(SpanId(2)).map(|s| s.label()).collect();
        assert_eq!(chain, vec!["planner", "session"]);
        assert_eq!(tl.ancestors(ROOT_SPAN).count(), 0);
    }

    #[test]
    fn status_counts_sum_to_span_count() {
        let tl = nested_timeline();
        let (complete, unterminated, malformed) = tl.status_counts();
        assert_eq!(complete + unterminated + malformed, tl.span_count());
        assert_eq!(complete, 3);
    }
}
