use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use skald_core::config::EngineConfig;
use skald_core::{EventKind, SpanId, SpanStatus};
use skald_timeline::Timeline;

use crate::tokenize;

/// Per-span snapshot used to evaluate attribute predicates in O(1).
#[derive(Debug, Clone)]
struct SpanAttrs {
    /// Bit per event kind present in the span's own events.
    kinds_mask: u16,
    status: SpanStatus,
    /// Case-folded agent name.
    agent: Option<String>,
    start_ms: i64,
    end_ms: i64,
    parent: Option<SpanId>,
}

/// Read-only search structures over one frozen timeline.
///
/// Built once per load and never updated; a reload builds a fresh index.
/// The index snapshots everything it needs (including ancestry), so queries
/// never touch the timeline.
#[derive(Debug)]
pub struct SearchIndex {
    /// token -> sorted unique span ids.
    postings: HashMap<String, Vec<SpanId>>,
    /// case-folded agent name -> sorted unique span ids.
    agents: HashMap<String, Vec<SpanId>>,
    attrs: Vec<SpanAttrs>,
    token_count: usize,
}

impl SearchIndex {
    pub fn build(timeline: &Timeline) -> SearchIndex {
        SearchIndex::build_with(timeline, &EngineConfig::default())
    }

    pub fn build_with(timeline: &Timeline, config: &EngineConfig) -> SearchIndex {
        let mut postings: HashMap<String, Vec<SpanId>> = HashMap::new();
        let mut agents: HashMap<String, Vec<SpanId>> = HashMap::new();
        let mut attrs = Vec::with_capacity(timeline.span_count());
        let mut token_count = 0usize;

        for span in timeline.spans() {
            let mut kinds_mask = 0u16;
            let mut tokens = BTreeSet::new();
            for ev in &span.events {
                kinds_mask |= 1 << (ev.kind as u16);
                tokenize::payload_tokens(
                    &ev.payload,
                    config.min_token_len,
                    config.max_tokens_per_event,
                    &mut tokens,
                );
            }
            token_count += tokens.len();
            // Spans arrive in id order, so every posting list stays sorted
            // without a separate sort pass.
            for tok in tokens {
                postings.entry(tok).or_default().push(span.id);
            }
            let folded_agent = span.agent.as_deref().map(str::to_lowercase);
            if let Some(a) = &folded_agent {
                agents.entry(a.clone()).or_default().push(span.id);
            }
            attrs.push(SpanAttrs {
                kinds_mask,
                status: span.status,
                agent: folded_agent,
                start_ms: span.start_ms,
                end_ms: span.end_ms,
                parent: span.parent,
            });
        }

        SearchIndex {
            postings,
            agents,
            attrs,
            token_count,
        }
    }

    pub fn span_count(&self) -> usize {
        self.attrs.len()
    }

    /// Span-token pairs indexed (a span counts each distinct token once).
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn distinct_tokens(&self) -> usize {
        self.postings.len()
    }

    /// Evaluate an AND-composed filter.
    ///
    /// Token postings are the entry point when tokens are present, the
    /// agent posting when only an agent is given; otherwise every span is
    /// a candidate. Results are in span-id order.
    pub fn query(&self, filter: &SpanFilter) -> QueryResult {
        let agent_folded = filter.agent.as_deref().map(str::to_lowercase);

        let mut candidates: Option<Vec<SpanId>> = None;
        for raw in &filter.tokens {
            let hits = match tokenize::normalize_token(raw, 1) {
                Some(tok) => self.postings.get(&tok).cloned().unwrap_or_default(),
                // A token that trims to nothing can never match.
                None => Vec::new(),
            };
            candidates = Some(match candidates {
                None => hits,
                Some(prev) => intersect(&prev, &hits),
            });
            if candidates.as_deref().is_some_and(|c| c.is_empty()) {
                break;
            }
        }

        let base: Vec<SpanId> = match candidates {
            Some(c) => c,
            None => match &agent_folded {
                Some(a) => self.agents.get(a).cloned().unwrap_or_default(),
                None => (0..self.attrs.len() as u32).map(SpanId).collect(),
            },
        };

        let matches: Vec<SpanId> = base
            .into_iter()
            .filter(|id| self.attrs_match(*id, filter, agent_folded.as_deref()))
            .collect();

        // Every ancestor of a match is context, unless it matched itself.
        // A hit on an already-marked ancestor means the rest of the chain
        // is marked too; a matching ancestor walks its own chain.
        let matched: BTreeSet<SpanId> = matches.iter().copied().collect();
        let mut context: BTreeSet<SpanId> = BTreeSet::new();
        for &id in &matches {
            let mut cur = self.attrs[id.index()].parent;
            while let Some(p) = cur {
                if matched.contains(&p) || !context.insert(p) {
                    break;
                }
                cur = self.attrs[p.index()].parent;
            }
        }

        QueryResult {
            matches,
            context: context.into_iter().collect(),
        }
    }

    fn attrs_match(&self, id: SpanId, filter: &SpanFilter, agent_folded: Option<&str>) -> bool {
        let a = &self.attrs[id.index()];
        if let Some(kind) = filter.kind {
            if a.kinds_mask & (1 << (kind as u16)) == 0 {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if a.status != status {
                return false;
            }
        }
        if let Some(wanted) = agent_folded {
            if a.agent.as_deref() != Some(wanted) {
                return false;
            }
        }
        if let Some(range) = &filter.range {
            if a.start_ms > range.end_ms || a.end_ms < range.start_ms {
                return false;
            }
        }
        true
    }
}

fn intersect(a: &[SpanId], b: &[SpanId]) -> Vec<SpanId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// AND-composed span predicate. The empty filter matches every span.
#[derive(Debug, Clone, Default)]
pub struct SpanFilter {
    /// Every token must appear somewhere in the span's events.
    pub tokens: Vec<String>,
    /// At least one event of this kind in the span.
    pub kind: Option<EventKind>,
    pub status: Option<SpanStatus>,
    /// Case-insensitive agent name.
    pub agent: Option<String>,
    /// Interval overlap, inclusive on both ends.
    pub range: Option<TimeRange>,
}

impl SpanFilter {
    pub fn new() -> SpanFilter {
        SpanFilter::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_range(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.range = Some(TimeRange { start_ms, end_ms });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
            && self.kind.is_none()
            && self.status.is_none()
            && self.agent.is_none()
            && self.range.is_none()
    }
}

/// Inclusive overlap window in unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Matches in span-id order plus the ancestors that contain them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub matches: Vec<SpanId>,
    /// Ancestors of matches that are not matches themselves.
    pub context: Vec<SpanId>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skald_core::{Event, TraceMeta, ROOT_SPAN};
    use skald_timeline::{assemble, reconstruct};

    const T0: i64 = 1_772_359_200_000;

    fn ev(id: u64, offset_ms: i64, kind: EventKind, payload: serde_json::Value) -> Event {
        Event {
            id,
            ts: Some(T0 + offset_ms),
            kind,
            agent: None,
            parent_hint: None,
            depth_hint: None,
            payload,
        }
    }

    fn marker(id: u64, offset_ms: i64, kind: EventKind, agent: &str) -> Event {
        Event {
            agent: Some(agent.to_string()),
            ..ev(id, offset_ms, kind, serde_json::Value::Null)
        }
    }

    /// session -> planner -> executor; the executor fails a tool call.
    fn fixture() -> Timeline {
        let events = vec![
            ev(1, 0, EventKind::Request, json!({"text": "summarize the repo"})),
            marker(2, 1_000, EventKind::AgentStart, "planner"),
            marker(3, 2_000, EventKind::AgentStart, "executor"),
            ev(4, 3_000, EventKind::ToolCall, json!({"tool": "grep", "args": "-r TODO"})),
            ev(5, 4_000, EventKind::Error, json!({"text": "tool error: timeout"})),
            marker(6, 5_000, EventKind::AgentEnd, "executor"),
            marker(7, 6_000, EventKind::AgentEnd, "planner"),
            ev(8, 7_000, EventKind::Response, json!({"text": "partial summary"})),
        ];
        assemble(reconstruct(events, T0), Vec::new(), TraceMeta::default())
    }

    fn ids(v: &[SpanId]) -> Vec<u32> {
        v.iter().map(|s| s.0).collect()
    }

    #[test]
    fn token_match_returns_span_and_ancestor_context() {
        let index = SearchIndex::build(&fixture());
        let result = index.query(&SpanFilter::new().with_token("error"));
        assert_eq!(ids(&result.matches), vec![2]);
        assert_eq!(ids(&result.context), vec![0, 1]);
    }

    #[test]
    fn tokens_are_case_folded_and_trimmed() {
        let index = SearchIndex::build(&fixture());
        for needle in ["ERROR", "Timeout", "timeout."] {
            let result = index.query(&SpanFilter::new().with_token(needle));
            assert_eq!(ids(&result.matches), vec![2], "needle {needle}");
        }
    }

    #[test]
    fn all_tokens_must_match() {
        let index = SearchIndex::build(&fixture());
        let both = index.query(&SpanFilter::new().with_token("tool").with_token("timeout"));
        assert_eq!(ids(&both.matches), vec![2]);
        let none = index.query(&SpanFilter::new().with_token("tool").with_token("summarize"));
        assert!(none.is_empty());
    }

    #[test]
    fn kind_filter_needs_an_event_of_that_kind() {
        let index = SearchIndex::build(&fixture());
        let result = index.query(&SpanFilter::new().with_kind(EventKind::ToolCall));
        assert_eq!(ids(&result.matches), vec![2]);
        let result = index.query(&SpanFilter::new().with_kind(EventKind::Request));
        assert_eq!(ids(&result.matches), vec![0]);
    }

    #[test]
    fn status_and_kind_compose() {
        let index = SearchIndex::build(&fixture());
        let result = index.query(
            &SpanFilter::new()
                .with_kind(EventKind::Error)
                .with_status(SpanStatus::Complete),
        );
        assert_eq!(ids(&result.matches), vec![2]);
        let result = index.query(
            &SpanFilter::new()
                .with_kind(EventKind::Error)
                .with_status(SpanStatus::Malformed),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn agent_filter_is_case_insensitive() {
        let index = SearchIndex::build(&fixture());
        let result = index.query(&SpanFilter::new().with_agent("Planner"));
        assert_eq!(ids(&result.matches), vec![1]);
        assert_eq!(ids(&result.context), vec![0]);
    }

    #[test]
    fn time_range_overlap_is_inclusive() {
        let index = SearchIndex::build(&fixture());
        // The executor span covers +2000..+5000.
        let hit = index.query(
            &SpanFilter::new()
                .with_agent("executor")
                .with_range(T0 + 5_000, T0 + 60_000),
        );
        assert_eq!(ids(&hit.matches), vec![2]);
        let miss = index.query(
            &SpanFilter::new()
                .with_agent("executor")
                .with_range(T0 + 5_001, T0 + 60_000),
        );
        assert!(miss.is_empty());
    }

    #[test]
    fn empty_filter_matches_every_span() {
        let tl = fixture();
        let index = SearchIndex::build(&tl);
        let result = index.query(&SpanFilter::new());
        assert_eq!(result.matches.len(), tl.span_count());
        assert!(result.context.is_empty());
        assert!(SpanFilter::new().is_empty());
    }

    #[test]
    fn unmatchable_token_yields_nothing() {
        let index = SearchIndex::build(&fixture());
        let result = index.query(&SpanFilter::new().with_token("!!!"));
        assert!(result.is_empty());
        assert!(result.context.is_empty());
    }

    #[test]
    fn matching_ancestor_is_reported_as_match_not_context() {
        let mut planner_start = marker(2, 1_000, EventKind::AgentStart, "planner");
        planner_start.payload = json!({"note": "needle in the plan"});
        let events = vec![
            ev(1, 0, EventKind::Request, json!({"text": "start"})),
            planner_start,
            marker(3, 2_000, EventKind::AgentStart, "executor"),
            ev(4, 3_000, EventKind::Message, json!({"text": "needle in the work"})),
            marker(5, 4_000, EventKind::AgentEnd, "executor"),
            marker(6, 5_000, EventKind::AgentEnd, "planner"),
        ];
        let tl = assemble(reconstruct(events, T0), Vec::new(), TraceMeta::default());
        let index = SearchIndex::build(&tl);
        let result = index.query(&SpanFilter::new().with_token("needle"));
        // Planner matches on its own and is not demoted to context.
        assert_eq!(ids(&result.matches), vec![1, 2]);
        assert_eq!(ids(&result.context), vec![0]);
    }

    #[test]
    fn min_token_len_filters_at_build_time() {
        let events = vec![ev(
            1,
            0,
            EventKind::Message,
            json!({"text": "a bb ccc"}),
        )];
        let tl = assemble(reconstruct(events, T0), Vec::new(), TraceMeta::default());
        let config = EngineConfig {
            min_token_len: 3,
            ..EngineConfig::default()
        };
        let index = SearchIndex::build_with(&tl, &config);
        assert!(index.query(&SpanFilter::new().with_token("bb")).is_empty());
        assert!(!index.query(&SpanFilter::new().with_token("ccc")).is_empty());
        assert_eq!(index.distinct_tokens(), 1);
    }

    #[test]
    fn queries_are_idempotent() {
        let index = SearchIndex::build(&fixture());
        let filter = SpanFilter::new().with_token("error").with_kind(EventKind::Error);
        let first = index.query(&filter);
        let second = index.query(&filter);
        assert_eq!(first, second);
    }

    #[test]
    fn build_reports_token_volume() {
        let index = SearchIndex::build(&fixture());
        assert!(index.token_count() >= index.distinct_tokens());
        assert!(index.distinct_tokens() > 0);
        assert_eq!(index.span_count(), 3);
        assert_eq!(ROOT_SPAN.index(), 0);
    }
}
