//! Sub-agent boundary detection over a flat event stream.
//!
//! The reconstructor walks events in (timestamp, id) order and maintains an
//! explicit stack of open spans seeded with a synthetic root. Sources that
//! emit `agent_start`/`agent_end` markers drive the stack directly; sources
//! that only carry depth hints have their transitions synthesized at depth
//! changes. The pass absorbs every inconsistency it meets as a warning and
//! never fails.

use skald_core::{Event, EventKind, SpanId, SpanStatus, Warning, ROOT_SPAN};

/// One span under construction. Finalized by the assembler.
#[derive(Debug)]
pub struct SpanBuild {
    pub agent: Option<String>,
    pub parent: Option<SpanId>,
    pub children: Vec<SpanId>,
    pub events: Vec<Event>,
    pub status: SpanStatus,
    /// When the span came into existence; stands in for empty spans.
    pub opened_ms: i64,
}

/// Output of the reconstruction pass: a span arena in which a parent always
/// sits at a lower index than its children, plus the warnings emitted.
#[derive(Debug)]
pub struct Reconstruction {
    pub spans: Vec<SpanBuild>,
    pub warnings: Vec<Warning>,
    pub imputed_timestamps: usize,
}

/// Distribute every event into exactly one span.
///
/// `file_open_ms` anchors traces that carry no timestamps at all; it must be
/// supplied by the caller so the result is reproducible.
pub fn reconstruct(mut events: Vec<Event>, file_open_ms: i64) -> Reconstruction {
    let imputed = impute_timestamps(&mut events, file_open_ms);
    // Stable sort: equal keys keep file order.
    events.sort_by_key(|e| (e.ts_or(file_open_ms), e.id));

    let mut builder = Builder::new(file_open_ms);
    if events.iter().any(|e| e.kind.is_boundary()) {
        builder.run_marker_mode(events);
    } else if events.iter().any(|e| e.depth_hint.is_some()) {
        builder.run_depth_mode(events);
    } else {
        builder.run_flat(events);
    }
    builder.finish(imputed)
}

/// Fill missing timestamps in file order.
///
/// Interior gaps interpolate linearly by position between the nearest
/// timestamped neighbors; leading and trailing gaps copy the nearest known
/// value; a file without any timestamps anchors everything at
/// `file_open_ms`.
fn impute_timestamps(events: &mut [Event], file_open_ms: i64) -> usize {
    let known: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.ts.is_some())
        .map(|(i, _)| i)
        .collect();
    let missing = events.len() - known.len();
    if missing == 0 {
        return 0;
    }
    if known.is_empty() {
        for e in events.iter_mut() {
            e.ts = Some(file_open_ms);
        }
        return missing;
    }

    let first = known[0];
    let first_ts = events[first].ts_or(file_open_ms);
    for i in 0..first {
        events[i].ts = Some(first_ts);
    }
    for w in known.windows(2) {
        let (a, b) = (w[0], w[1]);
        if b - a <= 1 {
            continue;
        }
        let ta = events[a].ts_or(file_open_ms);
        let tb = events[b].ts_or(file_open_ms);
        let gap = (b - a) as i128;
        for i in (a + 1)..b {
            let step = (i - a) as i128;
            let ts = ta as i128 + (tb - ta) as i128 * step / gap;
            events[i].ts = Some(ts as i64);
        }
    }
    let last = known[known.len() - 1];
    let last_ts = events[last].ts_or(file_open_ms);
    for i in (last + 1)..events.len() {
        events[i].ts = Some(last_ts);
    }
    missing
}

// ── Stack machine ──

struct Builder {
    spans: Vec<SpanBuild>,
    stack: Vec<SpanId>,
    warnings: Vec<Warning>,
}

impl Builder {
    fn new(file_open_ms: i64) -> Builder {
        let root = SpanBuild {
            agent: None,
            parent: None,
            children: Vec::new(),
            events: Vec::new(),
            status: SpanStatus::Complete,
            opened_ms: file_open_ms,
        };
        Builder {
            spans: vec![root],
            stack: vec![ROOT_SPAN],
            warnings: Vec::new(),
        }
    }

    fn top(&self) -> SpanId {
        self.stack.last().copied().unwrap_or(ROOT_SPAN)
    }

    /// Open a child of the current top and make it the new top.
    fn open(&mut self, agent: Option<String>, opened_ms: i64, status: SpanStatus) -> SpanId {
        let parent = self.top();
        let id = SpanId(self.spans.len() as u32);
        self.spans.push(SpanBuild {
            agent,
            parent: Some(parent),
            children: Vec::new(),
            events: Vec::new(),
            status,
            opened_ms,
        });
        self.spans[parent.index()].children.push(id);
        self.stack.push(id);
        id
    }

    /// Pop the top span. `Unterminated` is the "still open" state, so a
    /// close only upgrades that; a span already marked malformed keeps it.
    fn close_top(&mut self, to: SpanStatus) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(id) = self.stack.pop() {
            let span = &mut self.spans[id.index()];
            if span.status == SpanStatus::Unterminated {
                span.status = to;
            }
        }
    }

    fn push_event(&mut self, ev: Event) {
        let top = self.top();
        self.spans[top.index()].events.push(ev);
    }

    fn run_marker_mode(&mut self, events: Vec<Event>) {
        for ev in events {
            match ev.kind {
                EventKind::AgentStart => self.handle_start(ev),
                EventKind::AgentEnd => self.handle_end(ev),
                _ => self.push_event(ev),
            }
        }
    }

    fn handle_start(&mut self, ev: Event) {
        let top = self.top();
        if let Some(hint) = ev.parent_hint.as_deref() {
            let top_agent = self.spans[top.index()].agent.as_deref();
            if top_agent != Some(hint) {
                self.warnings.push(Warning::Consistency {
                    event_id: ev.id,
                    detail: format!(
                        "parent hint '{hint}' does not match open agent {}; trusting nesting order",
                        display_agent(top_agent)
                    ),
                });
            }
        }
        let opened = ev.ts_or(self.spans[top.index()].opened_ms);
        let id = self.open(ev.agent.clone(), opened, SpanStatus::Unterminated);
        // The start marker itself belongs to the span it opens.
        self.spans[id.index()].events.push(ev);
    }

    fn handle_end(&mut self, ev: Event) {
        // Nearest open span matching this end, root excluded. An unlabelled
        // end matches any non-root top.
        let matched = match ev.agent.as_deref() {
            None => (self.stack.len() > 1).then(|| self.stack.len() - 1),
            Some(label) => self.stack.iter().rposition(|s| {
                *s != ROOT_SPAN && self.spans[s.index()].agent.as_deref() == Some(label)
            }),
        };
        let Some(pos) = matched else {
            self.warnings.push(Warning::Consistency {
                event_id: ev.id,
                detail: match ev.agent.as_deref() {
                    Some(label) => {
                        format!("agent_end for '{label}' matches no open span; keeping event in place")
                    }
                    None => "agent_end with no open span; keeping event in place".to_string(),
                },
            });
            self.push_event(ev);
            return;
        };

        if pos < self.stack.len() - 1 {
            // Crossed markers: everything above the match closes malformed.
            let label = ev.agent.as_deref().unwrap_or("(unlabelled)");
            self.warnings.push(Warning::Repair {
                event_id: ev.id,
                detail: format!(
                    "agent_end for '{label}' closes {} intervening span(s) out of order",
                    self.stack.len() - 1 - pos
                ),
            });
            while self.stack.len() - 1 > pos {
                self.close_top(SpanStatus::Malformed);
            }
        }
        // The end marker lands in the span it closes.
        self.push_event(ev);
        self.close_top(SpanStatus::Complete);
    }

    fn run_depth_mode(&mut self, events: Vec<Event>) {
        let mut prev_depth: u32 = 0;
        for ev in events {
            let depth = ev.depth_hint.unwrap_or(prev_depth);
            let open = (self.stack.len() - 1) as u32;
            if depth > open {
                let jump = depth - open;
                if jump > 1 {
                    self.warnings.push(Warning::Repair {
                        event_id: ev.id,
                        detail: format!(
                            "depth jumps from {open} to {depth}; synthesizing {} bridging span(s)",
                            jump - 1
                        ),
                    });
                }
                let opened = ev.ts_or(self.spans[self.top().index()].opened_ms);
                for level in 1..=jump {
                    let deepest = level == jump;
                    let agent = if deepest { ev.agent.clone() } else { None };
                    let status = if deepest {
                        SpanStatus::Unterminated
                    } else {
                        SpanStatus::Malformed
                    };
                    self.open(agent, opened, status);
                }
            } else if depth < open {
                for _ in 0..(open - depth) {
                    self.close_top(SpanStatus::Complete);
                }
            }
            self.push_event(ev);
            prev_depth = depth;
        }
    }

    fn run_flat(&mut self, events: Vec<Event>) {
        for ev in events {
            self.push_event(ev);
        }
    }

    fn finish(mut self, imputed: usize) -> Reconstruction {
        // EOF with open spans: they keep their opened state, which is
        // `unterminated` unless a repair already marked them.
        self.stack.truncate(1);
        Reconstruction {
            spans: self.spans,
            warnings: self.warnings,
            imputed_timestamps: imputed,
        }
    }
}

fn display_agent(agent: Option<&str>) -> String {
    match agent {
        Some(a) => format!("'{a}'"),
        None => "the session root".to_string(),
    }
}
