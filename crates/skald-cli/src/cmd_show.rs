use std::path::Path;

use skald_core::config::EngineConfig;
use skald_engine::LoadOptions;
use skald_timeline::{Span, Timeline};

use crate::render;

pub fn execute(file: &Path, events: bool, json: bool, config: &EngineConfig) -> anyhow::Result<()> {
    let opts = LoadOptions {
        config: config.clone(),
        file_open_ms: None,
    };
    let trace = skald_engine::load_with_options(file, &opts)?;
    let tl = &trace.timeline;

    if json {
        let spans: Vec<serde_json::Value> = tl.spans().map(|s| render::span_json(s, events)).collect();
        let doc = serde_json::json!({
            "meta": tl.meta(),
            "spans": spans,
            "warnings": tl.warnings(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let meta = tl.meta();
    let (complete, unterminated, malformed) = tl.status_counts();
    println!("{} ({})", meta.source_path.display(), meta.load_id);
    println!(
        "{} spans ({complete} complete, {unterminated} unterminated, {malformed} malformed), \
         {} events, {} skipped records, {} warnings",
        tl.span_count(),
        tl.event_count(),
        meta.skipped_records,
        tl.warnings().len()
    );
    println!();

    println!("{}", render::span_line(tl.root()));
    if events {
        print_events(tl.root(), "");
    }
    print_children(tl, tl.root(), "", events);
    Ok(())
}

fn print_children(tl: &Timeline, span: &Span, prefix: &str, events: bool) {
    let count = span.children.len();
    for (i, &child_id) in span.children.iter().enumerate() {
        let Some(child) = tl.span(child_id) else {
            continue;
        };
        let last = i + 1 == count;
        let branch = if last { "└─ " } else { "├─ " };
        println!("{prefix}{branch}{}", render::span_line(child));
        let deeper = format!("{prefix}{}", if last { "   " } else { "│  " });
        if events {
            print_events(child, &deeper);
        }
        print_children(tl, child, &deeper, events);
    }
}

fn print_events(span: &Span, prefix: &str) {
    for ev in &span.events {
        println!(
            "{prefix}  [{}] {:<12} {}",
            render::short_ts(ev.ts_or(0)),
            ev.kind.as_wire(),
            render::payload_excerpt(&ev.payload)
        );
    }
}
