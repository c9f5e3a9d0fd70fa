use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use skald_core::config::EngineConfig;
use skald_core::SpanId;
use skald_engine::LoadOptions;
use skald_export::{export_spans, ExportStats};

use crate::cmd_search;

pub struct ExportParams<'a> {
    pub file: &'a Path,
    pub out: &'a str,
    pub spans: &'a [u32],
    pub tokens: &'a [String],
    pub kind: Option<&'a str>,
    pub status: Option<&'a str>,
    pub agent: Option<&'a str>,
    pub after: Option<&'a str>,
    pub before: Option<&'a str>,
    pub config: &'a EngineConfig,
}

pub fn execute(params: &ExportParams<'_>) -> anyhow::Result<()> {
    let filter = cmd_search::build_filter(
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

    let mut selection: BTreeSet<SpanId> = params.spans.iter().map(|&id| SpanId(id)).collect();
    if !filter.is_empty() {
        selection.extend(trace.index.query(&filter).matches);
    }
    if params.spans.is_empty() && filter.is_empty() {
        // No selection means the whole timeline.
        selection.extend(tl.spans().map(|s| s.id));
    }

    let to_stdout = params.out == "-";
    let stats = if to_stdout {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        export_spans(tl, &selection, &mut lock)?
    } else {
        let file = std::fs::File::create(params.out)
            .with_context(|| format!("creating {}", params.out))?;
        let mut writer = std::io::BufWriter::new(file);
        let stats = export_spans(tl, &selection, &mut writer)?;
        writer.flush()?;
        stats
    };

    // The summary goes to stderr when the trace itself is on stdout.
    let summary = summary_line(&stats, params.out);
    if to_stdout {
        eprintln!("{summary}");
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn summary_line(stats: &ExportStats, out: &str) -> String {
    let mut line = format!(
        "exported {} spans, {} events ({} bytes",
        stats.spans, stats.events, stats.bytes_written
    );
    if stats.synthesized_markers > 0 {
        line.push_str(&format!(", {} synthesized markers", stats.synthesized_markers));
    }
    line.push(')');
    if out != "-" {
        line.push_str(&format!(" -> {out}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_names_the_target_file() {
        let stats = ExportStats {
            spans: 2,
            events: 9,
            synthesized_markers: 0,
            bytes_written: 310,
        };
        assert_eq!(
            summary_line(&stats, "out.jsonl"),
            "exported 2 spans, 9 events (310 bytes) -> out.jsonl"
        );
    }

    #[test]
    fn summary_counts_synthesized_markers() {
        let stats = ExportStats {
            spans: 3,
            events: 4,
            synthesized_markers: 2,
            bytes_written: 150,
        };
        assert_eq!(
            summary_line(&stats, "-"),
            "exported 3 spans, 4 events (150 bytes, 2 synthesized markers)"
        );
    }
}
