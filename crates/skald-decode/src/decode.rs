use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use skald_core::config::EngineConfig;
use skald_core::error::LoadError;
use skald_core::record::TraceRecord;
use skald_core::{Event, EventKind, Warning};

/// Everything one decode pass produced.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Decoded events in file order.
    pub events: Vec<Event>,
    pub warnings: Vec<Warning>,
    pub stats: DecodeStats,
}

/// Counters over one decode pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeStats {
    /// Non-blank lines seen.
    pub records_read: usize,
    pub events_decoded: usize,
    pub records_skipped: usize,
    /// Records that arrived with no usable timestamp.
    pub missing_timestamps: usize,
    pub by_kind: HashMap<String, usize>,
}

/// Read and decode one trace file. IO failure on open is the only fatal case.
pub fn decode_file(path: &Path, config: &EngineConfig) -> Result<DecodeOutcome, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::Source {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(decode_reader(file, config))
}

/// Decode an in-memory buffer.
pub fn decode_bytes(data: &[u8], config: &EngineConfig) -> DecodeOutcome {
    decode_reader(data, config)
}

/// Decode a whole byte stream, absorbing per-record failures as warnings.
///
/// The decoder never fails: a stream of garbage yields zero events plus one
/// warning per line, and the caller decides whether that is fatal.
pub fn decode_reader<R: Read>(reader: R, config: &EngineConfig) -> DecodeOutcome {
    let mut out = DecodeOutcome::default();
    // Last id seen; missing `seq` fields continue from here.
    let mut last_id: u64 = 0;

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let lineno = idx + 1;
        let line = match line {
            Ok(l) => l,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                // Non-UTF-8 line; the reader already consumed it.
                tracing::warn!(line = lineno, "skipping non-UTF-8 record");
                out.stats.records_read += 1;
                out.stats.records_skipped += 1;
                out.warnings.push(Warning::Decode {
                    line: lineno,
                    reason: "record is not valid UTF-8".to_string(),
                });
                continue;
            }
            Err(e) => {
                out.warnings.push(Warning::Decode {
                    line: lineno,
                    reason: format!("read error: {e}"),
                });
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.stats.records_read += 1;

        if trimmed.len() > config.max_record_bytes {
            out.stats.records_skipped += 1;
            out.warnings.push(Warning::Decode {
                line: lineno,
                reason: format!(
                    "record of {} bytes exceeds limit of {}",
                    trimmed.len(),
                    config.max_record_bytes
                ),
            });
            continue;
        }

        let rec: TraceRecord = match serde_json::from_str(trimmed) {
            Ok(rec) => rec,
            Err(e) => {
                tracing::debug!(line = lineno, error = %e, "skipping unparsable record");
                out.stats.records_skipped += 1;
                out.warnings.push(Warning::Decode {
                    line: lineno,
                    reason: format!("invalid record: {e}"),
                });
                continue;
            }
        };

        let Some(kind) = EventKind::from_wire(&rec.kind) else {
            out.stats.records_skipped += 1;
            out.warnings.push(Warning::Decode {
                line: lineno,
                reason: format!("unknown record type '{}'", rec.kind),
            });
            continue;
        };

        let id = match rec.seq {
            Some(s) => {
                if s < last_id {
                    out.warnings.push(Warning::Decode {
                        line: lineno,
                        reason: format!("sequence number {s} decreases (previous {last_id})"),
                    });
                }
                s
            }
            None => last_id + 1,
        };

        let ts = match rec.ts {
            None => {
                out.stats.missing_timestamps += 1;
                None
            }
            Some(v) => match v.to_ms() {
                Some(ms) => Some(ms),
                None => {
                    out.stats.missing_timestamps += 1;
                    out.warnings.push(Warning::Decode {
                        line: lineno,
                        reason: format!("bad timestamp {v:?}"),
                    });
                    None
                }
            },
        };

        out.stats.events_decoded += 1;
        *out.stats.by_kind.entry(rec.kind).or_insert(0) += 1;
        out.events.push(Event {
            id,
            ts,
            kind,
            agent: rec.agent,
            parent_hint: rec.parent,
            depth_hint: rec.depth,
            payload: rec.payload,
        });
        last_id = id;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    const SMALL_TRACE: &str = r#"{"seq":1,"ts":"2026-03-01T10:00:00Z","type":"request","payload":{"text":"list the files"}}
{"seq":2,"ts":"2026-03-01T10:00:01Z","type":"agent_start","agent":"explorer","payload":{"task":"enumerate workspace"}}
{"seq":3,"ts":"2026-03-01T10:00:02Z","type":"tool_call","payload":{"tool":"ls"}}
{"seq":4,"ts":"2026-03-01T10:00:03Z","type":"agent_end","agent":"explorer"}
{"seq":5,"ts":"2026-03-01T10:00:04Z","type":"response","payload":{"text":"done"}}
"#;

    #[test]
    fn decodes_small_trace() {
        let out = decode_bytes(SMALL_TRACE.as_bytes(), &cfg());
        assert!(out.warnings.is_empty());
        assert_eq!(out.events.len(), 5);
        assert_eq!(out.stats.records_read, 5);
        assert_eq!(out.stats.events_decoded, 5);
        assert_eq!(out.stats.records_skipped, 0);
        assert_eq!(out.events[0].id, 1);
        assert_eq!(out.events[0].kind, EventKind::Request);
        assert_eq!(out.events[0].ts, Some(1_772_359_200_000));
        assert_eq!(out.events[1].agent.as_deref(), Some("explorer"));
        assert_eq!(out.stats.by_kind["tool_call"], 1);
    }

    #[test]
    fn blank_lines_are_skipped_silently() {
        let data = "\n\n{\"seq\":1,\"type\":\"message\"}\n\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events.len(), 1);
        assert!(out.warnings.is_empty());
        assert_eq!(out.stats.records_read, 1);
    }

    #[test]
    fn bad_line_keeps_the_rest() {
        let data = "{\"seq\":1,\"type\":\"message\"}\nnot json at all\n{\"seq\":3,\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.warnings.len(), 1);
        match &out.warnings[0] {
            Warning::Decode { line, reason } => {
                assert_eq!(*line, 2);
                assert!(reason.starts_with("invalid record"));
            }
            other => panic!("unexpected warning {other:?}"),
        }
        assert_eq!(out.stats.records_skipped, 1);
    }

    #[test]
    fn unknown_type_is_skipped_with_warning() {
        let data = "{\"seq\":1,\"type\":\"telemetry\"}\n{\"seq\":2,\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].id, 2);
        assert!(out.warnings[0]
            .to_string()
            .contains("unknown record type 'telemetry'"));
    }

    #[test]
    fn missing_seq_continues_from_previous() {
        let data = "{\"type\":\"message\"}\n{\"seq\":10,\"type\":\"message\"}\n{\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        let ids: Vec<u64> = out.events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 10, 11]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn decreasing_seq_warns_but_keeps_the_event() {
        let data = "{\"seq\":5,\"type\":\"message\"}\n{\"seq\":2,\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[1].id, 2);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].to_string().contains("decreases"));
    }

    #[test]
    fn bad_timestamp_is_cleared_not_dropped() {
        let data = "{\"seq\":1,\"ts\":\"yesterday\",\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].ts, None);
        assert_eq!(out.stats.missing_timestamps, 1);
        assert!(out.warnings[0].to_string().contains("bad timestamp"));
    }

    #[test]
    fn epoch_numbers_decode_in_both_units() {
        let data = "{\"seq\":1,\"ts\":1772359200,\"type\":\"message\"}\n{\"seq\":2,\"ts\":1772359200500,\"type\":\"message\"}\n";
        let out = decode_bytes(data.as_bytes(), &cfg());
        assert_eq!(out.events[0].ts, Some(1_772_359_200_000));
        assert_eq!(out.events[1].ts, Some(1_772_359_200_500));
    }

    #[test]
    fn oversized_record_is_skipped() {
        let mut config = cfg();
        config.max_record_bytes = 64;
        let big = format!(
            "{{\"seq\":1,\"type\":\"message\",\"payload\":{{\"text\":\"{}\"}}}}",
            "x".repeat(200)
        );
        let data = format!("{big}\n{{\"seq\":2,\"type\":\"message\"}}\n");
        let out = decode_bytes(data.as_bytes(), &config);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].id, 2);
        assert!(out.warnings[0].to_string().contains("exceeds limit"));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let out = decode_bytes(b"", &cfg());
        assert!(out.events.is_empty());
        assert!(out.warnings.is_empty());
        assert_eq!(out.stats, DecodeStats::default());
    }

    #[test]
    fn decode_file_missing_is_a_source_error() {
        let err = decode_file(Path::new("/nonexistent/trace.jsonl"), &cfg()).unwrap_err();
        assert!(matches!(err, LoadError::Source { .. }));
    }

    #[test]
    fn decode_file_reads_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let mut f = File::create(&path).unwrap();
        write!(f, "{SMALL_TRACE}").unwrap();
        let out = decode_file(&path, &cfg()).unwrap();
        assert_eq!(out.events.len(), 5);
    }

    #[test]
    fn non_utf8_line_is_absorbed() {
        let mut data: Vec<u8> = Vec::new();
        data.extend_from_slice(b"{\"seq\":1,\"type\":\"message\"}\n");
        data.extend_from_slice(&[0xff, 0xfe, 0xfd, b'\n']);
        data.extend_from_slice(b"{\"seq\":3,\"type\":\"message\"}\n");
        let out = decode_bytes(&data, &cfg());
        assert_eq!(out.events.len(), 2);
        assert!(out.warnings[0].to_string().contains("not valid UTF-8"));
    }
}
