//! The load pipeline: decode, reconstruct, assemble, index.
//!
//! `load` is the one-call entry point for turning a trace file into a
//! queryable [`LoadedTrace`]. Per-record problems surface as warnings on the
//! timeline; the only fatal outcomes are an unreadable source and a source
//! with zero parsable events.

use std::path::Path;
use std::time::Instant;

use skald_core::config::EngineConfig;
use skald_core::error::LoadError;
use skald_core::{timefmt, TraceMeta};
use skald_index::SearchIndex;
use skald_timeline::{assemble, reconstruct, Timeline};

/// One fully loaded trace: the immutable timeline plus its search index.
#[derive(Debug)]
pub struct LoadedTrace {
    pub timeline: Timeline,
    pub index: SearchIndex,
}

/// Caller knobs for a single load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config: EngineConfig,
    /// Anchor for traces that carry no usable timestamps. Wall clock when
    /// absent; tests pin it for reproducible output.
    pub file_open_ms: Option<i64>,
}

/// Load a trace file with default options.
pub fn load(path: &Path) -> Result<LoadedTrace, LoadError> {
    load_with_options(path, &LoadOptions::default())
}

/// Load a trace file, reading it once and hashing the raw bytes.
pub fn load_with_options(path: &Path, opts: &LoadOptions) -> Result<LoadedTrace, LoadError> {
    let data = std::fs::read(path).map_err(|e| LoadError::Source {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_bytes(path, &data, opts)
}

/// Run the pipeline over bytes already in memory. `path` is provenance only;
/// it is recorded in the metadata and never touched.
pub fn load_bytes(path: &Path, data: &[u8], opts: &LoadOptions) -> Result<LoadedTrace, LoadError> {
    let started = Instant::now();
    let loaded_at = timefmt::now_rfc3339();
    let content_hash = content_hash(data);

    let outcome = skald_decode::decode_bytes(data, &opts.config);
    if outcome.events.is_empty() {
        return Err(LoadError::NoParsableEvents {
            path: path.to_path_buf(),
        });
    }

    let file_open_ms = opts.file_open_ms.unwrap_or_else(timefmt::now_ms);
    let recon = reconstruct(outcome.events, file_open_ms);

    let meta = TraceMeta {
        source_path: path.to_path_buf(),
        load_id: new_load_id(),
        loaded_at,
        load_duration_ms: started.elapsed().as_millis() as u64,
        event_count: outcome.stats.events_decoded,
        skipped_records: outcome.stats.records_skipped,
        content_hash,
    };
    let timeline = assemble(recon, outcome.warnings, meta);
    let index = SearchIndex::build_with(&timeline, &opts.config);

    tracing::info!(
        path = %path.display(),
        spans = timeline.span_count(),
        events = timeline.event_count(),
        warnings = timeline.warnings().len(),
        "trace loaded"
    );
    Ok(LoadedTrace { timeline, index })
}

/// Truncated blake3 over the raw bytes. Equal content always hashes equal,
/// so the store can skip rebuilds on unchanged files.
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..32].to_string()
}

fn new_load_id() -> String {
    format!("ld_{}", ulid::Ulid::new().to_string().to_lowercase())
}

// ── Tests ──────────────────────────────────────────────────────────────
