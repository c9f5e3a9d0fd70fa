use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use globset::{Glob, GlobMatcher};
use skald_core::config::EngineConfig;
use skald_core::timefmt;

use crate::render;

struct Found {
    path: PathBuf,
    modified_ms: i64,
    bytes: u64,
}

pub fn execute(
    root: Option<&Path>,
    glob: Option<&str>,
    json: bool,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let root = match root {
        Some(r) => r.to_path_buf(),
        None => default_root(),
    };
    if !root.is_dir() {
        anyhow::bail!("scan root {} is not a directory", root.display());
    }
    let matcher = glob
        .map(|g| {
            Glob::new(g)
                .map(|g| g.compile_matcher())
                .with_context(|| format!("invalid glob {g:?}"))
        })
        .transpose()?;

    let mut found = Vec::new();
    collect(&root, &config.trace_extension, matcher.as_ref(), &mut found);
    // Newest first; path breaks the tie for stable output.
    found.sort_by(|a, b| b.modified_ms.cmp(&a.modified_ms).then_with(|| a.path.cmp(&b.path)));

    if found.is_empty() {
        println!("No trace files under {}", root.display());
        return Ok(());
    }

    if json {
        for f in &found {
            let doc = serde_json::json!({
                "path": f.path,
                "modified": timefmt::format_rfc3339_ms(f.modified_ms),
                "bytes": f.bytes,
            });
            println!("{doc}");
        }
    } else {
        for f in &found {
            println!(
                "[{}] {:>10}  {}",
                render::short_ts(f.modified_ms),
                render::format_size(f.bytes),
                f.path.display()
            );
        }
        println!("\n({} trace files)", found.len());
    }
    Ok(())
}

/// The conventional agent log root when it exists, else the cwd.
fn default_root() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        let logs = home.join(".claude").join("projects");
        if logs.is_dir() {
            return logs;
        }
    }
    PathBuf::from(".")
}

/// Recursive walk. Unreadable directories are skipped, not fatal.
fn collect(dir: &Path, extension: &str, matcher: Option<&GlobMatcher>, out: &mut Vec<Found>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            collect(&path, extension, matcher, out);
            continue;
        }
        if !meta.is_file() || !matches_trace(&path, extension, matcher) {
            continue;
        }
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        out.push(Found {
            path,
            modified_ms,
            bytes: meta.len(),
        });
    }
}

fn matches_trace(path: &Path, extension: &str, matcher: Option<&GlobMatcher>) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if !by_extension {
        return false;
    }
    match matcher {
        None => true,
        Some(m) => {
            if m.is_match(path) {
                return true;
            }
            // Also try the bare file name, so "session-*.jsonl" works
            // without directory components.
            path.file_name()
                .map(|n| m.is_match(Path::new(n)))
                .unwrap_or(false)
        }
    }
}
