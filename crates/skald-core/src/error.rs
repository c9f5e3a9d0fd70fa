use std::path::PathBuf;
use thiserror::Error;

/// Fatal, per-file load failure. Anything softer is absorbed as a
/// [`crate::Warning`] and attached to the timeline instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read trace source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no parsable events in {}", path.display())]
    NoParsableEvents { path: PathBuf },
}

impl LoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::Source { path, .. } => path,
            LoadError::NoParsableEvents { path } => path,
        }
    }
}
