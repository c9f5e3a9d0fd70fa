mod pipeline;
mod store;

pub use pipeline::{content_hash, load, load_bytes, load_with_options, LoadOptions, LoadedTrace};
pub use store::TraceStore;
