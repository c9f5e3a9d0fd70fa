mod index;
mod tokenize;

pub use index::{QueryResult, SearchIndex, SpanFilter, TimeRange};
