mod assemble;
mod reconstruct;
mod timeline;

pub use assemble::assemble;
pub use reconstruct::{reconstruct, Reconstruction, SpanBuild};
pub use timeline::{Ancestors, Span, Timeline};
