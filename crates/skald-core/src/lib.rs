pub mod config;
pub mod error;
pub mod record;
pub mod timefmt;
pub mod types;

pub use types::*;
