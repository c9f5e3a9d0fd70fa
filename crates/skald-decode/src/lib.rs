mod decode;

pub use decode::{decode_bytes, decode_file, decode_reader, DecodeOutcome, DecodeStats};
