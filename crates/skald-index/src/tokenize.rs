use serde_json::Value;
use std::collections::BTreeSet;

/// Collect search tokens from one payload value.
///
/// Every string anywhere in the payload is split on whitespace, trimmed of
/// non-alphanumeric edges, and case-folded. Object keys are not indexed,
/// only values. Collection stops once `max_tokens` tokens were accepted.
pub fn payload_tokens(
    payload: &Value,
    min_len: usize,
    max_tokens: usize,
    out: &mut BTreeSet<String>,
) {
    let mut budget = max_tokens;
    walk(payload, min_len, &mut budget, out);
}

fn walk(value: &Value, min_len: usize, budget: &mut usize, out: &mut BTreeSet<String>) {
    if *budget == 0 {
        return;
    }
    match value {
        Value::String(s) => {
            for raw in s.split_whitespace() {
                if *budget == 0 {
                    return;
                }
                if let Some(tok) = normalize_token(raw, min_len) {
                    out.insert(tok);
                    *budget -= 1;
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, min_len, budget, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                walk(v, min_len, budget, out);
            }
        }
        _ => {}
    }
}

/// Trim non-alphanumeric edges and case-fold one raw word.
///
/// Returns `None` when the result is shorter than `min_len` characters,
/// which also drops pure punctuation.
pub fn normalize_token(raw: &str, min_len: usize) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.chars().count() < min_len.max(1) {
        return None;
    }
    Some(trimmed.to_lowercase())
}
