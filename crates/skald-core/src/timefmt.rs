use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Highest epoch value accepted from a source, in milliseconds (year 3000).
const MAX_EPOCH_MS: i64 = 32_503_680_000_000;

/// Below this an epoch number is read as seconds, at or above as milliseconds.
const EPOCH_SECONDS_CUTOFF: i64 = 100_000_000_000;

fn in_range(ms: i64) -> Option<i64> {
    if (0..=MAX_EPOCH_MS).contains(&ms) {
        Some(ms)
    } else {
        None
    }
}

/// Parse RFC 3339 text into unix milliseconds.
pub fn parse_rfc3339_ms(s: &str) -> Option<i64> {
    let dt = OffsetDateTime::parse(s, &Rfc3339).ok()?;
    in_range((dt.unix_timestamp_nanos() / 1_000_000) as i64)
}

/// Interpret a bare epoch integer, seconds or milliseconds by magnitude.
pub fn epoch_to_ms(n: i64) -> Option<i64> {
    let ms = if n < EPOCH_SECONDS_CUTOFF {
        n.checked_mul(1000)?
    } else {
        n
    };
    in_range(ms)
}

/// Fractional epoch numbers carry sub-second precision in either unit.
pub fn epoch_f64_to_ms(n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }
    let ms = if n < EPOCH_SECONDS_CUTOFF as f64 {
        (n * 1000.0).round() as i64
    } else {
        n.round() as i64
    };
    in_range(ms)
}

/// Format unix milliseconds as RFC 3339.
///
/// Only call with values that came through the range checks above (or were
/// interpolated between such values).
pub fn format_rfc3339_ms(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| String::from("1970-01-01T00:00:00Z"))
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_and_without_fraction() {
        assert_eq!(
            parse_rfc3339_ms("2026-03-01T10:00:00Z"),
            Some(1_772_359_200_000)
        );
        assert_eq!(
            parse_rfc3339_ms("2026-03-01T10:00:00.250Z"),
            Some(1_772_359_200_250)
        );
        assert_eq!(
            parse_rfc3339_ms("2026-03-01T11:00:00+01:00"),
            Some(1_772_359_200_000)
        );
        assert_eq!(parse_rfc3339_ms("yesterday"), None);
        assert_eq!(parse_rfc3339_ms("2026-03-01"), None);
    }

    #[test]
    fn epoch_magnitude_disambiguation() {
        // Ten digits: seconds.
        assert_eq!(epoch_to_ms(1_772_359_200), Some(1_772_359_200_000));
        // Thirteen digits: already milliseconds.
        assert_eq!(epoch_to_ms(1_772_359_200_123), Some(1_772_359_200_123));
        assert_eq!(epoch_to_ms(0), Some(0));
        assert_eq!(epoch_to_ms(-5), None);
        // Far past year 3000 in either reading.
        assert_eq!(epoch_to_ms(99_999_999_999_999_999), None);
    }

    #[test]
    fn fractional_epoch_keeps_subsecond_precision() {
        assert_eq!(epoch_f64_to_ms(1_772_359_200.5), Some(1_772_359_200_500));
        assert_eq!(epoch_f64_to_ms(f64::NAN), None);
        assert_eq!(epoch_f64_to_ms(f64::INFINITY), None);
    }

    #[test]
    fn format_round_trips_parse() {
        let ms = 1_772_359_200_250;
        let text = format_rfc3339_ms(ms);
        assert_eq!(parse_rfc3339_ms(&text), Some(ms));
        // Whole seconds format without a fractional part.
        assert_eq!(format_rfc3339_ms(1_772_359_200_000), "2026-03-01T10:00:00Z");
    }

    #[test]
    fn now_is_in_range() {
        let ms = now_ms();
        assert!(ms > 1_600_000_000_000);
        assert!(parse_rfc3339_ms(&now_rfc3339()).is_some());
    }
}
