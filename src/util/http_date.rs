//! Parsing for HTTP `Date`-style response headers.

use chrono::{DateTime, Utc};

/// Parse an RFC 2822 HTTP date header (`Sun, 06 Nov 1994 08:49:37 GMT`)
/// into a UTC timestamp. Returns `None` for malformed values rather than
/// erroring; callers fall back to local time.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc2822_date() {
        let dt = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (1994, 11, 6));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (8, 49, 37));
    }

    #[test]
    fn test_parse_with_offset_normalizes_to_utc() {
        let dt = parse_http_date("Wed, 01 Jan 2025 00:30:00 +0100").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 23);
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        assert!(parse_http_date("  Sun, 06 Nov 1994 08:49:37 GMT  ").is_some());
    }

    #[test]
    fn test_parse_malformed_returns_none() {
        assert!(parse_http_date("not a date").is_none());
        assert!(parse_http_date("").is_none());
        assert!(parse_http_date("2025-01-01T00:00:00Z").is_none());
    }
}
