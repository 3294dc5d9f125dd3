//! RFC 3339 timestamp helpers.
//!
//! Records carry timestamps as RFC 3339 strings so they serialize verbatim.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current UTC time as an RFC 3339 string.
pub fn now() -> String {
    format(OffsetDateTime::now_utc())
}

/// Format a timestamp as RFC 3339. Falls back to the Unix epoch string if the
/// value is outside the representable range.
pub fn format(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Parse an RFC 3339 string.
pub fn parse(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}

/// `YYYY-MM` bucket key for a timestamp string. `None` when unparseable.
pub fn month_key(raw: &str) -> Option<String> {
    let at = parse(raw)?;
    Some(format!("{:04}-{:02}", at.year(), u8::from(at.month())))
}

/// Milliseconds elapsed between two RFC 3339 timestamps, clamped at zero.
pub fn elapsed_ms(from: &str, to: &str) -> Option<u64> {
    let start = parse(from)?;
    let end = parse(to)?;
    let ms = (end - start).whole_milliseconds();
    Some(ms.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_pads_month() {
        assert_eq!(month_key("2026-03-09T10:00:00Z").as_deref(), Some("2026-03"));
        assert_eq!(month_key("not a date"), None);
    }

    #[test]
    fn elapsed_never_negative() {
        assert_eq!(
            elapsed_ms("2026-01-01T00:00:01Z", "2026-01-01T00:00:00Z"),
            Some(0)
        );
        assert_eq!(
            elapsed_ms("2026-01-01T00:00:00Z", "2026-01-01T00:00:02.5Z"),
            Some(2500)
        );
    }

    #[test]
    fn now_round_trips_through_parse() {
        assert!(parse(&now()).is_some());
    }
}
