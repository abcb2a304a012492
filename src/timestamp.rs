use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const DISPLAY_FORMAT: &str = "%b %d, %Y %I:%M %p";
pub const UNKNOWN: &str = "Unknown";

/// Parses an ISO-8601 timestamp, keeping its offset. Timestamps without an
/// offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    // Offsets without a colon, or a space instead of `T`
    let zoned = [
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
    ];
    for f in zoned.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    let naive = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for f in naive.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(Utc.from_utc_datetime(&ndt).into());
        }
    }
    // date only: midnight UTC
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt).into())
}

pub fn to_iso(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Human form, e.g. `Sep 26, 2025 07:14 PM`, in the timestamp's own offset.
pub fn format_display(dt: &DateTime<FixedOffset>) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

/// Display form of a raw value: reformatted when it parses, left as-is when
/// it does not, `Unknown` when empty.
pub fn display_raw(raw: &str) -> String {
    if raw.trim().is_empty() {
        return UNKNOWN.to_string();
    }
    match parse_timestamp(raw) {
        Some(dt) => format_display(&dt),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Case {
        input: &'static str,
        expected_utc: Option<&'static str>,
        description: &'static str,
    }

    const CASES: &[Case] = &[
        Case { input: "2025-09-26T19:14:45.987000+00:00", expected_utc: Some("2025-09-26T19:14:45.987+00:00"), description: "microseconds with colon offset" },
        Case { input: "2025-09-26T10:00:00Z", expected_utc: Some("2025-09-26T10:00:00+00:00"), description: "Z suffix" },
        Case { input: "2025-09-26T12:00:00+0200", expected_utc: Some("2025-09-26T10:00:00+00:00"), description: "offset without colon" },
        Case { input: "2025-09-26 10:00:00+00:00", expected_utc: Some("2025-09-26T10:00:00+00:00"), description: "space separator" },
        Case { input: "2025-09-26T10:00:00", expected_utc: Some("2025-09-26T10:00:00+00:00"), description: "naive taken as UTC" },
        Case { input: "2025-09-26", expected_utc: Some("2025-09-26T00:00:00+00:00"), description: "date only" },
        Case { input: "26/09/2025 10:00", expected_utc: None, description: "day-first" },
        Case { input: "yesterday", expected_utc: None, description: "free text" },
        Case { input: "", expected_utc: None, description: "empty" },
    ];

    #[test]
    fn parses_timestamp_variants() {
        for case in CASES {
            let got = parse_timestamp(case.input).map(|d| d.with_timezone(&Utc).to_rfc3339());
            assert_eq!(got.as_deref(), case.expected_utc, "{}: {}", case.description, case.input);
        }
    }

    #[test]
    fn offset_is_preserved_for_display() {
        let dt = parse_timestamp("2025-09-26T19:14:45+05:30").unwrap();
        assert_eq!(format_display(&dt), "Sep 26, 2025 07:14 PM");
        assert_eq!(to_iso(&dt), "2025-09-26T19:14:45+05:30");
    }

    #[test]
    fn display_raw_falls_back() {
        assert_eq!(display_raw("2025-09-26T10:00:00+00:00"), "Sep 26, 2025 10:00 AM");
        assert_eq!(display_raw("Sep 26, 2025 10:00 AM"), "Sep 26, 2025 10:00 AM");
        assert_eq!(display_raw("  "), "Unknown");
    }
}
