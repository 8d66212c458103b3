//! The probe header that carries a probe's identity through the mail system.
//!
//! Outbound probes carry `X-RoundTrip-Probe: <uuid> <sent_at>`. Inbound mail
//! is searched for the same line; anything that does not match exactly is
//! treated as ordinary mail.

use std::sync::LazyLock;

use regex::Regex;

pub const PROBE_HEADER: &str = "X-RoundTrip-Probe";

static PROBE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^X-RoundTrip-Probe: ([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}) ((?:[0-9]*\.)?[0-9]+)[ \t]*\r?$",
    )
    .expect("probe header pattern is valid")
});

/// Identity and send time recovered from an inbound probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeHeader {
    pub id: String,
    /// Unix seconds, possibly fractional
    pub sent_at: f64,
}

impl ProbeHeader {
    /// Header value for an outbound probe.
    pub fn value(id: &str, sent_at: i64) -> String {
        format!("{id} {sent_at}")
    }

    /// Find the first probe header line in a raw message.
    pub fn find(message: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(message);
        let captures = PROBE_LINE.captures(&text)?;

        let id = captures.get(1)?.as_str().to_string();
        let sent_at = captures.get(2)?.as_str().parse::<f64>().ok()?;

        Some(Self { id, sent_at })
    }

    /// Seconds between sending and `now`, truncated to millisecond precision.
    pub fn round_trip(&self, now: f64) -> f64 {
        truncate_millis(now - self.sent_at)
    }
}

pub(crate) fn truncate_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).trunc() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn message(header: &str) -> Vec<u8> {
        format!("From: a@example.org\r\n{header}\r\nSubject: x\r\n\r\nbody\r\n").into_bytes()
    }

    #[test]
    fn value_formats_id_and_time() {
        assert_eq!(ProbeHeader::value(ID, 1000), format!("{ID} 1000"));
    }

    #[test]
    fn finds_integer_and_fractional_times() {
        let found = ProbeHeader::find(&message(&format!("X-RoundTrip-Probe: {ID} 1000")))
            .expect("header");
        assert_eq!(found.id, ID);
        assert!((found.sent_at - 1000.0).abs() < f64::EPSILON);

        let found = ProbeHeader::find(&message(&format!("X-RoundTrip-Probe: {ID} 1000.000 ")))
            .expect("header with fraction and trailing blank");
        assert!((found.sent_at - 1000.0).abs() < f64::EPSILON);

        let found =
            ProbeHeader::find(&message(&format!("X-RoundTrip-Probe: {ID} .5"))).expect("header");
        assert!((found.sent_at - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn works_with_bare_newlines() {
        let raw = format!("Subject: x\nX-RoundTrip-Probe: {ID} 42\n\nbody\n");
        assert!(ProbeHeader::find(raw.as_bytes()).is_some());
    }

    #[test]
    fn malformed_headers_are_ignored() {
        for header in [
            format!("X-RoundTrip-Probe: {ID}"),
            format!("X-RoundTrip-Probe: {} 1000", ID.to_uppercase()),
            format!("X-RoundTrip-Probe: {ID} 1000 trailing"),
            format!("X-RoundTrip-Probe: {ID} abc"),
            "X-RoundTrip-Probe: not-a-uuid-at-all-not-a-uuid-at-all-xx 1000".to_string(),
            format!(" X-RoundTrip-Probe: {ID} 1000"),
            format!("X-Other: {ID} 1000"),
        ] {
            assert_eq!(ProbeHeader::find(&message(&header)), None, "{header}");
        }
    }

    #[test]
    fn first_header_wins() {
        let other = "11111111-2222-4333-8444-555555555555";
        let raw = message(&format!(
            "X-RoundTrip-Probe: {ID} 1\r\nX-RoundTrip-Probe: {other} 2"
        ));
        assert_eq!(ProbeHeader::find(&raw).map(|header| header.id), Some(ID.to_string()));
    }

    #[test]
    fn round_trip_truncates_to_millis() {
        let header = ProbeHeader {
            id: ID.to_string(),
            sent_at: 1000.0,
        };
        assert!((header.round_trip(1007.25) - 7.25).abs() < 1e-9);
        assert!((header.round_trip(1007.123_99) - 7.123).abs() < 1e-9);
    }
}
