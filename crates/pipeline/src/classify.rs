//! Booking classification: online-vs-manual origin, status eligibility,
//! and attribution-key extraction.

use relay_core::types::BookingRecord;
use url::Url;

/// Query/metadata parameter carrying the attribution key.
const ATTRIBUTION_PARAM: &str = "eid";

/// Markers identifying staff-created bookings in channel/creator strings.
const MANUAL_MARKERS: &[&str] = &["admin", "manual", "staff", "phone", "walk-in", "walkin"];

const BLOCKED_STATUSES: &[&str] = &[
    "canceled",
    "cancelled",
    "declined",
    "no-show",
    "noshow",
    "no_show",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOrigin {
    /// Explicit online-booking signal present.
    Online,
    /// Channel/creator string identifies a staff-created booking.
    Manual,
    /// No explicit signal either way. Not forwardable.
    Unknown,
}

/// The explicit online signal wins over channel text; with no signal the
/// classification fails closed — absence of proof is not proof of online
/// origin.
pub fn classify_origin(booking: &BookingRecord) -> BookingOrigin {
    if booking.online == Some(true) {
        return BookingOrigin::Online;
    }
    let channel = booking.channel.as_deref().unwrap_or("").to_lowercase();
    if MANUAL_MARKERS.iter().any(|marker| channel.contains(marker)) {
        return BookingOrigin::Manual;
    }
    BookingOrigin::Unknown
}

/// Cancelled/declined/no-show bookings never forward. With the
/// `require_confirmed` policy set, only a "confirmed" status passes;
/// otherwise booked/scheduled/pending (and statuses this relay does not
/// recognize) pass through.
pub fn is_eligible_status(booking: &BookingRecord, require_confirmed: bool) -> bool {
    let status = booking
        .status
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if BLOCKED_STATUSES.contains(&status.as_str()) {
        return false;
    }
    if require_confirmed {
        return status == "confirmed";
    }
    true
}

/// Look for an explicit attribution key: structured metadata first, then
/// an `eid` query parameter in the referrer URL, then an `eid=` token in
/// free-text notes. `None` is the normal case for unattributed bookings,
/// not an error.
pub fn extract_attribution_key(booking: &BookingRecord) -> Option<String> {
    if let Some(metadata) = &booking.metadata {
        if let Some(value) = metadata.get(ATTRIBUTION_PARAM).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    if let Some(key) = booking.referrer.as_deref().and_then(key_from_url) {
        return Some(key);
    }
    booking.notes.as_deref().and_then(key_from_text)
}

fn key_from_url(referrer: &str) -> Option<String> {
    let url = Url::parse(referrer).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == ATTRIBUTION_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn key_from_text(notes: &str) -> Option<String> {
    let marker = format!("{ATTRIBUTION_PARAM}=");
    let start = notes.find(&marker)? + marker.len();
    let value: String = notes[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '&' | ',' | ';'))
        .collect();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> BookingRecord {
        serde_json::from_value(serde_json::json!({"id": "b-1"})).unwrap()
    }

    #[test]
    fn test_explicit_online_signal_wins_over_channel() {
        let mut b = booking();
        b.online = Some(true);
        b.channel = Some("admin-console".to_string());
        assert_eq!(classify_origin(&b), BookingOrigin::Online);
    }

    #[test]
    fn test_manual_marker_in_channel() {
        let mut b = booking();
        b.channel = Some("staff-manual".to_string());
        assert_eq!(classify_origin(&b), BookingOrigin::Manual);
    }

    #[test]
    fn test_no_signal_fails_closed() {
        let mut b = booking();
        b.channel = Some("unknown-widget".to_string());
        assert_eq!(classify_origin(&b), BookingOrigin::Unknown);
        assert_eq!(classify_origin(&booking()), BookingOrigin::Unknown);
    }

    #[test]
    fn test_blocked_statuses() {
        for status in ["canceled", "Cancelled", "declined", "no-show"] {
            let mut b = booking();
            b.status = Some(status.to_string());
            assert!(!is_eligible_status(&b, false), "{status} should block");
        }
    }

    #[test]
    fn test_open_statuses_pass_unless_confirmed_required() {
        for status in ["booked", "scheduled", "pending"] {
            let mut b = booking();
            b.status = Some(status.to_string());
            assert!(is_eligible_status(&b, false));
            assert!(!is_eligible_status(&b, true));
        }
        let mut b = booking();
        b.status = Some("confirmed".to_string());
        assert!(is_eligible_status(&b, true));
    }

    #[test]
    fn test_key_priority_metadata_over_referrer() {
        let mut b = booking();
        b.metadata = Some(
            [("eid".to_string(), serde_json::json!("from-metadata"))]
                .into_iter()
                .collect(),
        );
        b.referrer = Some("https://example.com/book?eid=from-referrer".to_string());
        assert_eq!(extract_attribution_key(&b).as_deref(), Some("from-metadata"));
    }

    #[test]
    fn test_key_from_referrer_is_url_decoded() {
        let mut b = booking();
        b.referrer = Some("https://example.com/book?utm=x&eid=abc%20123".to_string());
        assert_eq!(extract_attribution_key(&b).as_deref(), Some("abc 123"));
    }

    #[test]
    fn test_key_from_notes_stops_at_delimiters() {
        let mut b = booking();
        b.notes = Some("ref eid=abc123&utm=y please call".to_string());
        assert_eq!(extract_attribution_key(&b).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_no_key_is_normal() {
        let mut b = booking();
        b.notes = Some("no marker here".to_string());
        assert_eq!(extract_attribution_key(&b), None);
    }
}
