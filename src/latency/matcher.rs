//! Venue to monitor matching
//!
//! Substring matching is ambiguous by nature. The first record that
//! matches wins, in whatever order the telemetry source returned them.

use super::telemetry::TelemetryRecord;

/// Find the monitor for a venue.
///
/// A record matches when, case-insensitively, the venue name occurs in the
/// record's friendly name or URL, or the venue id occurs in the friendly name.
pub fn match_monitor<'a>(
    venue_id: &str,
    venue_name: &str,
    records: &'a [TelemetryRecord],
) -> Option<&'a TelemetryRecord> {
    let search_name = venue_name.to_lowercase();
    let search_id = venue_id.to_lowercase();

    records.iter().find(|record| {
        let friendly_name = record.friendly_name.to_lowercase();
        let url = record.url.to_lowercase();

        friendly_name.contains(&search_name)
            || url.contains(&search_name)
            || friendly_name.contains(&search_id)
    })
}
