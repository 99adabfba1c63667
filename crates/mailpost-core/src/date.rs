//! Send-date formatting
//!
//! Dates render as `DD MMM YYYY at HHMM-PDT` (or `-PST` outside daylight
//! saving). The zone letter is fixed; only the daylight/standard half of
//! the suffix varies. Month abbreviations are 3-letter English.

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Offset, TimeZone};

/// Fixed leading letter of the zone suffix.
const ZONE_LETTER: char = 'P';

/// The current local time as a send date.
pub fn send_date() -> String {
    let now = Local::now();
    format_send_date(now.naive_local(), is_dst(&now))
}

/// Pure formatting over a calendar time and a daylight-saving flag.
pub fn format_send_date(dt: NaiveDateTime, dst: bool) -> String {
    let half = if dst { 'D' } else { 'S' };
    format!(
        "{} at {}-{ZONE_LETTER}{half}T",
        dt.format("%d %b %Y"),
        dt.format("%H%M")
    )
}

/// Daylight saving is in effect when the offset exceeds the year's
/// standard (minimum) offset.
fn is_dst(now: &DateTime<Local>) -> bool {
    let offset = now.offset().fix().local_minus_utc();
    match standard_offset(now.year()) {
        Some(standard) => offset > standard,
        None => false,
    }
}

/// The year's standard offset: the smaller of the two mid-season offsets,
/// which holds for either hemisphere.
fn standard_offset(year: i32) -> Option<i32> {
    let jan = Local.with_ymd_and_hms(year, 1, 1, 12, 0, 0).single()?;
    let jul = Local.with_ymd_and_hms(year, 7, 1, 12, 0, 0).single()?;
    Some(
        jan.offset()
            .fix()
            .local_minus_utc()
            .min(jul.offset().fix().local_minus_utc()),
    )
}
