//! Spreadsheet serial dates.

use chrono::{DateTime, TimeZone, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Fractional days since the spreadsheet epoch, 1899-12-30 00:00 UTC.
///
/// The remote store writes `timeIn`, `timeOut` and upload timestamps in this
/// form so they render as dates in the sheet.
#[must_use]
pub fn excel_serial(at: DateTime<Utc>) -> f64 {
    let epoch = Utc
        .with_ymd_and_hms(1899, 12, 30, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    #[allow(clippy::cast_precision_loss)] // millisecond spans stay well inside f64's exact range
    let millis = (at - epoch).num_milliseconds() as f64;
    millis / MILLIS_PER_DAY
}
