//! Timestamp helpers for file names and report headers.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Format used in file names, e.g. `20240131_154500`.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format used in report headers, e.g. `2024-01-31 15:45:00`.
pub const DISPLAY_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use analystflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp for use in a file name.
#[must_use]
pub fn file_stamp(ts: &Timestamp) -> String {
    ts.format(FILE_STAMP_FORMAT).to_string()
}

/// Formats a timestamp for display in a report.
#[must_use]
pub fn display_stamp(ts: &Timestamp) -> String {
    ts.format(DISPLAY_STAMP_FORMAT).to_string()
}
