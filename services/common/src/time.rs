//! FIX UTC timestamp helpers
//!
//! Tags 52 (SendingTime) and 60 (TransactTime) use `YYYYMMDD-HH:MM:SS.mmm`
//! in UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Wire format for FIX timestamp fields
pub const FIX_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

/// Current UTC time in FIX wire format
#[must_use]
pub fn utc_timestamp() -> String {
    Utc::now().format(FIX_TIME_FORMAT).to_string()
}

/// Parse a FIX wire timestamp back into a UTC datetime
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, FIX_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
