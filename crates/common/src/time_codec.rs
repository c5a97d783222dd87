use chrono::{
    DateTime,
    NaiveDateTime,
    TimeZone,
    Utc,
};

/// The canonical wire format for date keys: `"%Y-%m-%d %H:%MZ"`, e.g.
/// `"2020-01-01 00:00Z"`. The trailing `Z` is matched as a literal rather
/// than parsed as a timezone offset -- every date key is UTC by convention.
const FORMAT: &str = "%Y-%m-%d %H:%MZ";

/// Parses and formats date keys against the canonical wire format.
///
/// Standardizes on UTC rather than the host's local time: two cache
/// instances parsing the same date key always agree on the epoch, which the
/// original host-local behavior did not guarantee.
pub struct TimeCodec;

impl TimeCodec {
    /// Parses a date key to a Unix epoch (seconds). Returns `-1` on
    /// unparseable input, matching the "malformed timestamps don't abort the
    /// whole batch" posture used throughout ingestion.
    pub fn parse_to_epoch(s: &str) -> i64 {
        NaiveDateTime::parse_from_str(s, FORMAT)
            .map(|naive| naive.and_utc().timestamp())
            .unwrap_or(-1)
    }

    pub fn is_valid(s: &str) -> bool {
        NaiveDateTime::parse_from_str(s, FORMAT).is_ok()
    }

    /// Formats an epoch back to the canonical date key. Returns an empty
    /// string if `epoch` is out of `chrono`'s representable range.
    pub fn format_from_epoch(epoch: i64) -> String {
        DateTime::from_timestamp(epoch, 0).map(|dt| dt.format(FORMAT).to_string()).unwrap_or_default()
    }

    /// Shifts a date key by `offset_secs` (positive or negative) and
    /// reformats it. Used to widen a query interval by a multiple of the
    /// finest downsampling duration when prefetching. Returns an empty
    /// string if `s` doesn't parse.
    pub fn offset(s: &str, offset_secs: i64) -> String {
        let epoch = Self::parse_to_epoch(s);
        if epoch < 0 {
            return String::new();
        }
        Self::format_from_epoch(epoch + offset_secs)
    }

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    pub fn from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(epoch, 0).single()
    }
}
