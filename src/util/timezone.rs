use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use chrono::{DateTime, TimeZone, Utc};
use time::{OffsetDateTime, UtcOffset};

/// Date format used when neither the caller nor the configuration provides one.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> DateTime<Tz> {
    let utc = time.to_offset(UtcOffset::UTC);
    let seconds = utc.unix_timestamp();
    let nanos: u32 = utc.nanosecond();
    let datetime_utc = DateTime::<Utc>::from_timestamp(seconds, nanos)
        .or_else(|| DateTime::<Utc>::from_timestamp(seconds, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    tz.from_utc_datetime(&datetime_utc.naive_utc())
}

/// Returns whether `pattern` is a valid strftime pattern.
pub fn is_valid_format(pattern: &str) -> bool {
    !pattern.is_empty() && !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Render `time` in `tz` with a strftime `pattern`.
///
/// Invalid patterns fall back to [`DEFAULT_DATE_FORMAT`].
pub fn format_local(time: OffsetDateTime, tz: Tz, pattern: &str) -> String {
    let pattern = if is_valid_format(pattern) {
        pattern
    } else {
        DEFAULT_DATE_FORMAT
    };
    let localized = localized_datetime(time, tz);
    let mut out = String::new();
    if write!(out, "{}", localized.format(pattern)).is_err() {
        out.clear();
        let _ = write!(out, "{}", localized.format(DEFAULT_DATE_FORMAT));
    }
    out
}
