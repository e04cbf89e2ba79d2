// 📅 Date Coercion
// Normalizes "date, date string, or absent" into Option<NaiveDate> once, at the
// boundary. Everything downstream only ever sees Option<NaiveDate>.

use crate::error::{Error, Result};
use crate::table::Value;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// The only accepted textual date format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` string strictly
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| Error::DateFormat {
        date_str: s.to_string(),
    })
}

/// Coerce a cell or argument into a date or absent.
///
/// - `Null` is absent and stays absent
/// - `Date` is returned unchanged
/// - `Text` must be `YYYY-MM-DD`, otherwise `DateFormat`
/// - anything else is `InvalidDateValue`
pub fn coerce(value: &Value) -> Result<Option<NaiveDate>> {
    match value {
        Value::Null => Ok(None),
        Value::Date(d) => Ok(Some(*d)),
        Value::Text(s) => parse_iso_date(s).map(Some),
        other => Err(Error::InvalidDateValue {
            value: other.to_string(),
        }),
    }
}

/// Parse a date literal as the data platform serializes it (`2017-06-08+01:00`).
///
/// Only the calendar date is kept; the offset suffix is dropped.
pub fn parse_platform_date(s: &str) -> Result<NaiveDate> {
    let bad = || Error::DateFormat {
        date_str: s.to_string(),
    };
    let date_part = s.get(..10).ok_or_else(bad)?;
    let suffix = &s[10..];
    if !(suffix.is_empty()
        || suffix.starts_with('+')
        || suffix.starts_with('-')
        || suffix.starts_with('Z'))
    {
        return Err(bad());
    }
    parse_iso_date(date_part).map_err(|_| bad())
}

/// Earliest date, or absent if any date is absent
pub fn min_date_poisoned<I>(dates: I) -> Option<NaiveDate>
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    let mut earliest: Option<NaiveDate> = None;
    for d in dates {
        let d = d?;
        earliest = Some(earliest.map_or(d, |e| e.min(d)));
    }
    earliest
}

/// Latest date, or absent if any date is absent.
///
/// An absent end date means "still open", so one open record makes the
/// whole aggregate open.
pub fn max_date_poisoned<I>(dates: I) -> Option<NaiveDate>
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    let mut latest: Option<NaiveDate> = None;
    for d in dates {
        let d = d?;
        latest = Some(latest.map_or(d, |l| l.max(d)));
    }
    latest
}

/// Order optional dates ascending with absent dates last
pub fn cmp_absent_last(a: &Option<NaiveDate>, b: &Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
