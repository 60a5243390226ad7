//! Timezone-naive construction of HL7 `DT`, `TM` and `DTM` values.

use chrono::{NaiveDate, NaiveDateTime};

/// Build a naive timestamp. `month` is 1-based as on the wire.
pub fn make_timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// `YYYY[MM[DD[HH[MM[SS[.S+]]]]]][+/-ZZZZ]`; the offset is dropped.
///
/// Missing month and day default to 1, missing time parts to 0. Year 0 is
/// treated as "no value".
pub fn parse_dtm(raw: &str) -> Option<NaiveDateTime> {
    let digits = strip_fraction(strip_offset(raw.trim(), 4)?);
    if digits.len() < 4 || digits.len() % 2 != 0 || digits.len() > 14 {
        return None;
    }
    let year: i32 = number(digits, 0, 4)?;
    if year == 0 {
        return None;
    }
    make_timestamp(
        year,
        optional_pair(digits, 4)?.unwrap_or(1),
        optional_pair(digits, 6)?.unwrap_or(1),
        optional_pair(digits, 8)?.unwrap_or(0),
        optional_pair(digits, 10)?.unwrap_or(0),
        optional_pair(digits, 12)?.unwrap_or(0),
    )
}

/// `YYYY[MM[DD]]` at midnight.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let digits = raw.trim();
    if !matches!(digits.len(), 4 | 6 | 8) {
        return None;
    }
    parse_dtm(digits)
}

/// `HH[MM[SS[.S+]]][+/-ZZZZ]` on the zero date (0000-01-01).
pub fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let digits = strip_fraction(strip_offset(raw.trim(), 2)?);
    if !matches!(digits.len(), 2 | 4 | 6) {
        return None;
    }
    make_timestamp(
        0,
        1,
        1,
        number(digits, 0, 2)?,
        optional_pair(digits, 2)?.unwrap_or(0),
        optional_pair(digits, 4)?.unwrap_or(0),
    )
}

/// Drop a trailing `+ZZZZ`/`-ZZZZ` offset.
///
/// A sign anywhere else, or an offset that is not exactly four digits, makes
/// the whole value invalid.
fn strip_offset(value: &str, min_leading: usize) -> Option<&str> {
    let Some(index) = value.rfind(['+', '-']) else {
        return Some(value);
    };
    let (leading, offset) = (&value[..index], &value[index + 1..]);
    let well_formed = leading.len() >= min_leading
        && !leading.contains(['+', '-'])
        && offset.len() == 4
        && offset.bytes().all(|b| b.is_ascii_digit());
    well_formed.then_some(leading)
}

fn strip_fraction(value: &str) -> &str {
    value.split('.').next().unwrap_or(value)
}

fn number<T: std::str::FromStr>(digits: &str, start: usize, len: usize) -> Option<T> {
    let slice = digits.get(start..start + len)?;
    if !slice.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    slice.parse().ok()
}

/// `Some(None)` when the pair is absent, `None` when present but invalid.
fn optional_pair(digits: &str, start: usize) -> Option<Option<u32>> {
    if digits.len() <= start {
        return Some(None);
    }
    number(digits, start, 2).map(Some)
}
