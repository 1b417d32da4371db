//! 🧪 Coercions: strings in, typed cells out, `Null` when the string had other plans.
//!
//! Every function here is total. Nothing raises, nothing panics. A bad date is
//! not an incident, it's a `Null`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::common::CellValue;

/// 📅 `DD/MM/YYYY`, the format the API speaks.
pub const DATE_FORMAT: &str = "%d/%m/%Y";
/// ⏰ `DD/MM/YYYY HH:MM`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";
/// 🕐 `HH:MM` on a 24h clock.
pub const CLOCK_FORMAT: &str = "%H:%M";

pub fn parse_date(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Date(d) => CellValue::Date(*d),
        CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map_or(CellValue::Null, CellValue::Date),
        _ => CellValue::Null,
    }
}

pub fn parse_timestamp(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Timestamp(ts) => CellValue::Timestamp(*ts),
        CellValue::Text(s) => NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
            .map_or(CellValue::Null, CellValue::Timestamp),
        _ => CellValue::Null,
    }
}

/// 🔢 JSON numbers stay as they are. Strings try integer, then float. NaN and
/// infinities are not numbers we want in a database, so they become `Null` too.
pub fn parse_numeric(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Integer(i) => CellValue::Integer(*i),
        CellValue::Float(x) if x.is_finite() => CellValue::Float(*x),
        CellValue::Bool(b) => CellValue::Integer(i64::from(*b)),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                CellValue::Integer(i)
            } else {
                match trimmed.parse::<f64>() {
                    Ok(x) if x.is_finite() => CellValue::Float(x),
                    _ => CellValue::Null,
                }
            }
        }
        _ => CellValue::Null,
    }
}

/// 🕐 `HH:MM` → time of day. `25:00` and `03:70` are not times of day.
pub fn parse_clock_time(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Time(t) => CellValue::Time(*t),
        CellValue::Text(s) => NaiveTime::parse_from_str(s.trim(), CLOCK_FORMAT)
            .map_or(CellValue::Null, CellValue::Time),
        _ => CellValue::Null,
    }
}

/// ⏱️ `"H:MM"` duration string → total minutes.
///
/// Exactly one `:`, both sides integers, hours non-negative (durations may exceed a
/// day, so no 24h cap), minutes in `0..60`. Anything else is `None`.
pub fn clock_to_minutes(raw: &str) -> Option<i64> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    if minutes.contains(':') {
        return None;
    }
    let hours: i64 = hours.trim().parse().ok()?;
    let minutes: i64 = minutes.trim().parse().ok()?;
    if hours < 0 || !(0..60).contains(&minutes) {
        return None;
    }
    hours.checked_mul(60)?.checked_add(minutes)
}

/// ⏱️ Minutes from either an already-parsed time or a raw `"H:MM"` string.
pub fn minutes_of(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Time(t) => CellValue::Integer(i64::from(t.hour() * 60 + t.minute())),
        CellValue::Text(s) => clock_to_minutes(s).map_or(CellValue::Null, CellValue::Integer),
        _ => CellValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn the_one_where_dates_are_day_first_like_civilised_people() {
        assert_eq!(
            parse_date(&text("20/04/2018")),
            CellValue::Date(NaiveDate::from_ymd_opt(2018, 4, 20).expect("valid date"))
        );
        assert_eq!(parse_date(&text("2018-04-20")), CellValue::Null);
        assert_eq!(parse_date(&text("31/02/2018")), CellValue::Null);
        assert_eq!(parse_date(&CellValue::Null), CellValue::Null);
        assert_eq!(parse_date(&CellValue::Integer(20180420)), CellValue::Null);
    }

    #[test]
    fn the_one_where_timestamps_need_both_halves() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 0))
            .expect("valid timestamp");
        assert_eq!(parse_timestamp(&text("31/12/2024 23:59")), CellValue::Timestamp(expected));
        assert_eq!(parse_timestamp(&text("31/12/2024")), CellValue::Null);
    }

    #[test]
    fn the_one_where_numbers_come_in_many_disguises() {
        assert_eq!(parse_numeric(&text("42")), CellValue::Integer(42));
        assert_eq!(parse_numeric(&text(" 4.5 ")), CellValue::Float(4.5));
        assert_eq!(parse_numeric(&CellValue::Float(1.25)), CellValue::Float(1.25));
        assert_eq!(parse_numeric(&text("03:00")), CellValue::Null);
        assert_eq!(parse_numeric(&text("NaN")), CellValue::Null);
        assert_eq!(parse_numeric(&text("")), CellValue::Null);
        assert_eq!(parse_numeric(&CellValue::Null), CellValue::Null);
    }

    #[test]
    fn the_one_where_clock_strings_become_minutes_or_nothing() {
        assert_eq!(clock_to_minutes("03:00"), Some(180));
        assert_eq!(clock_to_minutes("0:45"), Some(45));
        assert_eq!(clock_to_minutes("120:30"), Some(7230));
        assert_eq!(clock_to_minutes("3:70"), None);
        assert_eq!(clock_to_minutes("abc"), None);
        assert_eq!(clock_to_minutes("1:2:3"), None);
        assert_eq!(clock_to_minutes("-1:30"), None);
        assert_eq!(clock_to_minutes(""), None);
    }

    #[test]
    fn the_one_where_a_parsed_time_also_knows_its_minutes() {
        let time = parse_clock_time(&text("02:15"));
        assert_eq!(minutes_of(&time), CellValue::Integer(135));
        assert_eq!(parse_clock_time(&text("25:00")), CellValue::Null);
        assert_eq!(minutes_of(&CellValue::Null), CellValue::Null);
    }
}
