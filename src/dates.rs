//! UTC-normalized calendar date helpers
//!
//! Every calendar day in the planner is a [`NaiveDate`] taken from the UTC
//! calendar. Timestamps are converted to UTC before their date part is read,
//! so a day never drifts because of the local time zone of whoever runs the
//! code. Months are 0-based here, the way the picker addresses them.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

const FORM_FORMAT: &str = "%Y-%m-%d";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Parse a form or backend date string into its UTC calendar day.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` (date part taken as is) and
/// full RFC 3339 timestamps, which are shifted to UTC first.
#[must_use]
pub fn parse_date_string(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }

    let date_part = value.split(['T', ' ']).next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, FORM_FORMAT).ok()
}

/// Format a day the way date inputs expect it (`YYYY-MM-DD`)
#[must_use]
pub fn format_date_for_form(date: NaiveDate) -> String {
    date.format(FORM_FORMAT).to_string()
}

/// Human readable form, e.g. "October 1, 2025"
#[must_use]
pub fn format_date_for_display(date: NaiveDate) -> String {
    format!("{} {}, {}", month_name(date.month0()), date.day(), date.year())
}

/// Compact range label, e.g. "Oct 1 – 5, 2025" or "Dec 30, 2025 – Jan 2, 2026"
#[must_use]
pub fn format_date_range_display(start: NaiveDate, end: NaiveDate) -> String {
    let (start, end) = ordered(start, end);
    if start == end {
        return start.format("%b %-d, %Y").to_string();
    }
    if start.year() != end.year() {
        return format!("{} – {}", start.format("%b %-d, %Y"), end.format("%b %-d, %Y"));
    }
    if start.month() == end.month() {
        return format!("{} – {}", start.format("%b %-d"), end.format("%-d, %Y"));
    }
    format!("{} – {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
}

/// English month name for a 0-based month, "Invalid Month" otherwise
#[must_use]
pub fn month_name(month0: u32) -> &'static str {
    MONTH_NAMES
        .get(month0 as usize)
        .copied()
        .unwrap_or("Invalid Month")
}

/// Number of days in a 0-based month, 0 when the month does not exist
#[must_use]
pub fn days_in_month(year: i32, month0: u32) -> u32 {
    if month0 > 11 {
        return 0;
    }
    // Day 0 of the following month is the last day of this one.
    let next = if month0 == 11 {
        year.checked_add(1).map(|next_year| (next_year, 0))
    } else {
        Some((year, month0 + 1))
    };
    next.and_then(|(next_year, next_month0)| NaiveDate::from_ymd_opt(next_year, next_month0 + 1, 1))
        .and_then(|first| first.pred_opt())
        .map_or(0, |last| last.day())
}

/// Today on the UTC calendar
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Midnight UTC timestamp of a calendar day
#[must_use]
pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Every day from `start` to `end`, both inclusive. Empty if `end < start`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |day| *day <= end)
}

/// Nights spent between check-in and check-out, never negative
#[must_use]
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> u32 {
    u32::try_from((check_out - check_in).num_days()).unwrap_or(0)
}

/// `true` if `day` lies in the inclusive span `[start, end]`
#[must_use]
pub fn span_contains(start: NaiveDate, end: NaiveDate, day: NaiveDate) -> bool {
    start <= day && day <= end
}

/// Returns the pair in ascending order
#[must_use]
pub fn ordered(a: NaiveDate, b: NaiveDate) -> (NaiveDate, NaiveDate) {
    if b < a { (b, a) } else { (a, b) }
}

/// Serde adapter for `YYYY-MM-DD` fields that may also arrive as timestamps
pub mod serde_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date_for_form(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date_string(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'")))
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_str(&super::super::format_date_for_form(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::super::parse_date_string(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_form_date_uses_utc_components() {
        let parsed = parse_date_string("2025-10-01").unwrap();
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.month0(), 9);
        assert_eq!(parsed.day(), 1);
    }

    #[rstest]
    #[case("2025-10-01T00:00:00", date(2025, 10, 1))]
    #[case("2025-10-01T23:30:00+00:00", date(2025, 10, 1))]
    #[case("2025-10-01T23:30:00-05:00", date(2025, 10, 2))]
    #[case("2025-10-01T01:00:00+09:00", date(2025, 9, 30))]
    #[case(" 2024-02-29 ", date(2024, 2, 29))]
    fn test_parse_variants(#[case] input: &str, #[case] expected: NaiveDate) {
        assert_eq!(parse_date_string(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("not a date")]
    #[case("2023-02-29")]
    #[case("2025-13-01")]
    fn test_parse_invalid(#[case] input: &str) {
        assert_eq!(parse_date_string(input), None);
    }

    #[test]
    fn test_form_round_trip_is_stable() {
        let mut day = date(2023, 12, 25);
        for _ in 0..800 {
            let formatted = format_date_for_form(day);
            let reparsed = parse_date_string(&formatted).unwrap();
            assert_eq!(format_date_for_form(reparsed), formatted);
            day = day.succ_opt().unwrap();
        }
    }

    #[rstest]
    #[case(2024, 1, 29)]
    #[case(2023, 1, 28)]
    #[case(2000, 1, 29)]
    #[case(1900, 1, 28)]
    #[case(2025, 0, 31)]
    #[case(2025, 3, 30)]
    #[case(2025, 11, 31)]
    #[case(2025, 12, 0)]
    fn test_days_in_month(#[case] year: i32, #[case] month0: u32, #[case] expected: u32) {
        assert_eq!(days_in_month(year, month0), expected);
    }

    #[test]
    fn test_days_between_is_inclusive() {
        let days: Vec<_> = days_between(date(2025, 2, 27), date(2025, 3, 2)).collect();
        assert_eq!(
            days,
            vec![date(2025, 2, 27), date(2025, 2, 28), date(2025, 3, 1), date(2025, 3, 2)]
        );
        assert_eq!(days_between(date(2025, 3, 2), date(2025, 3, 1)).count(), 0);
    }

    #[test]
    fn test_nights_between() {
        assert_eq!(nights_between(date(2025, 10, 1), date(2025, 10, 4)), 3);
        assert_eq!(nights_between(date(2025, 10, 4), date(2025, 10, 1)), 0);
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(format_date_for_display(date(2025, 10, 1)), "October 1, 2025");
        assert_eq!(
            format_date_range_display(date(2025, 10, 1), date(2025, 10, 5)),
            "Oct 1 – 5, 2025"
        );
        assert_eq!(
            format_date_range_display(date(2025, 10, 30), date(2025, 11, 2)),
            "Oct 30 – Nov 2, 2025"
        );
        assert_eq!(
            format_date_range_display(date(2026, 1, 2), date(2025, 12, 30)),
            "Dec 30, 2025 – Jan 2, 2026"
        );
    }

    #[test]
    fn test_utc_midnight() {
        let midnight = utc_midnight(date(2025, 3, 30));
        assert_eq!(midnight.to_rfc3339(), "2025-03-30T00:00:00+00:00");
    }
}
