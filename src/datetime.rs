//! Date/time resolution for upstream schedule text.
//!
//! Every parser here returns `Option`: an unparseable value is a skipped item, never an error
//! for the caller. Instants carry the theater's zone; storage uses a naive timestamp in the
//! canonical zone.

use std::sync::LazyLock;

use jiff::{
    Span, Timestamp, Zoned,
    civil::{Date, DateTime, Time},
    tz::TimeZone,
};
use regex::Regex;

static TWELVE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m\b\.?").expect("valid regex")
});
static TWENTY_FOUR_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("valid regex"));
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b").expect("valid regex"));

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 12-hour clock to 24-hour: 12 am is 0, 12 pm stays 12, other pm hours add 12.
pub fn to_24_hour(hour: i8, pm: bool) -> i8 {
    match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

/// Parses "7:30 pm", "7:30pm", "7 P.M." into a wall-clock time.
pub fn resolve_time(text: &str) -> Option<Time> {
    let caps = TWELVE_HOUR.captures(text)?;
    let hour: i8 = caps.get(1)?.as_str().parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let minute: i8 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
    Time::new(to_24_hour(hour, pm), minute, 0, 0).ok()
}

/// Parses "17:00" or "17:00:00".
pub fn resolve_clock(text: &str) -> Option<Time> {
    let caps = TWENTY_FOUR_HOUR.captures(text.trim())?;
    let hour: i8 = caps.get(1)?.as_str().parse().ok()?;
    let minute: i8 = caps.get(2)?.as_str().parse().ok()?;
    let second: i8 = caps.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
    Time::new(hour, minute, second, 0).ok()
}

/// Month number for a full or abbreviated English month name.
pub fn month_from_name(name: &str) -> Option<i8> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(&lower)) || (lower == "sept" && *m == "september"))
        .map(|i| i as i8 + 1)
}

/// Finds the first "Month Day" pair in free text ("Mon, January 05" → (1, 5)).
pub fn find_month_day(text: &str) -> Option<(i8, i8)> {
    MONTH_DAY.captures_iter(text).find_map(|caps| {
        let month = month_from_name(caps.get(1)?.as_str())?;
        let day: i8 = caps.get(2)?.as_str().parse().ok()?;
        (1..=31).contains(&day).then_some((month, day))
    })
}

/// Calendars that omit the year: this year, unless the date already passed, then next year.
pub fn infer_year(month: i8, day: i8, today: Date) -> i16 {
    if (month, day) < (today.month(), today.day()) { today.year() + 1 } else { today.year() }
}

pub fn localize(date: Date, time: Time, tz: &TimeZone) -> Option<Zoned> {
    DateTime::from_parts(date, time).to_zoned(tz.clone()).ok()
}

/// "Month Day" text plus a separate "7:30 pm" string, year inferred from `now`.
pub fn resolve_month_day_time(date_text: &str, time_text: &str, now: &Zoned) -> Option<Zoned> {
    let (month, day) = find_month_day(date_text)?;
    let time = resolve_time(time_text)?;
    let year = infer_year(month, day, now.date());
    let date = Date::new(year, month, day).ok()?;
    localize(date, time, now.time_zone())
}

/// Compact `YYYYMMDD` date and `HH:MM[:SS]` time.
pub fn resolve_compact(date_text: &str, time_text: &str, tz: &TimeZone) -> Option<Zoned> {
    let digits = date_text.trim();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i16 = digits[..4].parse().ok()?;
    let month: i8 = digits[4..6].parse().ok()?;
    let day: i8 = digits[6..8].parse().ok()?;
    let date = Date::new(year, month, day).ok()?;
    localize(date, resolve_clock(time_text)?, tz)
}

/// ISO-8601 datetime. An explicit offset or `Z` is honoured; otherwise the
/// value is wall-clock time in `tz`.
pub fn resolve_iso(text: &str, tz: &TimeZone) -> Option<Zoned> {
    let text = text.trim();
    if let Ok(ts) = text.parse::<Timestamp>() {
        return Some(ts.to_zoned(tz.clone()));
    }
    let dt: DateTime = text.parse().ok()?;
    dt.to_zoned(tz.clone()).ok()
}

/// Strictly after `now`.
pub fn is_future(instant: &Zoned, now: &Zoned) -> bool {
    instant.timestamp() > now.timestamp()
}

/// Consecutive local dates starting with today in `now`'s zone.
pub fn days_from(now: &Zoned, days: u32) -> Vec<Date> {
    let today = now.date();
    (0..days as i64).filter_map(|i| today.checked_add(Span::new().days(i)).ok()).collect()
}

/// Naive wall-clock timestamp in `canonical`, the form screenings are keyed by.
pub fn to_storage(instant: &Zoned, canonical: &TimeZone) -> String {
    instant.with_time_zone(canonical.clone()).datetime().strftime(STORAGE_FORMAT).to_string()
}

pub fn storage_now(canonical: &TimeZone) -> String {
    to_storage(&Zoned::now(), canonical)
}

pub fn parse_storage(text: &str) -> Option<DateTime> {
    text.parse().ok()
}


#[cfg(test)]
mod tests {
    use jiff::civil::{date, time};

    use super::{test_support::*, *};

    #[test]
    fn twelve_hour_conversion() {
        assert_eq!(resolve_time("7:30 pm"), Some(time(19, 30, 0, 0)));
        assert_eq!(resolve_time("12:00 am"), Some(time(0, 0, 0, 0)));
        assert_eq!(resolve_time("12:15 pm"), Some(time(12, 15, 0, 0)));
        assert_eq!(resolve_time("11:59pm"), Some(time(23, 59, 0, 0)));
        assert_eq!(resolve_time("7:00 P.M."), Some(time(19, 0, 0, 0)));
        assert_eq!(resolve_time("/ 9:25 pm"), Some(time(21, 25, 0, 0)));
        assert_eq!(resolve_time("13:00 pm"), None);
        assert_eq!(resolve_time("sold out"), None);
    }

    #[test]
    fn clock_times() {
        assert_eq!(resolve_clock("17:00:00"), Some(time(17, 0, 0, 0)));
        assert_eq!(resolve_clock("9:05"), Some(time(9, 5, 0, 0)));
        assert_eq!(resolve_clock("25:00"), None);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_from_name("January"), Some(1));
        assert_eq!(month_from_name("sep"), Some(9));
        assert_eq!(month_from_name("Sept."), Some(9));
        assert_eq!(month_from_name("Mon"), None);
        assert_eq!(find_month_day("Tue, January 06"), Some((1, 6)));
        assert_eq!(find_month_day("Sunday, February 1st"), Some((2, 1)));
    }

    #[test]
    fn year_rolls_over_for_past_dates() {
        let today = date(2026, 12, 20);
        assert_eq!(infer_year(12, 28, today), 2026);
        assert_eq!(infer_year(12, 20, today), 2026);
        assert_eq!(infer_year(1, 3, today), 2027);
    }

    #[test]
    fn future_filtering() {
        let now = pacific_at(2026, 1, 10, 18, 0);
        assert!(!is_future(&pacific_at(2026, 1, 10, 17, 0), &now));
        assert!(is_future(&pacific_at(2026, 1, 10, 19, 0), &now));
        assert!(!is_future(&now, &now));
    }

    #[test]
    fn month_day_with_separate_time() {
        let now = pacific_at(2026, 1, 4, 12, 0);
        let got = resolve_month_day_time("Mon, January 05", "7:30 pm", &now).unwrap();
        assert_eq!(got.datetime(), date(2026, 1, 5).at(19, 30, 0, 0));
        assert_eq!(got.time_zone().iana_name(), Some("America/Los_Angeles"));
    }

    #[test]
    fn compact_and_iso_forms() {
        let tz = pacific();
        let compact = resolve_compact("20260125", "17:00:00", &tz).unwrap();
        assert_eq!(compact.datetime(), date(2026, 1, 25).at(17, 0, 0, 0));
        assert!(resolve_compact("2026-01-25", "17:00:00", &tz).is_none());

        let naive = resolve_iso("2026-01-06T17:00:00", &tz).unwrap();
        assert_eq!(naive.datetime(), date(2026, 1, 6).at(17, 0, 0, 0));

        let utc = resolve_iso("2026-01-07T03:00:00Z", &tz).unwrap();
        assert_eq!(utc.datetime(), date(2026, 1, 6).at(19, 0, 0, 0));
    }

    #[test]
    fn storage_is_canonical_wall_clock() {
        let eastern = TimeZone::get("America/New_York").unwrap();
        let instant = date(2026, 3, 1).at(22, 0, 0, 0).to_zoned(eastern).unwrap();
        assert_eq!(to_storage(&instant, &pacific()), "2026-03-01T19:00:00");
        assert_eq!(parse_storage("2026-03-01T19:00:00"), Some(date(2026, 3, 1).at(19, 0, 0, 0)));
    }

    #[test]
    fn day_windows() {
        let now = pacific_at(2026, 2, 27, 23, 0);
        assert_eq!(days_from(&now, 3), vec![date(2026, 2, 27), date(2026, 2, 28), date(2026, 3, 1)]);
    }
}
