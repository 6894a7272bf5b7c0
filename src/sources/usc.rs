use std::sync::LazyLock;

use jiff::{Zoned, civil::Date, tz::TimeZone};
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::{Source, absolute_url, get_text, selector};
use crate::{
    datetime::{is_future, localize, month_from_name, resolve_time},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{DEFAULT_FORMAT, collapse_whitespace, normalize_title},
};

const BASE: &str = "https://cinema.usc.edu";
const EVENTS_URL: &str = "https://cinema.usc.edu/events/index.cfm";
const TZ: &str = "America/Los_Angeles";

/// Event listings that are not screenings.
const SKIP_KEYWORDS: [&str; 14] = [
    "information session",
    "admissions",
    "open house",
    "workshop",
    "seminar",
    "lecture",
    "panel",
    "trojan family",
    "graduation",
    "commencement",
    "orientation",
    "tour",
    "award",
    "ceremony",
];

/// "January 12, 2026, 7:00"
static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2}),\s*(\d{4}),\s*(\d{1,2}(?::\d{2})?)").expect("valid regex")
});

const THEATERS: [TheaterInfo; 1] = [TheaterInfo {
    name: "USC School of Cinematic Arts",
    address: "900 W 34th St, Los Angeles, CA 90089",
    city: "Los Angeles",
    state: "CA",
    zip_code: Some("90089"),
    website: BASE,
    coordinates: None,
    description: Some("Free public screenings, often with filmmakers in conversation."),
}];

pub struct UscCinemaSource {
    http: reqwest::Client,
}

impl UscCinemaSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Source for UscCinemaSource {
    fn name(&self) -> &str {
        "usc-cinema"
    }

    fn theaters(&self) -> &[TheaterInfo] {
        &THEATERS
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(TZ)?);
        let body = get_text(&self.http, EVENTS_URL, &[]).await?;
        Ok(parse_events(&body, &now))
    }
}

fn parse_events(html: &str, now: &Zoned) -> Vec<ScreeningCandidate> {
    let doc = Html::parse_document(html);
    let item_sel = selector("div.newsItem");
    let title_sel = selector("h5 a");
    let h5_sel = selector("h5");
    let h6_sel = selector("h6");
    let img_sel = selector("img");

    let mut out = Vec::new();
    for item in doc.select(&item_sel) {
        let Some(link) = item.select(&title_sel).next() else { continue };
        let raw_title = collapse_whitespace(&link.text().collect::<String>());
        let lower = raw_title.to_lowercase();
        if SKIP_KEYWORDS.iter().any(|k| lower.contains(k)) {
            debug!(title = %raw_title, "skipping non-screening event");
            continue;
        }
        let Some(title) = normalize_title(&raw_title) else { continue };

        let Some(when) = item.select(&h6_sel).next() else { continue };
        let when = collapse_whitespace(&when.text().collect::<String>());
        let Some(starts_at) = resolve_event_time(&when, now.time_zone()) else {
            debug!(title = %title, when = %when, "unscheduled or multi-day event");
            continue;
        };
        if !is_future(&starts_at, now) {
            continue;
        }

        let location = item
            .select(&h5_sel)
            .nth(1)
            .map(|h5| collapse_whitespace(&h5.text().collect::<String>()))
            .filter(|l| !l.is_empty());
        let poster_url = item
            .select(&img_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| absolute_url(BASE, src));

        out.push(ScreeningCandidate {
            title,
            starts_at,
            ticket_url: link.value().attr("href").map(|href| absolute_url(BASE, href)),
            format: DEFAULT_FORMAT.to_string(),
            runtime: None,
            special_notes: location,
            poster_url,
            theater: THEATERS[0].name.to_string(),
        });
    }
    out
}

/// Start of "January 12, 2026, 7:00 - 9:30 P.M." style listings.
///
/// A time range carries its meridiem only at the end, and that meridiem applies to the
/// start. "Varies" and multi-day ranges have no single start and yield `None`.
fn resolve_event_time(text: &str, tz: &TimeZone) -> Option<Zoned> {
    if text.to_lowercase().contains("varies") {
        return None;
    }
    if let Some((_, tail)) = text.split_once('-') {
        if tail.contains(',') {
            return None;
        }
    }

    let caps = DATE_TIME.captures(text)?;
    let month = month_from_name(caps.get(1)?.as_str())?;
    let day: i8 = caps.get(2)?.as_str().parse().ok()?;
    let year: i16 = caps.get(3)?.as_str().parse().ok()?;

    let tail = text.to_lowercase().replace('.', "");
    let meridiem = if tail.trim_end().ends_with("am") { "am" } else { "pm" };
    let time = resolve_time(&format!("{} {meridiem}", caps.get(4)?.as_str()))?;

    localize(Date::new(year, month, day).ok()?, time, tz)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;
    use crate::datetime::test_support::{pacific, pacific_at};

    const EVENTS: &str = r#"
        <div class="newsItem">
          <img src="/images/events/chinatown.jpg">
          <h5><a href="/events/event.cfm?id=1">Chinatown (35mm)</a></h5>
          <h6>January 12, 2026, 7:00 - 9:30 P.M.</h6>
          <h5>Norris Cinema Theatre</h5>
        </div>
        <div class="newsItem">
          <h5><a href="/events/event.cfm?id=2">MFA Information Session</a></h5>
          <h6>January 13, 2026, 6:00 P.M.</h6>
        </div>
        <div class="newsItem">
          <h5><a href="/events/event.cfm?id=3">Student Showcase</a></h5>
          <h6>Varies</h6>
        </div>
        <div class="newsItem">
          <h5><a href="https://cinema.usc.edu/events/event.cfm?id=4">Morning Matinee</a></h5>
          <h6>January 14, 2026, 10:30 A.M.</h6>
        </div>
    "#;

    #[test]
    fn parses_screenings_and_skips_admin_events() {
        let now = pacific_at(2026, 1, 10, 12, 0);
        let got = parse_events(EVENTS, &now);
        assert_eq!(got.len(), 2);

        assert_eq!(got[0].title, "Chinatown");
        assert_eq!(got[0].starts_at.datetime(), date(2026, 1, 12).at(19, 0, 0, 0));
        assert_eq!(got[0].special_notes.as_deref(), Some("Norris Cinema Theatre"));
        assert_eq!(got[0].poster_url.as_deref(), Some("https://cinema.usc.edu/images/events/chinatown.jpg"));
        assert_eq!(got[0].ticket_url.as_deref(), Some("https://cinema.usc.edu/events/event.cfm?id=1"));

        assert_eq!(got[1].title, "Morning Matinee");
        assert_eq!(got[1].starts_at.datetime(), date(2026, 1, 14).at(10, 30, 0, 0));
        assert_eq!(got[1].special_notes, None);
    }

    #[test]
    fn event_times() {
        let tz = pacific();
        assert_eq!(
            resolve_event_time("January 12, 2026, 7:00 P.M.", &tz).map(|z| z.datetime()),
            Some(date(2026, 1, 12).at(19, 0, 0, 0))
        );
        assert!(resolve_event_time("January 5 - February 3, 2026", &tz).is_none());
        assert!(resolve_event_time("Times vary / Varies", &tz).is_none());
    }
}
