use std::{sync::LazyLock, time::Duration};

use jiff::{Zoned, civil::Date, tz::TimeZone};
use regex::Regex;
use scraper::Html;
use tracing::{debug, warn};

use super::{Source, absolute_url, get_text, selector};
use crate::{
    datetime::{days_from, is_future, localize, resolve_time},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{collapse_whitespace, extract_format, normalize_title},
};

const BASE: &str = "https://www.laemmle.com";
const TZ: &str = "America/Los_Angeles";

static RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*min").expect("valid regex"));

/// A Laemmle location and its per-theater schedule page.
pub struct LaemmleVenue {
    pub theater: TheaterInfo,
    pub url: &'static str,
}

const fn venue(
    name: &'static str,
    city: &'static str,
    address: &'static str,
    zip: &'static str,
    url: &'static str,
) -> LaemmleVenue {
    LaemmleVenue {
        theater: TheaterInfo {
            name,
            address,
            city,
            state: "CA",
            zip_code: Some(zip),
            website: url,
            coordinates: None,
            description: None,
        },
        url,
    }
}

pub const VENUES: [LaemmleVenue; 8] = [
    venue(
        "Laemmle Royal",
        "Los Angeles",
        "11523 Santa Monica Blvd, Los Angeles, CA 90025",
        "90025",
        "https://www.laemmle.com/theater/royal",
    ),
    venue(
        "Laemmle Town Center 5",
        "Encino",
        "17200 Ventura Blvd, Encino, CA 91316",
        "91316",
        "https://www.laemmle.com/theater/town-center-5",
    ),
    venue(
        "Laemmle Glendale",
        "Glendale",
        "207 N Maryland Ave, Glendale, CA 91206",
        "91206",
        "https://www.laemmle.com/theater/glendale",
    ),
    venue(
        "Laemmle Monica Film Center",
        "Santa Monica",
        "1332 2nd St, Santa Monica, CA 90401",
        "90401",
        "https://www.laemmle.com/theater/monica-film-center",
    ),
    venue(
        "Laemmle Newhall",
        "Santa Clarita",
        "24201 Valencia Blvd #1701, Santa Clarita, CA 91355",
        "91355",
        "https://www.laemmle.com/theater/newhall",
    ),
    venue(
        "Laemmle NoHo 7",
        "North Hollywood",
        "5240 Lankershim Blvd, North Hollywood, CA 91601",
        "91601",
        "https://www.laemmle.com/theater/noho-7",
    ),
    venue(
        "Laemmle Claremont 5",
        "Claremont",
        "450 W 2nd St, Claremont, CA 91711",
        "91711",
        "https://www.laemmle.com/theater/claremont-5",
    ),
    venue(
        "Laemmle Playhouse 7",
        "Pasadena",
        "673 E Colorado Blvd, Pasadena, CA 91101",
        "91101",
        "https://www.laemmle.com/theater/playhouse-7",
    ),
];

/// One Laemmle location, fetched a day at a time.
pub struct LaemmleSource {
    http: reqwest::Client,
    venue: LaemmleVenue,
    pacing: Duration,
}

impl LaemmleSource {
    pub fn new(http: reqwest::Client, venue: LaemmleVenue, pacing: Duration) -> Self {
        Self { http, venue, pacing }
    }
}

#[async_trait::async_trait]
impl Source for LaemmleSource {
    fn name(&self) -> &str {
        self.venue.theater.name
    }

    fn theaters(&self) -> &[TheaterInfo] {
        std::slice::from_ref(&self.venue.theater)
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(TZ)?);
        let days = days_from(&now, window.days);

        let mut out = Vec::new();
        let mut last_err = None;
        let mut fetched = 0usize;

        for (i, day) in days.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let query = [("date", day.strftime("%Y-%m-%d").to_string())];
            match get_text(&self.http, self.venue.url, &query).await {
                Ok(body) => {
                    fetched += 1;
                    let found = parse_day(&body, *day, &now, self.venue.theater.name);
                    debug!(theater = self.venue.theater.name, date = %day, screenings = found.len(), "parsed day");
                    out.extend(found);
                },
                Err(err) => {
                    warn!(theater = self.venue.theater.name, date = %day, error = %err, "day failed");
                    last_err = Some(err);
                },
            }
        }

        // One bad day is a partial result; nothing at all is a failure.
        match last_err {
            Some(err) if fetched == 0 => Err(err),
            _ => Ok(out),
        }
    }
}

fn parse_day(html: &str, day: Date, now: &Zoned, theater: &str) -> Vec<ScreeningCandidate> {
    let doc = Html::parse_document(html);
    let info_sel = selector("div.info");
    let wrapper_sel = selector("div.film-info-wrapper");
    let title_sel = selector("div.title a");
    let detail_sel = selector("div.detail");
    let showtimes_sel = selector("div.showtimes");
    let showtime_sel = selector("div.showtime");

    let mut out = Vec::new();
    for info in doc.select(&info_sel) {
        let Some(wrapper) = info.select(&wrapper_sel).next() else { continue };
        let Some(title_el) = wrapper.select(&title_sel).next() else { continue };
        let raw_title = title_el.text().collect::<String>();
        let Some(title) = normalize_title(&raw_title) else { continue };

        let film_url = title_el.value().attr("href").map(|href| absolute_url(BASE, href));
        let runtime = wrapper.select(&detail_sel).next().and_then(|detail| {
            let text = detail.text().collect::<String>();
            RUNTIME.captures(&text)?.get(1)?.as_str().parse::<u32>().ok()
        });
        let format = extract_format(&info.text().collect::<Vec<_>>().join(" "));

        let Some(showtimes) = info.select(&showtimes_sel).next() else { continue };
        for showtime in showtimes.select(&showtime_sel) {
            if showtime.value().classes().any(|c| c.contains("past")) {
                continue;
            }
            let text = collapse_whitespace(&showtime.text().collect::<String>());
            let Some(starts_at) =
                resolve_time(&text).and_then(|time| localize(day, time, now.time_zone()))
            else {
                continue;
            };
            if !is_future(&starts_at, now) {
                continue;
            }
            out.push(ScreeningCandidate {
                title: title.clone(),
                starts_at,
                ticket_url: film_url.clone(),
                format: format.clone(),
                runtime,
                special_notes: None,
                poster_url: None,
                theater: theater.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;
    use crate::datetime::test_support::pacific_at;

    const DAY: &str = r#"
        <div class="info">
          <div class="film-info-wrapper">
            <div class="title"><a href="/film/anora">Anora</a></div>
            <div class="detail">139 min. R</div>
          </div>
          <div class="showtimes">
            <div class="showtime showtime-past">11:00am</div>
            <div class="showtime">1:20pm</div>
            <div class="showtime">7:30pm</div>
          </div>
        </div>
        <div class="info">
          <div class="film-info-wrapper">
            <div class="title"><a href="https://www.laemmle.com/film/lawrence">Lawrence of Arabia (70mm)</a></div>
          </div>
          <div class="showtimes"><div class="showtime">6:00pm</div></div>
          <p>Presented in 70mm</p>
        </div>
        <div class="info"><div class="film-info-wrapper"></div></div>
    "#;

    #[test]
    fn parses_showtimes_and_skips_past_ones() {
        let now = pacific_at(2026, 1, 7, 13, 0);
        let got = parse_day(DAY, date(2026, 1, 7), &now, "Laemmle Royal");

        assert_eq!(got.len(), 3);
        assert_eq!(got[0].title, "Anora");
        assert_eq!(got[0].starts_at.datetime(), date(2026, 1, 7).at(13, 20, 0, 0));
        assert_eq!(got[0].runtime, Some(139));
        assert_eq!(got[0].ticket_url.as_deref(), Some("https://www.laemmle.com/film/anora"));
        assert_eq!(got[0].format, "Digital");

        assert_eq!(got[2].title, "Lawrence of Arabia");
        assert_eq!(got[2].format, "70mm");
        assert_eq!(got[2].runtime, None);
        assert!(got.iter().all(|c| c.theater == "Laemmle Royal"));
    }

    #[test]
    fn drops_times_before_now_even_without_past_class() {
        let now = pacific_at(2026, 1, 7, 19, 0);
        let got = parse_day(DAY, date(2026, 1, 7), &now, "Laemmle Royal");
        let times: Vec<_> = got.iter().map(|c| c.starts_at.datetime()).collect();
        assert_eq!(times, vec![date(2026, 1, 7).at(19, 30, 0, 0)]);
    }

    #[test]
    fn venue_table_is_complete() {
        assert_eq!(VENUES.len(), 8);
        assert!(VENUES.iter().all(|v| v.url.starts_with("https://www.laemmle.com/theater/")));
    }
}
