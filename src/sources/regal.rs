//! Regal pages render showtimes client-side; the data lands in the Next.js
//! `__NEXT_DATA__` payload once the page has been rendered.

use std::time::Duration;

use jiff::{Zoned, tz::TimeZone};
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

use super::{Source, decode_items, loose_string, null_as_default, selector};
use crate::{
    browser,
    datetime::{is_future, resolve_iso},
    error::{AppError, AppResult},
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{format_from_attributes, normalize_title},
};

pub struct RegalVenue {
    pub theater: TheaterInfo,
    pub url: &'static str,
    pub code: &'static str,
    pub tz: &'static str,
}

const fn venue(
    name: &'static str,
    city: &'static str,
    address: &'static str,
    zip: &'static str,
    url: &'static str,
    code: &'static str,
) -> RegalVenue {
    RegalVenue {
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
        code,
        tz: "America/Los_Angeles",
    }
}

pub const VENUES: [RegalVenue; 5] = [
    venue(
        "Regal Paseo Stadium 14",
        "Pasadena",
        "336 E. Colorado Blvd., Pasadena, CA 91101",
        "91101",
        "https://www.regmovies.com/theatres/regal-paseo-1485",
        "1485",
    ),
    venue(
        "Regal LA Live Stadium 14",
        "Los Angeles",
        "1000 W. Olympic Blvd., Los Angeles, CA 90015",
        "90015",
        "https://www.regmovies.com/theatres/regal-la-live-1484",
        "1484",
    ),
    venue(
        "Regal Edwards Long Beach Stadium 26",
        "Long Beach",
        "7501 Carson Blvd., Long Beach, CA 90808",
        "90808",
        "https://www.regmovies.com/theatres/regal-edwards-long-beach-stadium-26-1042",
        "1042",
    ),
    venue(
        "Regal Alhambra Renaissance Stadium 14",
        "Alhambra",
        "1000 S. Fremont Ave., Alhambra, CA 91803",
        "91803",
        "https://www.regmovies.com/theatres/regal-alhambra-renaissance-stadium-14-1053",
        "1053",
    ),
    venue(
        "Regal Garden Grove",
        "Garden Grove",
        "9741 Chapman Ave., Garden Grove, CA 92841",
        "92841",
        "https://www.regmovies.com/theatres/regal-garden-grove-0364",
        "0364",
    ),
];

#[derive(Debug, Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    page_props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    /// One entry per business day, each decoded as a [`ShowDay`].
    #[serde(default, deserialize_with = "null_as_default")]
    showtimes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShowDay {
    #[serde(default, deserialize_with = "null_as_default")]
    film: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Film {
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    performances: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Performance {
    #[serde(default, deserialize_with = "loose_string")]
    calendar_show_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    performance_attributes: Vec<String>,
    #[serde(default)]
    performance_id: serde_json::Value,
}

pub struct RegalSource {
    venue: RegalVenue,
    timeout: Duration,
}

impl RegalSource {
    pub fn new(venue: RegalVenue, timeout: Duration) -> Self {
        Self { venue, timeout }
    }
}

#[async_trait::async_trait]
impl Source for RegalSource {
    fn name(&self) -> &str {
        self.venue.theater.name
    }

    fn theaters(&self) -> &[TheaterInfo] {
        std::slice::from_ref(&self.venue.theater)
    }

    fn is_optional(&self) -> bool {
        true
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(self.venue.tz)?);
        debug!(theater = self.venue.theater.name, code = self.venue.code, "rendering Regal page");
        let html = browser::render_once(self.venue.url, self.timeout).await?;
        parse_page(&html, window.days as usize, &now, self.venue.theater.name)
    }
}

fn parse_page(html: &str, days: usize, now: &Zoned, theater: &str) -> AppResult<Vec<ScreeningCandidate>> {
    let doc = Html::parse_document(html);
    let script = doc
        .select(&selector("script#__NEXT_DATA__"))
        .next()
        .ok_or_else(|| AppError::parse(theater, "page has no __NEXT_DATA__"))?;
    let data: NextData = serde_json::from_str(&script.text().collect::<String>())?;

    let show_days = data.props.page_props.showtimes.into_iter().take(days).collect();

    let mut out = Vec::new();
    for day in decode_items::<ShowDay>(show_days, theater) {
        for film in decode_items::<Film>(day.film, theater) {
            let Some(title) = normalize_title(&film.title) else { continue };
            for performance in decode_items::<Performance>(film.performances, theater) {
                let Some(starts_at) = performance
                    .calendar_show_time
                    .as_deref()
                    .and_then(|s| resolve_iso(s, now.time_zone()))
                else {
                    continue;
                };
                if !is_future(&starts_at, now) {
                    continue;
                }
                let attributes = performance.performance_attributes;
                out.push(ScreeningCandidate {
                    title: title.clone(),
                    starts_at,
                    ticket_url: ticket_url(&performance.performance_id),
                    format: format_from_attributes(&attributes),
                    runtime: None,
                    special_notes: (!attributes.is_empty()).then(|| attributes.join(", ")),
                    poster_url: None,
                    theater: theater.to_string(),
                });
            }
        }
    }
    Ok(out)
}

fn ticket_url(id: &serde_json::Value) -> Option<String> {
    let id = match id {
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(format!("https://www.regmovies.com/movies/{id}"))
}
