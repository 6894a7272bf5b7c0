//! Fine Arts Theatre Beverly Hills. The homepage lists each program as an `h4`
//! title followed somewhere later by "Sunday, February 1st at 2:00pm".

use std::{collections::HashSet, sync::LazyLock};

use jiff::{Zoned, civil::Date, tz::TimeZone};
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::{Source, get_text, selector};
use crate::{
    datetime::{infer_year, is_future, localize, month_from_name, resolve_time},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::normalize_title,
};

const BASE: &str = "https://fineartstheatrebh.com";
const TICKET_URL: &str = "https://ticketing.uswest.veezi.com/sessions/?siteToken=tez3prscsvfbagchhkxbevjwk8";
const TZ: &str = "America/Los_Angeles";

/// Headings on the page that are not films (the neighbouring food stands, mostly).
const SKIP_HEADINGS: [&str; 12] = [
    "wilshire",
    "grill",
    "pizza",
    "egg",
    "dog",
    "wing",
    "burrito",
    "pretzel",
    "nacho",
    "location",
    "screenings every",
    "70mm",
];

/// Programs here are the venue's 70mm series.
const SERIES_FORMAT: &str = "70mm";

static SHOWING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Sunday|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday),?\s+([A-Za-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?\s+at\s+(\d{1,2}:\d{2}\s*[ap]m)",
    )
    .expect("valid regex")
});
static TITLE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:IN PERSON|SPECIAL EVENT|70MM)\s*").expect("valid regex"));
static AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").expect("valid regex"));

const THEATERS: [TheaterInfo; 1] = [TheaterInfo {
    name: "Fine Arts Theatre Beverly Hills",
    address: "8556 Wilshire Blvd, Beverly Hills, CA 90211",
    city: "Beverly Hills",
    state: "CA",
    zip_code: Some("90211"),
    website: BASE,
    coordinates: Some((34.0620, -118.3842)),
    description: None,
}];

pub struct FineArtsSource {
    http: reqwest::Client,
}

impl FineArtsSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Source for FineArtsSource {
    fn name(&self) -> &str {
        "fine-arts"
    }

    fn theaters(&self) -> &[TheaterInfo] {
        &THEATERS
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(TZ)?);
        let body = get_text(&self.http, BASE, &[]).await?;
        Ok(parse_homepage(&body, &now))
    }
}

fn parse_homepage(html: &str, now: &Zoned) -> Vec<ScreeningCandidate> {
    let doc = Html::parse_document(html);
    let h4 = selector("h4");

    let mut seen = HashSet::new();
    let headings: Vec<String> = doc
        .select(&h4)
        .map(|el| el.text().map(str::trim).collect::<String>())
        .filter(|text| is_program_heading(text))
        .filter(|text| seen.insert(text.clone()))
        .collect();

    let all_text = doc.root_element().text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ");

    let mut out = Vec::new();
    for heading in headings {
        let Some(pos) = all_text.find(&heading) else { continue };
        let Some(starts_at) = first_showing(&all_text[pos..], now) else {
            debug!(title = %heading, "no showing after heading");
            continue;
        };
        if !is_future(&starts_at, now) {
            continue;
        }

        let cleaned = TITLE_PREFIX.replace(&heading, "").trim().to_string();
        let titles: Vec<String> = AND.split(&cleaned).filter_map(normalize_title).collect();
        let note = if titles.len() > 1 { "70mm Screening - Double Feature" } else { "70mm Screening" };

        for title in titles {
            out.push(ScreeningCandidate {
                title,
                starts_at: starts_at.clone(),
                ticket_url: Some(TICKET_URL.to_string()),
                format: SERIES_FORMAT.to_string(),
                runtime: None,
                special_notes: Some(note.to_string()),
                poster_url: None,
                theater: THEATERS[0].name.to_string(),
            });
        }
    }
    out
}

fn is_program_heading(text: &str) -> bool {
    let lower = text.to_lowercase();
    (4..100).contains(&text.chars().count()) && !SKIP_HEADINGS.iter().any(|skip| lower.contains(skip))
}

fn first_showing(text: &str, now: &Zoned) -> Option<Zoned> {
    let caps = SHOWING.captures(text)?;
    let month = month_from_name(caps.get(1)?.as_str())?;
    let day: i8 = caps.get(2)?.as_str().parse().ok()?;
    let time = resolve_time(caps.get(3)?.as_str())?;
    let date = Date::new(infer_year(month, day, now.date()), month, day).ok()?;
    localize(date, time, now.time_zone())
}
