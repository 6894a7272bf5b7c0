//! New Beverly Cinema: a single revival house whose monthly schedule is a page of
//! program cards, each linking to `/program/...`.

use jiff::{Zoned, tz::TimeZone};
use scraper::Html;
use tracing::{debug, warn};

use super::{Source, absolute_url, get_text, selector};
use crate::{
    datetime::{is_future, month_from_name, resolve_month_day_time, resolve_time},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{extract_format, normalize_title, split_double_feature, strip_promotional_prefix},
};

const BASE: &str = "https://thenewbev.com";
const SCHEDULE_URL: &str = "https://thenewbev.com/schedule/";
const TZ: &str = "America/Los_Angeles";

const THEATERS: [TheaterInfo; 1] = [TheaterInfo {
    name: "New Beverly Cinema",
    address: "7165 Beverly Blvd, Los Angeles, CA 90036",
    city: "Los Angeles",
    state: "CA",
    zip_code: Some("90036"),
    website: BASE,
    coordinates: Some((34.0759, -118.3432)),
    description: Some("Revival house showing double features, mostly on 35mm."),
}];

pub struct NewBeverlySource {
    http: reqwest::Client,
}

impl NewBeverlySource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Source for NewBeverlySource {
    fn name(&self) -> &str {
        "new-beverly"
    }

    fn theaters(&self) -> &[TheaterInfo] {
        &THEATERS
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(TZ)?);
        debug!(url = SCHEDULE_URL, "fetching New Beverly schedule");
        let body = get_text(&self.http, SCHEDULE_URL, &[]).await?;
        let screenings = parse_schedule(&body, &now);
        debug!(screenings = screenings.len(), "parsed New Beverly schedule");
        Ok(screenings)
    }
}

/// One program card: date parts, showtimes and the (possibly double) title.
#[derive(Debug, Default)]
struct ProgramCard {
    month: Option<String>,
    day: Option<String>,
    times: Vec<String>,
}

fn parse_schedule(html: &str, now: &Zoned) -> Vec<ScreeningCandidate> {
    let doc = Html::parse_document(html);
    let link_sel = selector("a[href*='/program/']");
    let title_sel = selector("h4");

    let mut out = Vec::new();
    for link in doc.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        let url = absolute_url(BASE, href);

        let Some(title_el) = link.select(&title_sel).next() else { continue };
        let title_lines: Vec<&str> =
            title_el.text().map(str::trim).filter(|t| !t.is_empty()).collect();
        let title_text = title_lines.join(" ");

        let lines: Vec<&str> = link
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !title_lines.contains(t))
            .collect();
        let card = read_card(&lines);

        let (Some(month), Some(day)) = (card.month.as_deref(), card.day.as_deref()) else {
            debug!(url = %url, "program card without a date");
            continue;
        };
        if card.times.is_empty() {
            debug!(url = %url, "program card without showtimes");
            continue;
        }

        let full_text = link.text().collect::<Vec<_>>().join(" ");
        let format = extract_format(&full_text);
        let date_text = format!("{month} {day}");

        let titles = split_double_feature(&strip_promotional_prefix(&title_text));
        // A double bill lists one time per feature; otherwise every title shares the first.
        let pairs: Vec<(&String, &String)> = if card.times.len() > 1 && titles.len() > 1 {
            titles.iter().zip(card.times.iter()).collect()
        } else {
            titles.iter().map(|t| (t, &card.times[0])).collect()
        };

        for (raw_title, time) in pairs {
            let Some(title) = normalize_title(raw_title) else { continue };
            let Some(starts_at) = resolve_month_day_time(&date_text, time, now) else {
                warn!(title = %title, date = %date_text, time = %time, "unparseable New Beverly showtime");
                continue;
            };
            if !is_future(&starts_at, now) {
                continue;
            }
            out.push(ScreeningCandidate {
                title,
                starts_at,
                ticket_url: Some(url.clone()),
                format: format.clone(),
                runtime: None,
                special_notes: (titles.len() > 1).then(|| "Double Feature".to_string()),
                poster_url: None,
                theater: THEATERS[0].name.to_string(),
            });
        }
    }
    out
}

fn read_card(lines: &[&str]) -> ProgramCard {
    let mut card = ProgramCard::default();
    for line in lines {
        let lower = line.to_lowercase();
        if month_from_name(line).is_some() {
            card.month = Some(line.to_string());
        } else if line.chars().all(|c| c.is_ascii_digit())
            && line.parse::<u8>().is_ok_and(|d| (1..=31).contains(&d))
        {
            card.day = Some(line.to_string());
        } else if lower.contains("am") || lower.contains("pm") {
            // "7:30 pm / 9:25 pm" carries both features' times.
            card.times.extend(
                line.split('/')
                    .map(str::trim)
                    .filter(|t| resolve_time(t).is_some())
                    .map(String::from),
            );
        }
    }
    card
}
