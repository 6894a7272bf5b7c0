//! American Cinematheque publishes every venue's events through one JSON
//! endpoint backed by their search index.

use jiff::{Zoned, tz::TimeZone};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Source, decode_items, get_json, loose_string};
use crate::{
    datetime::{is_future, resolve_clock, resolve_compact},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{extract_format, html_lines, html_text, normalize_title, strip_promotional_prefix},
};

const API_URL: &str = "https://www.americancinematheque.com/wp-json/wp/v2/algolia_get_events";
const TZ: &str = "America/Los_Angeles";

const NOTE_KEYWORDS: [&str; 4] = ["masterclass", "q&a", "discussion", "introduction"];

const THEATERS: [TheaterInfo; 3] = [
    TheaterInfo {
        name: "American Cinematheque - Aero Theatre",
        address: "1328 Montana Ave, Santa Monica, CA 90403",
        city: "Santa Monica",
        state: "CA",
        zip_code: Some("90403"),
        website: "https://www.americancinematheque.com",
        coordinates: None,
        description: None,
    },
    TheaterInfo {
        name: "American Cinematheque - Egyptian Theatre",
        address: "6712 Hollywood Blvd, Los Angeles, CA 90028",
        city: "Los Angeles",
        state: "CA",
        zip_code: Some("90028"),
        website: "https://www.americancinematheque.com",
        coordinates: None,
        description: None,
    },
    TheaterInfo {
        name: "American Cinematheque - Los Feliz 3",
        address: "1822 N Vermont Ave, Los Angeles, CA 90027",
        city: "Los Angeles",
        state: "CA",
        zip_code: Some("90027"),
        website: "https://www.americancinematheque.com",
        coordinates: None,
        description: None,
    },
];

/// Upstream location id for each entry of [`THEATERS`].
const LOCATION_IDS: [i64; 3] = [54, 55, 102];

#[derive(Debug, Deserialize)]
struct EventsResponse {
    hits: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    title: String,
    #[serde(default)]
    event_location: Vec<i64>,
    #[serde(default, deserialize_with = "loose_string")]
    event_start_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    event_start_time: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    event_end_time: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    event_card_excerpt: Option<String>,
    /// An object with `url`, or `false` when the event has no card image.
    #[serde(default)]
    event_card_image: serde_json::Value,
}

pub struct AmericanCinemathequeSource {
    http: reqwest::Client,
}

impl AmericanCinemathequeSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Source for AmericanCinemathequeSource {
    fn name(&self) -> &str {
        "american-cinematheque"
    }

    fn theaters(&self) -> &[TheaterInfo] {
        &THEATERS
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(TZ)?);
        let start = now.timestamp().as_second();
        let end = start + i64::from(window.days) * 86_400;
        let query = [
            ("environment", "production".to_string()),
            ("startDate", start.to_string()),
            ("endDate", end.to_string()),
        ];

        let response: EventsResponse = get_json(&self.http, API_URL, &query).await?;
        Ok(parse_response(response, &now))
    }
}

fn parse_response(response: EventsResponse, now: &Zoned) -> Vec<ScreeningCandidate> {
    let Some(hits) = response.hits else {
        warn!("American Cinematheque response has no hits");
        return Vec::new();
    };
    debug!(events = hits.len(), "fetched American Cinematheque events");
    decode_items::<Event>(hits, API_URL)
        .iter()
        .filter_map(|event| parse_event(event, now))
        .collect()
}

fn parse_event(event: &Event, now: &Zoned) -> Option<ScreeningCandidate> {
    let location = *event.event_location.first()?;
    let Some(theater) = LOCATION_IDS.iter().position(|id| *id == location).map(|i| &THEATERS[i])
    else {
        debug!(location, title = %event.title, "event at unknown location");
        return None;
    };

    let raw_title = html_text(&event.title);
    let title = normalize_title(&strip_promotional_prefix(&raw_title))?;

    let start_time = event.event_start_time.as_deref()?;
    let starts_at = resolve_compact(event.event_start_date.as_deref()?, start_time, now.time_zone())?;
    if !is_future(&starts_at, now) {
        return None;
    }

    let excerpt = event.event_card_excerpt.as_deref().unwrap_or_default();
    let format = extract_format(&format!("{raw_title} {}", html_text(excerpt)));
    let runtime = event.event_end_time.as_deref().and_then(|end| runtime_between(start_time, end));
    let poster_url = event
        .event_card_image
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(String::from);

    Some(ScreeningCandidate {
        title,
        starts_at,
        ticket_url: event.url.clone().filter(|u| !u.is_empty()),
        format,
        runtime,
        special_notes: special_notes(excerpt),
        poster_url,
        theater: theater.name.to_string(),
    })
}

/// Minutes from start to end, when the event ends later the same day.
fn runtime_between(start: &str, end: &str) -> Option<u32> {
    let start = resolve_clock(start)?;
    let end = resolve_clock(end)?;
    let minutes = (i32::from(end.hour()) * 60 + i32::from(end.minute()))
        - (i32::from(start.hour()) * 60 + i32::from(start.minute()));
    u32::try_from(minutes).ok().filter(|m| *m > 0)
}

/// The excerpt's second line, when the excerpt announces a guest or talk.
fn special_notes(excerpt: &str) -> Option<String> {
    let lines: Vec<String> = html_lines(excerpt)
        .iter()
        .flat_map(|l| l.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect::<Vec<_>>())
        .collect();
    let lower = lines.join(" ").to_lowercase();
    if !NOTE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }
    lines.into_iter().nth(1)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;
    use crate::datetime::test_support::pacific_at;

    const RESPONSE: &str = r#"{
      "hits": [
        {
          "title": "Masterclass / Seven Samurai",
          "event_location": [55],
          "event_start_date": "20260125",
          "event_start_time": "17:00:00",
          "event_end_time": "20:27:00",
          "url": "https://www.americancinematheque.com/now-showing/seven-samurai/",
          "event_card_excerpt": "<p>Masterclass</p>\n<p>Discussion with Kurosawa scholar</p>",
          "event_card_image": {"url": "https://www.americancinematheque.com/img/samurai.jpg"}
        },
        {
          "title": "Vertigo &amp; Friends",
          "event_location": [54],
          "event_start_date": "20260126",
          "event_start_time": "19:30:00",
          "event_end_time": "",
          "url": "https://www.americancinematheque.com/now-showing/vertigo/",
          "event_card_excerpt": "New 70mm print",
          "event_card_image": false
        },
        {
          "title": "Members Mixer",
          "event_location": [999],
          "event_start_date": "20260126",
          "event_start_time": "18:00:00"
        },
        {
          "title": "Yesterday's Film",
          "event_location": [102],
          "event_start_date": "20260110",
          "event_start_time": "10:00:00"
        },
        {
          "title": "No Start",
          "event_location": [102],
          "event_start_date": "20260126"
        }
      ]
    }"#;

    fn parse(now: &Zoned) -> Vec<ScreeningCandidate> {
        parse_response(serde_json::from_str(RESPONSE).unwrap(), now)
    }

    #[test]
    fn maps_events_to_venues() {
        let now = pacific_at(2026, 1, 10, 12, 0);
        let got = parse(&now);
        assert_eq!(got.len(), 2);

        let samurai = &got[0];
        assert_eq!(samurai.title, "Seven Samurai");
        assert_eq!(samurai.theater, "American Cinematheque - Egyptian Theatre");
        assert_eq!(samurai.starts_at.datetime(), date(2026, 1, 25).at(17, 0, 0, 0));
        assert_eq!(samurai.runtime, Some(207));
        assert_eq!(samurai.special_notes.as_deref(), Some("Discussion with Kurosawa scholar"));
        assert_eq!(
            samurai.poster_url.as_deref(),
            Some("https://www.americancinematheque.com/img/samurai.jpg")
        );

        let vertigo = &got[1];
        assert_eq!(vertigo.title, "Vertigo & Friends");
        assert_eq!(vertigo.theater, "American Cinematheque - Aero Theatre");
        assert_eq!(vertigo.format, "70mm");
        assert_eq!(vertigo.runtime, None);
        assert_eq!(vertigo.poster_url, None);
        assert_eq!(vertigo.special_notes, None);
    }

    #[test]
    fn one_bad_event_does_not_drop_its_siblings() {
        let body = r#"{
          "hits": [
            {
              "title": "Seven Samurai",
              "event_location": [55],
              "event_start_date": "20260125",
              "event_start_time": "17:00:00",
              "event_end_time": "20:27:00"
            },
            {
              "title": "Ran",
              "event_location": [54],
              "event_start_date": "20260126",
              "event_start_time": "19:30:00",
              "event_end_time": false,
              "event_card_excerpt": false
            },
            {
              "title": "Ikiru",
              "event_location": "Aero",
              "event_start_date": "20260127",
              "event_start_time": "19:30:00"
            }
          ]
        }"#;
        let now = pacific_at(2026, 1, 10, 12, 0);
        let got = parse_response(serde_json::from_str(body).unwrap(), &now);
        let titles: Vec<&str> = got.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Seven Samurai", "Ran"]);
        assert_eq!(got[0].runtime, Some(207));
        assert_eq!(got[1].runtime, None);
    }

    #[test]
    fn response_without_hits_is_empty() {
        let now = pacific_at(2026, 1, 10, 12, 0);
        assert!(parse_response(serde_json::from_str("{}").unwrap(), &now).is_empty());
    }

    #[test]
    fn runtime_requires_positive_span() {
        assert_eq!(runtime_between("17:00:00", "18:45:00"), Some(105));
        assert_eq!(runtime_between("23:00:00", "01:00:00"), None);
        assert_eq!(runtime_between("17:00:00", ""), None);
    }
}
