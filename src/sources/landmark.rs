use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use jiff::{Span, Zoned, tz::TimeZone};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Source, decode_items, get_json, loose_string, null_as_default};
use crate::{
    datetime::{is_future, resolve_iso},
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
    normalize::{format_from_attributes, normalize_title},
};

const SCHEDULE_API: &str = "https://www.landmarktheatres.com/api/gatsby-source-boxofficeapi/schedule";
const MOVIES_API: &str = "https://www.landmarktheatres.com/api/gatsby-source-boxofficeapi/movies";

/// A Landmark location as the box-office API knows it.
pub struct LandmarkVenue {
    pub theater: TheaterInfo,
    pub api_id: &'static str,
    pub tz: &'static str,
}

pub const VENUES: [LandmarkVenue; 1] = [LandmarkVenue {
    theater: TheaterInfo {
        name: "Landmark Nuart Theatre",
        address: "11272 Santa Monica Blvd, Los Angeles, CA 90025",
        city: "West Los Angeles",
        state: "CA",
        zip_code: Some("90025"),
        website: "https://www.landmarktheatres.com/los-angeles/nuart-theatre",
        coordinates: None,
        description: None,
    },
    api_id: "X00CW",
    tz: "America/Los_Angeles",
}];

#[derive(Debug, Default, Deserialize)]
struct TheaterSchedule {
    /// movie id → local date → showtimes
    #[serde(default, deserialize_with = "null_as_default")]
    schedule: BTreeMap<String, BTreeMap<String, Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Showtime {
    #[serde(default, deserialize_with = "loose_string")]
    starts_at: Option<String>,
    #[serde(default)]
    is_expired: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(default)]
    data: Option<ShowtimeData>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowtimeData {
    #[serde(default, deserialize_with = "null_as_default")]
    ticketing: Vec<Ticketing>,
}

#[derive(Debug, Default, Deserialize)]
struct Ticketing {
    #[serde(default, deserialize_with = "null_as_default")]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: serde_json::Value,
    #[serde(default, deserialize_with = "loose_string")]
    title: Option<String>,
    /// Seconds; sometimes sent as a float.
    runtime: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
}

impl MovieDetails {
    fn key(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub struct LandmarkSource {
    http: reqwest::Client,
    venue: LandmarkVenue,
    pacing: Duration,
}

impl LandmarkSource {
    pub fn new(http: reqwest::Client, venue: LandmarkVenue, pacing: Duration) -> Self {
        Self { http, venue, pacing }
    }
}

#[async_trait::async_trait]
impl Source for LandmarkSource {
    fn name(&self) -> &str {
        self.venue.theater.name
    }

    fn theaters(&self) -> &[TheaterInfo] {
        std::slice::from_ref(&self.venue.theater)
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let now = window.now.with_time_zone(TimeZone::get(self.venue.tz)?);
        let from = now.start_of_day()?;
        let to = from.checked_add(Span::new().days(i64::from(window.days)))?;

        let theaters = serde_json::json!({ "id": self.venue.api_id, "timeZone": self.venue.tz });
        let query = [
            ("from", from.strftime("%Y-%m-%dT%H:%M:%S").to_string()),
            ("to", to.strftime("%Y-%m-%dT%H:%M:%S").to_string()),
            ("theaters", theaters.to_string()),
        ];
        let mut response: HashMap<String, TheaterSchedule> =
            get_json(&self.http, SCHEDULE_API, &query).await?;
        let Some(schedule) = response.remove(self.venue.api_id) else {
            warn!(theater = self.venue.theater.name, "no schedule for venue");
            return Ok(Vec::new());
        };
        if schedule.schedule.is_empty() {
            return Ok(Vec::new());
        }

        tokio::time::sleep(self.pacing).await;
        let mut query = vec![("basic", "false".to_string()), ("castingLimit", "3".to_string())];
        query.extend(schedule.schedule.keys().map(|id| ("ids", id.clone())));
        let details = get_json(&self.http, MOVIES_API, &query).await;
        let movies = movie_index(details, self.venue.theater.name);
        Ok(parse_schedule(schedule, &movies, &now, self.venue.theater.name))
    }
}

/// Keys movie details by id. A failed details call leaves the index empty
/// rather than failing the venue.
fn movie_index(details: AppResult<Vec<serde_json::Value>>, theater: &str) -> HashMap<String, MovieDetails> {
    let items = match details {
        Ok(items) => items,
        Err(error) => {
            warn!(theater, %error, "movie details unavailable");
            return HashMap::new();
        },
    };
    debug!(theater, movies = items.len(), "fetched movie details");
    decode_items::<MovieDetails>(items, theater)
        .into_iter()
        .map(|m| (m.key(), m))
        .collect()
}

fn parse_schedule(
    schedule: TheaterSchedule,
    movies: &HashMap<String, MovieDetails>,
    now: &Zoned,
    theater: &str,
) -> Vec<ScreeningCandidate> {
    let mut out = Vec::new();
    for (movie_id, dates) in schedule.schedule {
        let Some(movie) = movies.get(&movie_id) else {
            debug!(movie_id, "no details for scheduled movie");
            continue;
        };
        let Some(title) = movie.title.as_deref().and_then(normalize_title) else { continue };
        let runtime = movie
            .runtime
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| (secs / 60.0) as u32)
            .filter(|m| *m > 0);
        let poster_url = movie.images.first().and_then(|i| i.url.clone());

        for showtime in decode_items::<Showtime>(dates.into_values().flatten().collect(), theater) {
            if showtime.is_expired {
                continue;
            }
            let Some(starts_at) =
                showtime.starts_at.as_deref().and_then(|s| resolve_iso(s, now.time_zone()))
            else {
                continue;
            };
            if !is_future(&starts_at, now) {
                continue;
            }
            let ticket_url = showtime
                .data
                .and_then(|d| d.ticketing.into_iter().next())
                .and_then(|t| t.urls.into_iter().next());
            out.push(ScreeningCandidate {
                title: title.clone(),
                starts_at,
                ticket_url,
                format: format_from_attributes(&showtime.tags),
                runtime,
                special_notes: None,
                poster_url: poster_url.clone(),
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
    use crate::{datetime::test_support::pacific_at, error::AppError};

    const SCHEDULE: &str = r#"{
      "X00CW": {
        "schedule": {
          "101": {
            "2026-01-06": [
              {"startsAt": "2026-01-06T17:00:00", "isExpired": false, "tags": ["Showtime.Format.35mm"],
               "data": {"ticketing": [{"urls": ["https://tickets.example/101-a"]}]}},
              {"startsAt": "2026-01-06T11:00:00", "isExpired": false, "tags": []}
            ],
            "2026-01-07": [
              {"startsAt": "2026-01-07T20:00:00", "isExpired": true, "tags": []},
              {"startsAt": "2026-01-07T21:30:00", "tags": ["IMAX"]}
            ]
          },
          "202": {
            "2026-01-06": [{"startsAt": "2026-01-06T19:00:00"}]
          }
        }
      }
    }"#;

    const MOVIES: &str = r#"[
      {"id": 101, "title": "Mulholland Drive (35mm)", "runtime": 8820,
       "images": [{"url": "https://img.example/mulholland.jpg"}]}
    ]"#;

    fn schedule(body: &str) -> TheaterSchedule {
        let mut response: HashMap<String, TheaterSchedule> = serde_json::from_str(body).unwrap();
        response.remove("X00CW").unwrap()
    }

    #[test]
    fn joins_schedule_with_movie_details() {
        let schedule = schedule(SCHEDULE);
        let movies = movie_index(Ok(serde_json::from_str(MOVIES).unwrap()), "Landmark Nuart Theatre");

        let now = pacific_at(2026, 1, 6, 12, 0);
        let got = parse_schedule(schedule, &movies, &now, "Landmark Nuart Theatre");

        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|c| c.title == "Mulholland Drive"));
        assert_eq!(got[0].starts_at.datetime(), date(2026, 1, 6).at(17, 0, 0, 0));
        assert_eq!(got[0].format, "35mm");
        assert_eq!(got[0].runtime, Some(147));
        assert_eq!(got[0].ticket_url.as_deref(), Some("https://tickets.example/101-a"));
        assert_eq!(got[0].poster_url.as_deref(), Some("https://img.example/mulholland.jpg"));

        assert_eq!(got[1].starts_at.datetime(), date(2026, 1, 7).at(21, 30, 0, 0));
        assert_eq!(got[1].format, "IMAX");
        assert_eq!(got[1].ticket_url, None);
    }

    #[test]
    fn malformed_entries_only_lose_themselves() {
        let body = r#"{
          "X00CW": {
            "schedule": {
              "101": {
                "2026-01-06": [
                  {"startsAt": "2026-01-06T17:00:00", "tags": null},
                  {"startsAt": "2026-01-06T18:00:00", "isExpired": "no"},
                  {"startsAt": "2026-01-06T21:00:00", "tags": ["Showtime.Format.IMAX"]}
                ]
              },
              "202": {"2026-01-06": [{"startsAt": "2026-01-06T19:00:00"}]}
            }
          }
        }"#;
        let movies = r#"[
          {"id": 101, "title": "Mulholland Drive", "runtime": 8820.0},
          {"id": 202, "title": "Eraserhead", "images": "none"}
        ]"#;
        let movies = movie_index(Ok(serde_json::from_str(movies).unwrap()), "Landmark Nuart Theatre");
        assert_eq!(movies.len(), 1);

        let now = pacific_at(2026, 1, 6, 12, 0);
        let got = parse_schedule(schedule(body), &movies, &now, "Landmark Nuart Theatre");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].format, "Digital");
        assert_eq!(got[0].runtime, Some(147));
        assert_eq!(got[1].format, "IMAX");
    }

    #[test]
    fn failed_details_call_yields_no_screenings() {
        let details = Err(AppError::Fetch { url: MOVIES_API.into(), message: "503".into() });
        let movies = movie_index(details, "Landmark Nuart Theatre");
        assert!(movies.is_empty());

        let now = pacific_at(2026, 1, 6, 12, 0);
        assert!(parse_schedule(schedule(SCHEDULE), &movies, &now, "Landmark Nuart Theatre").is_empty());
    }
}
