//! Source extractors: one adapter per theater chain, all behind [`Source`].

mod american_cinematheque;
mod fine_arts;
mod laemmle;
mod landmark;
mod new_beverly;
mod regal;
pub mod retry;
mod usc;

use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use tracing::warn;

use crate::{
    config::Config,
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
};

pub use self::{
    american_cinematheque::AmericanCinemathequeSource, fine_arts::FineArtsSource,
    laemmle::LaemmleSource, landmark::LandmarkSource, new_beverly::NewBeverlySource,
    regal::RegalSource, retry::Retrying, usc::UscCinemaSource,
};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Produces screenings for a venue (or a chain's venues) over a date window.
///
/// Implementations never return past screenings and never fail because one item
/// was malformed; an `Err` means the upstream could not be reached at all.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    /// Venues this source can emit candidates for.
    fn theaters(&self) -> &[TheaterInfo];

    /// Optional sources may fail without failing the run.
    fn is_optional(&self) -> bool {
        false
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>>;
}

pub type BoxedSource = Box<dyn Source>;

/// Every known source, in the order a run processes them.
pub fn default_sources(config: &Config, http: &reqwest::Client, with_browser: bool) -> Vec<BoxedSource> {
    let pacing = config.request_delay();
    let mut sources: Vec<BoxedSource> = Vec::new();

    sources.push(Box::new(NewBeverlySource::new(http.clone())));
    for venue in laemmle::VENUES {
        sources.push(Box::new(LaemmleSource::new(http.clone(), venue, pacing)));
    }
    sources.push(Box::new(AmericanCinemathequeSource::new(http.clone())));
    for venue in landmark::VENUES {
        sources.push(Box::new(LandmarkSource::new(http.clone(), venue, pacing)));
    }
    sources.push(Box::new(FineArtsSource::new(http.clone())));
    sources.push(Box::new(UscCinemaSource::new(http.clone())));

    if with_browser {
        for venue in regal::VENUES {
            sources.push(Box::new(RegalSource::new(venue, config.browser_timeout())));
        }
    }

    let attempts = config.retry_attempts;
    let base = Duration::from_millis(config.retry_base_ms);
    sources
        .into_iter()
        .map(|source| Box::new(Retrying::new(source, attempts, base)) as BoxedSource)
        .collect()
}

pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> AppResult<String> {
    let body = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> AppResult<T> {
    let body = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(ACCEPT, "application/json")
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(serde_json::from_str(&body)?)
}

/// Decodes each item on its own so one malformed entry only loses itself.
pub(crate) fn decode_items<T: DeserializeOwned>(items: Vec<serde_json::Value>, context: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(context, %error, "skipping malformed item");
                None
            },
        })
        .collect()
}

/// Treats `null` like a missing field, for upstreams that send `null` for empty lists.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a string or a number; anything else (WordPress sends `false` for
/// empty fields) reads as absent.
pub(crate) fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Resolves `href` against `base` for the relative links upstream pages use.
pub(crate) fn absolute_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), href)
    }
}

pub(crate) fn selector(css: &str) -> scraper::Selector {
    scraper::Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "loose_string")]
        note: Option<String>,
    }

    #[test]
    fn malformed_items_are_skipped_individually() {
        let items: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
              {"name": "a", "tags": null, "note": false},
              {"name": 7},
              {"name": "b", "tags": ["x"], "note": 35}
            ]"#,
        )
        .unwrap();
        let decoded: Vec<Item> = decode_items(items, "test");
        assert_eq!(
            decoded,
            vec![
                Item { name: "a".into(), tags: vec![], note: None },
                Item { name: "b".into(), tags: vec!["x".into()], note: Some("35".into()) },
            ]
        );
    }

    #[test]
    fn absolute_urls() {
        assert_eq!(absolute_url("https://thenewbev.com", "/program/x/"), "https://thenewbev.com/program/x/");
        assert_eq!(absolute_url("https://thenewbev.com/", "program/x"), "https://thenewbev.com/program/x");
        assert_eq!(absolute_url("https://a.com", "https://b.com/y"), "https://b.com/y");
    }
}
