use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::AppResult;

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// One search result, movie or TV.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogHit {
    pub id: i32,
    pub title: String,
    pub popularity: f64,
    pub poster_path: Option<String>,
    pub year: Option<i16>,
}

impl CatalogHit {
    pub fn poster_url(&self) -> Option<String> {
        self.poster_path.as_deref().filter(|p| !p.is_empty()).map(|p| format!("{POSTER_BASE}{p}"))
    }
}

/// The catalog lookups enrichment needs. Implemented by [`TmdbClient`]; tests use a fake.
#[async_trait::async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn search_movies(&self, query: &str, year: Option<i16>) -> AppResult<Vec<CatalogHit>>;
    async fn search_tv(&self, query: &str) -> AppResult<Vec<CatalogHit>>;
    async fn movie_director(&self, id: i32) -> AppResult<Option<String>>;
    async fn movie_runtime(&self, id: i32) -> AppResult<Option<u32>>;
    async fn tv_creator(&self, id: i32) -> AppResult<Option<String>>;
}

#[derive(Clone, Debug, PartialEq)]
enum Auth {
    /// v3 API key, sent as `api_key`.
    ApiKey(String),
    /// v4 read access token (a JWT), sent as a bearer token.
    Bearer(String),
}

impl Auth {
    fn from_key(key: String) -> Self {
        if key.starts_with("eyJ") { Auth::Bearer(key) } else { Auth::ApiKey(key) }
    }
}

pub struct TmdbClient {
    client: reqwest::Client,
    auth: Auth,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, auth: Auth::from_key(api_key), base_url, limiter }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> AppResult<T> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let req = self.client.get(url).query(query);
        let req = match &self.auth {
            Auth::ApiKey(key) => req.query(&[("api_key", key)]),
            Auth::Bearer(token) => req.bearer_auth(token),
        };
        Ok(req.send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait::async_trait]
impl MetadataCatalog for TmdbClient {
    async fn search_movies(&self, query: &str, year: Option<i16>) -> AppResult<Vec<CatalogHit>> {
        let mut params = vec![("query", query.to_string())];
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }
        let resp: SearchResponse = self.get("search/movie", &params).await?;
        Ok(resp.into_hits())
    }

    async fn search_tv(&self, query: &str) -> AppResult<Vec<CatalogHit>> {
        let resp: SearchResponse = self.get("search/tv", &[("query", query.to_string())]).await?;
        Ok(resp.into_hits())
    }

    async fn movie_director(&self, id: i32) -> AppResult<Option<String>> {
        let resp: CreditsResponse = self.get(&format!("movie/{id}/credits"), &[]).await?;
        Ok(resp.crew.into_iter().find(|c| c.job == "Director").map(|c| c.name))
    }

    async fn movie_runtime(&self, id: i32) -> AppResult<Option<u32>> {
        let resp: MovieResponse = self.get(&format!("movie/{id}"), &[]).await?;
        Ok(resp.runtime.filter(|r| *r > 0))
    }

    async fn tv_creator(&self, id: i32) -> AppResult<Option<String>> {
        let resp: TvResponse = self.get(&format!("tv/{id}"), &[]).await?;
        Ok(resp.created_by.into_iter().next().map(|c| c.name))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<CatalogHit> {
        self.results
            .into_iter()
            .filter_map(|r| {
                let title = r.title.or(r.name)?;
                let date = r.release_date.or(r.first_air_date).unwrap_or_default();
                Some(CatalogHit {
                    id: r.id,
                    title,
                    popularity: r.popularity.unwrap_or(0.0),
                    poster_path: r.poster_path,
                    year: date.get(..4).and_then(|y| y.parse().ok()),
                })
            })
            .collect()
    }
}

/// Movies carry `title`/`release_date`, TV shows `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i32,
    title: Option<String>,
    name: Option<String>,
    popularity: Option<f64>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    #[serde(default)]
    job: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MovieResponse {
    runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TvResponse {
    #[serde(default)]
    created_by: Vec<Creator>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    name: String,
}
