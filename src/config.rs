use std::time::Duration;

use anyhow::Context;
use jiff::tz::TimeZone;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: String,
    pub tmdb_rps: u32,
    pub canonical_tz: TimeZone,
    pub fetch_days: u32,
    pub request_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub browser_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub upcoming_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://marquee.db?mode=rwc".to_string());

        let tmdb_api_key =
            std::env::var("TMDB_API_KEY").ok().map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let tz_name =
            std::env::var("CANONICAL_TZ").unwrap_or_else(|_| "America/Los_Angeles".to_string());
        let canonical_tz = TimeZone::get(&tz_name).context("CANONICAL_TZ")?;

        let fetch_days: u32 =
            std::env::var("FETCH_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(7);

        let request_delay_ms: u64 =
            std::env::var("REQUEST_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(1000);

        let http_timeout_secs: u64 =
            std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let browser_timeout_secs: u64 =
            std::env::var("BROWSER_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        let retry_attempts: u32 =
            std::env::var("RETRY_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or(3);

        let retry_base_ms: u64 =
            std::env::var("RETRY_BASE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(500);

        let upcoming_limit: usize =
            std::env::var("UPCOMING_LIMIT").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        Ok(Self {
            database_url,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_rps,
            canonical_tz,
            fetch_days,
            request_delay_ms,
            http_timeout_secs,
            browser_timeout_secs,
            retry_attempts,
            retry_base_ms,
            upcoming_limit,
        })
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }
}
