use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Transport-level failure reaching an upstream.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Upstream payload did not have the expected shape.
    #[error("unexpected payload from {context}: {message}")]
    Parse { context: String, message: String },

    /// A required credential or setting is missing.
    #[error("configuration: {0}")]
    Config(String),

    #[error("browser session: {0}")]
    Browser(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Time(#[from] jiff::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { context: context.into(), message: message.into() }
    }

    /// Failures worth another attempt against the same upstream.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Timeout(_) | Self::Browser(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());
        if err.is_decode() {
            return Self::Parse { context: url, message: err.to_string() };
        }
        Self::Fetch { url, message: err.to_string() }
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        let fetch = AppError::Fetch { url: "https://x".into(), message: "reset".into() };
        assert!(fetch.is_transient());
        assert!(AppError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!AppError::parse("x", "missing hits").is_transient());
        assert!(!AppError::Config("TMDB_API_KEY".into()).is_transient());
    }
}
