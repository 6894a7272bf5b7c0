use std::time::Duration;

use tracing::warn;

use super::{BoxedSource, Source};
use crate::{
    error::AppResult,
    models::{FetchWindow, ScreeningCandidate, TheaterInfo},
};

/// Re-runs a source on transient failures with exponential backoff.
///
/// The wrapped source keeps its contract; only `Fetch`, `Timeout` and `Browser`
/// errors are retried, so a malformed payload fails fast.
pub struct Retrying {
    inner: BoxedSource,
    attempts: u32,
    base_delay: Duration,
}

impl Retrying {
    pub fn new(inner: BoxedSource, attempts: u32, base_delay: Duration) -> Self {
        Self { inner, attempts: attempts.max(1), base_delay }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[async_trait::async_trait]
impl Source for Retrying {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn theaters(&self) -> &[TheaterInfo] {
        self.inner.theaters()
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    async fn fetch_screenings(&self, window: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch_screenings(window).await {
                Ok(candidates) => return Ok(candidates),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        source = %self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;
    use crate::{datetime::test_support::pacific_at, error::AppError};

    struct Flaky {
        calls: Arc<AtomicU32>,
        failures: u32,
        transient: bool,
    }

    #[async_trait::async_trait]
    impl Source for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn theaters(&self) -> &[TheaterInfo] {
            &[]
        }

        async fn fetch_screenings(&self, _: &FetchWindow) -> AppResult<Vec<ScreeningCandidate>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(if self.transient {
                    AppError::Fetch { url: "https://upstream".into(), message: "reset".into() }
                } else {
                    AppError::parse("upstream", "no hits")
                });
            }
            Ok(Vec::new())
        }
    }

    fn wrap(failures: u32, transient: bool, attempts: u32) -> (Retrying, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = Flaky { calls: calls.clone(), failures, transient };
        (Retrying::new(Box::new(inner), attempts, Duration::from_millis(1)), calls)
    }

    fn window() -> FetchWindow {
        FetchWindow::new(pacific_at(2026, 1, 10, 12, 0), 1)
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let (source, calls) = wrap(2, true, 3);
        assert!(source.fetch_screenings(&window()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let (source, calls) = wrap(5, true, 3);
        let err = source.fetch_screenings(&window()).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn parse_errors_are_not_retried() {
        let (source, calls) = wrap(1, false, 3);
        assert!(source.fetch_screenings(&window()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let (source, _) = wrap(0, true, 4);
        let source = Retrying { base_delay: Duration::from_millis(100), ..source };
        assert_eq!(source.backoff(1), Duration::from_millis(100));
        assert_eq!(source.backoff(2), Duration::from_millis(200));
        assert_eq!(source.backoff(3), Duration::from_millis(400));
    }
}
