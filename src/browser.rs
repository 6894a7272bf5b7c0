//! Headless Chromium for pages that only render their data client-side.

use std::time::Duration;

use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    error::CdpError,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    sources::BROWSER_USER_AGENT,
};

/// Client-side frameworks keep hydrating after the load event.
const SETTLE: Duration = Duration::from_secs(2);

/// A launched browser plus the task pumping its CDP connection.
///
/// Prefer [`render_once`]; it shuts the session down on every path. Dropping a session without
/// [`BrowserSession::shutdown`] still stops the handler task, and chromiumoxide kills the child
/// process when the `Browser` is dropped.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch() -> AppResult<Self> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"))
            .build()
            .map_err(AppError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler stopped");
                    break;
                }
            }
        });

        Ok(Self { browser: Some(browser), handler })
    }

    /// Navigates a fresh tab to `url` and returns the rendered document.
    pub async fn render(&self, url: &str) -> AppResult<String> {
        let browser =
            self.browser.as_ref().ok_or_else(|| AppError::Browser("session already closed".into()))?;
        let page = browser.new_page(url).await?;
        let content: Result<String, CdpError> = async {
            page.wait_for_navigation().await?;
            tokio::time::sleep(SETTLE).await;
            page.content().await
        }
        .await;
        if let Err(err) = page.close().await {
            debug!(error = %err, "closing page");
        }
        Ok(content?)
    }

    pub async fn shutdown(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "browser close");
            }
            if let Err(err) = browser.wait().await {
                warn!(error = %err, "waiting for browser exit");
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Launches a browser, renders one page within `timeout`, and tears everything down.
pub async fn render_once(url: &str, timeout: Duration) -> AppResult<String> {
    let session = BrowserSession::launch().await?;
    let rendered = tokio::time::timeout(timeout, session.render(url)).await;
    session.shutdown().await;
    rendered.map_err(|_| AppError::Timeout(timeout))?
}
