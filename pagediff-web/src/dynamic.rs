//! Rendering a page in a browser session and reading its live DOM.
//!
//! Stages, each with its own bound:
//!
//! 1. launch an isolated session
//! 2. navigate; exceeding the page-load bound is fatal for this URL
//! 3. settle delay for client-side rendering
//! 4. poll `document.readyState`; a timeout is logged and rendering goes on
//! 5. optionally scroll until the document stops growing
//! 6. wait for the ready selector, then each extra selector; best-effort
//! 7. snapshot the DOM and walk it for text
//!
//! The session is quit on every exit path.

use anyhow::anyhow;
use pagediff_common::{ExtractedContent, PageDiffError, RenderStage};
use pagediff_config::BrowserConfig;
use pagediff_drivers::browser::dom::{DomSnapshot, visible_text};
use pagediff_drivers::browser::{BrowserLauncher, Session, scripts, with_session};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use url::Url;

const READY_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DynamicSettings {
    /// Bound for page load, document readiness and each element wait.
    pub wait: Duration,
    pub scroll: bool,
    pub settle_delay: Duration,
    pub scroll_pause: Duration,
    pub max_scrolls: u32,
    pub ready_selector: String,
    pub wait_selectors: Vec<String>,
    pub login_configured: bool,
}

impl Default for DynamicSettings {
    fn default() -> Self {
        Self::from(&BrowserConfig::default())
    }
}

impl From<&BrowserConfig> for DynamicSettings {
    fn from(cfg: &BrowserConfig) -> Self {
        Self {
            wait: Duration::from_secs(cfg.wait_seconds),
            scroll: cfg.scroll,
            settle_delay: Duration::from_millis(cfg.settle_delay_ms),
            scroll_pause: Duration::from_millis(cfg.scroll_pause_ms),
            max_scrolls: cfg.max_scrolls,
            ready_selector: cfg.ready_selector.clone(),
            wait_selectors: cfg.wait_selectors.clone(),
            login_configured: cfg.login.is_some(),
        }
    }
}

pub struct DynamicExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    settings: DynamicSettings,
}

impl DynamicExtractor {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: DynamicSettings) -> Self {
        Self { launcher, settings }
    }

    pub fn settings(&self) -> &DynamicSettings {
        &self.settings
    }

    /// Render with the configured wait and scroll behaviour.
    pub async fn extract(&self, url: &str) -> Option<ExtractedContent> {
        self.render(url, self.settings.wait, self.settings.scroll)
            .await
    }

    /// Render `url` and return its visible text, or `None` on any failure.
    pub async fn render(
        &self,
        url: &str,
        wait: Duration,
        scroll: bool,
    ) -> Option<ExtractedContent> {
        let started = Instant::now();
        match self.try_render(url, wait, scroll).await {
            Ok(content) => {
                tracing::info!(
                    target: "extract.dynamic",
                    %url,
                    chars = content.text.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "rendered content extracted"
                );
                Some(content)
            }
            Err(e) => {
                tracing::error!(target: "extract.dynamic", %url, error = %e, "rendering failed");
                None
            }
        }
    }

    async fn try_render(
        &self,
        url: &str,
        wait: Duration,
        scroll: bool,
    ) -> Result<ExtractedContent, PageDiffError> {
        validate_url(url)?;
        if self.settings.login_configured {
            tracing::warn!(target: "extract.dynamic", "login configured but not performed");
        }

        let session = self.launcher.launch().await?;
        let settings = self.settings.clone();
        let target = url.to_string();

        let text = with_session(session, move |s| {
            Box::pin(async move { render_in_session(s, &target, &settings, wait, scroll).await })
        })
        .await
        .map_err(|e| match e.downcast::<PageDiffError>() {
            Ok(typed) => typed,
            Err(other) => PageDiffError::Driver(other),
        })?;

        Ok(ExtractedContent::new(&text, url))
    }
}

fn validate_url(url: &str) -> Result<(), PageDiffError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(PageDiffError::Translation(format!("Invalid URL format: {url}"))),
    }
}

async fn render_in_session(
    s: &mut Session,
    url: &str,
    settings: &DynamicSettings,
    wait: Duration,
    scroll: bool,
) -> anyhow::Result<String> {
    match timeout(wait, s.navigate(url, wait)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(PageDiffError::RenderTimeout {
                stage: RenderStage::PageLoad,
            }
            .into());
        }
    }

    sleep(settings.settle_delay).await;

    if !wait_document_ready(s, wait).await? {
        tracing::warn!(
            target: "extract.dynamic",
            %url,
            stage = %RenderStage::DocumentReady,
            "render wait timed out; continuing with current document"
        );
    }

    if scroll {
        let scrolls = scroll_to_bottom(s, settings.scroll_pause, settings.max_scrolls).await?;
        tracing::debug!(target: "extract.dynamic", %url, scrolls, "scrolled to bottom");
    }

    let selectors = std::iter::once(&settings.ready_selector)
        .chain(settings.wait_selectors.iter())
        .filter(|css| !css.trim().is_empty());
    for css in selectors {
        if !s.wait_for_element(css, wait).await? {
            tracing::warn!(
                target: "extract.dynamic",
                %url,
                selector = %css,
                stage = %RenderStage::ElementPresence,
                "render wait timed out; proceeding with available content"
            );
        }
    }

    let snapshot = DomSnapshot::from_value(s.execute(scripts::DOM_SNAPSHOT).await?)?;
    Ok(snapshot
        .map(|snap| visible_text(&snap.root()))
        .unwrap_or_default())
}

async fn wait_document_ready(s: &mut Session, wait: Duration) -> anyhow::Result<bool> {
    let deadline = Instant::now() + wait;
    loop {
        let state = s.execute(scripts::READY_STATE).await?;
        if state.as_str() == Some("complete") {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(READY_POLL).await;
    }
}

async fn document_height(s: &mut Session) -> anyhow::Result<i64> {
    let value = s.execute(scripts::SCROLL_HEIGHT).await?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|h| h as i64))
        .ok_or_else(|| anyhow!("scrollHeight was not a number: {value}"))
}

/// Scroll until the height stops changing or `max_scrolls` is reached.
/// Returns the number of scrolls performed.
async fn scroll_to_bottom(
    s: &mut Session,
    pause: Duration,
    max_scrolls: u32,
) -> anyhow::Result<u32> {
    let mut last_height = document_height(s).await?;
    for done in 1..=max_scrolls {
        s.execute(scripts::SCROLL_TO_BOTTOM).await?;
        sleep(pause).await;
        let height = document_height(s).await?;
        if height == last_height {
            return Ok(done);
        }
        last_height = height;
    }
    Ok(max_scrolls)
}
