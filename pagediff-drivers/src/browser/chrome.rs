use super::session::{BrowserLauncher, BrowserSession, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Value};
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// How each browser session is launched. Immutable for the launcher's life.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
}

impl LaunchSettings {
    /// Chrome command-line arguments for an isolated, fixed-viewport session.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={},{}", self.window_width, self.window_height),
            format!("--user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.insert(0, "--headless".to_string());
        }
        args
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": self.chrome_args() }),
        );
        caps
    }
}

/// Launches one chromedriver-backed session per call.
pub struct ChromeLauncher {
    settings: LaunchSettings,
}

impl ChromeLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Session> {
        let client = ClientBuilder::native()
            .capabilities(self.settings.capabilities())
            .connect(&self.settings.webdriver_url)
            .await
            .with_context(|| format!("connecting to webdriver at {}", self.settings.webdriver_url))?;

        tracing::debug!(
            target: "browser",
            webdriver = %self.settings.webdriver_url,
            headless = self.settings.headless,
            "browser session started"
        );
        Ok(Box::new(ChromeSession { client }))
    }
}

struct ChromeSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str, page_load_timeout: Duration) -> Result<()> {
        self.client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_load_timeout), None))
            .await?;
        self.client
            .goto(url)
            .await
            .with_context(|| format!("navigating to {url}"))
    }

    async fn execute(&mut self, script: &str) -> Result<Value> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(anyhow::Error::from)
    }

    async fn wait_for_element(&mut self, css: &str, timeout: Duration) -> Result<bool> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(css))
            .await
        {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        tracing::debug!(target: "browser", "browser session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(headless: bool) -> LaunchSettings {
        LaunchSettings {
            webdriver_url: "http://localhost:9515".into(),
            headless,
            window_width: 1920,
            window_height: 1080,
            user_agent: "pagediff-test/1.0".into(),
        }
    }

    #[test]
    fn headless_args_are_isolated_and_sized() {
        let args = settings(true).chrome_args();
        assert_eq!(args[0], "--headless");
        for flag in ["--no-sandbox", "--disable-gpu", "--disable-dev-shm-usage"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--user-agent=pagediff-test/1.0".to_string()));
    }

    #[test]
    fn headed_sessions_drop_only_headless_flag() {
        let args = settings(false).chrome_args();
        assert!(!args.iter().any(|a| a == "--headless"));
        assert!(args.iter().any(|a| a == "--disable-gpu"));
    }

    #[test]
    fn capabilities_carry_chrome_options() {
        let caps = settings(true).capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert_eq!(args.len(), 6);
    }
}
