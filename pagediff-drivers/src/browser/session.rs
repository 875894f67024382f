use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;

/// One live, isolated browser session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, failing if the page does not finish loading within
    /// `page_load_timeout`.
    async fn navigate(&mut self, url: &str, page_load_timeout: Duration) -> Result<()>;

    /// Run `script` as a function body and return its JSON result.
    async fn execute(&mut self, script: &str) -> Result<Value>;

    /// Wait for an element matching `css`. `Ok(false)` means the wait timed
    /// out; `Err` is reserved for a broken session.
    async fn wait_for_element(&mut self, css: &str, timeout: Duration) -> Result<bool>;

    /// Tear the session down.
    async fn quit(self: Box<Self>) -> Result<()>;
}

pub type Session = Box<dyn BrowserSession>;

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Session>;
}

/// Run `work` against `session`, then quit the session whatever `work`
/// returned. A failed quit is logged and never masks the work's outcome.
pub async fn with_session<T, F>(mut session: Session, work: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, Result<T>>,
{
    let outcome = work(&mut session).await;
    if let Err(e) = session.quit().await {
        tracing::warn!(target: "browser", error = %e, "browser session quit failed");
    }
    outcome
}
