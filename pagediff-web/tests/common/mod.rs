#![allow(dead_code)]

use async_trait::async_trait;
use pagediff_common::PageDiffError;
use pagediff_drivers::browser::{BrowserLauncher, BrowserSession, Session, scripts};
use pagediff_http::HttpClient;
use pagediff_llm::comparator::Comparator;
use pagediff_llm::normalizer::ContentNormalizer;
use pagediff_llm::traits::{LlmClient, LlmResponse};
use pagediff_web::classifier::SiteClassifier;
use pagediff_web::dynamic::{DynamicExtractor, DynamicSettings};
use pagediff_web::static_extractor::StaticExtractor;
use pagediff_web::{ComparisonPipeline, StrategySelector};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub const UA: &str = "pagediff-test/1.0";

/// How a fake page behaves once navigated to.
#[derive(Clone)]
pub struct FakePage {
    pub load_delay: Duration,
    pub load_error: Option<String>,
    /// Successive `document.readyState` answers; the last one repeats.
    pub ready_states: Vec<&'static str>,
    /// Successive `scrollHeight` answers; the last one repeats.
    pub heights: Vec<i64>,
    pub missing_selectors: Vec<String>,
    pub snapshot: Value,
}

impl FakePage {
    pub fn rendering(snapshot: Value) -> Self {
        Self {
            load_delay: Duration::ZERO,
            load_error: None,
            ready_states: vec!["complete"],
            heights: vec![1000],
            missing_selectors: Vec::new(),
            snapshot,
        }
    }
}

/// Flat snapshot of `<body>` holding one element per `(tag, text)` pair.
pub fn flat_body(children: &[(&str, &str)]) -> Value {
    let mut nodes = vec![json!({ "tag": "body", "parent": null, "text": null })];
    nodes.extend(
        children
            .iter()
            .map(|(tag, text)| json!({ "tag": tag, "parent": 0, "text": text })),
    );
    Value::Array(nodes)
}

#[derive(Default)]
pub struct BrowserStats {
    pub launches: AtomicUsize,
    pub quits: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub waited_selectors: Mutex<Vec<String>>,
}

impl BrowserStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    pub pages: Arc<HashMap<String, FakePage>>,
    pub stats: Arc<BrowserStats>,
    pub fail_launch: bool,
}

impl FakeBrowser {
    pub fn with_pages(pages: impl IntoIterator<Item = (String, FakePage)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self) -> anyhow::Result<Session> {
        if self.fail_launch {
            anyhow::bail!("chromedriver not reachable");
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            page: None,
            ready_calls: 0,
            height_calls: 0,
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    page: Option<FakePage>,
    ready_calls: usize,
    height_calls: usize,
}

fn nth_or_last<T: Clone>(items: &[T], n: usize) -> Option<T> {
    items.get(n).or_else(|| items.last()).cloned()
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _page_load_timeout: Duration) -> anyhow::Result<()> {
        let page = self
            .browser
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("net::ERR_NAME_NOT_RESOLVED for {url}"))?;
        tokio::time::sleep(page.load_delay).await;
        if let Some(e) = &page.load_error {
            anyhow::bail!("{e}");
        }
        self.page = Some(page);
        Ok(())
    }

    async fn execute(&mut self, script: &str) -> anyhow::Result<Value> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))?;
        let value = if script == scripts::READY_STATE {
            self.ready_calls += 1;
            json!(nth_or_last(&page.ready_states, self.ready_calls - 1).unwrap_or("complete"))
        } else if script == scripts::SCROLL_HEIGHT {
            self.height_calls += 1;
            json!(nth_or_last(&page.heights, self.height_calls - 1).unwrap_or(0))
        } else if script == scripts::SCROLL_TO_BOTTOM {
            self.browser.stats.scrolls.fetch_add(1, Ordering::SeqCst);
            Value::Null
        } else if script == scripts::DOM_SNAPSHOT {
            page.snapshot.clone()
        } else {
            anyhow::bail!("unexpected script: {script}");
        };
        Ok(value)
    }

    async fn wait_for_element(&mut self, css: &str, _timeout: Duration) -> anyhow::Result<bool> {
        self.browser
            .stats
            .waited_selectors
            .lock()
            .unwrap()
            .push(css.to_string());
        let missing = self
            .page
            .as_ref()
            .is_some_and(|p| p.missing_selectors.iter().any(|m| m == css));
        Ok(!missing)
    }

    async fn quit(self: Box<Self>) -> anyhow::Result<()> {
        self.browser.stats.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn fast_settings() -> DynamicSettings {
    DynamicSettings {
        wait: Duration::from_millis(300),
        scroll: false,
        settle_delay: Duration::ZERO,
        scroll_pause: Duration::ZERO,
        max_scrolls: 10,
        ready_selector: "div".into(),
        wait_selectors: Vec::new(),
        login_configured: false,
    }
}

/// Oracle that answers with a fixed reply and counts its calls.
pub struct CountingOracle {
    reply: String,
    calls: AtomicUsize,
}

impl CountingOracle {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for CountingOracle {
    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse, PageDiffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse {
            text: self.reply.clone(),
            model: Some("counting".into()),
            tokens_used: None,
        })
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

pub fn http() -> HttpClient {
    HttpClient::detached()
        .expect("client builds")
        .with_timeout(Duration::from_secs(5))
}

pub fn selector(browser: FakeBrowser) -> StrategySelector {
    StrategySelector::new(
        UA,
        SiteClassifier::new(http(), UA),
        StaticExtractor::new(http()),
        DynamicExtractor::new(Arc::new(browser), fast_settings()),
    )
}

pub fn normalizer() -> ContentNormalizer {
    static SHARED: OnceLock<ContentNormalizer> = OnceLock::new();
    SHARED
        .get_or_init(|| ContentNormalizer::cl100k(3000).expect("cl100k loads"))
        .clone()
}

pub fn pipeline(browser: FakeBrowser, oracle: Arc<CountingOracle>) -> ComparisonPipeline {
    ComparisonPipeline::new(selector(browser), normalizer(), Comparator::new(oracle))
}
