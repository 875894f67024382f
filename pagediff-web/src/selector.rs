use crate::classifier::{Classification, SiteClassifier};
use crate::dynamic::DynamicExtractor;
use crate::static_extractor::StaticExtractor;
use crate::translator::{RequestDescriptor, is_replay, translate};
use pagediff_common::ExtractedContent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a caller wants its inputs retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Classify each URL and render only the dynamic ones.
    #[default]
    Auto,
    /// Treat the input as a replay string (bare URLs get browser headers).
    Replay,
    /// Always render in a browser.
    Browser,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "replay" | "curl" => Ok(Mode::Replay),
            "browser" | "render" => Ok(Mode::Browser),
            other => Err(format!("unknown mode {other:?} (expected auto, replay or browser)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Auto => "auto",
            Mode::Replay => "replay",
            Mode::Browser => "browser",
        })
    }
}

/// The retrieval path actually taken for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Static,
    Dynamic,
    Replay,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Route::Static => "static",
            Route::Dynamic => "dynamic",
            Route::Replay => "replay",
        })
    }
}

/// One input's extraction, with how it was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub route: Route,
    /// Present only when the route was chosen by classification.
    pub classification: Option<Classification>,
    pub content: Option<ExtractedContent>,
}

pub struct StrategySelector {
    user_agent: String,
    classifier: SiteClassifier,
    static_extractor: StaticExtractor,
    dynamic: DynamicExtractor,
}

impl StrategySelector {
    pub fn new(
        user_agent: impl Into<String>,
        classifier: SiteClassifier,
        static_extractor: StaticExtractor,
        dynamic: DynamicExtractor,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            classifier,
            static_extractor,
            dynamic,
        }
    }

    /// Content for `input`, or `None` if it could not be retrieved.
    pub async fn extract(&self, input: &str, mode: Mode) -> Option<ExtractedContent> {
        self.extract_with_report(input, mode).await.content
    }

    pub async fn extract_with_report(&self, input: &str, mode: Mode) -> Extraction {
        let input = input.trim();
        match mode {
            Mode::Replay => self.replay(input).await,
            Mode::Auto if is_replay(input) => self.replay(input).await,
            Mode::Auto => {
                let classification = self.classifier.classify(input).await;
                let mut extraction = if classification.is_dynamic() {
                    self.render(input).await
                } else {
                    self.fetch_static(input).await
                };
                extraction.classification = Some(classification);
                extraction
            }
            Mode::Browser => self.render(input).await,
        }
    }

    async fn replay(&self, input: &str) -> Extraction {
        let content = match translate(input, &self.user_agent) {
            Ok(req) => self.static_extractor.fetch(&req).await,
            Err(e) => {
                tracing::error!(target: "extract.replay", error = %e, "replay string rejected");
                None
            }
        };
        Extraction {
            route: Route::Replay,
            classification: None,
            content,
        }
    }

    async fn fetch_static(&self, url: &str) -> Extraction {
        let content = match RequestDescriptor::browser_like(url, &self.user_agent) {
            Ok(req) => self.static_extractor.fetch(&req).await,
            Err(e) => {
                tracing::error!(target: "extract.static", %url, error = %e, "unusable URL");
                None
            }
        };
        Extraction {
            route: Route::Static,
            classification: None,
            content,
        }
    }

    async fn render(&self, url: &str) -> Extraction {
        Extraction {
            route: Route::Dynamic,
            classification: None,
            content: self.dynamic.extract(url).await,
        }
    }
}
