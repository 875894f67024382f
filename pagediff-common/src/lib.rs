//! Common types and utilities shared across PageDiff crates.
//!
//! This crate defines the extraction/comparison data model, the shared error
//! taxonomy, and observability helpers used throughout the PageDiff
//! workspace. It is intentionally lightweight so that every crate can depend
//! on it without pulling in HTTP or browser stacks.
//!
//! # Overview
//!
//! - [`ExtractedContent`]: text pulled out of one page, tagged with its source
//! - [`ComparisonResult`]: the final score/analysis verdict
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`PageDiffError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use pagediff_common::{collapse_whitespace, ExtractedContent};
//!
//! let content = ExtractedContent::new("  Hello \n\t world ", "https://a.test");
//! assert_eq!(content.text, "Hello world");
//! assert_eq!(collapse_whitespace(" a  b "), "a b");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Text extracted from a single page.
///
/// `text` is always whitespace-collapsed; markup, scripts and styles have
/// been removed by the extractor that produced it. Extraction failure is
/// represented by the absence of this value, never by an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub text: String,
    pub source_url: String,
}

impl ExtractedContent {
    /// Build content from raw extracted text, collapsing whitespace runs.
    pub fn new(text: &str, source_url: impl Into<String>) -> Self {
        Self {
            text: collapse_whitespace(text),
            source_url: source_url.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Similarity verdict for two pages.
///
/// Constructed once per comparison and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Similarity in `0..=100`.
    pub score: u8,
    pub analysis: String,
}

impl ComparisonResult {
    pub fn new(score: u8, analysis: impl Into<String>) -> Self {
        Self {
            score: score.min(100),
            analysis: analysis.into(),
        }
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rendering stage whose bounded wait was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderStage {
    PageLoad,
    DocumentReady,
    ElementPresence,
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenderStage::PageLoad => "page load",
            RenderStage::DocumentReady => "document ready",
            RenderStage::ElementPresence => "element presence",
        };
        f.write_str(name)
    }
}

/// Error types used across the PageDiff system.
#[derive(thiserror::Error, Debug)]
pub enum PageDiffError {
    /// A replay string could not be turned into a request.
    #[error("Translation error: {0}")]
    Translation(String),

    /// Transport failure or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// The classifier probe failed; callers degrade to non-dynamic.
    #[error("Classification failed: {0}")]
    Classification(String),

    /// A bounded rendering wait was exceeded.
    #[error("Render timeout during {stage}")]
    RenderTimeout { stage: RenderStage },

    /// The scoring oracle could not be reached or its reply was unusable.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A driver (browser, network, etc.) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`PageDiffError`].
pub type Result<T> = std::result::Result<T, PageDiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_handles_mixed_whitespace() {
        assert_eq!(collapse_whitespace("\n a\t\tb  \r\n c "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn comparison_result_clamps_score() {
        assert_eq!(ComparisonResult::new(250, "x").score, 100);
    }

    #[test]
    fn render_timeout_message_names_stage() {
        let err = PageDiffError::RenderTimeout {
            stage: RenderStage::PageLoad,
        };
        assert_eq!(err.to_string(), "Render timeout during page load");
    }
}
