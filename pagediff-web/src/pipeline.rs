use crate::classifier::Classification;
use crate::selector::{Extraction, Mode, Route, StrategySelector};
use pagediff_common::{ComparisonResult, ExtractedContent};
use pagediff_llm::comparator::Comparator;
use pagediff_llm::normalizer::ContentNormalizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const FETCH_FAILED: &str = "Failed to fetch content from one or both URLs";

/// The upstream request: two inputs (URLs or replay strings) and a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::A => "A",
            Side::B => "B",
        })
    }
}

fn join_sides(sides: &[Side]) -> String {
    sides
        .iter()
        .map(Side::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Failed to fetch content from one or both URLs (failed: {})", join_sides(.sides))]
    FetchFailed { sides: Vec<Side> },
}

/// How one side was obtained and how large it was going into comparison.
#[derive(Debug, Clone, Serialize)]
pub struct SideReport {
    pub input: String,
    pub source_url: String,
    pub route: Route,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareReport {
    #[serde(flatten)]
    pub result: ComparisonResult,
    pub a: SideReport,
    pub b: SideReport,
}

/// Serializable outcome: `{"result": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOutcome {
    Result(CompareReport),
    Error(String),
}

impl From<Result<CompareReport, PipelineError>> for CompareOutcome {
    fn from(outcome: Result<CompareReport, PipelineError>) -> Self {
        match outcome {
            Ok(report) => CompareOutcome::Result(report),
            Err(e) => CompareOutcome::Error(e.to_string()),
        }
    }
}

/// Extract both sides one after the other, bound them to the token
/// budget, and compare.
pub struct ComparisonPipeline {
    selector: StrategySelector,
    normalizer: ContentNormalizer,
    comparator: Comparator,
}

impl ComparisonPipeline {
    pub fn new(
        selector: StrategySelector,
        normalizer: ContentNormalizer,
        comparator: Comparator,
    ) -> Self {
        Self {
            selector,
            normalizer,
            comparator,
        }
    }

    pub async fn run(&self, request: CompareRequest) -> Result<CompareReport, PipelineError> {
        tracing::info!(target: "pipeline", mode = %request.mode, "comparison started");

        let a = self.selector.extract_with_report(&request.a, request.mode).await;
        let b = self.selector.extract_with_report(&request.b, request.mode).await;

        let (content_a, content_b) = match (usable(&a), usable(&b)) {
            (Some(ca), Some(cb)) => (ca, cb),
            (ca, cb) => {
                let sides: Vec<Side> = [(Side::A, ca), (Side::B, cb)]
                    .into_iter()
                    .filter(|(_, c)| c.is_none())
                    .map(|(side, _)| side)
                    .collect();
                tracing::warn!(target: "pipeline", failed = %join_sides(&sides), "extraction failed; comparison skipped");
                return Err(PipelineError::FetchFailed { sides });
            }
        };

        let text_a = self.normalizer.normalize(Some(&content_a.text));
        let text_b = self.normalizer.normalize(Some(&content_b.text));
        let result = self.comparator.compare(&text_a, &text_b).await;

        tracing::info!(target: "pipeline", score = result.score, "comparison finished");
        Ok(CompareReport {
            result,
            a: self.side_report(&request.a, &a, content_a, &text_a),
            b: self.side_report(&request.b, &b, content_b, &text_b),
        })
    }

    fn side_report(
        &self,
        input: &str,
        extraction: &Extraction,
        content: &ExtractedContent,
        normalized: &str,
    ) -> SideReport {
        SideReport {
            input: input.trim().to_string(),
            source_url: content.source_url.clone(),
            route: extraction.route,
            classification: extraction.classification.clone(),
            tokens: self.normalizer.count_tokens(normalized),
        }
    }
}

/// Blank text counts as a failed fetch.
fn usable(extraction: &Extraction) -> Option<&ExtractedContent> {
    extraction.content.as_ref().filter(|c| !c.is_blank())
}
