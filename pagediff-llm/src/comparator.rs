//! Similarity verdicts for two normalized page texts.
//!
//! Cheap deterministic checks run first; only texts that still differ after
//! preprocessing are sent to the scoring oracle. Oracle failures become a
//! score of 0 with the reason in the analysis, so [`Comparator::compare`]
//! always returns a [`ComparisonResult`].

use crate::traits::LlmClient;
use pagediff_common::{collapse_whitespace, ComparisonResult, PageDiffError};
use std::sync::Arc;

pub const IDENTICAL_AFTER_PREPROCESSING: &str =
    "The contents are exactly identical (ignoring case and formatting).";
pub const IDENTICAL_RAW: &str = "The contents are exactly identical.";

const SCORING_POLICY: &str = r#"You are a precise content comparison expert.
Follow these rules strictly:
1. If the texts are identical or only differ in whitespace, score must be 100
2. If the texts contain the same information but slightly different wording, score should be 95-99
3. For minor differences, score should be 90-94
4. For significant differences, score should be below 90
Be very precise in your scoring."#;

const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Collapse whitespace, lowercase, and straighten curly quotes.
///
/// Idempotent: `preprocess(&preprocess(x)) == preprocess(x)`.
///
/// ```
/// use pagediff_llm::comparator::preprocess;
///
/// assert_eq!(preprocess("  \u{201C}Hello\u{201D}\n  World\u{2019}s "), "\"hello\" world's");
/// ```
pub fn preprocess(text: &str) -> String {
    collapse_whitespace(text)
        .to_lowercase()
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

fn build_prompt(text_a: &str, text_b: &str) -> String {
    format!(
        "First provide a similarity score (just the number 0-100) on the first line, \
         then on subsequent lines provide detailed analysis of the key differences:\n\n\
         Text 1: {text_a}\n\nText 2: {text_b}"
    )
}

/// Parse an oracle reply: first line is the score (optional trailing `%`),
/// the remaining lines are the analysis (possibly empty).
pub fn parse_oracle_reply(reply: &str) -> Result<ComparisonResult, PageDiffError> {
    let reply = reply.trim_start();
    let (first, rest) = reply.split_once('\n').unwrap_or((reply, ""));
    let raw_score = first.trim().trim_end_matches('%').trim();

    let score: u8 = raw_score
        .parse()
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| PageDiffError::Oracle(format!("unparseable score line: {first:?}")))?;

    Ok(ComparisonResult::new(score, rest.trim()))
}

pub struct Comparator {
    oracle: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Comparator {
    pub fn new(oracle: Arc<dyn LlmClient>) -> Self {
        Self {
            oracle,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Compare two texts. Never fails; see the module docs.
    pub async fn compare(&self, text_a: &str, text_b: &str) -> ComparisonResult {
        if preprocess(text_a) == preprocess(text_b) {
            tracing::info!(target: "compare", "texts identical after preprocessing; oracle skipped");
            return ComparisonResult::new(100, IDENTICAL_AFTER_PREPROCESSING);
        }

        let verdict = match self.ask_oracle(text_a, text_b).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(target: "compare", error = %e, "oracle comparison failed");
                ComparisonResult::new(0, format!("Error in comparison: {e}"))
            }
        };

        apply_identity_override(text_a, text_b, verdict)
    }

    async fn ask_oracle(
        &self,
        text_a: &str,
        text_b: &str,
    ) -> Result<ComparisonResult, PageDiffError> {
        let response = self
            .oracle
            .generate(
                &build_prompt(text_a, text_b),
                Some(SCORING_POLICY),
                self.max_tokens,
                Some(self.temperature),
            )
            .await?;

        let verdict = parse_oracle_reply(&response.text)?;
        tracing::info!(
            target: "compare",
            model = self.oracle.model_name(),
            score = verdict.score,
            tokens_used = ?response.tokens_used,
            "oracle verdict"
        );
        Ok(verdict)
    }
}

/// Raw byte-identical inputs always score 100, whatever the oracle said.
///
/// Preprocessed equality already short-circuits every raw-identical pair
/// before the oracle is called, so this only fires if preprocessing ever
/// stops being a pure function of its input.
fn apply_identity_override(
    text_a: &str,
    text_b: &str,
    verdict: ComparisonResult,
) -> ComparisonResult {
    if text_a == text_b {
        ComparisonResult::new(100, IDENTICAL_RAW)
    } else {
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LlmResponse;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedOracle {
        reply: Result<String, String>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<(String, Option<String>, Option<f32>)>>,
    }

    impl ScriptedOracle {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedOracle {
        async fn generate(
            &self,
            prompt: &str,
            system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            temperature: Option<f32>,
        ) -> pagediff_common::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some((
                prompt.to_string(),
                system_prompt.map(str::to_string),
                temperature,
            ));
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    text: text.clone(),
                    model: Some("scripted".into()),
                    tokens_used: None,
                }),
                Err(reason) => Err(PageDiffError::Oracle(reason.clone())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn identical_text_scores_100_without_oracle() {
        let oracle = ScriptedOracle::replying("12\nnope");
        let cmp = Comparator::new(oracle.clone());
        let verdict = cmp.compare("Same page text", "Same page text").await;
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.analysis, IDENTICAL_AFTER_PREPROCESSING);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_and_case_variants_score_100() {
        let oracle = ScriptedOracle::replying("12\nnope");
        let cmp = Comparator::new(oracle.clone());
        assert_eq!(cmp.compare("Hello  World", "hello world").await.score, 100);
        assert_eq!(
            cmp.compare("\u{201C}Quoted\u{201D} text", "\"quoted\"   TEXT").await.score,
            100
        );
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn differing_texts_are_scored_by_oracle() {
        let oracle = ScriptedOracle::replying("92%\nThe second page adds a pricing table.\nMore.");
        let cmp = Comparator::new(oracle.clone());
        let verdict = cmp.compare("Plans: basic", "Plans: basic, pro").await;

        assert_eq!(verdict.score, 92);
        assert_eq!(verdict.analysis, "The second page adds a pricing table.\nMore.");
        assert_eq!(oracle.calls(), 1);

        let (prompt, system, temperature) = oracle.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Text 1: Plans: basic\n"));
        assert!(prompt.ends_with("Text 2: Plans: basic, pro"));
        assert!(system.unwrap().contains("score must be 100"));
        assert_eq!(temperature, Some(DEFAULT_TEMPERATURE));
    }

    #[tokio::test]
    async fn oracle_failure_becomes_zero_score() {
        let oracle = ScriptedOracle::failing("connection reset");
        let cmp = Comparator::new(oracle);
        let verdict = cmp.compare("a", "b").await;
        assert_eq!(verdict.score, 0);
        assert!(verdict.analysis.contains("connection reset"));
    }

    #[tokio::test]
    async fn unparseable_reply_becomes_zero_score() {
        let oracle = ScriptedOracle::replying("quite similar overall\n...");
        let verdict = Comparator::new(oracle).compare("a", "b").await;
        assert_eq!(verdict.score, 0);
        assert!(verdict.analysis.starts_with("Error in comparison:"));
    }

    #[test]
    fn reply_without_analysis_line() {
        let verdict = parse_oracle_reply("87").unwrap();
        assert_eq!(verdict, ComparisonResult::new(87, ""));
    }

    #[test]
    fn reply_score_out_of_range_is_rejected() {
        assert!(parse_oracle_reply("140\ntoo high").is_err());
        assert!(parse_oracle_reply("-3\nnegative").is_err());
    }

    #[test]
    fn reply_tolerates_crlf_and_padding() {
        let verdict = parse_oracle_reply("\n 95 % \r\nSame meaning.\r\n").unwrap();
        assert_eq!(verdict.score, 95);
        assert_eq!(verdict.analysis, "Same meaning.");
    }

    #[test]
    fn identity_override_only_touches_identical_inputs() {
        let low = ComparisonResult::new(40, "differs");
        assert_eq!(apply_identity_override("x", "x", low.clone()).score, 100);
        assert_eq!(apply_identity_override("x", "y", low.clone()), low);
    }

    proptest! {
        #[test]
        fn preprocess_is_idempotent(text in "\\PC{0,200}") {
            let once = preprocess(&text);
            prop_assert_eq!(preprocess(&once), once);
        }

        #[test]
        fn self_comparison_never_calls_oracle(text in "\\PC{0,120}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let oracle = ScriptedOracle::replying("1\nunused");
            let cmp = Comparator::new(oracle.clone());
            let verdict = rt.block_on(cmp.compare(&text, &text));
            prop_assert_eq!(verdict.score, 100);
            prop_assert_eq!(oracle.calls(), 0);
        }
    }
}
