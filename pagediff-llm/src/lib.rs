//! Scoring-oracle integration for PageDiff.
//!
//! This crate exposes the [`traits::LlmClient`] seam the comparator talks
//! to, the OpenAI-backed implementation, the token-budget
//! [`normalizer::ContentNormalizer`], and the [`comparator::Comparator`]
//! that turns two normalized texts into a [`pagediff_common::ComparisonResult`].
//!
//! # Examples
//! ```
//! use pagediff_config::OracleConfig;
//! use pagediff_llm::{build_oracle, comparator::Comparator};
//!
//! # #[tokio::main]
//! # async fn main() -> pagediff_common::Result<()> {
//! let config = OracleConfig::Openai {
//!     model: "gpt-4o-mini".to_string(),
//!     auth_token: "sk-example".to_string(),
//!     temperature: 0.3,
//!     max_tokens: None,
//!     endpoint: "https://api.openai.com/v1".to_string(),
//! };
//! let oracle = build_oracle(&config)?;
//!
//! // Equal after whitespace and case folding: scored without calling out.
//! let verdict = Comparator::new(oracle).compare("Hello  World", "hello world").await;
//! assert_eq!(verdict.score, 100);
//! # Ok(())
//! # }
//! ```
pub mod comparator;
pub mod normalizer;
pub mod openai;
pub mod traits;

use openai::OpenAiClient;
use pagediff_common::PageDiffError;
use pagediff_config::OracleConfig;
use std::sync::Arc;
use traits::LlmClient;

/// Build the scoring oracle described by `config`.
///
/// Fails with [`PageDiffError::Config`] when no credential is available.
pub fn build_oracle(config: &OracleConfig) -> pagediff_common::Result<Arc<dyn LlmClient>> {
    match config {
        OracleConfig::Openai {
            model,
            auth_token,
            endpoint,
            ..
        } => {
            if auth_token.trim().is_empty() {
                return Err(PageDiffError::Config(
                    "oracle.auth_token is empty (set OPENAI_API_KEY)".to_string(),
                ));
            }
            let client = OpenAiClient::new(auth_token.clone(), model.clone(), endpoint)?;
            Ok(Arc::new(client))
        }
    }
}
