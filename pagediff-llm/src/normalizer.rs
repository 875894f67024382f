//! Token-budget normalization of extracted page text.
//!
//! Text is measured in the scoring model's own BPE units so the budget
//! matches what the oracle will see. Over-budget text is cut to a token
//! prefix and decoded back; nothing is reordered or summarized.

use pagediff_common::{PageDiffError, Result};
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

pub const DEFAULT_MAX_TOKENS: usize = 3000;

#[derive(Clone)]
pub struct ContentNormalizer {
    bpe: Arc<CoreBPE>,
    max_tokens: usize,
}

impl ContentNormalizer {
    /// Use the encoding of `model`, falling back to `cl100k_base` for
    /// models the tokenizer table does not know.
    pub fn for_model(model: &str, max_tokens: usize) -> Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                tracing::debug!(%model, error = %e, "unknown model encoding; using cl100k_base");
                tiktoken_rs::cl100k_base().map_err(PageDiffError::Driver)?
            }
        };
        Ok(Self {
            bpe: Arc::new(bpe),
            max_tokens,
        })
    }

    pub fn cl100k(max_tokens: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(PageDiffError::Driver)?;
        Ok(Self {
            bpe: Arc::new(bpe),
            max_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Bound `text` to the configured budget. Absent input yields `""`.
    pub fn normalize(&self, text: Option<&str>) -> String {
        self.normalize_with_budget(text.unwrap_or_default(), self.max_tokens)
    }

    /// Bound `text` to `max_tokens` units.
    ///
    /// Within budget the text is returned untouched. Otherwise the longest
    /// token prefix of length `<= max_tokens` that decodes to valid UTF-8
    /// and re-encodes within budget is kept.
    pub fn normalize_with_budget(&self, text: &str, max_tokens: usize) -> String {
        if text.is_empty() {
            return String::new();
        }

        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        let mut keep = max_tokens;
        while keep > 0 {
            // A cut inside a multi-byte character fails to decode; a cut at a
            // merge boundary can re-encode longer. Both shrink the prefix.
            if let Ok(prefix) = self.bpe.decode(tokens[..keep].to_vec()) {
                if self.count_tokens(&prefix) <= max_tokens {
                    tracing::debug!(
                        target: "normalize",
                        original_tokens = tokens.len(),
                        kept_tokens = keep,
                        "content truncated to token budget"
                    );
                    return prefix;
                }
            }
            keep -= 1;
        }
        String::new()
    }
}
