use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentClass
// ---------------------------------------------------------------------------

/// Declared class of a text payload, used to pick the chars-per-token ratio
/// for the heuristic path. Code packs more tokens per character than prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    #[default]
    Natural,
    Code,
    Mixed,
}

// ---------------------------------------------------------------------------
// EstimatorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub chars_per_token_natural: f64,
    pub chars_per_token_code: f64,
    pub chars_per_token_mixed: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            chars_per_token_natural: 4.0,
            chars_per_token_code: 3.0,
            chars_per_token_mixed: 3.5,
        }
    }
}

impl EstimatorConfig {
    fn ratio(&self, class: ContentClass) -> f64 {
        match class {
            ContentClass::Natural => self.chars_per_token_natural,
            ContentClass::Code => self.chars_per_token_code,
            ContentClass::Mixed => self.chars_per_token_mixed,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenEstimator
// ---------------------------------------------------------------------------

/// Approximate token counting for activities whose caller supplied no counts.
///
/// With the `exact-tokenizer` feature enabled and a tokenizer file loaded,
/// counts come from the real tokenizer; in every other case the character
/// heuristic answers. Estimation never fails.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    config: EstimatorConfig,
    #[cfg(feature = "exact-tokenizer")]
    tokenizer: Option<std::sync::Arc<tokenizers::Tokenizer>>,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl TokenEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "exact-tokenizer")]
            tokenizer: None,
        }
    }

    /// Load an exact tokenizer from a `tokenizer.json` file. Falls back to
    /// the heuristic (and logs) when the file cannot be loaded.
    #[cfg(feature = "exact-tokenizer")]
    pub fn with_tokenizer_file(config: EstimatorConfig, path: &std::path::Path) -> Self {
        let tokenizer = match tokenizers::Tokenizer::from_file(path) {
            Ok(t) => Some(std::sync::Arc::new(t)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "tokenizer unavailable, using character heuristic");
                None
            }
        };
        Self { config, tokenizer }
    }

    /// Estimate tokens for a text payload.
    pub fn estimate_text(&self, text: &str, class: ContentClass) -> u64 {
        if text.is_empty() {
            return 0;
        }
        if let Some(exact) = self.exact_count(text) {
            return exact;
        }
        let ratio = self.config.ratio(class);
        (text.chars().count() as f64 / ratio).ceil() as u64
    }

    /// Estimate tokens for a structured payload by serializing it to its
    /// canonical JSON string form first.
    pub fn estimate_value(&self, value: &serde_json::Value, class: ContentClass) -> u64 {
        if value.is_null() {
            return 0;
        }
        let serialized = value.to_string();
        self.estimate_text(&serialized, class)
    }

    #[cfg(feature = "exact-tokenizer")]
    fn exact_count(&self, text: &str) -> Option<u64> {
        let tokenizer = self.tokenizer.as_ref()?;
        match tokenizer.encode(text, false) {
            Ok(encoding) => Some(encoding.get_ids().len() as u64),
            Err(e) => {
                tracing::debug!(error = %e, "tokenizer encode failed, using character heuristic");
                None
            }
        }
    }

    #[cfg(not(feature = "exact-tokenizer"))]
    fn exact_count(&self, _text: &str) -> Option<u64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
