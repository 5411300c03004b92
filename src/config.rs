use std::env;
use std::path::PathBuf;

use anyhow::Result;

use crate::engine::reconcile::{
    EditDistance, KeyReconciler, LabelMatcher, TokenOverlap, DEFAULT_MATCH_THRESHOLD,
};

/// Which fuzzy label matching strategy the key reconciler uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatcherKind {
    /// Normalized Levenshtein similarity (default)
    EditDistance,
    /// Jaccard overlap of word tokens
    TokenOverlap,
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Directory holding `<region>_vectors_e5.json`, `policy_vectors.json`
    /// and the optional `gap_table.json`
    pub files_dir: PathBuf,
    /// Where batch pipeline results are written
    pub output_dir: PathBuf,
    pub openai_api_key: String,
    /// OpenAI-compatible API base (no trailing slash)
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Maximum chat/embedding requests per second
    pub llm_qps: f64,
    pub match_threshold: f64,
    pub matcher: MatcherKind,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the API key, which is only needed
    /// for commands that call the language model or the embedder.
    pub fn load() -> Result<Self> {
        let matcher = match env::var("WELLING_MATCHER").as_deref() {
            Ok("token") => MatcherKind::TokenOverlap,
            // "edit" or unset both default to edit distance
            _ => MatcherKind::EditDistance,
        };

        let llm_qps = match env::var("WELLING_LLM_QPS") {
            Ok(raw) => raw
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("WELLING_LLM_QPS must be a number, got '{raw}'"))?,
            Err(_) => 2.0,
        };
        if llm_qps <= 0.0 {
            anyhow::bail!("WELLING_LLM_QPS must be positive, got {llm_qps}");
        }

        let match_threshold = match env::var("WELLING_MATCH_THRESHOLD") {
            Ok(raw) => raw.parse::<f64>().map_err(|_| {
                anyhow::anyhow!("WELLING_MATCH_THRESHOLD must be a number, got '{raw}'")
            })?,
            Err(_) => DEFAULT_MATCH_THRESHOLD,
        };
        if !(0.0..=1.0).contains(&match_threshold) {
            anyhow::bail!("WELLING_MATCH_THRESHOLD must be between 0 and 1, got {match_threshold}");
        }

        Ok(Self {
            db_path: env::var("WELLING_DB_PATH").unwrap_or_else(|_| "./welling.db".to_string()),
            files_dir: env::var("WELLING_FILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./app/files")),
            output_dir: env::var("WELLING_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| crate::llm::openai::DEFAULT_BASE_URL.to_string()),
            chat_model: env::var("WELLING_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("WELLING_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            llm_qps,
            match_threshold,
            matcher,
        })
    }

    /// Check that the language model API key is configured.
    /// Call this before any operation that generates text or embeddings.
    pub fn require_llm(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            anyhow::bail!(
                "OPENAI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Build the key reconciler from the configured strategy and threshold.
    pub fn reconciler(&self) -> KeyReconciler {
        let matcher: Box<dyn LabelMatcher> = match self.matcher {
            MatcherKind::EditDistance => Box::new(EditDistance),
            MatcherKind::TokenOverlap => Box::new(TokenOverlap),
        };
        KeyReconciler::new(matcher, self.match_threshold)
    }
}
