use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_TOP_K: usize = 5;

/// Settings for one ingestion run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Documents per segment before the in-memory index is flushed
    pub batch_size: usize,
    /// Number of independent ingestion shards
    pub shards: usize,
    /// Reduce segments on the rayon pool instead of one after another
    pub parallel_merge: bool,
    pub normalizer: NormalizerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            shards: 1,
            parallel_merge: false,
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        if self.shards == 0 {
            return Err(Error::Config("shards must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Text normalization switches. Recorded alongside the final index so that
/// queries are normalized the same way the corpus was.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Apply NFKC before case folding
    pub unicode_nfkc: bool,
    /// Drop English stopwords before stemming
    pub remove_stopwords: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Upper bound on a caller-supplied k
    pub max_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K, max_k: 100 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".into()));
        }
        if self.max_k < self.top_k {
            return Err(Error::Config("max_k must be at least top_k".into()));
        }
        Ok(())
    }

    /// Clamp a requested result count into `1..=max_k`, falling back to `top_k`.
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.top_k).clamp(1, self.max_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.batch_size, 10_000);
        assert_eq!(cfg.shards, 1);
        assert!(!cfg.parallel_merge);
        assert_eq!(SearchConfig::default().top_k, 5);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: IndexConfig = serde_json::from_str(r#"{"batch_size": 50}"#).unwrap();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.shards, 1);
        assert_eq!(cfg.normalizer, NormalizerConfig::default());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cfg = IndexConfig { batch_size: 0, ..IndexConfig::default() };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn effective_k_is_clamped() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.effective_k(None), 5);
        assert_eq!(cfg.effective_k(Some(0)), 1);
        assert_eq!(cfg.effective_k(Some(1_000)), 100);
    }
}
