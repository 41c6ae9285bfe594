use crate::persist::IndexPaths;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const MB: f64 = 1024.0 * 1024.0;

fn mb_to_bytes(mb: f64) -> u64 {
    ((mb * MB) as u64).max(1)
}

/// What each posting stores on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexVariant {
    /// Raw term counts, no IDF.
    Frequency,
    /// LNC weight per posting, IDF per term.
    #[default]
    Weighted,
    /// Weighted, plus the term positions inside the document.
    Positional,
}

impl IndexVariant {
    pub fn has_idf(self) -> bool {
        !matches!(self, IndexVariant::Frequency)
    }

    pub fn has_positions(self) -> bool {
        matches!(self, IndexVariant::Positional)
    }
}

impl fmt::Display for IndexVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexVariant::Frequency => "frequency",
            IndexVariant::Weighted => "weighted",
            IndexVariant::Positional => "positional",
        };
        f.write_str(name)
    }
}

impl FromStr for IndexVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frequency" => Ok(IndexVariant::Frequency),
            "weighted" => Ok(IndexVariant::Weighted),
            "positional" => Ok(IndexVariant::Positional),
            other => Err(Error::Config(format!("unknown index variant '{other}'"))),
        }
    }
}

fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Settings for one indexing run. Sizes are in MB and may be fractional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub output: PathBuf,
    pub stopwords: Option<PathBuf>,
    /// Spill once the in-memory index uses this fraction of the memory budget.
    pub load_factor: f64,
    pub memory_budget_mb: f64,
    pub max_index_segment_mb: f64,
    pub max_registry_segment_mb: f64,
    pub variant: IndexVariant,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("./index"),
            stopwords: None,
            load_factor: 0.8,
            memory_budget_mb: 256.0,
            max_index_segment_mb: 16.0,
            max_registry_segment_mb: 4.0,
            variant: IndexVariant::Weighted,
        }
    }
}

impl IndexConfig {
    pub fn new<P: Into<PathBuf>>(output: P) -> Self {
        Self { output: output.into(), ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::Config(format!("load factor must be in (0, 1], got {}", self.load_factor)));
        }
        if !is_positive(self.memory_budget_mb) {
            return Err(Error::Config(format!("memory budget must be positive, got {}", self.memory_budget_mb)));
        }
        if !is_positive(self.max_index_segment_mb) || !is_positive(self.max_registry_segment_mb) {
            return Err(Error::Config("segment sizes must be positive".into()));
        }
        if let Some(path) = &self.stopwords {
            if !path.is_file() {
                return Err(Error::Config(format!("stop-words file {} not found", path.display())));
            }
        }
        Ok(())
    }

    pub fn memory_budget_bytes(&self) -> u64 {
        mb_to_bytes(self.memory_budget_mb)
    }

    pub fn max_index_segment_bytes(&self) -> u64 {
        mb_to_bytes(self.max_index_segment_mb)
    }

    pub fn max_registry_segment_bytes(&self) -> u64 {
        mb_to_bytes(self.max_registry_segment_mb)
    }
}

/// Settings for a searcher opened over a built index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub index: PathBuf,
    pub stopwords: Option<PathBuf>,
    pub top_k: usize,
    pub memory_budget_mb: f64,
    /// Share of the memory budget given to cached index segments.
    pub index_cache_fraction: f64,
    /// Share of the memory budget given to cached registry segments.
    pub registry_cache_fraction: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: PathBuf::from("./index"),
            stopwords: None,
            top_k: 10,
            memory_budget_mb: 256.0,
            index_cache_fraction: 0.6,
            registry_cache_fraction: 0.2,
        }
    }
}

impl SearchConfig {
    pub fn new<P: Into<PathBuf>>(index: P) -> Self {
        Self { index: index.into(), ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top-k must be positive".into()));
        }
        if !is_positive(self.memory_budget_mb) {
            return Err(Error::Config(format!("memory budget must be positive, got {}", self.memory_budget_mb)));
        }
        for (name, fraction) in [("index", self.index_cache_fraction), ("registry", self.registry_cache_fraction)] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(Error::Config(format!("{name} cache fraction must be in (0, 1], got {fraction}")));
            }
        }
        if self.index_cache_fraction + self.registry_cache_fraction > 1.0 {
            return Err(Error::Config("cache fractions add up to more than 1".into()));
        }
        if !self.index.is_dir() {
            return Err(Error::Config(format!("index folder {} not found", self.index.display())));
        }
        let meta = IndexPaths::new(&self.index).meta();
        if !meta.is_file() {
            return Err(Error::Config(format!("{} not found, is this an index folder?", meta.display())));
        }
        if let Some(path) = &self.stopwords {
            if !path.is_file() {
                return Err(Error::Config(format!("stop-words file {} not found", path.display())));
            }
        }
        Ok(())
    }

    /// How many segments of `segment_bytes` fit in `fraction` of the budget, never less than one.
    pub fn cache_capacity(&self, fraction: f64, segment_bytes: u64) -> usize {
        let budget = self.memory_budget_mb * MB * fraction;
        ((budget / segment_bytes.max(1) as f64) as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_load_factor() {
        let mut cfg = IndexConfig::default();
        cfg.load_factor = 0.0;
        assert!(cfg.validate().unwrap_err().is_config());
        cfg.load_factor = 1.5;
        assert!(cfg.validate().is_err());
        cfg.load_factor = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut cfg = IndexConfig::default();
        cfg.max_registry_segment_mb = 0.0;
        assert!(cfg.validate().is_err());
        cfg.max_registry_segment_mb = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_variants() {
        assert_eq!("Positional".parse::<IndexVariant>().unwrap(), IndexVariant::Positional);
        assert!("bm25".parse::<IndexVariant>().is_err());
        assert!(!IndexVariant::Frequency.has_idf());
    }

    #[test]
    fn cache_capacity_is_at_least_one() {
        let cfg = SearchConfig::default();
        let segment = mb_to_bytes(16.0);
        assert_eq!(cfg.cache_capacity(0.5, segment), 8);
        assert_eq!(cfg.cache_capacity(0.001, segment), 1);
    }
}
