use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MarketConfig — YAML-loaded, per-run configuration (spec §6).
//
// Candidate-path + env-var-override resolution mirrors the teacher's
// `load_shadow_config`: try a list of paths, first found wins; a missing file
// falls back to defaults where that's safe, but a market config is required
// to begin a run, so a missing/malformed file is a `ConfigError` (fatal).
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "TOPICSCOUT_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CollectorsConfig {
    #[serde(default = "default_true")]
    pub rss_enabled: bool,
    #[serde(default)]
    pub reddit_enabled: bool,
    #[serde(default)]
    pub trends_enabled: bool,
    #[serde(default)]
    pub autocomplete_enabled: bool,
    #[serde(default)]
    pub custom_feeds: Vec<String>,
    #[serde(default)]
    pub reddit_subreddits: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_collection_time")]
    pub collection_time: String,
    #[serde(default = "default_sync_day")]
    pub sync_day: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_collection_time() -> String {
    "02:00".to_string()
}
fn default_sync_day() -> String {
    "Monday 09:00".to_string()
}
fn default_lookback_days() -> u32 {
    7
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            collection_time: default_collection_time(),
            sync_day: default_sync_day(),
            lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankerConfig {
    #[serde(default)]
    pub enable_voyage: bool,
    #[serde(default = "default_stage1_threshold")]
    pub stage1_threshold: f32,
    #[serde(default = "default_stage2_threshold")]
    pub stage2_threshold: f32,
    #[serde(default = "default_stage3_final_count")]
    pub stage3_final_count: usize,
}

fn default_stage1_threshold() -> f32 {
    0.0
}
fn default_stage2_threshold() -> f32 {
    0.3
}
fn default_stage3_final_count() -> usize {
    25
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enable_voyage: false,
            stage1_threshold: default_stage1_threshold(),
            stage2_threshold: default_stage2_threshold(),
            stage3_final_count: default_stage3_final_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    Bm25Llm,
    LlmOnly,
}

impl Default for SynthesisStrategy {
    fn default() -> Self {
        SynthesisStrategy::Bm25Llm
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesizerConfig {
    #[serde(default)]
    pub strategy: SynthesisStrategy,
    #[serde(default = "default_max_article_words")]
    pub max_article_words: usize,
}

fn default_max_article_words() -> usize {
    2000
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            strategy: SynthesisStrategy::default(),
            max_article_words: default_max_article_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeepResearchSettings {
    #[serde(default = "default_min_successful_backends")]
    pub min_successful_backends: usize,
}

fn default_min_successful_backends() -> usize {
    1
}

impl Default for DeepResearchSettings {
    fn default() -> Self {
        Self {
            min_successful_backends: default_min_successful_backends(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    pub domain: String,
    pub market: String,
    pub language: String,
    #[serde(default)]
    pub vertical: String,
    #[serde(default)]
    pub seed_keywords: Vec<String>,
    #[serde(default)]
    pub competitor_urls: Vec<String>,
    #[serde(default)]
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub synthesizer: SynthesizerConfig,
    #[serde(default)]
    pub deep_research: DeepResearchSettings,
}

impl MarketConfig {
    fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            bail!("ConfigError: `domain` must not be empty");
        }
        if self.market.trim().is_empty() {
            bail!("ConfigError: `market` must not be empty");
        }
        if self.language.trim().is_empty() {
            bail!("ConfigError: `language` must not be empty");
        }
        Ok(())
    }
}

/// Load a market configuration from `path`, or from the first candidate that
/// exists among `./market.yaml`, `./config/market.yaml`, and the
/// `TOPICSCOUT_CONFIG` env var (checked first when set).
///
/// A missing or malformed file is a `ConfigError`: the run refuses to begin
/// (spec §7 — fatal at startup).
pub fn load_market_config(path: Option<&Path>) -> Result<MarketConfig> {
    let candidates: Vec<PathBuf> = {
        let mut v = Vec::new();
        if let Some(p) = path {
            v.push(p.to_path_buf());
        }
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.push(PathBuf::from(env_path));
        }
        v.push(PathBuf::from("market.yaml"));
        v.push(PathBuf::from("config/market.yaml"));
        v
    };

    let found = candidates
        .iter()
        .find(|p| p.exists())
        .with_context(|| {
            format!(
                "ConfigError: no market config found among {:?}",
                candidates
            )
        })?;

    let contents = std::fs::read_to_string(found)
        .with_context(|| format!("ConfigError: failed to read {}", found.display()))?;

    // Parse through a generic value first, not straight into `MarketConfig`:
    // top-level configs may ship `market`/`language` as a flat map or as a
    // nested `market: {market, language}` object (spec §4.9, §6), and
    // `coerce_locality` is what normalizes either shape into the flat
    // strings `MarketConfig` actually stores.
    let raw: serde_yaml::Value = serde_yaml::from_str(&contents)
        .with_context(|| format!("ConfigError: failed to parse {}", found.display()))?;
    let mut doc = serde_json::to_value(&raw)
        .with_context(|| format!("ConfigError: failed to parse {}", found.display()))?;

    let (market, language) = coerce_locality(&doc);
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("market".to_string(), serde_json::Value::String(market));
        if !language.is_empty() || !obj.contains_key("language") {
            obj.insert("language".to_string(), serde_json::Value::String(language));
        }
    }

    let cfg: MarketConfig = serde_json::from_value(doc)
        .with_context(|| format!("ConfigError: failed to parse {}", found.display()))?;

    cfg.validate()?;
    tracing::info!("market config loaded from {}", found.display());
    Ok(cfg)
}

/// Resolve `(market, language)` as lowercase strings from an arbitrary JSON
/// blob that may be either a flat map (`{market: "Germany", language: "de"}`)
/// or a nested object with a `.market` sub-object
/// (`{market: {market: "Germany", language: "de"}, ...}`).
///
/// Called from `load_market_config` so a market config file may use either
/// shape; the resolved strings become `MarketConfig.market`/`.language`,
/// which the cascaded reranker's locality metric (spec §4.9) then reads
/// directly. Falls back to empty strings when neither shape yields a value.
pub fn coerce_locality(cfg: &serde_json::Value) -> (String, String) {
    let flat_market = cfg.get("market").and_then(|v| v.as_str());
    let flat_language = cfg.get("language").and_then(|v| v.as_str());
    if let (Some(m), Some(l)) = (flat_market, flat_language) {
        return (m.to_lowercase(), l.to_lowercase());
    }

    let nested = cfg.get("market").filter(|v| v.is_object());
    let nested_market = nested
        .and_then(|m| m.get("market"))
        .and_then(|v| v.as_str());
    let nested_language = nested
        .and_then(|m| m.get("language"))
        .and_then(|v| v.as_str());

    (
        flat_market
            .or(nested_market)
            .unwrap_or_default()
            .to_lowercase(),
        flat_language
            .or(nested_language)
            .unwrap_or_default()
            .to_lowercase(),
    )
}

/// Default sqlite path: `~/.topicscout/store.db`, mirroring the teacher's
/// `lancedb_uri()` stable-default-path pattern. `TOPICSCOUT_DB` overrides.
pub fn default_store_path() -> PathBuf {
    if let Ok(v) = std::env::var("TOPICSCOUT_DB") {
        if !v.trim().is_empty() {
            return PathBuf::from(v);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".topicscout")
        .join("store.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_locality_flat() {
        let cfg = serde_json::json!({"market": "Germany", "language": "DE"});
        assert_eq!(coerce_locality(&cfg), ("germany".into(), "de".into()));
    }

    #[test]
    fn coerce_locality_nested() {
        let cfg = serde_json::json!({"market": {"market": "Germany", "language": "de"}});
        assert_eq!(coerce_locality(&cfg), ("germany".into(), "de".into()));
    }

    #[test]
    fn coerce_locality_missing() {
        let cfg = serde_json::json!({});
        assert_eq!(coerce_locality(&cfg), ("".into(), "".into()));
    }

    #[test]
    fn market_config_rejects_empty_domain() {
        let cfg = MarketConfig {
            domain: "".into(),
            market: "Germany".into(),
            language: "de".into(),
            vertical: "".into(),
            seed_keywords: vec![],
            competitor_urls: vec![],
            collectors: CollectorsConfig::default(),
            scheduling: SchedulingConfig::default(),
            reranker: RerankerConfig::default(),
            synthesizer: SynthesizerConfig::default(),
            deep_research: DeepResearchSettings::default(),
        };
        assert!(cfg.validate().is_err());
    }

    /// Regression test for the nested `market: {market, language}` shape
    /// (spec §4.9, §6): `load_market_config` must accept it, not just
    /// `coerce_locality` in isolation.
    #[test]
    fn load_market_config_accepts_nested_market_shape() {
        let path = std::env::temp_dir().join(format!(
            "topicscout-test-nested-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            "domain: tech\nmarket:\n  market: Germany\n  language: de\nseed_keywords: [rust]\n",
        )
        .unwrap();

        let cfg = load_market_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.market, "germany");
        assert_eq!(cfg.language, "de");
        assert_eq!(cfg.domain, "tech");
    }

    #[test]
    fn load_market_config_accepts_flat_market_shape() {
        let path = std::env::temp_dir().join(format!(
            "topicscout-test-flat-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "domain: tech\nmarket: Germany\nlanguage: DE\n").unwrap();

        let cfg = load_market_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.market, "germany");
        assert_eq!(cfg.language, "de");
    }
}
