use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single collected, deduplicated unit of content.
///
/// `canonical_url` is the store's uniqueness key; `content_hash` is a
/// deterministic SHA-256 over whitespace-collapsed, case-folded content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Collector tag, e.g. `rss_heise`, `reddit_rust`, `trends`.
    pub source: String,
    pub source_url: String,
    pub canonical_url: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub language: String,
    pub domain: String,
    pub market: String,
    pub vertical: String,
    pub content_hash: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub author: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub reliability_score: f32,
    pub paywall: bool,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    New,
    Processed,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::New => "new",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "processed" => DocumentStatus::Processed,
            "rejected" => DocumentStatus::Rejected,
            _ => DocumentStatus::New,
        }
    }
}

/// Where a topic candidate originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TopicSource {
    Rss,
    Reddit,
    Trends,
    Autocomplete,
    Competitor,
    Manual,
}

impl TopicSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicSource::Rss => "RSS",
            TopicSource::Reddit => "REDDIT",
            TopicSource::Trends => "TRENDS",
            TopicSource::Autocomplete => "AUTOCOMPLETE",
            TopicSource::Competitor => "COMPETITOR",
            TopicSource::Manual => "MANUAL",
        }
    }
}

/// A candidate content topic, scored and enriched across the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Slug id, derived from the title.
    pub id: String,
    pub title: String,
    pub description: String,
    pub cluster_label: String,
    pub source: TopicSource,
    pub source_url: String,
    pub language: String,
    pub domain: String,
    pub market: String,

    pub demand_score: f32,
    pub opportunity_score: f32,
    pub fit_score: f32,
    pub novelty_score: f32,
    pub priority_score: f32,

    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub content_gaps: Vec<String>,
    #[serde(default)]
    pub keywords: HashMap<String, f32>,
    pub research_report: Option<ResearchReport>,
    pub hero_image_url: Option<String>,
    #[serde(default)]
    pub supporting_images: Vec<String>,

    pub discovered_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Topic {
    /// Integer 1-10 priority derived from `priority_score` in `[0,1]`.
    pub fn priority(&self) -> u8 {
        let scaled = (self.priority_score.clamp(0.0, 1.0) * 9.0).round() as u8;
        scaled + 1
    }
}

/// A group of Documents the clusterer believes represent one topic candidate.
/// References Documents by id only; Documents never own a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_id: String,
    pub label: String,
    pub representative_title: String,
    pub document_ids: Vec<String>,
}

/// A single result returned by a research backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_date: Option<chrono::DateTime<chrono::Utc>>,
    pub backend: Backend,
    #[serde(default)]
    pub score: Option<f32>,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Tavily,
    Searxng,
    Gemini,
    Rss,
    Thenewsapi,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Tavily => "tavily",
            Backend::Searxng => "searxng",
            Backend::Gemini => "gemini",
            Backend::Rss => "rss",
            Backend::Thenewsapi => "thenewsapi",
        }
    }

    /// Fixed diversity-interleave order used by the orchestrator (spec §4.8 step 6).
    pub const DIVERSITY_ORDER: [Backend; 5] = [
        Backend::Tavily,
        Backend::Searxng,
        Backend::Gemini,
        Backend::Rss,
        Backend::Thenewsapi,
    ];
}

/// A backend's specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Horizon {
    Depth,
    Breadth,
    Trends,
    Curated,
    Breaking,
}

/// A source-intelligence cache entry, keyed by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub domain: String,
    pub title: String,
    /// Truncated to <=500 chars.
    pub content_preview: String,
    pub first_fetched_at: chrono::DateTime<chrono::Utc>,
    pub last_fetched_at: chrono::DateTime<chrono::Utc>,
    pub fetch_count: u32,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub usage_count: u32,
    pub quality_score: f32,
    #[serde(default)]
    pub e_e_a_t_signals: HashMap<String, f32>,
    pub author: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_stale: bool,
    /// Set when `content` was longer than the 500-char cap, mirroring the
    /// teacher's `batch_scrape` truncation flag.
    #[serde(default)]
    pub truncated: bool,
}

/// One ranked row from a single SERP query, persisted as part of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpRow {
    pub position: u32,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpSnapshot {
    pub topic_id: String,
    pub search_query: String,
    pub searched_at: chrono::DateTime<chrono::Utc>,
    pub rows: Vec<SerpRow>,
}

/// Per-backend statistics for a single research run on one topic.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendStat {
    pub success: bool,
    pub count: usize,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub topic_id: String,
    pub query: String,
    pub article_markdown: String,
    /// citation index (1-based, matches `[Source N]` tokens) -> URL.
    pub citations: Vec<String>,
    pub backend_stats: HashMap<String, BackendStat>,
    pub cost_usd: f64,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Per-topic outcome for a run's result summary (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicRunStatus {
    Researched,
    ResearchFailed,
    SynthesisFailed,
    Ok,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task_name: String,
    pub error: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Health tracking for one collector-owned resource (feed URL, subreddit, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthRecord {
    pub success: u32,
    pub failure: u32,
    pub consecutive_failures: u32,
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
    pub last_failure: Option<chrono::DateTime<chrono::Utc>>,
}

impl HealthRecord {
    pub fn record_success(&mut self) {
        self.success += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(chrono::Utc::now());
    }

    pub fn record_failure(&mut self) {
        self.failure += 1;
        self.consecutive_failures += 1;
        self.last_failure = Some(chrono::Utc::now());
    }

    /// 15-minute base backoff, doubling per failure past the threshold, capped at 6h.
    pub fn is_backing_off(&self, threshold: u32) -> bool {
        if self.consecutive_failures < threshold {
            return false;
        }
        let Some(last_failure) = self.last_failure else {
            return false;
        };
        let extra = self.consecutive_failures.saturating_sub(threshold);
        let minutes = (15u64.saturating_mul(1u64 << extra.min(4))).min(360);
        let window = chrono::Duration::minutes(minutes as i64);
        chrono::Utc::now() - last_failure < window
    }
}

/// Error taxonomy kinds (spec §7). Used to decide retry/degrade behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    DuplicateCanonicalUrl,
    BackendFailure,
    AllSourcesFailed,
    QuotaExhausted,
    CorruptedRecord,
    ConfigError,
}
