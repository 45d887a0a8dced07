use std::path::PathBuf;
use std::sync::Arc;

use topicscout::core::config::{default_store_path, load_market_config};
use topicscout::llm::FallbackLlmProvider;
use topicscout::{Pipeline, Store};

/// Batch entry point (spec §1, §2): loads the market config, opens the
/// document store, and runs one collection/research pass. Scheduling
/// (`scheduling.collection_time`, weekly Notion sync) is an external
/// collaborator's contract per spec §1 — this binary runs a single pass per
/// invocation; a cron-like trigger outside the crate is expected to call it
/// repeatedly.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_market_config(config_path.as_deref())?;

    tracing::info!(
        domain = %config.domain,
        market = %config.market,
        language = %config.language,
        "topicscout: starting run"
    );

    let store = Arc::new(Store::open(default_store_path())?);
    let llm: Arc<dyn topicscout::llm::LlmProvider> = Arc::new(FallbackLlmProvider);

    let pipeline = Pipeline::new(store, config, llm)?;
    let result = pipeline.run_once().await;

    tracing::info!(
        documents_collected = result.stats.documents_collected,
        documents_inserted = result.stats.documents_inserted,
        duplicates_dropped = result.stats.duplicates_dropped,
        topics_discovered = result.stats.topics_discovered,
        topics_researched = result.stats.topics_researched,
        cost_usd = result.stats.total_cost_usd,
        "topicscout: run complete"
    );

    for topic in &result.topics {
        tracing::info!(topic = %topic.title, status = ?topic.status, "topic outcome");
    }

    Ok(())
}
