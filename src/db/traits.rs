// Database trait — async interface for all store operations.
//
// Implementor: SqliteDatabase (wraps rusqlite). Methods are async so the
// pipeline can hold an `Arc<dyn Database>` across awaits while LLM calls
// are in flight.
//
// The trait mirrors the queries.rs function signatures.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{PolarityTally, RagSummary, SentimentLog};
use crate::engine::region::RegionAggregate;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Regions ---

    /// Insert or replace a region's scores.
    async fn upsert_region(&self, region: &RegionAggregate) -> Result<()>;

    /// Load one region by name.
    async fn get_region(&self, region_name: &str) -> Result<Option<RegionAggregate>>;

    /// All regions, alphabetically.
    async fn list_regions(&self) -> Result<Vec<RegionAggregate>>;

    /// Regions with the largest stored gap first.
    async fn regions_by_gap(&self, limit: u32) -> Result<Vec<RegionAggregate>>;

    /// Write back a recomputed gap. Returns false if the region doesn't exist.
    async fn update_gap(&self, region_name: &str, gap: f64) -> Result<bool>;

    // --- Sentiment log ---

    /// Record a citizen opinion and return its ID.
    async fn insert_sentiment_log(
        &self,
        region: &str,
        topic: &str,
        text: &str,
        label: i64,
    ) -> Result<i64>;

    /// Record an opinion together with the region aggregate it produced, in
    /// one transaction. Returns the opinion's ID.
    async fn record_opinion(
        &self,
        region: &RegionAggregate,
        topic: &str,
        text: &str,
        label: i64,
    ) -> Result<i64>;

    /// A region's opinions, oldest first.
    async fn get_sentiment_logs(&self, region: &str, limit: u32) -> Result<Vec<SentimentLog>>;

    async fn count_sentiment_logs(&self, region: &str) -> Result<u32>;

    /// Label counts per recorded topic spelling in a region.
    async fn topic_tallies(&self, region: &str) -> Result<Vec<(String, PolarityTally)>>;

    // --- Summaries ---

    /// Save a summary, replacing the existing one for the same region and topic.
    async fn save_summary(
        &self,
        region: Option<&str>,
        topic: &str,
        summary: &str,
        proposal_list: &[String],
    ) -> Result<i64>;

    /// Stored summaries, optionally for a single region.
    async fn list_summaries(&self, region: Option<&str>) -> Result<Vec<RagSummary>>;

    /// Store a summary's embedding vector.
    async fn set_summary_embedding(&self, id: i64, embedding: &[f64]) -> Result<()>;
}
