// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{PolarityTally, RagSummary, SentimentLog};
use super::traits::Database;
use crate::engine::region::RegionAggregate;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn upsert_region(&self, region: &RegionAggregate) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_region(&conn, region)
    }

    async fn get_region(&self, region_name: &str) -> Result<Option<RegionAggregate>> {
        let conn = self.conn.lock().await;
        super::queries::get_region(&conn, region_name)
    }

    async fn list_regions(&self) -> Result<Vec<RegionAggregate>> {
        let conn = self.conn.lock().await;
        super::queries::list_regions(&conn)
    }

    async fn regions_by_gap(&self, limit: u32) -> Result<Vec<RegionAggregate>> {
        let conn = self.conn.lock().await;
        super::queries::regions_by_gap(&conn, limit)
    }

    async fn update_gap(&self, region_name: &str, gap: f64) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::update_gap(&conn, region_name, gap)
    }

    async fn insert_sentiment_log(
        &self,
        region: &str,
        topic: &str,
        text: &str,
        label: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_sentiment_log(&conn, region, topic, text, label)
    }

    async fn record_opinion(
        &self,
        region: &RegionAggregate,
        topic: &str,
        text: &str,
        label: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::record_opinion(&conn, region, topic, text, label)
    }

    async fn get_sentiment_logs(&self, region: &str, limit: u32) -> Result<Vec<SentimentLog>> {
        let conn = self.conn.lock().await;
        super::queries::get_sentiment_logs(&conn, region, limit)
    }

    async fn count_sentiment_logs(&self, region: &str) -> Result<u32> {
        let conn = self.conn.lock().await;
        super::queries::count_sentiment_logs(&conn, region)
    }

    async fn topic_tallies(&self, region: &str) -> Result<Vec<(String, PolarityTally)>> {
        let conn = self.conn.lock().await;
        super::queries::topic_tallies(&conn, region)
    }

    async fn save_summary(
        &self,
        region: Option<&str>,
        topic: &str,
        summary: &str,
        proposal_list: &[String],
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::save_summary(&conn, region, topic, summary, proposal_list)
    }

    async fn list_summaries(&self, region: Option<&str>) -> Result<Vec<RagSummary>> {
        let conn = self.conn.lock().await;
        super::queries::list_summaries(&conn, region)
    }

    async fn set_summary_embedding(&self, id: i64, embedding: &[f64]) -> Result<()> {
        let json = serde_json::to_string(embedding)?;
        let conn = self.conn.lock().await;
        super::queries::set_summary_embedding(&conn, id, &json)
    }
}
