// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::engine::topics::CanonicalTopic;

/// Column names for a topic's policy and sentiment scores in `region_data`.
pub fn topic_columns(topic: CanonicalTopic) -> (String, String) {
    (
        format!("{}_policy_score", topic.key()),
        format!("{}_sentiment_score", topic.key()),
    )
}

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    let topic_score_columns: String = CanonicalTopic::ALL
        .iter()
        .map(|&topic| {
            let (policy, sentiment) = topic_columns(topic);
            format!("            {policy} REAL,\n            {sentiment} REAL,\n")
        })
        .collect();

    conn.execute_batch(&format!(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per region: overall and per-topic policy/sentiment scores
        CREATE TABLE IF NOT EXISTS region_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            region_name TEXT NOT NULL UNIQUE,
            policy_avg_score REAL,
            sentiment_avg_score REAL,
{topic_score_columns}            gap_score REAL NOT NULL DEFAULT 0.0,  -- |policy - sentiment|
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Individual citizen opinions with polarity labels
        CREATE TABLE IF NOT EXISTS sentiment_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            region TEXT NOT NULL,
            topic TEXT NOT NULL,
            text TEXT NOT NULL,
            label INTEGER NOT NULL,            -- +1 positive, -1 negative, 0 neutral
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Generated summaries and recommendations
        CREATE TABLE IF NOT EXISTS rag_summary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            region TEXT,                       -- null for cross-region recommendations
            topic TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Index for loading a region's opinions
        CREATE INDEX IF NOT EXISTS idx_sentiment_region
            ON sentiment_log(region, topic);

        -- Index for ranking regions by gap
        CREATE INDEX IF NOT EXISTS idx_region_gap
            ON region_data(gap_score);

        -- Index for replacing a region/topic summary
        CREATE INDEX IF NOT EXISTS idx_summary_region_topic
            ON rag_summary(region, topic);
        ",
    ))
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: add embedding column to rag_summary.
    // Stores the summary's embedding as a JSON array of floats, filled in
    // lazily by `reindex-embeddings` and semantic search.
    run_migration(conn, 2, |c| {
        c.execute_batch("ALTER TABLE rag_summary ADD COLUMN embedding TEXT;")
    })?;

    // Migration v3: add proposal_list column to rag_summary.
    // JSON array of referenced policy names for action recommendations.
    run_migration(conn, 3, |c| {
        c.execute_batch("ALTER TABLE rag_summary ADD COLUMN proposal_list TEXT;")
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Running create_tables twice should not error
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let count = table_count(&conn).unwrap();
        // schema_version, region_data, sentiment_log, rag_summary = 4 tables
        assert_eq!(count, 4i64);
    }

    #[test]
    fn test_region_table_has_topic_columns() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        conn.execute(
            "INSERT INTO region_data (region_name, healthcare_policy_score, housing_environment_sentiment_score)
             VALUES ('서울', 71.5, 40.0)",
            [],
        )
        .unwrap();

        let score: f64 = conn
            .query_row(
                "SELECT healthcare_policy_score FROM region_data WHERE region_name = '서울'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!((score - 71.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Run create_tables three times — migrations should only run once
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_migration_v2_adds_embedding_column() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        conn.execute(
            "INSERT INTO rag_summary (topic, summary, embedding) VALUES ('t', 's', '[0.1, 0.2]')",
            [],
        )
        .unwrap();

        let result: String = conn
            .query_row("SELECT embedding FROM rag_summary", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, "[0.1, 0.2]");
    }
}
