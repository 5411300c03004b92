// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{PolarityTally, RagSummary, SentimentLog};
use super::schema::topic_columns;
use crate::engine::region::{RegionAggregate, TopicScores};
use crate::engine::topics::CanonicalTopic;

// --- Regions ---

/// Comma-separated list of every region_data column read into a RegionAggregate.
fn region_select_columns() -> String {
    let mut cols = vec![
        "region_name".to_string(),
        "policy_avg_score".to_string(),
        "sentiment_avg_score".to_string(),
        "gap_score".to_string(),
        "updated_at".to_string(),
    ];
    for topic in CanonicalTopic::ALL {
        let (policy, sentiment) = topic_columns(topic);
        cols.push(policy);
        cols.push(sentiment);
    }
    cols.join(", ")
}

fn row_to_region(row: &Row<'_>) -> rusqlite::Result<RegionAggregate> {
    let mut region = RegionAggregate {
        region_name: row.get("region_name")?,
        policy_avg_score: row.get("policy_avg_score")?,
        sentiment_avg_score: row.get("sentiment_avg_score")?,
        gap_score: row.get("gap_score")?,
        updated_at: row.get("updated_at")?,
        ..Default::default()
    };

    for topic in CanonicalTopic::ALL {
        let (policy_col, sentiment_col) = topic_columns(topic);
        let scores = TopicScores {
            policy: row.get(policy_col.as_str())?,
            sentiment: row.get(sentiment_col.as_str())?,
        };
        if scores.policy.is_some() || scores.sentiment.is_some() {
            region.topic_scores.insert(topic, scores);
        }
    }

    Ok(region)
}

/// Insert or replace a region's scores (keyed by region name).
pub fn upsert_region(conn: &Connection, region: &RegionAggregate) -> Result<()> {
    let mut columns = vec![
        "region_name".to_string(),
        "policy_avg_score".to_string(),
        "sentiment_avg_score".to_string(),
        "gap_score".to_string(),
    ];
    let mut values: Vec<Option<f64>> = vec![
        region.policy_avg_score,
        region.sentiment_avg_score,
        Some(region.gap_score),
    ];
    for topic in CanonicalTopic::ALL {
        let (policy_col, sentiment_col) = topic_columns(topic);
        let scores = region.scores(topic);
        columns.push(policy_col);
        values.push(scores.policy);
        columns.push(sentiment_col);
        values.push(scores.sentiment);
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .skip(1)
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    let sql = format!(
        "INSERT INTO region_data ({}, updated_at)
         VALUES ({}, datetime('now'))
         ON CONFLICT(region_name) DO UPDATE SET {}, updated_at = datetime('now')",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    );

    let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(columns.len());
    bound.push(&region.region_name);
    for value in &values {
        bound.push(value);
    }

    conn.execute(&sql, bound.as_slice())?;
    Ok(())
}

/// Load one region by name.
pub fn get_region(conn: &Connection, region_name: &str) -> Result<Option<RegionAggregate>> {
    let sql = format!(
        "SELECT {} FROM region_data WHERE region_name = ?1",
        region_select_columns()
    );
    let result = conn
        .query_row(&sql, params![region_name], row_to_region)
        .optional()?;
    Ok(result)
}

/// All regions, alphabetically.
pub fn list_regions(conn: &Connection) -> Result<Vec<RegionAggregate>> {
    let sql = format!(
        "SELECT {} FROM region_data ORDER BY region_name ASC",
        region_select_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_region)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Regions with the largest stored gap first.
pub fn regions_by_gap(conn: &Connection, limit: u32) -> Result<Vec<RegionAggregate>> {
    let sql = format!(
        "SELECT {} FROM region_data ORDER BY gap_score DESC, region_name ASC LIMIT ?1",
        region_select_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], row_to_region)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Write back a region's recomputed gap. Returns false if the region doesn't exist.
pub fn update_gap(conn: &Connection, region_name: &str, gap: f64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE region_data SET gap_score = ?2, updated_at = datetime('now') WHERE region_name = ?1",
        params![region_name, gap],
    )?;
    Ok(changed > 0)
}

// --- Sentiment log ---

/// Record a citizen opinion and return its ID.
pub fn insert_sentiment_log(
    conn: &Connection,
    region: &str,
    topic: &str,
    text: &str,
    label: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sentiment_log (region, topic, text, label) VALUES (?1, ?2, ?3, ?4)",
        params![region, topic, text, label],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record an opinion and write the region it updated, all or nothing.
pub fn record_opinion(
    conn: &Connection,
    region: &RegionAggregate,
    topic: &str,
    text: &str,
    label: i64,
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let id = insert_sentiment_log(&tx, &region.region_name, topic, text, label)?;
    upsert_region(&tx, region)?;
    tx.commit()?;
    Ok(id)
}

/// A region's opinions, oldest first, capped at `limit`.
pub fn get_sentiment_logs(conn: &Connection, region: &str, limit: u32) -> Result<Vec<SentimentLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, region, topic, text, label, created_at
         FROM sentiment_log WHERE region = ?1
         ORDER BY id ASC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![region, limit], |row| {
            Ok(SentimentLog {
                id: row.get(0)?,
                region: row.get(1)?,
                topic: row.get(2)?,
                text: row.get(3)?,
                label: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Number of opinions recorded for a region.
pub fn count_sentiment_logs(conn: &Connection, region: &str) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM sentiment_log WHERE region = ?1",
        params![region],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Label counts for every topic spelling recorded in a region, in order of
/// first appearance.
pub fn topic_tallies(conn: &Connection, region: &str) -> Result<Vec<(String, PolarityTally)>> {
    let mut stmt = conn.prepare(
        "SELECT topic,
            SUM(CASE WHEN label > 0 THEN 1 ELSE 0 END),
            SUM(CASE WHEN label < 0 THEN 1 ELSE 0 END),
            COUNT(*)
         FROM sentiment_log WHERE region = ?1
         GROUP BY topic
         ORDER BY MIN(id)",
    )?;
    let rows = stmt
        .query_map(params![region], |row| {
            Ok((
                row.get(0)?,
                PolarityTally {
                    positive: row.get(1)?,
                    negative: row.get(2)?,
                    total: row.get(3)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// --- Summaries ---

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<(RagSummary, Option<String>, Option<String>)> {
    Ok((
        RagSummary {
            id: row.get(0)?,
            region: row.get(1)?,
            topic: row.get(2)?,
            summary: row.get(3)?,
            proposal_list: Vec::new(),
            embedding: None,
            created_at: row.get(4)?,
        },
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Save a summary, replacing any existing summary for the same region and topic.
pub fn save_summary(
    conn: &Connection,
    region: Option<&str>,
    topic: &str,
    summary: &str,
    proposal_list: &[String],
) -> Result<i64> {
    let proposals_json = if proposal_list.is_empty() {
        None
    } else {
        Some(serde_json::to_string(proposal_list)?)
    };

    conn.execute(
        "DELETE FROM rag_summary WHERE region IS ?1 AND topic = ?2",
        params![region, topic],
    )?;
    conn.execute(
        "INSERT INTO rag_summary (region, topic, summary, proposal_list) VALUES (?1, ?2, ?3, ?4)",
        params![region, topic, summary, proposals_json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stored summaries, optionally restricted to one region, oldest first.
pub fn list_summaries(conn: &Connection, region: Option<&str>) -> Result<Vec<RagSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, region, topic, summary, created_at, proposal_list, embedding
         FROM rag_summary
         WHERE ?1 IS NULL OR region = ?1
         ORDER BY id ASC",
    )?;
    let raw = stmt
        .query_map(params![region], row_to_summary)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut summaries = Vec::with_capacity(raw.len());
    for (mut summary, proposals, embedding) in raw {
        if let Some(json) = proposals {
            summary.proposal_list = serde_json::from_str(&json)?;
        }
        if let Some(json) = embedding {
            summary.embedding = Some(serde_json::from_str(&json)?);
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Store a summary's embedding (JSON array of floats).
pub fn set_summary_embedding(conn: &Connection, id: i64, embedding_json: &str) -> Result<()> {
    conn.execute(
        "UPDATE rag_summary SET embedding = ?2 WHERE id = ?1",
        params![id, embedding_json],
    )?;
    Ok(())
}
