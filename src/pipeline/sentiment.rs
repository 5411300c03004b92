// Sentiment recording — store one labeled opinion and refresh the region.
//
// The topic's sentiment score is recomputed from all labels recorded for
// that region under any spelling of the same canonical topic, then the
// region averages and gap follow.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::db::models::PolarityTally;
use crate::db::Database;
use crate::engine::{CanonicalTopic, RegionAggregate};

/// What changed after recording an opinion.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentUpdate {
    pub log_id: i64,
    pub region: String,
    pub topic: String,
    /// New sentiment score for the topic, when it is canonical and has
    /// polar opinions
    pub topic_sentiment_score: Option<f64>,
    pub gap_score: f64,
    pub created_region: bool,
}

pub async fn record_sentiment(
    db: &dyn Database,
    region_name: &str,
    topic: &str,
    text: &str,
    label: i64,
) -> Result<SentimentUpdate> {
    if !(-1..=1).contains(&label) {
        anyhow::bail!("Sentiment label must be -1, 0 or 1, got {label}");
    }
    if region_name.trim().is_empty() || topic.trim().is_empty() {
        anyhow::bail!("Region and topic must not be empty");
    }

    let existing = db.get_region(region_name).await?;
    let created_region = existing.is_none();
    let mut region = existing.unwrap_or_else(|| RegionAggregate::new(region_name));

    let mut topic_sentiment_score = None;
    if let Some(canonical) = CanonicalTopic::from_label(topic) {
        // Stored labels under any spelling of the topic, plus this one
        let mut tally = PolarityTally::of_label(label);
        for (recorded, counts) in db.topic_tallies(region_name).await? {
            if CanonicalTopic::from_label(&recorded) == Some(canonical) {
                tally.merge(counts);
            }
        }
        if let Some(score) = tally.sentiment_score() {
            region.set_sentiment_score(canonical, score);
            region.refresh_averages();
            topic_sentiment_score = Some(score);
        }
    }

    let gap_score = region.recalculate();
    let log_id = db.record_opinion(&region, topic, text, label).await?;

    info!(
        region = region_name,
        topic,
        label,
        gap = gap_score,
        created_region,
        "Recorded sentiment"
    );

    Ok(SentimentUpdate {
        log_id,
        region: region_name.to_string(),
        topic: topic.to_string(),
        topic_sentiment_score,
        gap_score,
        created_region,
    })
}
