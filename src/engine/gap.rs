// Gap ranker — which topics diverge most between policy and sentiment.
//
// Three sources produce the same GapRecord shape:
//
//   vector set   gap carried per topic (literal gap_score or the polarity
//                count gap); falls back to topic weight when neither exists
//   aggregate    |policy - sentiment| per canonical topic from the store
//   table        a region row of precomputed per-topic gap columns
//
// The count-difference gap and the score-difference gap are on different
// scales and are never mixed within one ranking.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{EngineError, Result};
use super::reconcile::{normalize_label, KeyReconciler};
use super::region::RegionAggregate;
use super::topics::CanonicalTopic;
use super::vector_set::VectorSet;

/// One ranked topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub topic_label: String,
    /// The same topic in the other language, when the topic is canonical.
    pub topic_label_alt: Option<String>,
    pub policy_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub gap: f64,
}

/// Precomputed gap scores: region name -> (column name -> gap).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GapTable {
    rows: IndexMap<String, IndexMap<String, Option<f64>>>,
}

impl GapTable {
    pub fn new(rows: IndexMap<String, IndexMap<String, Option<f64>>>) -> Self {
        Self { rows }
    }

    pub fn row(&self, region: &str) -> Option<&IndexMap<String, Option<f64>>> {
        self.rows.get(region)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}

/// Where the gaps come from.
#[derive(Debug, Clone, Copy)]
pub enum GapSource<'a> {
    Vectors(&'a VectorSet),
    Aggregate(&'a RegionAggregate),
    Table { region: &'a str, table: &'a GapTable },
}

/// The label of the same canonical topic in the other language.
fn alternate_label(label: &str) -> Option<String> {
    let topic = CanonicalTopic::from_label(label)?;
    let alt = if normalize_label(label) == normalize_label(topic.english()) {
        topic.korean()
    } else {
        topic.english()
    };
    Some(alt.to_string())
}

/// Ranks topics by gap. Holds the reconciler used to find canonical topic
/// columns in tabular sources.
#[derive(Default)]
pub struct GapRanker {
    reconciler: KeyReconciler,
}

impl GapRanker {
    pub fn new(reconciler: KeyReconciler) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &KeyReconciler {
        &self.reconciler
    }

    /// Top `top_k` topics by gap, descending. Ties keep source order. Fewer
    /// than `top_k` topics returns all of them without padding.
    pub fn top_gap_topics(&self, source: GapSource<'_>, top_k: usize) -> Result<Vec<GapRecord>> {
        let mut records = match source {
            GapSource::Vectors(set) => records_from_vectors(set)?,
            GapSource::Aggregate(region) => records_from_aggregate(region)?,
            GapSource::Table { region, table } => self.records_from_table(region, table)?,
        };

        // sort_by is stable, so equal gaps keep source order
        records.sort_by(|a, b| b.gap.total_cmp(&a.gap));
        records.truncate(top_k);
        Ok(records)
    }

    fn records_from_table(&self, region: &str, table: &GapTable) -> Result<Vec<GapRecord>> {
        let row = table
            .row(region)
            .ok_or_else(|| EngineError::NotFound(format!("region '{region}' not in gap table")))?;

        // (column position, record), so ties later keep the table's column order
        let mut found = Vec::new();
        for topic in CanonicalTopic::ALL {
            let column = self
                .reconciler
                .resolve(topic.aliases(), row.keys())
                .and_then(|c| row.get_full(&c).map(|(pos, _, gap)| (pos, *gap)));
            match column {
                Some((pos, Some(gap))) => found.push((
                    pos,
                    GapRecord {
                        topic_label: topic.korean().to_string(),
                        topic_label_alt: Some(topic.english().to_string()),
                        policy_score: None,
                        sentiment_score: None,
                        gap,
                    },
                )),
                _ => {
                    warn!(region = region, topic = topic.key(), "Gap column missing, skipping");
                }
            }
        }

        if found.is_empty() {
            return Err(EngineError::NotFound(format!(
                "region '{region}' has no recognized gap columns"
            )));
        }
        found.sort_by_key(|(pos, _)| *pos);
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }
}

/// Rank with the default reconciler.
pub fn top_gap_topics(source: GapSource<'_>, top_k: usize) -> Result<Vec<GapRecord>> {
    GapRanker::default().top_gap_topics(source, top_k)
}

fn records_from_vectors(set: &VectorSet) -> Result<Vec<GapRecord>> {
    if set.is_empty() {
        return Err(EngineError::NotFound("vector set has no topics".to_string()));
    }

    Ok(set
        .iter()
        .map(|tv| GapRecord {
            topic_label: tv.topic_label.clone(),
            topic_label_alt: alternate_label(&tv.topic_label),
            policy_score: None,
            sentiment_score: None,
            gap: tv.gap.unwrap_or(tv.weight),
        })
        .collect())
}

fn records_from_aggregate(region: &RegionAggregate) -> Result<Vec<GapRecord>> {
    let records: Vec<GapRecord> = CanonicalTopic::ALL
        .into_iter()
        .filter_map(|topic| {
            let scores = region.scores(topic);
            let gap = scores.gap()?;
            Some(GapRecord {
                topic_label: topic.korean().to_string(),
                topic_label_alt: Some(topic.english().to_string()),
                policy_score: scores.policy,
                sentiment_score: scores.sentiment,
                gap,
            })
        })
        .collect();

    if records.is_empty() {
        return Err(EngineError::NotFound(format!(
            "region '{}' has no topic with both scores",
            region.region_name
        )));
    }
    Ok(records)
}
