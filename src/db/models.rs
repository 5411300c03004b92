// Data models — Rust structs that map to database rows.
//
// Region rows map onto the engine's RegionAggregate directly; the two types
// here are the rows that only the application layer cares about.

use serde::{Deserialize, Serialize};

/// A single citizen opinion with its polarity label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentLog {
    pub id: i64,
    pub region: String,
    pub topic: String,
    pub text: String,
    /// +1 positive, -1 negative, 0 neutral
    pub label: i64,
    pub created_at: String,
}

/// A stored summary or recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSummary {
    pub id: i64,
    pub region: Option<String>,
    pub topic: String,
    pub summary: String,
    /// Referenced policy names, for action recommendations
    pub proposal_list: Vec<String>,
    /// Embedding of `summary`, once computed
    pub embedding: Option<Vec<f64>>,
    pub created_at: String,
}

/// Positive / negative / total label counts for one region and topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolarityTally {
    pub positive: u32,
    pub negative: u32,
    pub total: u32,
}

impl PolarityTally {
    /// Share of positive opinions among polar ones, on a 0–100 scale.
    /// `None` when no opinion is polar.
    pub fn sentiment_score(&self) -> Option<f64> {
        let polar = self.positive + self.negative;
        (polar > 0).then(|| f64::from(self.positive) / f64::from(polar) * 100.0)
    }

    /// The tally of a single opinion.
    pub fn of_label(label: i64) -> Self {
        Self {
            positive: u32::from(label > 0),
            negative: u32::from(label < 0),
            total: 1,
        }
    }

    /// Fold another tally into this one.
    pub fn merge(&mut self, other: PolarityTally) {
        self.positive += other.positive;
        self.negative += other.negative;
        self.total += other.total;
    }
}
