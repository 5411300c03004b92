// RegionAggregate — a region's per-topic policy and sentiment scores.
//
// Rows live in the store; the engine reads them and writes back only the
// overall gap. Gaps are always recomputed from the scores, never adjusted
// incrementally.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::topics::CanonicalTopic;

/// Policy and sentiment score for one topic. Either may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicScores {
    pub policy: Option<f64>,
    pub sentiment: Option<f64>,
}

impl TopicScores {
    /// `|policy - sentiment|` when both are known.
    pub fn gap(&self) -> Option<f64> {
        match (self.policy, self.sentiment) {
            (Some(p), Some(s)) => Some((p - s).abs()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionAggregate {
    pub region_name: String,
    pub topic_scores: IndexMap<CanonicalTopic, TopicScores>,
    pub policy_avg_score: Option<f64>,
    pub sentiment_avg_score: Option<f64>,
    pub gap_score: f64,
    pub updated_at: Option<String>,
}

impl RegionAggregate {
    pub fn new(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            ..Default::default()
        }
    }

    /// Scores for a topic (all unknown if the topic has no entry).
    pub fn scores(&self, topic: CanonicalTopic) -> TopicScores {
        self.topic_scores.get(&topic).copied().unwrap_or_default()
    }

    pub fn set_policy_score(&mut self, topic: CanonicalTopic, score: f64) {
        self.topic_scores.entry(topic).or_default().policy = Some(score);
    }

    pub fn set_sentiment_score(&mut self, topic: CanonicalTopic, score: f64) {
        self.topic_scores.entry(topic).or_default().sentiment = Some(score);
    }

    /// Recompute the overall gap. Stored averages are used as-is; a missing
    /// average is derived from the per-topic scores. Returns the new gap.
    pub fn recalculate(&mut self) -> f64 {
        let policy = self
            .policy_avg_score
            .or_else(|| mean_of(self.topic_scores.values().filter_map(|s| s.policy)));
        let sentiment = self
            .sentiment_avg_score
            .or_else(|| mean_of(self.topic_scores.values().filter_map(|s| s.sentiment)));
        self.gap_score = calculate_gap(policy, sentiment);
        self.gap_score
    }

    /// Replace both averages with the mean of the per-topic scores (where
    /// any exist). Used after a topic score changes.
    pub fn refresh_averages(&mut self) {
        if let Some(avg) = mean_of(self.topic_scores.values().filter_map(|s| s.policy)) {
            self.policy_avg_score = Some(avg);
        }
        if let Some(avg) = mean_of(self.topic_scores.values().filter_map(|s| s.sentiment)) {
            self.sentiment_avg_score = Some(avg);
        }
    }
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Gap between a policy score and a sentiment score.
///
/// A missing score yields 0.0 so regions without sentiment data sort to the
/// bottom instead of failing the whole recalculation.
pub fn calculate_gap(policy_score: Option<f64>, sentiment_score: Option<f64>) -> f64 {
    match (policy_score, sentiment_score) {
        (Some(p), Some(s)) => (p - s).abs(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_gap() {
        assert!((calculate_gap(Some(82.5), Some(40.2)) - 42.3).abs() < 1e-9);
        assert!((calculate_gap(Some(40.0), Some(82.0)) - 42.0).abs() < 1e-9);
        assert_eq!(calculate_gap(None, Some(10.0)), 0.0);
        assert_eq!(calculate_gap(Some(10.0), None), 0.0);
    }

    #[test]
    fn test_topic_scores_gap_requires_both() {
        let scores = TopicScores {
            policy: Some(70.0),
            sentiment: None,
        };
        assert_eq!(scores.gap(), None);
    }

    #[test]
    fn test_recalculate_derives_missing_averages() {
        let mut region = RegionAggregate::new("부산");
        region.set_policy_score(CanonicalTopic::Healthcare, 80.0);
        region.set_policy_score(CanonicalTopic::LaborEconomy, 60.0);
        region.set_sentiment_score(CanonicalTopic::Healthcare, 50.0);

        let gap = region.recalculate();
        assert!((gap - 20.0).abs() < 1e-9);
        // Only the gap is written
        assert_eq!(region.policy_avg_score, None);
        assert_eq!(region.sentiment_avg_score, None);
    }

    #[test]
    fn test_refresh_averages() {
        let mut region = RegionAggregate::new("대전");
        region.policy_avg_score = Some(76.0);
        region.set_sentiment_score(CanonicalTopic::Healthcare, 40.0);
        region.set_sentiment_score(CanonicalTopic::HousingEnvironment, 60.0);

        region.refresh_averages();
        // No per-topic policy scores: stored policy average is kept
        assert_eq!(region.policy_avg_score, Some(76.0));
        assert_eq!(region.sentiment_avg_score, Some(50.0));
    }

    #[test]
    fn test_recalculate_keeps_stored_averages_without_topic_scores() {
        let mut region = RegionAggregate::new("제주");
        region.policy_avg_score = Some(74.2);
        region.sentiment_avg_score = Some(66.3);
        let gap = region.recalculate();
        assert!((gap - 7.9).abs() < 1e-9);
    }
}
