// VectorSet — the canonical per-topic vector mapping for one region or one
// policy corpus.
//
// A VectorSet is only ever produced by the normalizer or the aggregator, both
// of which check that every topic vector has the same dimension. There is no
// mutating API after construction.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};

/// One topic's representative vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicVector {
    pub topic_label: String,
    pub vector: Vec<f64>,
    /// Confidence / activity signal. For aggregated sets this is the number
    /// of source vectors.
    pub weight: f64,
    /// Gap carried by the source, either a literal `gap_score` or the
    /// polarity-count gap of labeled opinions.
    pub gap: Option<f64>,
}

/// Insertion-ordered mapping `topic_label -> TopicVector` with a single
/// vector dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VectorSet {
    topics: IndexMap<String, TopicVector>,
    dimension: Option<usize>,
}

impl VectorSet {
    /// Build a set from topic vectors, checking the shared dimension.
    ///
    /// Later entries with a label already seen replace the earlier one but
    /// keep its position.
    pub fn from_topics(topics: impl IntoIterator<Item = TopicVector>) -> Result<Self> {
        let mut map: IndexMap<String, TopicVector> = IndexMap::new();
        let mut dimension: Option<usize> = None;

        for topic in topics {
            let found = topic.vector.len();
            match dimension {
                None => dimension = Some(found),
                Some(expected) if expected != found => {
                    return Err(EngineError::DimensionMismatch { expected, found });
                }
                Some(_) => {}
            }
            map.insert(topic.topic_label.clone(), topic);
        }

        Ok(Self {
            topics: map,
            dimension,
        })
    }

    pub fn get(&self, label: &str) -> Option<&TopicVector> {
        self.topics.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.topics.contains_key(label)
    }

    /// Topic labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicVector> {
        self.topics.values()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// The shared vector dimension (`None` for an empty set).
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// The set in the map-shaped file format the normalizer reads.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .topics
            .iter()
            .map(|(label, tv)| {
                let mut entry = serde_json::json!({ "vector": tv.vector, "weight": tv.weight });
                if let Some(gap) = tv.gap {
                    entry["gap_score"] = serde_json::json!(gap);
                }
                (label.clone(), entry)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<'a> IntoIterator for &'a VectorSet {
    type Item = &'a TopicVector;
    type IntoIter = indexmap::map::Values<'a, String, TopicVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.topics.values()
    }
}
