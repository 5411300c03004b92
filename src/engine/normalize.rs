// VectorSet normalizer — the single place where raw input shape is decided.
//
// Vector files come in two shapes:
//
//   list: [{"topic": "주거/환경", "vector": [...], "label": -1}, ...]
//         one record per citizen utterance, optionally labeled with polarity
//   map:  {"주거/환경": {"vector": [...], "weight": 12, "gap_score": 4.0}, ...}
//         already aggregated per topic; a value may also be a bare vector
//
// The JSON is resolved into `RawVectorInput` once; everything downstream
// only sees a VectorSet.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::aggregate::aggregate_topics;
use super::error::{EngineError, Result};
use super::vector_set::{TopicVector, VectorSet};

/// One utterance record from a list-shaped file. Missing fields are
/// tolerated here and filtered during normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub vector: Option<Vec<f64>>,
    /// Polarity: positive > 0, negative < 0, neutral 0.
    #[serde(default)]
    pub label: Option<f64>,
}

/// One topic entry from a map-shaped file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTopicEntry {
    Bare(Vec<f64>),
    Detailed {
        vector: Vec<f64>,
        #[serde(default)]
        weight: Option<f64>,
        #[serde(default)]
        gap_score: Option<f64>,
    },
}

impl RawTopicEntry {
    fn into_parts(self) -> (Vec<f64>, Option<f64>, Option<f64>) {
        match self {
            RawTopicEntry::Bare(vector) => (vector, None, None),
            RawTopicEntry::Detailed {
                vector,
                weight,
                gap_score,
            } => (vector, weight, gap_score),
        }
    }
}

/// Raw vector input, discriminated by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawVectorInput {
    List(Vec<RawRecord>),
    Map(IndexMap<String, RawTopicEntry>),
}

impl RawVectorInput {
    /// Decide the shape of a parsed JSON document.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => serde_json::from_value(value)
                .map(RawVectorInput::List)
                .map_err(|e| EngineError::InvalidFormat(format!("bad record list: {e}"))),
            Value::Object(_) => serde_json::from_value(value)
                .map(RawVectorInput::Map)
                .map_err(|e| EngineError::InvalidFormat(format!("bad topic mapping: {e}"))),
            other => Err(EngineError::InvalidFormat(format!(
                "expected a list or mapping, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Normalize raw input into a canonical VectorSet.
pub fn normalize(raw: RawVectorInput) -> Result<VectorSet> {
    match raw {
        RawVectorInput::Map(entries) => normalize_map(entries),
        RawVectorInput::List(records) => normalize_list(records),
    }
}

/// Parse and normalize in one step.
pub fn normalize_json(value: Value) -> Result<VectorSet> {
    normalize(RawVectorInput::from_json(value)?)
}

fn normalize_map(entries: IndexMap<String, RawTopicEntry>) -> Result<VectorSet> {
    let mut topics = Vec::with_capacity(entries.len());

    for (label, entry) in entries {
        let (vector, weight, gap) = entry.into_parts();
        if vector.is_empty() {
            return Err(EngineError::InvalidFormat(format!(
                "topic '{label}' has an empty vector"
            )));
        }
        topics.push(TopicVector {
            topic_label: label,
            vector,
            weight: weight.unwrap_or(1.0),
            gap,
        });
    }

    VectorSet::from_topics(topics)
}

#[derive(Default)]
struct Polarity {
    positive: u32,
    negative: u32,
    labeled: bool,
}

fn normalize_list(records: Vec<RawRecord>) -> Result<VectorSet> {
    let total = records.len();
    let mut grouped: IndexMap<String, Vec<Vec<f64>>> = IndexMap::new();
    let mut polarity: IndexMap<String, Polarity> = IndexMap::new();

    for record in records {
        let Some(topic) = record.topic.filter(|t| !t.trim().is_empty()) else {
            continue;
        };

        if let Some(label) = record.label {
            let stats = polarity.entry(topic.clone()).or_default();
            stats.labeled = true;
            if label > 0.0 {
                stats.positive += 1;
            } else if label < 0.0 {
                stats.negative += 1;
            }
        }

        match record.vector {
            Some(vector) if !vector.is_empty() => {
                grouped.entry(topic).or_default().push(vector);
            }
            _ => {}
        }
    }

    let kept: usize = grouped.values().map(Vec::len).sum();
    debug!(
        records = total,
        kept = kept,
        topics = grouped.len(),
        "Grouped list-shaped vector records"
    );

    let mut topics = aggregate_topics(&grouped)?;
    for topic in &mut topics {
        if let Some(stats) = polarity.get(&topic.topic_label) {
            if stats.labeled {
                topic.gap = Some(f64::from(stats.negative) - f64::from(stats.positive));
            }
        }
    }

    VectorSet::from_topics(topics)
}
