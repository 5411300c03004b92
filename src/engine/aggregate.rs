// Topic aggregation — mean vector per topic.
//
// A region's opinion file holds one embedding per utterance. Averaging the
// embeddings of a topic produces a stable centroid for what citizens say
// about it; the number of utterances rides along as the topic weight so
// callers can tell a busy topic from a quiet one.

use indexmap::IndexMap;
use tracing::debug;

use super::error::{EngineError, Result};
use super::vector_set::{TopicVector, VectorSet};

/// Element-wise arithmetic mean of equally sized vectors.
///
/// Returns `None` for an empty slice; there is no meaningful zero-length
/// placeholder for a topic with no data.
pub fn mean_vector(vectors: &[Vec<f64>]) -> Result<Option<Vec<f64>>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };

    let dim = first.len();
    let mut mean = vec![0.0_f64; dim];

    for vector in vectors {
        if vector.len() != dim {
            return Err(EngineError::DimensionMismatch {
                expected: dim,
                found: vector.len(),
            });
        }
        for (slot, &val) in mean.iter_mut().zip(vector) {
            *slot += val;
        }
    }

    let n = vectors.len() as f64;
    for val in &mut mean {
        *val /= n;
    }

    Ok(Some(mean))
}

/// Aggregate grouped per-utterance vectors into a VectorSet.
///
/// Topics keep their first-seen order. Topics with no vectors are dropped.
pub fn aggregate(grouped: &IndexMap<String, Vec<Vec<f64>>>) -> Result<VectorSet> {
    VectorSet::from_topics(aggregate_topics(grouped)?)
}

/// Mean vector and sample-count weight per non-empty topic.
pub(crate) fn aggregate_topics(
    grouped: &IndexMap<String, Vec<Vec<f64>>>,
) -> Result<Vec<TopicVector>> {
    let mut topics = Vec::with_capacity(grouped.len());

    for (topic, vectors) in grouped {
        let Some(mean) = mean_vector(vectors)? else {
            continue;
        };
        topics.push(TopicVector {
            topic_label: topic.clone(),
            vector: mean,
            weight: vectors.len() as f64,
            gap: None,
        });
    }

    debug!(topics = topics.len(), "Aggregated topic vectors");

    Ok(topics)
}
