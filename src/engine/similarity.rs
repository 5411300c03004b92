// Similarity matcher — cosine ranking of candidate vectors.
//
// Used two ways: "which other regions talk about this topic the way we do"
// (candidates are other regions' vectors for the same topic) and "which
// policy documents are closest to this topic" (candidates are policy
// embeddings).

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{EngineError, Result};
use super::reconcile::KeyReconciler;
use super::vector_set::VectorSet;

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Region name or policy name.
    pub candidate_id: String,
    /// Cosine similarity in [-1, 1].
    pub score: f64,
}

/// A policy document embedding from the policy corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub vector: Vec<f64>,
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm (including empty vectors).
/// Vectors of different length are an input error rather than a silent 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom == 0.0 {
        Ok(0.0)
    } else {
        Ok((dot / denom).clamp(-1.0, 1.0))
    }
}

/// Descending by score, then ascending by id.
fn by_score_then_id(a: &SimilarityResult, b: &SimilarityResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

/// Rank candidates by cosine similarity to `query`.
///
/// `exclude_id` drops the query's own source from the pool. An empty pool
/// gives an empty result.
pub fn rank_similar<I, S, V>(
    query: &[f64],
    candidates: I,
    top_k: usize,
    exclude_id: Option<&str>,
) -> Result<Vec<SimilarityResult>>
where
    I: IntoIterator<Item = (S, V)>,
    S: Into<String>,
    V: AsRef<[f64]>,
{
    let mut results = Vec::new();

    for (id, vector) in candidates {
        let id: String = id.into();
        if exclude_id == Some(id.as_str()) {
            continue;
        }
        let score = cosine_similarity(query, vector.as_ref())?;
        results.push(SimilarityResult {
            candidate_id: id,
            score,
        });
    }

    results.sort_by(by_score_then_id);
    results.truncate(top_k);

    Ok(results)
}

/// Rank other regions by how close their vector for the same topic is to
/// `query`.
///
/// Each region labels its topics its own way, so the topic is resolved in
/// every candidate set through the reconciler using `topic_aliases`. Regions
/// where the topic cannot be resolved are skipped; partial cross-region data
/// is normal.
pub fn rank_similar_regions(
    query: &[f64],
    topic_aliases: &[String],
    pool: &IndexMap<String, VectorSet>,
    self_region: &str,
    reconciler: &KeyReconciler,
    top_k: usize,
) -> Result<Vec<SimilarityResult>> {
    let mut candidates: Vec<(String, &[f64])> = Vec::with_capacity(pool.len());

    for (region, set) in pool {
        if region == self_region {
            continue;
        }
        match reconciler.resolve(topic_aliases, set.labels()) {
            Some(label) => {
                if let Some(topic) = set.get(&label) {
                    candidates.push((region.clone(), topic.vector.as_slice()));
                }
            }
            None => {
                debug!(region = %region, "Topic not resolvable in region, skipping");
            }
        }
    }

    rank_similar(query, candidates, top_k, Some(self_region))
}

/// Rank policy documents against a topic vector.
pub fn rank_policies(
    query: &[f64],
    corpus: &[PolicyDocument],
    top_k: usize,
) -> Result<Vec<SimilarityResult>> {
    rank_similar(
        query,
        corpus.iter().map(|doc| (doc.name.clone(), doc.vector.as_slice())),
        top_k,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-10);
    }

    #[test]
    fn test_cosine_proportional() {
        // Same direction, different magnitudes
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_opposite_is_negative() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let a = vec![1.0, 3.0, -2.0, 0.5];
        let b = vec![2.0, -1.0, 4.0, 0.0];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_rank_ties_break_by_id() {
        let results = rank_similar(
            &[1.0, 0.0],
            vec![("b", vec![2.0, 0.0]), ("a", vec![1.0, 0.0]), ("c", vec![0.0, 1.0])],
            3,
            None,
        )
        .unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rank_excludes_self() {
        let results = rank_similar(
            &[1.0, 0.0],
            vec![("Seoul", vec![1.0, 0.0]), ("Busan", vec![0.5, 0.5])],
            5,
            Some("Seoul"),
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate_id, "Busan");
    }

    #[test]
    fn test_rank_policies_uses_names() {
        let corpus = vec![
            PolicyDocument {
                name: "Youth housing subsidy".to_string(),
                description: None,
                vector: vec![0.0, 1.0],
            },
            PolicyDocument {
                name: "Night bus expansion".to_string(),
                description: Some("Late-night bus routes".to_string()),
                vector: vec![1.0, 0.1],
            },
        ];
        let results = rank_policies(&[1.0, 0.0], &corpus, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate_id, "Night bus expansion");
    }
}
