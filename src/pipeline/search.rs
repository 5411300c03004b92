// Summary embeddings and semantic search over stored summaries.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::models::RagSummary;
use crate::db::Database;
use crate::engine::cosine_similarity;
use crate::llm::Embedder;

/// Fill in summary embeddings. Only the first `limit` summaries (by ID) are
/// considered; without `force`, summaries that already have an embedding are
/// left alone. Returns the number of embeddings written.
pub async fn reindex_embeddings(
    db: &dyn Database,
    embedder: &dyn Embedder,
    limit: Option<usize>,
    force: bool,
) -> Result<usize> {
    let summaries = db.list_summaries(None).await?;
    let pending: Vec<RagSummary> = summaries
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .filter(|s| force || s.embedding.is_none())
        .collect();

    if pending.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = pending.iter().map(|s| s.summary.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != pending.len() {
        anyhow::bail!(
            "Embedder returned {} vectors for {} summaries",
            vectors.len(),
            pending.len()
        );
    }

    for (summary, vector) in pending.iter().zip(vectors.iter()) {
        db.set_summary_embedding(summary.id, vector).await?;
    }

    info!(updated = pending.len(), force, "Reindexed summary embeddings");
    Ok(pending.len())
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub summary: RagSummary,
    pub score: f64,
}

/// Embed `query` and rank stored summaries by cosine similarity. Summaries
/// without an embedding are embedded (and stored) first. Summaries embedded
/// with a different dimension are skipped.
pub async fn search_summaries(
    db: &dyn Database,
    embedder: &dyn Embedder,
    query: &str,
    region: Option<&str>,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    let mut summaries = db.list_summaries(region).await?;
    if summaries.is_empty() {
        return Ok(Vec::new());
    }

    let missing: Vec<usize> = summaries
        .iter()
        .enumerate()
        .filter(|(_, s)| s.embedding.is_none())
        .map(|(i, _)| i)
        .collect();
    if !missing.is_empty() {
        let texts: Vec<String> = missing.iter().map(|&i| summaries[i].summary.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != missing.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} summaries",
                vectors.len(),
                missing.len()
            );
        }
        for (&i, vector) in missing.iter().zip(vectors) {
            db.set_summary_embedding(summaries[i].id, &vector).await?;
            summaries[i].embedding = Some(vector);
        }
    }

    let query_vector = embedder.embed(query).await?;

    let mut hits = Vec::new();
    for summary in summaries {
        let Some(embedding) = summary.embedding.as_deref() else {
            continue;
        };
        if embedding.len() != query_vector.len() {
            debug!(id = summary.id, "Embedding dimension differs from query, skipping");
            continue;
        }
        let score = cosine_similarity(&query_vector, embedding)?;
        hits.push(SearchHit { summary, score });
    }

    // Descending by score, then oldest first
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.summary.id.cmp(&b.summary.id))
    });
    hits.truncate(top_k);
    Ok(hits)
}
