// Action recommendation — turn a region's largest gap into a concrete
// policy proposal, grounded in similar regions and policy documents.
//
// Steps: rank the region's topics by gap, take the top one, compare that
// topic's vector against every other region and the policy corpus, then
// ask the model for an action card citing the closest matches.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{
    aliases_for, rank_policies, rank_similar_regions, GapRanker, GapSource, PolicyDocument,
    SimilarityResult, VectorSet,
};
use crate::files::VectorFiles;
use crate::llm::prompts::{self, ActionReply};
use crate::llm::TextGenerator;

/// Similar regions and policies cited per recommendation.
pub const REFERENCE_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ActionRecommendation {
    pub region: String,
    pub main_topic: String,
    pub related_regions: Vec<SimilarityResult>,
    pub similar_policies: Vec<SimilarityResult>,
    pub result: ActionReply,
}

/// Policy documents whose embedding has the given dimension. Documents
/// embedded with a different model can't be compared and are dropped.
pub(crate) fn compatible_policies(corpus: &[PolicyDocument], dimension: usize) -> Vec<PolicyDocument> {
    let compatible: Vec<PolicyDocument> = corpus
        .iter()
        .filter(|doc| doc.vector.len() == dimension)
        .cloned()
        .collect();
    let dropped = corpus.len() - compatible.len();
    if dropped > 0 {
        warn!(dropped, dimension, "Skipping policies with a different embedding dimension");
    }
    compatible
}

/// Drop region sets whose dimension differs from the query vector.
fn compatible_regions(
    mut pool: IndexMap<String, VectorSet>,
    dimension: usize,
) -> IndexMap<String, VectorSet> {
    pool.retain(|region, set| {
        let keep = set.dimension() == Some(dimension);
        if !keep {
            warn!(region = %region, "Skipping region with a different embedding dimension");
        }
        keep
    });
    pool
}

pub async fn recommend_action(
    files: &VectorFiles,
    ranker: &GapRanker,
    generator: &dyn TextGenerator,
    region: &str,
) -> Result<ActionRecommendation> {
    let set = files.load_region(region)?;

    let top = ranker
        .top_gap_topics(GapSource::Vectors(&set), 1)?
        .into_iter()
        .next()
        .with_context(|| format!("Region '{region}' has no topics"))?;

    let mut targets = aliases_for(&top.topic_label);
    if let Some(alt) = &top.topic_label_alt {
        targets.push(alt.clone());
    }

    let main_topic = ranker
        .reconciler()
        .resolve(&targets, set.labels())
        .with_context(|| format!("Topic '{}' not found in region '{region}'", top.topic_label))?;
    let query = set
        .get(&main_topic)
        .map(|tv| tv.vector.clone())
        .with_context(|| format!("Topic '{main_topic}' has no vector"))?;

    // Exclude the region under its pool key, not the spelling that was typed
    let self_id = files
        .region_id(region)
        .unwrap_or_else(|| region.to_string());
    let pool = compatible_regions(files.load_region_pool()?, query.len());
    let related_regions = rank_similar_regions(
        &query,
        &targets,
        &pool,
        &self_id,
        ranker.reconciler(),
        REFERENCE_COUNT,
    )?;

    let corpus = compatible_policies(&files.load_policy_corpus()?, query.len());
    let similar_policies = rank_policies(&query, &corpus, REFERENCE_COUNT)?;

    let prompt = prompts::action_prompt(region, &main_topic, &related_regions, &similar_policies);
    let raw = generator
        .generate_json(prompts::PLANNER_SYSTEM, &prompt)
        .await?;
    let result: ActionReply = prompts::parse_reply(&raw)?;

    info!(
        region,
        topic = %main_topic,
        regions = related_regions.len(),
        policies = similar_policies.len(),
        "Action recommendation complete"
    );

    Ok(ActionRecommendation {
        region: region.to_string(),
        main_topic,
        related_regions,
        similar_policies,
        result,
    })
}
