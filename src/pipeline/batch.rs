// Batch pipeline — proposals for the regions with the largest gaps.
//
// For each of the top regions by stored gap, every canonical topic found in
// the region's vector file gets a citizen-complaint summary, the closest
// policies from the corpus, and a final proposal. Results are written to
// `<output_dir>/rag_pipeline_result.json` and saved as summaries in the
// store so semantic search can find them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::action::{compatible_policies, REFERENCE_COUNT};
use crate::db::Database;
use crate::engine::{rank_policies, CanonicalTopic, KeyReconciler, PolicyDocument};
use crate::files::VectorFiles;
use crate::llm::prompts;
use crate::llm::TextGenerator;

pub const RESULT_FILE: &str = "rag_pipeline_result.json";

/// Topic order of the batch run.
const BATCH_TOPICS: [CanonicalTopic; 5] = [
    CanonicalTopic::HousingEnvironment,
    CanonicalTopic::TransportInfra,
    CanonicalTopic::Healthcare,
    CanonicalTopic::PolicyEfficiency,
    CanonicalTopic::LaborEconomy,
];

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// How many top-gap regions to process
    pub regions: u32,
    /// Topic jobs in flight at once
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            regions: 3,
            concurrency: 4,
        }
    }
}

/// One region/topic result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub region: String,
    pub topic: String,
    pub citizen_summary: String,
    pub policy_examples: Vec<String>,
    pub final_summary: String,
}

#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    /// Region/topic pairs with no usable vector, or whose generation failed
    pub skipped: usize,
    pub saved_to: PathBuf,
}

struct TopicJob {
    index: usize,
    region: String,
    topic: CanonicalTopic,
    vector: Vec<f64>,
}

pub async fn run(
    db: &dyn Database,
    files: &VectorFiles,
    reconciler: &KeyReconciler,
    generator: &dyn TextGenerator,
    output_dir: &Path,
    options: BatchOptions,
) -> Result<BatchReport> {
    let regions = db.regions_by_gap(options.regions).await?;
    if regions.is_empty() {
        anyhow::bail!("No regions in the database. Record sentiment or import regions first.");
    }
    info!(count = regions.len(), "Loaded top regions by gap");

    let corpus = files.load_policy_corpus()?;

    // Step 1: resolve every region/topic vector up front
    let mut jobs = Vec::new();
    let mut skipped = 0;
    for region in &regions {
        let set = match files.load_region(&region.region_name) {
            Ok(set) => set,
            Err(e) => {
                warn!(region = %region.region_name, error = %e, "No vectors for region, skipping");
                skipped += BATCH_TOPICS.len();
                continue;
            }
        };

        for topic in BATCH_TOPICS {
            let vector = reconciler
                .resolve(topic.aliases(), set.labels())
                .and_then(|label| set.get(&label).map(|tv| tv.vector.clone()));
            match vector {
                Some(vector) => jobs.push(TopicJob {
                    index: jobs.len(),
                    region: region.region_name.clone(),
                    topic,
                    vector,
                }),
                None => {
                    warn!(region = %region.region_name, topic = topic.key(), "Topic vector not found");
                    skipped += 1;
                }
            }
        }
    }

    // Step 2: generate in parallel
    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("  Proposals [{bar:30}] {pos}/{len} ({eta})")?);

    let corpus = &corpus;
    let pb_ref = &pb;
    let mut results: Vec<(usize, Result<BatchItem>)> = stream::iter(jobs.into_iter().map(|job| async move {
        let index = job.index;
        let result = process_topic(generator, corpus, job).await;
        pb_ref.inc(1);
        (index, result)
    }))
    .buffer_unordered(options.concurrency.max(1))
    .collect()
    .await;
    pb.finish_and_clear();

    // Step 3: restore job order, persist sequentially
    results.sort_by_key(|(index, _)| *index);
    let mut items = Vec::with_capacity(results.len());
    for (_, result) in results {
        match result {
            Ok(item) => {
                db.save_summary(
                    Some(item.region.as_str()),
                    &item.topic,
                    &item.final_summary,
                    &item.policy_examples,
                )
                .await?;
                items.push(item);
            }
            Err(e) => {
                warn!(error = %e, "Proposal generation failed, skipping");
                skipped += 1;
            }
        }
    }

    let saved_to = write_results(output_dir, &items)?;
    info!(items = items.len(), skipped, path = %saved_to.display(), "Batch pipeline complete");

    Ok(BatchReport {
        items,
        skipped,
        saved_to,
    })
}

async fn process_topic(
    generator: &dyn TextGenerator,
    corpus: &[PolicyDocument],
    job: TopicJob,
) -> Result<BatchItem> {
    let topic_label = job.topic.korean();

    let citizen_summary = generator
        .generate(
            prompts::ANALYST_SYSTEM,
            &prompts::citizen_summary_prompt(&job.region, topic_label),
        )
        .await
        .with_context(|| format!("Citizen summary failed for {} / {topic_label}", job.region))?;

    let candidates = compatible_policies(corpus, job.vector.len());
    let ranked = rank_policies(&job.vector, &candidates, REFERENCE_COUNT)?;
    let policies: Vec<(String, String)> = ranked
        .iter()
        .map(|r| {
            let description = candidates
                .iter()
                .find(|doc| doc.name == r.candidate_id)
                .and_then(|doc| doc.description.clone())
                .unwrap_or_default();
            (r.candidate_id.clone(), description)
        })
        .collect();

    let final_summary = generator
        .generate(
            prompts::PLANNER_SYSTEM,
            &prompts::proposal_prompt(&job.region, topic_label, &citizen_summary, &policies),
        )
        .await
        .with_context(|| format!("Proposal failed for {} / {topic_label}", job.region))?;

    Ok(BatchItem {
        region: job.region,
        topic: topic_label.to_string(),
        citizen_summary,
        policy_examples: policies.into_iter().map(|(name, _)| name).collect(),
        final_summary,
    })
}

fn write_results(output_dir: &Path, items: &[BatchItem]) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join(RESULT_FILE);
    let json = serde_json::to_string_pretty(items)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
