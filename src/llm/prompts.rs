// Prompt builders and structured reply types.
//
// Wording is free to change; the JSON field names in the replies are what
// downstream consumers rely on.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::SimilarityResult;

pub const ANALYST_SYSTEM: &str =
    "You are an expert in social policy and public opinion analysis for Korean local governments.";
pub const PLANNER_SYSTEM: &str = "You are an expert in regional policy analysis and planning.";

/// Reply to the diagnosis prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReply {
    pub problem_summary: String,
    pub scarcity_insight: String,
}

/// Reply to the action recommendation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReply {
    pub rag_action_card: String,
    #[serde(default)]
    pub reference_regions: Vec<String>,
    #[serde(default)]
    pub reference_policies: Vec<String>,
}

/// Parse a JSON reply, tolerating a markdown code fence around it.
pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(body).with_context(|| {
        format!(
            "Model reply was not the expected JSON: {}",
            crate::output::truncate_chars(body, 200)
        )
    })
}

pub fn diagnosis_prompt(
    region: &str,
    topics: &str,
    record_count: u32,
    activity: &str,
    texts: &[String],
) -> String {
    format!(
        "You are the policy analysis engine of the Welling project.\n\
         Diagnose the problems of the region below from its citizen opinions.\n\n\
         [Region] {region}\n\
         [Topics with the largest policy/sentiment gap] {topics}\n\
         [Number of opinions] {record_count} ({activity})\n\
         [Opinions]\n{}\n\n\
         1. Summarize the residents' core complaints in 3-4 lines as \"problem_summary\".\n\
         2. Judge how active or scarce public opinion is from the number of opinions, as \"scarcity_insight\".\n\n\
         Return only JSON: {{\"problem_summary\": \"...\", \"scarcity_insight\": \"...\"}}",
        texts.join("\n")
    )
}

pub fn action_prompt(
    region: &str,
    topic: &str,
    similar_regions: &[SimilarityResult],
    policies: &[SimilarityResult],
) -> String {
    let region_refs: Vec<String> = similar_regions
        .iter()
        .map(|r| format!("- {} (similarity {:.3})", r.candidate_id, r.score))
        .collect();
    let policy_refs: Vec<String> = policies
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[Reference policy {}] {}", i + 1, p.candidate_id))
        .collect();

    format!(
        "You are the policy analysis engine of the Welling project.\n\
         Propose an actionable policy improvement for '{region}'.\n\n\
         [Region] {region}\n\
         [Key topic] {topic}\n\n\
         [Regions most similar on this topic]\n{}\n\n\
         [Reference policy documents]\n{}\n\n\
         1. Analyze what made the other regions' policies work and adapt it to {region}.\n\
         2. Write a 1-2 line actionable \"rag_action_card\" grounded in those regions and documents.\n\n\
         Return only JSON: {{\"rag_action_card\": \"...\", \"reference_regions\": [\"...\"], \"reference_policies\": [\"...\"]}}",
        region_refs.join("\n"),
        policy_refs.join("\n"),
    )
}

pub fn citizen_summary_prompt(region: &str, topic: &str) -> String {
    format!(
        "Analyze citizen opinion about '{topic}' in '{region}' and summarize the main complaints in 2-3 sentences."
    )
}

/// `policies` are (name, description) pairs.
pub fn proposal_prompt(
    region: &str,
    topic: &str,
    citizen_summary: &str,
    policies: &[(String, String)],
) -> String {
    let examples: Vec<String> = policies
        .iter()
        .map(|(name, description)| format!("- {name}: {description}"))
        .collect();
    format!(
        "Citizen complaints about '{topic}' in '{region}':\n{citizen_summary}\n\n\
         Similar policy examples:\n{}\n\n\
         Based on this, propose a direction for improving policy.",
        examples.join("\n")
    )
}
