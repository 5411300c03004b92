// Diagnosis — summarize a region's problems from its recorded opinions.

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::engine::{GapRanker, GapSource};
use crate::files::VectorFiles;
use crate::llm::prompts::{self, DiagnosisReply};
use crate::llm::TextGenerator;

/// Opinions sent to the model per diagnosis.
const MAX_TEXTS: u32 = 30;
/// Gap topics named in the prompt.
const TOP_TOPICS: usize = 3;
/// Used when the region's gap topics can't be determined.
pub const FALLBACK_TOPICS: &str = "transport, housing, healthcare and daily life in general";

/// How much public opinion a region has produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    VeryActive,
    Moderate,
    Scarce,
}

impl ActivityLevel {
    pub fn from_count(record_count: u32) -> Self {
        if record_count > 50 {
            ActivityLevel::VeryActive
        } else if record_count > 20 {
            ActivityLevel::Moderate
        } else {
            ActivityLevel::Scarce
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActivityLevel::VeryActive => "public opinion is very active",
            ActivityLevel::Moderate => "some public opinion activity exists",
            ActivityLevel::Scarce => "opinion data is scarce or information access is low",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub region: String,
    pub top_topics: String,
    pub record_count: u32,
    pub activity: ActivityLevel,
    pub result: DiagnosisReply,
}

/// Comma-separated top gap topics for a region, or the fallback description
/// when the region's vectors can't be loaded or ranked.
pub fn top_topic_description(files: &VectorFiles, ranker: &GapRanker, region: &str) -> String {
    let ranked = files.load_region(region).and_then(|set| {
        ranker
            .top_gap_topics(GapSource::Vectors(&set), TOP_TOPICS)
            .map_err(anyhow::Error::from)
    });

    match ranked {
        Ok(records) if !records.is_empty() => records
            .iter()
            .map(|r| r.topic_label.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Ok(_) => FALLBACK_TOPICS.to_string(),
        Err(e) => {
            warn!(region, error = %e, "Could not rank gap topics, using fallback");
            FALLBACK_TOPICS.to_string()
        }
    }
}

pub async fn diagnose(
    db: &dyn Database,
    files: &VectorFiles,
    ranker: &GapRanker,
    generator: &dyn TextGenerator,
    region: &str,
) -> Result<Diagnosis> {
    let record_count = db.count_sentiment_logs(region).await?;
    if record_count == 0 {
        anyhow::bail!("No opinion data recorded for region '{region}'");
    }

    let texts: Vec<String> = db
        .get_sentiment_logs(region, MAX_TEXTS)
        .await?
        .into_iter()
        .map(|log| log.text)
        .filter(|text| !text.trim().is_empty())
        .collect();

    let top_topics = top_topic_description(files, ranker, region);
    let activity = ActivityLevel::from_count(record_count);

    let prompt = prompts::diagnosis_prompt(
        region,
        &top_topics,
        record_count,
        &activity.to_string(),
        &texts,
    );
    let raw = generator
        .generate_json(prompts::ANALYST_SYSTEM, &prompt)
        .await?;
    let result: DiagnosisReply = prompts::parse_reply(&raw)?;

    info!(region, record_count, topics = %top_topics, "Diagnosis complete");

    Ok(Diagnosis {
        region: region.to_string(),
        top_topics,
        record_count,
        activity,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_level_boundaries() {
        assert_eq!(ActivityLevel::from_count(51), ActivityLevel::VeryActive);
        assert_eq!(ActivityLevel::from_count(50), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_count(21), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_count(20), ActivityLevel::Scarce);
        assert_eq!(ActivityLevel::from_count(1), ActivityLevel::Scarce);
    }

    #[test]
    fn test_missing_region_file_uses_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let files = VectorFiles::new(tmp.path());
        let description = top_topic_description(&files, &GapRanker::default(), "nowhere");
        assert_eq!(description, FALLBACK_TOPICS);
    }
}
