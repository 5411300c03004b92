// Vector files — loading region vector sets, the policy corpus, and the
// precomputed gap table from the files directory.
//
// Region files come from several export runs and aren't named consistently,
// so lookups try a fixed list of spellings before giving up.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{normalize_json, GapTable, PolicyDocument, VectorSet};

/// Suffix of the canonical region vector file.
const REGION_SUFFIX: &str = "_vectors_e5.json";
const POLICY_FILE: &str = "policy_vectors.json";
const GAP_TABLE_FILE: &str = "gap_table.json";

/// Read-only view over the files directory.
#[derive(Debug, Clone)]
pub struct VectorFiles {
    dir: PathBuf,
}

impl VectorFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names tried for a region, in order.
    fn region_candidates(&self, region: &str) -> Vec<PathBuf> {
        [
            format!("{region}{REGION_SUFFIX}"),
            format!("{region}_vectors.json"),
            format!("{region}.json"),
            format!("{}{REGION_SUFFIX}", region.to_lowercase()),
            format!("{}{REGION_SUFFIX}", capitalize(region)),
        ]
        .into_iter()
        .map(|name| self.dir.join(name))
        .collect()
    }

    /// Path of the first existing vector file for a region.
    pub fn region_path(&self, region: &str) -> Option<PathBuf> {
        self.region_candidates(region)
            .into_iter()
            .find(|path| path.is_file())
    }

    /// The region id of the file a name resolves to, i.e. the on-disk name
    /// with the vector file suffix removed. This is the key the region pool
    /// uses, which may differ in case from what was asked for.
    pub fn region_id(&self, region: &str) -> Option<String> {
        let path = self.region_path(region)?;
        let name = path.file_name()?.to_str()?;
        [REGION_SUFFIX, "_vectors.json", ".json"]
            .into_iter()
            .find_map(|suffix| name.strip_suffix(suffix))
            .map(str::to_string)
    }

    /// Load and normalize a region's vector set.
    pub fn load_region(&self, region: &str) -> Result<VectorSet> {
        let path = self.region_path(region).with_context(|| {
            format!(
                "No vector file for region '{region}' in {}",
                self.dir.display()
            )
        })?;
        let value = read_json(&path)?;
        let set = normalize_json(value)
            .with_context(|| format!("Invalid vector file {}", path.display()))?;
        debug!(region, topics = set.len(), path = %path.display(), "Loaded region vectors");
        Ok(set)
    }

    /// Regions that have a canonical `<region>_vectors_e5.json` file, sorted.
    pub fn list_regions(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read files directory {}", self.dir.display()))?;

        let mut regions = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(region) = name.strip_suffix(REGION_SUFFIX) {
                if !region.is_empty() {
                    regions.push(region.to_string());
                }
            }
        }
        regions.sort();
        Ok(regions)
    }

    /// Every region's vector set. Files that fail to load are skipped with a
    /// warning so one bad export doesn't block cross-region comparison.
    pub fn load_region_pool(&self) -> Result<IndexMap<String, VectorSet>> {
        let mut pool = IndexMap::new();
        for region in self.list_regions()? {
            match self.load_region(&region) {
                Ok(set) => {
                    pool.insert(region, set);
                }
                Err(e) => warn!(region = %region, error = %e, "Skipping unreadable region file"),
            }
        }
        Ok(pool)
    }

    /// Load the policy corpus from `policy_vectors.json`.
    pub fn load_policy_corpus(&self) -> Result<Vec<PolicyDocument>> {
        let path = self.dir.join(POLICY_FILE);
        parse_policy_corpus(read_json(&path)?)
            .with_context(|| format!("Invalid policy corpus {}", path.display()))
    }

    /// Load the precomputed gap table, if the file exists.
    pub fn load_gap_table(&self) -> Result<Option<GapTable>> {
        let path = self.dir.join(GAP_TABLE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let table: GapTable = serde_json::from_value(read_json(&path)?)
            .with_context(|| format!("Invalid gap table {}", path.display()))?;
        Ok(Some(table))
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[derive(Deserialize)]
struct PolicyEntry {
    #[serde(alias = "title")]
    policy_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    vector: Vec<f64>,
}

/// Accepts a list of `{policy_name | title, vector, description}` entries or
/// a `{name: vector}` map. Entries without a name or vector are dropped.
pub fn parse_policy_corpus(value: Value) -> Result<Vec<PolicyDocument>> {
    match value {
        Value::Array(_) => {
            let entries: Vec<PolicyEntry> = serde_json::from_value(value)?;
            Ok(entries
                .into_iter()
                .filter_map(|entry| {
                    let name = entry.policy_name?;
                    (!entry.vector.is_empty()).then_some(PolicyDocument {
                        name,
                        description: entry.description,
                        vector: entry.vector,
                    })
                })
                .collect())
        }
        Value::Object(_) => {
            let map: IndexMap<String, Vec<f64>> = serde_json::from_value(value)?;
            Ok(map
                .into_iter()
                .filter(|(_, vector)| !vector.is_empty())
                .map(|(name, vector)| PolicyDocument {
                    name,
                    description: None,
                    vector,
                })
                .collect())
        }
        other => anyhow::bail!("Policy corpus must be a list or an object, got {other}"),
    }
}
