// Composition tests — the pipelines running end to end against an
// in-memory database, temporary vector files, and canned model replies.
//
// No network calls: the TextGenerator and Embedder are fakes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{json, Value};

use welling::db::{schema, Database, SqliteDatabase};
use welling::engine::{CanonicalTopic, GapRanker, RegionAggregate};
use welling::files::VectorFiles;
use welling::llm::{Embedder, TextGenerator};
use welling::pipeline::diagnosis::{ActivityLevel, FALLBACK_TOPICS};
use welling::pipeline::{action, batch, diagnosis, gaps, search, sentiment};

// ============================================================
// Fakes
// ============================================================

/// Returns `json_reply` for JSON prompts and an echo of the prompt's start
/// otherwise. Records every prompt it sees.
struct FakeGenerator {
    json_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn new(json_reply: Value) -> Self {
        Self {
            json_reply: json_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let head: String = prompt.chars().take(20).collect();
        Ok(format!("generated: {head}"))
    }

    async fn generate_json(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.json_reply.clone())
    }
}

/// Embeds by keyword: transport texts point one way, housing texts another.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let transport = if text.contains("bus") || text.contains("교통") { 1.0 } else { 0.0 };
        let housing = if text.contains("rent") || text.contains("주거") { 1.0 } else { 0.0 };
        Ok(vec![transport, housing, 0.1])
    }
}

fn memory_db() -> Arc<dyn Database> {
    let conn = Connection::open_in_memory().unwrap();
    schema::create_tables(&conn).unwrap();
    Arc::new(SqliteDatabase::new(conn))
}

fn write_json(dir: &Path, name: &str, value: Value) {
    std::fs::write(dir.join(name), value.to_string()).unwrap();
}

/// Three regions and a small policy corpus.
fn sample_files(dir: &Path) {
    // List-shaped: housing has more complaints than praise
    write_json(
        dir,
        "서울_vectors_e5.json",
        json!([
            {"topic": "주거/환경", "vector": [0.0, 1.0, 0.0], "label": -1},
            {"topic": "주거/환경", "vector": [0.2, 0.8, 0.0], "label": -1},
            {"topic": "주거/환경", "vector": [0.1, 0.9, 0.0], "label": -1},
            {"topic": "인프라/교통", "vector": [1.0, 0.0, 0.0], "label": 1},
            {"topic": "인프라/교통", "vector": [0.9, 0.1, 0.0], "label": -1},
        ]),
    );
    // Map-shaped, labeled differently
    write_json(
        dir,
        "부산_vectors_e5.json",
        json!({
            "주거환경": {"vector": [0.1, 0.9, 0.0], "gap_score": 2.0},
            "교통인프라": {"vector": [1.0, 0.0, 0.0], "gap_score": 1.0},
        }),
    );
    write_json(
        dir,
        "대구_vectors_e5.json",
        json!({"housing_environment": [0.7, 0.7, 0.0]}),
    );
    write_json(
        dir,
        "policy_vectors.json",
        json!([
            {"policy_name": "청년 월세 지원", "vector": [0.0, 1.0, 0.0], "description": "rent support"},
            {"policy_name": "공공임대 확대", "vector": [0.3, 0.9, 0.0], "description": "public housing"},
            {"policy_name": "버스 노선 개편", "vector": [1.0, 0.0, 0.0], "description": "bus routes"},
            {"title": "old model", "vector": [1.0, 0.0]},
        ]),
    );
}

// ============================================================
// Sentiment -> gaps
// ============================================================

#[tokio::test]
async fn recording_sentiment_creates_region_and_updates_gap() {
    let db = memory_db();
    let mut seoul = RegionAggregate::new("서울");
    seoul.set_policy_score(CanonicalTopic::HousingEnvironment, 80.0);
    db.upsert_region(&seoul).await.unwrap();

    sentiment::record_sentiment(db.as_ref(), "서울", "주거/환경", "월세가 너무 올랐어요", -1)
        .await
        .unwrap();
    let update =
        sentiment::record_sentiment(db.as_ref(), "서울", "주거/환경", "공원이 생겨서 좋아요", 1)
            .await
            .unwrap();

    assert!(!update.created_region);
    assert_eq!(update.topic_sentiment_score, Some(50.0));
    assert!((update.gap_score - 30.0).abs() < 1e-9);

    let stored = db.get_region("서울").await.unwrap().unwrap();
    assert_eq!(stored.sentiment_avg_score, Some(50.0));
    assert_eq!(stored.policy_avg_score, Some(80.0));

    let created = sentiment::record_sentiment(db.as_ref(), "제주", "관광", "좋아요", 1)
        .await
        .unwrap();
    assert!(created.created_region);
    assert_eq!(created.topic_sentiment_score, None);
    assert_eq!(created.gap_score, 0.0);
}

#[tokio::test]
async fn sentiment_score_counts_every_spelling_of_a_topic() {
    let db = memory_db();
    for text in ["월세", "전세", "관리비"] {
        sentiment::record_sentiment(db.as_ref(), "서울", "주거/환경", text, -1)
            .await
            .unwrap();
    }
    let update = sentiment::record_sentiment(db.as_ref(), "서울", "주거환경", "공원", 1)
        .await
        .unwrap();

    assert_eq!(update.topic_sentiment_score, Some(25.0));
    let stored = db.get_region("서울").await.unwrap().unwrap();
    assert_eq!(
        stored.scores(CanonicalTopic::HousingEnvironment).sentiment,
        Some(25.0)
    );
}

#[tokio::test]
async fn invalid_label_is_rejected_before_writing() {
    let db = memory_db();
    let err = sentiment::record_sentiment(db.as_ref(), "서울", "주거/환경", "x", 5).await;
    assert!(err.is_err());
    assert_eq!(db.count_sentiment_logs("서울").await.unwrap(), 0);
}

#[tokio::test]
async fn recalculate_all_rewrites_stale_gaps() {
    let db = memory_db();
    assert_eq!(
        gaps::recalculate_all(db.as_ref()).await.unwrap(),
        gaps::RecalcOutcome::Empty
    );

    let mut region = RegionAggregate::new("부산");
    region.policy_avg_score = Some(71.0);
    region.sentiment_avg_score = Some(50.0);
    region.gap_score = 99.0; // stale
    db.upsert_region(&region).await.unwrap();

    assert_eq!(
        gaps::recalculate_all(db.as_ref()).await.unwrap(),
        gaps::RecalcOutcome::Updated(1)
    );
    let stored = db.get_region("부산").await.unwrap().unwrap();
    assert!((stored.gap_score - 21.0).abs() < 1e-9);
}

// ============================================================
// Diagnosis
// ============================================================

#[tokio::test]
async fn diagnosis_uses_gap_topics_and_opinion_texts() {
    let tmp = tempfile::tempdir().unwrap();
    sample_files(tmp.path());
    let files = VectorFiles::new(tmp.path());
    let db = memory_db();
    for text in ["전세 사기가 걱정돼요", "버스가 너무 안 와요"] {
        db.insert_sentiment_log("서울", "주거/환경", text, -1)
            .await
            .unwrap();
    }

    let generator = FakeGenerator::new(json!({
        "problem_summary": "Housing costs dominate complaints.",
        "scarcity_insight": "Few opinions recorded.",
    }));
    let result = diagnosis::diagnose(
        db.as_ref(),
        &files,
        &GapRanker::default(),
        &generator,
        "서울",
    )
    .await
    .unwrap();

    assert_eq!(result.record_count, 2);
    assert_eq!(result.activity, ActivityLevel::Scarce);
    assert!(result.top_topics.starts_with("주거/환경"));
    assert_eq!(result.result.problem_summary, "Housing costs dominate complaints.");

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("전세 사기가 걱정돼요"));
    assert!(prompt.contains("주거/환경"));
}

#[tokio::test]
async fn diagnosis_without_vectors_falls_back_to_generic_topics() {
    let tmp = tempfile::tempdir().unwrap();
    let files = VectorFiles::new(tmp.path());
    let db = memory_db();
    db.insert_sentiment_log("광주", "의료/보건", "병원이 멀어요", -1)
        .await
        .unwrap();

    let generator = FakeGenerator::new(json!({
        "problem_summary": "p",
        "scarcity_insight": "s",
    }));
    let result = diagnosis::diagnose(
        db.as_ref(),
        &files,
        &GapRanker::default(),
        &generator,
        "광주",
    )
    .await
    .unwrap();
    assert_eq!(result.top_topics, FALLBACK_TOPICS);
}

#[tokio::test]
async fn diagnosis_without_opinions_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let files = VectorFiles::new(tmp.path());
    let generator = FakeGenerator::new(json!({}));
    let result = diagnosis::diagnose(
        memory_db().as_ref(),
        &files,
        &GapRanker::default(),
        &generator,
        "서울",
    )
    .await;
    assert!(result.is_err());
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn malformed_model_reply_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let files = VectorFiles::new(tmp.path());
    let db = memory_db();
    db.insert_sentiment_log("서울", "주거/환경", "text", 0)
        .await
        .unwrap();

    let generator = FakeGenerator::new(json!({"unexpected": true}));
    let result =
        diagnosis::diagnose(db.as_ref(), &files, &GapRanker::default(), &generator, "서울").await;
    assert!(result.is_err());
}

// ============================================================
// Action recommendation
// ============================================================

#[tokio::test]
async fn action_compares_top_gap_topic_across_regions_and_policies() {
    let tmp = tempfile::tempdir().unwrap();
    sample_files(tmp.path());
    let files = VectorFiles::new(tmp.path());

    let generator = FakeGenerator::new(json!({
        "rag_action_card": "Expand youth rent support.",
        "reference_regions": ["부산"],
        "reference_policies": ["청년 월세 지원"],
    }));
    let result = action::recommend_action(&files, &GapRanker::default(), &generator, "서울")
        .await
        .unwrap();

    // Housing has gap 3 (3 negative, 0 positive), transport 0
    assert_eq!(result.main_topic, "주거/환경");

    let regions: Vec<&str> = result
        .related_regions
        .iter()
        .map(|r| r.candidate_id.as_str())
        .collect();
    assert_eq!(regions, vec!["부산", "대구"]);

    // The 2-dimensional "old model" entry is skipped
    assert_eq!(result.similar_policies.len(), 3);
    assert_eq!(result.similar_policies[0].candidate_id, "청년 월세 지원");
    assert_eq!(result.result.rag_action_card, "Expand youth rent support.");

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("부산"));
    assert!(prompt.contains("청년 월세 지원"));
}

#[tokio::test]
async fn action_excludes_own_region_when_name_case_differs() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(
        tmp.path(),
        "Seoul_vectors_e5.json",
        json!({"주거/환경": {"vector": [0.0, 1.0, 0.0], "gap_score": 4.0}}),
    );
    write_json(
        tmp.path(),
        "Busan_vectors_e5.json",
        json!({"housing_environment": [1.0, 0.0, 0.0]}),
    );
    write_json(
        tmp.path(),
        "policy_vectors.json",
        json!({"청년 월세 지원": [0.0, 1.0, 0.0]}),
    );
    let files = VectorFiles::new(tmp.path());
    let generator = FakeGenerator::new(json!({"rag_action_card": "x"}));

    let result = action::recommend_action(&files, &GapRanker::default(), &generator, "seoul")
        .await
        .unwrap();
    let regions: Vec<&str> = result
        .related_regions
        .iter()
        .map(|r| r.candidate_id.as_str())
        .collect();
    assert_eq!(regions, vec!["Busan"]);
}

#[tokio::test]
async fn action_for_unknown_region_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    sample_files(tmp.path());
    let files = VectorFiles::new(tmp.path());
    let generator = FakeGenerator::new(json!({"rag_action_card": "x"}));
    let result =
        action::recommend_action(&files, &GapRanker::default(), &generator, "울산").await;
    assert!(result.is_err());
}

// ============================================================
// Batch pipeline
// ============================================================

#[tokio::test]
async fn batch_pipeline_writes_results_and_saves_summaries() {
    let tmp = tempfile::tempdir().unwrap();
    sample_files(tmp.path());
    let files = VectorFiles::new(tmp.path());
    let output = tempfile::tempdir().unwrap();
    let db = memory_db();

    for (name, gap) in [("서울", 30.0), ("부산", 20.0), ("광주", 10.0), ("대구", 1.0)] {
        let mut region = RegionAggregate::new(name);
        region.gap_score = gap;
        db.upsert_region(&region).await.unwrap();
    }

    let generator = FakeGenerator::new(json!({}));
    let report = batch::run(
        db.as_ref(),
        &files,
        &Default::default(),
        &generator,
        output.path(),
        batch::BatchOptions {
            regions: 3,
            concurrency: 2,
        },
    )
    .await
    .unwrap();

    // 서울 and 부산 have housing + transport; 광주 has no file
    assert_eq!(report.items.len(), 4);
    assert_eq!(report.skipped, 3 + 3 + 5);
    let pairs: Vec<(&str, &str)> = report
        .items
        .iter()
        .map(|i| (i.region.as_str(), i.topic.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("서울", "주거/환경"),
            ("서울", "인프라/교통"),
            ("부산", "주거/환경"),
            ("부산", "인프라/교통"),
        ]
    );
    assert_eq!(report.items[0].policy_examples[0], "청년 월세 지원");

    let written: Vec<batch::BatchItem> =
        serde_json::from_str(&std::fs::read_to_string(&report.saved_to).unwrap()).unwrap();
    assert_eq!(written, report.items);
    assert!(report.saved_to.ends_with(batch::RESULT_FILE));

    let saved = db.list_summaries(Some("서울")).await.unwrap();
    assert_eq!(saved.len(), 2);
}

#[tokio::test]
async fn batch_pipeline_without_regions_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    sample_files(tmp.path());
    let output = tempfile::tempdir().unwrap();
    let generator = FakeGenerator::new(json!({}));

    let result = batch::run(
        memory_db().as_ref(),
        &VectorFiles::new(tmp.path()),
        &Default::default(),
        &generator,
        output.path(),
        batch::BatchOptions::default(),
    )
    .await;
    assert!(result.is_err());
}

// ============================================================
// Embeddings and search
// ============================================================

#[tokio::test]
async fn reindex_then_search_ranks_by_meaning() {
    let db = memory_db();
    db.save_summary(Some("서울"), "주거/환경", "rent is too high", &[])
        .await
        .unwrap();
    db.save_summary(Some("서울"), "인프라/교통", "bus service is slow", &[])
        .await
        .unwrap();
    db.save_summary(Some("부산"), "인프라/교통", "bus routes were cut", &[])
        .await
        .unwrap();

    let updated = search::reindex_embeddings(db.as_ref(), &KeywordEmbedder, Some(2), false)
        .await
        .unwrap();
    assert_eq!(updated, 2);
    // Already embedded rows are skipped without --force
    let updated = search::reindex_embeddings(db.as_ref(), &KeywordEmbedder, None, false)
        .await
        .unwrap();
    assert_eq!(updated, 1);
    let updated = search::reindex_embeddings(db.as_ref(), &KeywordEmbedder, None, true)
        .await
        .unwrap();
    assert_eq!(updated, 3);

    let hits = search::search_summaries(db.as_ref(), &KeywordEmbedder, "bus delays", None, 2)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.summary.topic == "인프라/교통"));

    let hits =
        search::search_summaries(db.as_ref(), &KeywordEmbedder, "bus", Some("부산"), 5)
            .await
            .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].summary.region.as_deref(), Some("부산"));
}

/// Drops the last vector of every batch.
struct ShortBatchEmbedder;

#[async_trait]
impl Embedder for ShortBatchEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        KeywordEmbedder.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut vectors = Vec::new();
        for text in texts.iter().skip(1) {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[tokio::test]
async fn search_rejects_short_embedding_batch() {
    let db = memory_db();
    db.save_summary(Some("서울"), "주거/환경", "rent is too high", &[])
        .await
        .unwrap();

    let result = search::search_summaries(db.as_ref(), &ShortBatchEmbedder, "rent", None, 3).await;
    assert!(result.is_err());
    assert!(db.list_summaries(None).await.unwrap()[0].embedding.is_none());
}

#[tokio::test]
async fn search_embeds_missing_summaries_on_the_fly() {
    let db = memory_db();
    db.save_summary(None, "추천:주거/환경", "rent support expansion", &[])
        .await
        .unwrap();

    let hits = search::search_summaries(db.as_ref(), &KeywordEmbedder, "rent", None, 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(db.list_summaries(None).await.unwrap()[0].embedding.is_some());
}
