use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use welling::config::Config;
use welling::db::{self, Database, SqliteDatabase};
use welling::engine::{
    aliases_for, rank_policies, rank_similar_regions, GapRanker, GapSource, RegionAggregate,
};
use welling::files::VectorFiles;
use welling::llm::OpenAiClient;
use welling::output::terminal;
use welling::pipeline::{action, batch, diagnosis, gaps, search, sentiment};

/// Welling: regional policy vs. citizen sentiment gap analysis.
///
/// Finds the topics where a region's policy scores and its citizens'
/// sentiment diverge most, compares regions, and drafts policy proposals.
#[derive(Parser)]
#[command(name = "welling", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GapSourceArg {
    /// The region's vector file
    Files,
    /// The precomputed gap table (gap_table.json)
    Table,
    /// Policy and sentiment scores in the database
    Db,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Recompute every region's stored gap from its scores
    RecalculateGaps,

    /// Show a region's topics ranked by gap
    TopGaps {
        region: String,

        #[arg(long, default_value = "3")]
        top_k: usize,

        #[arg(long, value_enum, default_value = "files")]
        source: GapSourceArg,
    },

    /// List regions ranked by stored gap
    Regions {
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Find regions whose vector for a topic is closest to this region's
    SimilarRegions {
        region: String,

        /// Topic to compare (defaults to the region's largest-gap topic)
        #[arg(long)]
        topic: Option<String>,

        #[arg(long, default_value = "3")]
        top_k: usize,
    },

    /// Find policy documents closest to a region's topic vector
    SimilarPolicies {
        region: String,
        topic: String,

        #[arg(long, default_value = "3")]
        top_k: usize,
    },

    /// Diagnose a region's problems from its recorded opinions
    Diagnose {
        region: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend a policy action for a region's largest gap
    Action {
        region: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate proposals for the regions with the largest gaps
    RunPipeline {
        /// Number of top-gap regions to process
        #[arg(long, default_value = "3")]
        regions: u32,

        /// Number of topic jobs to run in parallel
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Record a labeled citizen opinion and refresh the region's gap
    RecordSentiment {
        region: String,
        topic: String,

        /// +1 positive, -1 negative, 0 neutral
        #[arg(allow_negative_numbers = true)]
        label: i64,

        text: String,
    },

    /// Save a summary (replaces any summary for the same region and topic)
    SaveSummary {
        region: String,
        topic: String,
        summary: String,

        /// Referenced policy name (repeatable)
        #[arg(long = "proposal")]
        proposals: Vec<String>,
    },

    /// Compute embeddings for stored summaries
    ReindexEmbeddings {
        /// Only consider the first N summaries
        #[arg(long)]
        limit: Option<usize>,

        /// Recompute embeddings that already exist
        #[arg(long)]
        force: bool,
    },

    /// Semantic search over stored summaries
    Search {
        query: String,

        #[arg(long)]
        region: Option<String>,

        #[arg(long, default_value = "3")]
        top_k: usize,
    },

    /// Show system status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("welling=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Welling database...");
            let db: Arc<dyn Database> =
                Arc::new(SqliteDatabase::new(db::initialize(&config.db_path)?));
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext steps:");
            println!("  1. Put region vector files in {}", config.files_dir.display());
            println!("  2. Record opinions with `welling record-sentiment`");
        }

        Commands::RecalculateGaps => {
            let db = db::open_shared(&config.db_path)?;
            match gaps::recalculate_all(db.as_ref()).await? {
                gaps::RecalcOutcome::Empty => println!("No regions to recalculate."),
                gaps::RecalcOutcome::Updated(n) => {
                    println!("Recalculated gaps for {n} regions.");
                    terminal::display_region_ranking(&db.regions_by_gap(10).await?);
                }
            }
        }

        Commands::TopGaps {
            region,
            top_k,
            source,
        } => {
            let ranker = GapRanker::new(config.reconciler());
            let files = VectorFiles::new(&config.files_dir);
            let records = match source {
                GapSourceArg::Files => {
                    let set = files.load_region(&region)?;
                    ranker.top_gap_topics(GapSource::Vectors(&set), top_k)?
                }
                GapSourceArg::Table => {
                    let table = files.load_gap_table()?.with_context(|| {
                        format!("No gap_table.json in {}", files.dir().display())
                    })?;
                    ranker.top_gap_topics(
                        GapSource::Table {
                            region: &region,
                            table: &table,
                        },
                        top_k,
                    )?
                }
                GapSourceArg::Db => {
                    let db = db::open_shared(&config.db_path)?;
                    let aggregate = load_region(db.as_ref(), &region).await?;
                    ranker.top_gap_topics(GapSource::Aggregate(&aggregate), top_k)?
                }
            };
            terminal::display_gap_records(&region, &records);
        }

        Commands::Regions { limit } => {
            let db = db::open_shared(&config.db_path)?;
            terminal::display_region_ranking(&db.regions_by_gap(limit).await?);
        }

        Commands::SimilarRegions {
            region,
            topic,
            top_k,
        } => {
            let ranker = GapRanker::new(config.reconciler());
            let files = VectorFiles::new(&config.files_dir);
            let set = files.load_region(&region)?;

            let topic = match topic {
                Some(topic) => topic,
                None => ranker
                    .top_gap_topics(GapSource::Vectors(&set), 1)?
                    .into_iter()
                    .next()
                    .map(|r| r.topic_label)
                    .with_context(|| format!("Region '{region}' has no topics"))?,
            };
            let targets = aliases_for(&topic);
            let label = ranker
                .reconciler()
                .resolve(&targets, set.labels())
                .with_context(|| format!("Topic '{topic}' not found in region '{region}'"))?;
            let query = set
                .get(&label)
                .map(|tv| tv.vector.clone())
                .with_context(|| format!("Topic '{label}' has no vector"))?;

            let self_id = files.region_id(&region).unwrap_or_else(|| region.clone());
            let mut pool = files.load_region_pool()?;
            pool.retain(|_, other| other.dimension() == Some(query.len()));
            let results =
                rank_similar_regions(&query, &targets, &pool, &self_id, ranker.reconciler(), top_k)?;
            terminal::display_similarity(&format!("Regions similar to {region} on {label}"), &results);
        }

        Commands::SimilarPolicies {
            region,
            topic,
            top_k,
        } => {
            let reconciler = config.reconciler();
            let files = VectorFiles::new(&config.files_dir);
            let set = files.load_region(&region)?;
            let label = reconciler
                .resolve(aliases_for(&topic), set.labels())
                .with_context(|| format!("Topic '{topic}' not found in region '{region}'"))?;
            let query = set
                .get(&label)
                .map(|tv| tv.vector.clone())
                .with_context(|| format!("Topic '{label}' has no vector"))?;

            let corpus: Vec<_> = files
                .load_policy_corpus()?
                .into_iter()
                .filter(|doc| doc.vector.len() == query.len())
                .collect();
            let results = rank_policies(&query, &corpus, top_k)?;
            terminal::display_similarity(&format!("Policies for {region} / {label}"), &results);
        }

        Commands::Diagnose { region, json } => {
            let db = db::open_shared(&config.db_path)?;
            let client = OpenAiClient::from_config(&config)?;
            let files = VectorFiles::new(&config.files_dir);
            let ranker = GapRanker::new(config.reconciler());

            let result = diagnosis::diagnose(db.as_ref(), &files, &ranker, &client, &region).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                terminal::display_diagnosis(&result);
            }
        }

        Commands::Action { region, json } => {
            let client = OpenAiClient::from_config(&config)?;
            let files = VectorFiles::new(&config.files_dir);
            let ranker = GapRanker::new(config.reconciler());

            let result = action::recommend_action(&files, &ranker, &client, &region).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                terminal::display_action(&result);
            }
        }

        Commands::RunPipeline {
            regions,
            concurrency,
        } => {
            let db = db::open_shared(&config.db_path)?;
            let client = OpenAiClient::from_config(&config)?;
            let files = VectorFiles::new(&config.files_dir);

            println!("Running proposal pipeline for the top {regions} regions...");
            let report = batch::run(
                db.as_ref(),
                &files,
                &config.reconciler(),
                &client,
                &config.output_dir,
                batch::BatchOptions {
                    regions,
                    concurrency,
                },
            )
            .await?;
            terminal::display_batch_report(&report);
        }

        Commands::RecordSentiment {
            region,
            topic,
            label,
            text,
        } => {
            let db: Arc<dyn Database> =
                Arc::new(SqliteDatabase::new(db::initialize(&config.db_path)?));
            let update =
                sentiment::record_sentiment(db.as_ref(), &region, &topic, &text, label).await?;
            if update.created_region {
                println!("Created region {}", update.region.bold());
            }
            println!(
                "Recorded opinion #{} for {} / {}",
                update.log_id, update.region, update.topic
            );
            if let Some(score) = update.topic_sentiment_score {
                println!("  Topic sentiment: {score:.1}");
            }
            println!("  Region gap: {:.2}", update.gap_score);
        }

        Commands::SaveSummary {
            region,
            topic,
            summary,
            proposals,
        } => {
            let db = db::open_shared(&config.db_path)?;
            let id = db
                .save_summary(Some(region.as_str()), &topic, &summary, &proposals)
                .await?;
            println!("Saved summary #{id} for {region} / {topic}");
        }

        Commands::ReindexEmbeddings { limit, force } => {
            let db = db::open_shared(&config.db_path)?;
            let client = OpenAiClient::from_config(&config)?;
            let updated = search::reindex_embeddings(db.as_ref(), &client, limit, force).await?;
            println!("Updated {updated} summary embeddings.");
        }

        Commands::Search {
            query,
            region,
            top_k,
        } => {
            let db = db::open_shared(&config.db_path)?;
            let client = OpenAiClient::from_config(&config)?;
            let hits =
                search::search_summaries(db.as_ref(), &client, &query, region.as_deref(), top_k)
                    .await?;
            terminal::display_search_hits(&hits);
        }

        Commands::Status => {
            let db = db::open_shared(&config.db_path).ok();
            welling::status::show(db.as_ref(), &config).await?;
        }
    }

    Ok(())
}

async fn load_region(db: &dyn Database, region: &str) -> Result<RegionAggregate> {
    db.get_region(region)
        .await?
        .with_context(|| format!("Region '{region}' not found in the database"))
}
