// System status display — store counts, top gaps, and files directory.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::files::VectorFiles;

/// Display system status to the terminal.
pub async fn show(db: Option<&Arc<dyn Database>>, config: &Config) -> Result<()> {
    let db_path = config.db_path.as_str();
    let Some(db) = db.filter(|_| Path::new(db_path).exists()) else {
        println!("Database: not initialized");
        println!("\nRun `welling init` to set up the database.");
        return Ok(());
    };

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let regions = db.list_regions().await?;
    let mut opinions = 0;
    for region in &regions {
        opinions += db.count_sentiment_logs(&region.region_name).await?;
    }
    println!("Regions: {} ({} opinions recorded)", regions.len(), opinions);

    let summaries = db.list_summaries(None).await?;
    let embedded = summaries.iter().filter(|s| s.embedding.is_some()).count();
    println!(
        "Summaries: {} ({} with embeddings)",
        summaries.len(),
        embedded
    );
    if embedded < summaries.len() {
        println!("  Run `welling reindex-embeddings` to embed the rest");
    }

    match db.regions_by_gap(1).await?.first() {
        Some(top) => println!("Largest gap: {} ({:.2})", top.region_name, top.gap_score),
        None => println!("Largest gap: no regions yet"),
    }

    let files = VectorFiles::new(&config.files_dir);
    match files.list_regions() {
        Ok(names) => println!(
            "Vector files: {} regions in {}",
            names.len(),
            files.dir().display()
        ),
        Err(_) => println!("Vector files: {} not found", files.dir().display()),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
