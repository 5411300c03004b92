// Colored terminal output for gap rankings, similarity lists, and reports.
//
// main.rs display calls delegate here.

use colored::Colorize;

use crate::engine::{GapRecord, RegionAggregate, SimilarityResult};
use crate::pipeline::action::ActionRecommendation;
use crate::pipeline::batch::BatchReport;
use crate::pipeline::diagnosis::Diagnosis;
use crate::pipeline::search::SearchHit;

use super::truncate_chars;

/// Display a region's topics ranked by gap.
pub fn display_gap_records(region: &str, records: &[GapRecord]) {
    println!(
        "\n{}",
        format!("=== Largest gaps for {region} ({} topics) ===", records.len()).bold()
    );
    println!();
    println!(
        "  {:>4}  {:<24} {:<22} {:>8}  {:>9}  {:>8}",
        "Rank".dimmed(),
        "Topic".dimmed(),
        "Alt".dimmed(),
        "Policy".dimmed(),
        "Sentiment".dimmed(),
        "Gap".dimmed(),
    );
    println!("  {}", "-".repeat(84).dimmed());

    let max_gap = records.iter().map(|r| r.gap).fold(0.0_f64, f64::max);
    for (i, record) in records.iter().enumerate() {
        println!(
            "  {:>4}. {:<24} {:<22} {:>8}  {:>9}  {:>8}",
            i + 1,
            record.topic_label,
            record.topic_label_alt.as_deref().unwrap_or("-"),
            format_score(record.policy_score),
            format_score(record.sentiment_score),
            colorize_gap(record.gap, max_gap),
        );
    }
    println!();
}

/// Display regions ranked by stored gap.
pub fn display_region_ranking(regions: &[RegionAggregate]) {
    if regions.is_empty() {
        println!("No regions stored yet. Run `welling record-sentiment` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Regions by gap ({}) ===", regions.len()).bold()
    );
    let max_gap = regions.iter().map(|r| r.gap_score).fold(0.0_f64, f64::max);
    for (i, region) in regions.iter().enumerate() {
        println!(
            "  {:>4}. {:<20} policy {:>6}  sentiment {:>6}  gap {}",
            i + 1,
            region.region_name,
            format_score(region.policy_avg_score),
            format_score(region.sentiment_avg_score),
            colorize_gap(region.gap_score, max_gap),
        );
    }
    println!();
}

/// Display a similarity ranking under a heading.
pub fn display_similarity(title: &str, results: &[SimilarityResult]) {
    println!("\n{}", format!("=== {title} ===").bold());
    if results.is_empty() {
        println!("  {}", "no comparable candidates".dimmed());
        return;
    }
    for (i, result) in results.iter().enumerate() {
        println!(
            "  {:>4}. {:<32} {}",
            i + 1,
            result.candidate_id,
            colorize_similarity(result.score),
        );
    }
    println!();
}

pub fn display_diagnosis(diagnosis: &Diagnosis) {
    println!(
        "\n{}",
        format!("=== Diagnosis for {} ===", diagnosis.region).bold()
    );
    println!("  Gap topics: {}", diagnosis.top_topics);
    println!(
        "  Opinions: {} ({})",
        diagnosis.record_count,
        diagnosis.activity.to_string().dimmed()
    );
    println!("\n  {}", "Problem summary".underline());
    println!("  {}", diagnosis.result.problem_summary);
    println!("\n  {}", "Opinion activity".underline());
    println!("  {}", diagnosis.result.scarcity_insight);
    println!();
}

pub fn display_action(action: &ActionRecommendation) {
    println!(
        "\n{}",
        format!("=== Action for {} / {} ===", action.region, action.main_topic).bold()
    );
    println!("\n  {}", action.result.rag_action_card.green());
    display_similarity("Related regions", &action.related_regions);
    display_similarity("Similar policies", &action.similar_policies);
}

pub fn display_batch_report(report: &BatchReport) {
    println!(
        "\n{}",
        format!("=== Pipeline results ({} proposals) ===", report.items.len()).bold()
    );
    for item in &report.items {
        println!(
            "\n  {} / {}",
            item.region.bold(),
            item.topic,
        );
        println!("    Complaints: {}", truncate_chars(&item.citizen_summary, 140).dimmed());
        if !item.policy_examples.is_empty() {
            println!("    Policies: {}", item.policy_examples.join(", "));
        }
        println!("    Proposal: {}", truncate_chars(&item.final_summary, 200));
    }
    if report.skipped > 0 {
        println!("\n  {} {} region/topic pairs skipped", "~".yellow(), report.skipped);
    }
    println!("\n  Saved to {}", report.saved_to.display());
}

pub fn display_search_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matching summaries.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {:>2}. [{}] {} / {}",
            i + 1,
            colorize_similarity(hit.score),
            hit.summary.region.as_deref().unwrap_or("(all regions)"),
            hit.summary.topic,
        );
        println!("      {}", truncate_chars(&hit.summary.summary, 160).dimmed());
        if !hit.summary.proposal_list.is_empty() {
            println!("      Policies: {}", hit.summary.proposal_list.join(", "));
        }
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"))
}

/// Color a gap relative to the largest gap shown alongside it. Gap scales
/// differ between sources, so absolute cutoffs don't work.
fn colorize_gap(gap: f64, max_gap: f64) -> colored::ColoredString {
    let text = format!("{gap:.2}");
    let ratio = if max_gap > 0.0 { gap / max_gap } else { 0.0 };
    if ratio >= 0.75 {
        text.red().bold()
    } else if ratio >= 0.4 {
        text.yellow()
    } else {
        text.green()
    }
}

fn colorize_similarity(score: f64) -> colored::ColoredString {
    let text = format!("{score:.3}");
    if score >= 0.8 {
        text.green().bold()
    } else if score >= 0.5 {
        text.normal()
    } else {
        text.dimmed()
    }
}
