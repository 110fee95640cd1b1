//! Terminal reports
//!
//! Plain-text rendering of search results, the source ranking, the tracker
//! summary and the search history, plus JSON output for scripting.

use crate::output::markdown::{describe_outcome, format_price};
use crate::output::{OutputError, OutputResult};
use crate::resolver::ResolveResponse;
use crate::storage::SearchRecord;
use crate::tracker::{PerformanceSummary, SourceRanking};
use serde::Serialize;

const TITLE_WIDTH: usize = 44;

/// Formats search results as a fixed-width table
pub fn format_results(response: &ResolveResponse) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== {} result(s) for '{}' from {} ===\n\n",
        response.total, response.query, response.source
    ));

    if !response.sources.is_empty() {
        out.push_str("Sources:\n");
        for report in &response.sources {
            out.push_str(&format!(
                "  {:<18} {:<40} {:>6.2}s\n",
                report.source,
                describe_outcome(&report.outcome),
                report.elapsed.as_secs_f64()
            ));
        }
        out.push('\n');
    }

    if response.results.is_empty() {
        if let Some(reason) = &response.reason {
            out.push_str(&format!("No results: {}\n", reason));
        } else {
            out.push_str("No results.\n");
        }
        return out;
    }

    out.push_str(&format!(
        "{:>3} {:>5}  {:<width$} {:<16} {:>10}  {}\n",
        "#",
        "Score",
        "Title",
        "Condition",
        "Price",
        "Source",
        width = TITLE_WIDTH
    ));
    for (i, listing) in response.results.iter().enumerate() {
        out.push_str(&format!(
            "{:>3} {:>5}  {:<width$} {:<16} {:>10}  {}\n",
            i + 1,
            listing.score_overall,
            truncate(&listing.title, TITLE_WIDTH),
            listing.condition.label(),
            format_price(listing.price),
            listing.source,
            width = TITLE_WIDTH
        ));
    }

    out
}

/// Prints search results to stdout
pub fn print_results(response: &ResolveResponse) {
    print!("{}", format_results(response));
}

/// Formats the source ranking, best source first
pub fn format_ranking(ranking: &[SourceRanking]) -> String {
    if ranking.is_empty() {
        return "No source has been crawled yet.\n".to_string();
    }

    let mut out = String::from("=== Source Ranking ===\n\n");
    out.push_str(&format!(
        "{:>3}  {:<22} {:>8} {:>7} {:>7} {:>7}  {}\n",
        "#", "Source", "Success", "Items", "Blocks", "Avg(s)", "Evasion"
    ));
    for (i, row) in ranking.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<22} {:>7.1}% {:>7} {:>7} {:>7.2}  {}\n",
            i + 1,
            truncate(&row.source, 22),
            row.success_rate * 100.0,
            row.items_found,
            row.block_count,
            row.average_response_time,
            row.evasion_level.label()
        ));
    }
    out
}

/// Prints the source ranking to stdout
pub fn print_ranking(ranking: &[SourceRanking]) {
    print!("{}", format_ranking(ranking));
}

/// Prints tracker totals to stdout
pub fn print_summary(summary: &PerformanceSummary) {
    println!("=== Source Performance ===\n");

    println!("Overview:");
    println!("  Tracked sources: {}", summary.total_sources);
    println!("  Total requests: {}", summary.total_requests);
    println!("  Successful requests: {}", summary.total_successful);
    println!("  Items found: {}", summary.total_items_found);
    println!("  Blocks detected: {}", summary.total_blocks);
    println!();

    println!("Evasion Levels:");
    println!("  Low: {}", summary.sources_low);
    println!("  Medium: {}", summary.sources_medium);
    println!("  High: {}", summary.sources_high);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} requests)",
        summary.overall_success_rate * 100.0,
        summary.total_successful,
        summary.total_requests
    );
}

/// Prints the search history to stdout, newest first
pub fn print_history(searches: &[SearchRecord]) {
    if searches.is_empty() {
        println!("No searches recorded.");
        return;
    }

    println!("=== Recent Searches ===\n");
    for search in searches {
        println!(
            "  {}  {:<30} mode={:<4} tier={:<10} results={}",
            search.searched_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&search.query, 30),
            search.mode,
            search.tier,
            search.result_count
        );
    }
}

/// Prints any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> OutputResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| OutputError::Format(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
