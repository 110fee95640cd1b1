//! Markdown report generation
//!
//! This module renders a search response as a markdown report: the request,
//! the tier that answered, per-source crawl outcomes and the listing table.

use crate::crawler::SourceOutcome;
use crate::output::OutputResult;
use crate::resolver::ResolveResponse;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of a search response
///
/// # Arguments
///
/// * `response` - The resolved search
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_markdown_report(response: &ResolveResponse, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(response);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a search response as markdown
pub fn format_markdown_report(response: &ResolveResponse) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Gear-Sweep Results: {}\n\n", escape_cell(&response.query)));

    md.push_str("## Search Information\n\n");
    md.push_str(&format!("- **Query**: {}\n", response.query));
    md.push_str(&format!("- **Results**: {}\n", response.total));
    md.push_str(&format!("- **Answered By**: {}\n", response.source));
    if let Some(reason) = &response.reason {
        md.push_str(&format!("- **Note**: {}\n", reason));
    }
    md.push_str(&format!("- **Generated**: {}\n\n", response.timestamp.to_rfc3339()));

    if !response.sources.is_empty() {
        md.push_str("## Source Outcomes\n\n");
        md.push_str("| Source | Outcome | Time (s) |\n");
        md.push_str("|--------|---------|----------|\n");
        for report in &response.sources {
            md.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                escape_cell(&report.source),
                escape_cell(&describe_outcome(&report.outcome)),
                report.elapsed.as_secs_f64()
            ));
        }
        md.push('\n');
    }

    if response.results.is_empty() {
        md.push_str("_No listings found._\n");
        return md;
    }

    md.push_str("## Listings\n\n");
    md.push_str("| # | Score | Title | Brand | Model | Condition | Price | Location | Source |\n");
    md.push_str("|---|-------|-------|-------|-------|-----------|-------|----------|--------|\n");
    for (i, listing) in response.results.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} | [{}]({}) | {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            listing.score_overall,
            escape_cell(&listing.title),
            listing.url,
            escape_cell(&listing.brand),
            escape_cell(&listing.model),
            listing.condition,
            format_price(listing.price),
            escape_cell(&listing.location),
            escape_cell(&listing.source),
        ));
    }
    md.push('\n');

    md
}

/// One-line description of a source outcome
pub fn describe_outcome(outcome: &SourceOutcome) -> String {
    match outcome {
        SourceOutcome::Succeeded { items } => format!("{} listings", items),
        SourceOutcome::Failed { reason } => format!("failed: {}", reason),
        SourceOutcome::Blocked { reason } => format!("blocked: {}", reason),
        SourceOutcome::TimedOut => "timed out".to_string(),
        SourceOutcome::Cancelled => "cancelled at deadline".to_string(),
    }
}

/// Price with thousands separators, or a dash when unknown
pub fn format_price(price: Option<f64>) -> String {
    let Some(price) = price else {
        return "-".to_string();
    };

    let whole = price.round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${}", grouped)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
