//! Output module for presenting search results
//!
//! This module handles:
//! - Terminal tables for results, source rankings and history
//! - JSON output of any response
//! - Markdown report export

mod markdown;
mod report;

pub use markdown::{format_markdown_report, format_price, write_markdown_report};
pub use report::{
    format_ranking, format_results, print_history, print_json, print_ranking, print_results,
    print_summary,
};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
