//! Error type shared by every analysis in the crate.

use crate::contrast::prod::CoverageReport;

/// Errors raised by alignment, functional-load and predictability analyses.
#[derive(Debug, thiserror::Error)]
pub enum PhonoError {
    /// Bad algorithm name, empty argument list or malformed option.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("segment '{0}' is not in the corpus inventory")]
    SegmentNotFound(String),

    #[error("no feature specification for segment(s): {}", .0.join(", "))]
    MissingSpecification(Vec<String>),

    #[error("word '{0}' not found in corpus")]
    WordNotFound(String),

    /// The target segments never occur in a countable position.
    #[error("none of the segments {} occur in a countable position", .0.join(", "))]
    NoOccurrences(Vec<String>),

    #[error("n-gram '{}' does not occur in the corpus", .0.join(""))]
    GramNotFound(Vec<String>),

    #[error(
        "environments do not cover the corpus: {} occurrence(s) missing, {} overlapping",
        .0.missing.len(),
        .0.overlapping.len()
    )]
    Coverage(Box<CoverageReport>),

    #[error("invalid environment '{input}': {reason}")]
    Environment { input: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PhonoError>;
