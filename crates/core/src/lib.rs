//! Phonological analysis over word corpora.
//!
//! Feature-weighted sequence alignment, minimal-pair and entropy-based
//! functional load, predictability of distribution, and string similarity
//! measures. Analyses read a [`corpus::Corpus`] through a
//! [`corpus::CorpusContext`], which fixes the sequence type, frequency
//! weighting and variant policy for every call made against it.

pub mod contrast;
pub mod control;
pub mod corpus;
pub mod environment;
pub mod error;
pub mod similarity;
pub mod types;

pub use control::BatchControl;
pub use corpus::{ContextOptions, Corpus, CorpusContext, Word};
pub use environment::EnvironmentFilter;
pub use error::{PhonoError, Result};
pub use types::{FeatureSystem, FeatureValue, Segment, BOUNDARY};
