//! String similarity: edit distances built on the aligner and the Khorsi
//! frequency-weighted score, plus corpus-wide queries over them.

pub mod align;
pub mod khorsi;

pub use align::{AlignedPair, Aligner, AlignerConfig, Alignment, Categorical, FeatureCosts, FeatureMetric, Penalties, SegmentMetric};
pub use khorsi::FrequencyWeightedSimilarity;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::control::BatchControl;
use crate::corpus::{ContextWord, CorpusContext};
use crate::error::{PhonoError, Result};
use crate::types::FeatureSystem;

/// A way of scoring two sequences against each other.
pub trait DistanceAlgorithm: Send + Sync {
    /// Algorithm name for display.
    fn name(&self) -> &str;

    fn score(&self, a: &[String], b: &[String]) -> Result<f64>;

    /// True for similarities (higher = closer), false for distances.
    fn higher_is_closer(&self) -> bool {
        false
    }
}

/// Levenshtein distance over segments.
pub struct CategoricalEditDistance {
    aligner: Aligner<Categorical>,
}

impl CategoricalEditDistance {
    pub fn new(config: AlignerConfig) -> Result<Self> {
        Ok(Self {
            aligner: Aligner::new(Categorical, config)?,
        })
    }
}

impl DistanceAlgorithm for CategoricalEditDistance {
    fn name(&self) -> &str {
        "edit_distance"
    }

    fn score(&self, a: &[String], b: &[String]) -> Result<f64> {
        self.aligner.distance(a, b)
    }
}

/// Edit distance weighted by feature disagreement ("phono-edit-distance").
pub struct FeatureEditDistance<'a> {
    aligner: Aligner<FeatureMetric<'a>>,
}

impl<'a> FeatureEditDistance<'a> {
    pub fn new(system: &'a FeatureSystem, config: AlignerConfig, costs: FeatureCosts) -> Result<Self> {
        Ok(Self {
            aligner: Aligner::new(FeatureMetric::new(system, costs)?, config)?,
        })
    }
}

impl DistanceAlgorithm for FeatureEditDistance<'_> {
    fn name(&self) -> &str {
        "phono_edit_distance"
    }

    fn score(&self, a: &[String], b: &[String]) -> Result<f64> {
        self.aligner.distance(a, b)
    }
}

/// Algorithm tag, resolved once into a [`DistanceAlgorithm`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Algorithm {
    EditDistance,
    PhonoEditDistance,
    Khorsi,
}

impl FromStr for Algorithm {
    type Err = PhonoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "edit_distance" => Ok(Algorithm::EditDistance),
            "phono_edit_distance" => Ok(Algorithm::PhonoEditDistance),
            "khorsi" => Ok(Algorithm::Khorsi),
            _ => Err(PhonoError::Config(format!(
                "unknown algorithm '{}'. Available: edit_distance, phono_edit_distance, khorsi",
                s
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::EditDistance => "edit_distance",
            Algorithm::PhonoEditDistance => "phono_edit_distance",
            Algorithm::Khorsi => "khorsi",
        };
        write!(f, "{}", name)
    }
}

impl Algorithm {
    /// Build the scorer for `context`. Khorsi warms the unigram cache.
    pub fn build<'a>(
        &self,
        context: &CorpusContext<'a>,
        config: AlignerConfig,
        costs: FeatureCosts,
    ) -> Result<Box<dyn DistanceAlgorithm + 'a>> {
        match self {
            Algorithm::EditDistance => Ok(Box::new(CategoricalEditDistance::new(config)?)),
            Algorithm::PhonoEditDistance => Ok(Box::new(FeatureEditDistance::new(
                context.features(),
                config,
                costs,
            )?)),
            Algorithm::Khorsi => Ok(Box::new(FrequencyWeightedSimilarity::from_context(context)?)),
        }
    }
}

/// A corpus word scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub spelling: String,
    pub sequence: Vec<String>,
    pub score: f64,
}

/// A corpus word that could not be scored, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWord {
    pub spelling: String,
    pub reason: String,
}

/// Scores for every word that could be compared with the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    /// Closest first.
    pub scores: Vec<SimilarityScore>,
    pub skipped: Vec<SkippedWord>,
}

fn within(algorithm: &dyn DistanceAlgorithm, score: f64, threshold: f64) -> bool {
    if algorithm.higher_is_closer() {
        score >= threshold
    } else {
        score <= threshold
    }
}

/// Score `query` against every other word. A word whose comparison fails is
/// logged and skipped; cancellation aborts the query.
fn score_corpus(
    context: &CorpusContext<'_>,
    query: &ContextWord,
    algorithm: &dyn DistanceAlgorithm,
    control: &BatchControl<'_>,
) -> Result<(Vec<(ContextWord, f64)>, Vec<SkippedWord>)> {
    let words = context.words();
    let total = words.len();
    let mut scored = Vec::with_capacity(total);
    let mut skipped = Vec::new();

    for (done, word) in words.into_iter().enumerate() {
        control.step(done + 1, total)?;
        if word.spelling == query.spelling {
            continue;
        }
        match algorithm.score(&query.sequence, &word.sequence) {
            Ok(score) => scored.push((word, score)),
            Err(PhonoError::Cancelled) => return Err(PhonoError::Cancelled),
            Err(e) => {
                log::warn!("Skipping '{}': {}", word.spelling, e);
                skipped.push(SkippedWord {
                    spelling: word.spelling,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok((scored, skipped))
}

/// Score `query` against every other word in the context, closest first.
pub fn string_similarity(
    context: &CorpusContext<'_>,
    query: &ContextWord,
    algorithm: &dyn DistanceAlgorithm,
    control: &BatchControl<'_>,
) -> Result<SimilarityReport> {
    let (scored, skipped) = score_corpus(context, query, algorithm, control)?;
    let mut scores: Vec<SimilarityScore> = scored
        .into_iter()
        .map(|(word, score)| SimilarityScore {
            spelling: word.spelling,
            sequence: word.sequence,
            score,
        })
        .collect();

    if algorithm.higher_is_closer() {
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    } else {
        scores.sort_by(|a, b| a.score.total_cmp(&b.score));
    }
    log::debug!(
        "{}: scored '{}' against {} words ({} skipped)",
        algorithm.name(),
        query.spelling,
        scores.len(),
        skipped.len()
    );
    Ok(SimilarityReport { scores, skipped })
}

/// Neighbors of a query word and their summed frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighborhood {
    /// Neighbor count under type counting, summed frequency under token.
    pub density: f64,
    pub neighbors: Vec<SimilarityScore>,
    /// Words that could not be compared and count toward nothing.
    pub skipped: Vec<SkippedWord>,
}

/// Words within `threshold` of `query` (≤ for distances, ≥ for similarities).
pub fn neighborhood_density(
    context: &CorpusContext<'_>,
    query: &ContextWord,
    algorithm: &dyn DistanceAlgorithm,
    threshold: f64,
    control: &BatchControl<'_>,
) -> Result<Neighborhood> {
    let (scored, skipped) = score_corpus(context, query, algorithm, control)?;
    let mut density = 0.0;
    let mut neighbors = Vec::new();
    for (word, score) in scored {
        if within(algorithm, score, threshold) {
            density += word.frequency;
            neighbors.push(SimilarityScore {
                spelling: word.spelling,
                sequence: word.sequence,
                score,
            });
        }
    }

    Ok(Neighborhood {
        density,
        neighbors,
        skipped,
    })
}
