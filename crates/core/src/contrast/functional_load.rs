//! Functional load of segment contrasts.
//!
//! Two measures are offered. The minimal-pair measure counts word pairs
//! that collapse together once the contrast is neutralized. The entropy
//! measure reports how much corpus entropy is lost by the same merger.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entropy;
use super::neutralize::{Neutralizer, Unit};
use crate::control::BatchControl;
use crate::corpus::{CorpusContext, FrequencyKind};
use crate::environment::EnvironmentFilter;
use crate::error::{PhonoError, Result};
use crate::types::BOUNDARY;

/// Entropy drops below this are floating-point noise.
const MIN_ENTROPY_DROP: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinPairOptions {
    /// Divide the pair count by the number of words containing a target.
    pub relative_count: bool,
    /// Count every surface pair even when two pairs share transcriptions.
    pub distinguish_homophones: bool,
}

impl Default for MinPairOptions {
    fn default() -> Self {
        Self {
            relative_count: true,
            distinguish_homophones: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaHOptions {
    /// Report the raw entropy drop instead of dividing by the pre-merger entropy.
    pub prevent_normalization: bool,
}

/// A pair of words distinguished only by the neutralized contrast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinimalPair {
    pub spelling1: String,
    pub transcription1: Vec<String>,
    pub spelling2: String,
    pub transcription2: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinPairResult {
    pub score: f64,
    /// Words with at least one neutralized position.
    pub relevant_words: usize,
    pub pairs: Vec<MinimalPair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaHResult {
    /// Normalized drop, or the raw drop when normalization is prevented.
    pub value: f64,
    pub raw: f64,
    pub pre_entropy: f64,
    pub post_entropy: f64,
}

fn prepare<S: AsRef<str>>(context: &CorpusContext<'_>, pairs: &[(S, S)]) -> Result<Neutralizer> {
    let neutralizer = Neutralizer::new(pairs)?;
    let targets: Vec<&str> = neutralizer.targets().collect();
    context.require_segments(&targets)?;
    Ok(neutralizer)
}

fn target_list(neutralizer: &Neutralizer) -> Vec<String> {
    neutralizer.targets().map(str::to_string).collect()
}

/// Minimal-pair functional load of the contrasts in `pairs`.
///
/// Positions holding a target segment are neutralized when they satisfy
/// every filter; words sharing a neutralized form but differing in their
/// original sequences form minimal pairs.
pub fn minpair_fl<S: AsRef<str>>(
    context: &CorpusContext<'_>,
    pairs: &[(S, S)],
    options: &MinPairOptions,
    filters: &[EnvironmentFilter],
    control: &BatchControl,
) -> Result<MinPairResult> {
    let neutralizer = prepare(context, pairs)?;
    let words = context.words();
    let total = words.len();

    let mut groups: BTreeMap<Vec<Unit>, Vec<usize>> = BTreeMap::new();
    let mut relevant_words = 0;
    for (i, word) in words.iter().enumerate() {
        control.step(i + 1, total)?;
        let (key, changed) = neutralizer.neutralize(&word.sequence, filters);
        if changed {
            relevant_words += 1;
            groups.entry(key).or_default().push(i);
        }
    }

    let mut seen: HashSet<(Vec<String>, Vec<String>)> = HashSet::new();
    let mut found = Vec::new();
    for members in groups.values() {
        for (n, &i) in members.iter().enumerate() {
            for &j in &members[n + 1..] {
                let (a, b) = (&words[i], &words[j]);
                if a.spelling == b.spelling || a.sequence == b.sequence {
                    continue;
                }
                let (a, b) = if a.spelling <= b.spelling { (a, b) } else { (b, a) };
                if !options.distinguish_homophones {
                    let key = if a.sequence <= b.sequence {
                        (a.sequence.clone(), b.sequence.clone())
                    } else {
                        (b.sequence.clone(), a.sequence.clone())
                    };
                    if !seen.insert(key) {
                        continue;
                    }
                }
                found.push(MinimalPair {
                    spelling1: a.spelling.clone(),
                    transcription1: a.sequence.clone(),
                    spelling2: b.spelling.clone(),
                    transcription2: b.sequence.clone(),
                });
            }
        }
    }

    let count = found.len() as f64;
    let score = if options.relative_count {
        if relevant_words == 0 {
            return Err(PhonoError::NoOccurrences(target_list(&neutralizer)));
        }
        count / relevant_words as f64
    } else {
        count
    };

    log::debug!(
        "minpair_fl: {} pair(s) over {} relevant word(s), score {:.4}",
        found.len(),
        relevant_words,
        score
    );
    Ok(MinPairResult {
        score,
        relevant_words,
        pairs: found,
    })
}

/// Change in entropy over distinct sequences when the contrasts merge.
pub fn deltah_fl<S: AsRef<str>>(
    context: &CorpusContext<'_>,
    pairs: &[(S, S)],
    options: &DeltaHOptions,
    filters: &[EnvironmentFilter],
    control: &BatchControl,
) -> Result<DeltaHResult> {
    let neutralizer = prepare(context, pairs)?;
    let type_counting = context.frequency_kind() == FrequencyKind::Type;
    let words = context.words();
    let total = words.len();

    let mut original: BTreeMap<Vec<String>, f64> = BTreeMap::new();
    for (i, word) in words.into_iter().enumerate() {
        control.step(i + 1, total)?;
        let weight = original.entry(word.sequence).or_insert(0.0);
        if type_counting {
            *weight = 1.0;
        } else {
            *weight += word.frequency;
        }
    }

    let mut merged: BTreeMap<Vec<Unit>, f64> = BTreeMap::new();
    for (sequence, weight) in &original {
        let (key, _) = neutralizer.neutralize(sequence, filters);
        *merged.entry(key).or_insert(0.0) += weight;
    }

    let pre_entropy = entropy(original.values().copied());
    let post_entropy = entropy(merged.values().copied());
    let mut raw = pre_entropy - post_entropy;
    if raw < MIN_ENTROPY_DROP {
        raw = 0.0;
    }
    let value = if options.prevent_normalization || pre_entropy <= 0.0 {
        raw
    } else {
        raw / pre_entropy
    };

    log::debug!(
        "deltah_fl: H {:.4} -> {:.4} over {} sequence(s)",
        pre_entropy,
        post_entropy,
        original.len()
    );
    Ok(DeltaHResult {
        value,
        raw,
        pre_entropy,
        post_entropy,
    })
}

/// Average of `load` over `segment` paired with every other inventory symbol.
fn relative_load<F>(
    context: &CorpusContext<'_>,
    segment: &str,
    control: &BatchControl,
    mut load: F,
) -> Result<f64>
where
    F: FnMut((&str, &str), &BatchControl) -> Result<f64>,
{
    context.require_segments(&[segment])?;
    let others: Vec<String> = context
        .inventory()
        .into_iter()
        .filter(|s| s != segment && s != BOUNDARY)
        .collect();
    if others.is_empty() {
        return Err(PhonoError::Config(format!(
            "no other segment to contrast with '{}'",
            segment
        )));
    }

    let inner = control.stop_only();
    let mut sum = 0.0;
    for (i, other) in others.iter().enumerate() {
        control.step(i + 1, others.len())?;
        sum += load((segment, other.as_str()), &inner)?;
    }
    Ok(sum / others.len() as f64)
}

/// Mean minimal-pair load of `segment` against every other segment.
pub fn relative_minpair_fl(
    context: &CorpusContext<'_>,
    segment: &str,
    options: &MinPairOptions,
    filters: &[EnvironmentFilter],
    control: &BatchControl,
) -> Result<f64> {
    relative_load(context, segment, control, |pair, inner| {
        minpair_fl(context, &[pair], options, filters, inner).map(|r| r.score)
    })
}

/// Mean entropy-based load of `segment` against every other segment.
pub fn relative_deltah_fl(
    context: &CorpusContext<'_>,
    segment: &str,
    options: &DeltaHOptions,
    filters: &[EnvironmentFilter],
    control: &BatchControl,
) -> Result<f64> {
    relative_load(context, segment, control, |pair, inner| {
        deltah_fl(context, &[pair], options, filters, inner).map(|r| r.value)
    })
}

/// Which functional-load measure a batch computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionalLoadMethod {
    MinPair(MinPairOptions),
    DeltaH(DeltaHOptions),
}

impl FunctionalLoadMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinPair(_) => "minpair",
            Self::DeltaH(_) => "deltah",
        }
    }

    /// Score of a single contrast.
    pub fn pair_load(
        &self,
        context: &CorpusContext<'_>,
        pair: (&str, &str),
        filters: &[EnvironmentFilter],
        control: &BatchControl,
    ) -> Result<f64> {
        match self {
            Self::MinPair(options) => minpair_fl(context, &[pair], options, filters, control).map(|r| r.score),
            Self::DeltaH(options) => deltah_fl(context, &[pair], options, filters, control).map(|r| r.value),
        }
    }
}

impl FromStr for FunctionalLoadMethod {
    type Err = PhonoError;

    /// Parses a method name with default options.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minpair" | "min-pair" => Ok(Self::MinPair(MinPairOptions::default())),
            "deltah" | "entropy" => Ok(Self::DeltaH(DeltaHOptions::default())),
            other => Err(PhonoError::Config(format!(
                "unknown functional load method '{}' (expected minpair or deltah)",
                other
            ))),
        }
    }
}

impl fmt::Display for FunctionalLoadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadTarget {
    Pair(String, String),
    Segment(String),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pair(a, b) => write!(f, "{},{}", a, b),
            Self::Segment(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadScore {
    pub target: LoadTarget,
    pub score: f64,
}

/// Load of every segment pair in the inventory, boundary excluded, sorted
/// from highest to lowest.
///
/// With `relative`, each segment is instead scored by the mean of the
/// pairs it takes part in. A pair whose computation fails is logged and
/// skipped; cancellation aborts the whole batch.
pub fn all_pairwise_fls(
    context: &CorpusContext<'_>,
    method: &FunctionalLoadMethod,
    filters: &[EnvironmentFilter],
    relative: bool,
    control: &BatchControl,
) -> Result<Vec<LoadScore>> {
    let segments: Vec<String> = context.inventory().into_iter().filter(|s| s != BOUNDARY).collect();
    let n = segments.len();
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();
    log::info!(
        "Computing {} load for {} pair(s) of {} segment(s)",
        method,
        pairs.len(),
        n
    );

    let inner = control.stop_only();
    let mut pair_scores: Vec<(usize, usize, f64)> = Vec::with_capacity(pairs.len());
    for (k, &(i, j)) in pairs.iter().enumerate() {
        control.step(k + 1, pairs.len())?;
        match method.pair_load(context, (&segments[i], &segments[j]), filters, &inner) {
            Ok(score) => pair_scores.push((i, j, score)),
            Err(PhonoError::Cancelled) => return Err(PhonoError::Cancelled),
            Err(e) => log::warn!("Skipping ({}, {}): {}", segments[i], segments[j], e),
        }
    }

    let mut scores: Vec<LoadScore> = if relative {
        segments
            .iter()
            .enumerate()
            .filter_map(|(idx, segment)| {
                let own: Vec<f64> = pair_scores
                    .iter()
                    .filter(|(i, j, _)| *i == idx || *j == idx)
                    .map(|(_, _, s)| *s)
                    .collect();
                if own.is_empty() {
                    return None;
                }
                Some(LoadScore {
                    target: LoadTarget::Segment(segment.clone()),
                    score: own.iter().sum::<f64>() / own.len() as f64,
                })
            })
            .collect()
    } else {
        pair_scores
            .into_iter()
            .map(|(i, j, score)| LoadScore {
                target: LoadTarget::Pair(segments[i].clone(), segments[j].clone()),
                score,
            })
            .collect()
    };

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(scores)
}
