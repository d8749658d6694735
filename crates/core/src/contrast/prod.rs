//! Predictability of distribution.
//!
//! Measures how well the environment predicts which of two segments
//! occurs: 0 means complementary distribution, 1 means the segments are
//! freely interchangeable in every environment.

use serde::{Deserialize, Serialize};

use super::entropy;
use crate::control::BatchControl;
use crate::corpus::CorpusContext;
use crate::environment::EnvironmentFilter;
use crate::error::{PhonoError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProdOptions {
    /// Fail with [`PhonoError::Coverage`] instead of warning when the
    /// environments are not exhaustive and mutually exclusive.
    pub strict: bool,
}

/// One occurrence of a target segment that no environment, or more than
/// one environment, accounts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub spelling: String,
    pub sequence: Vec<String>,
    pub position: usize,
    /// Indices of the environments the position matched.
    pub environments: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub missing: Vec<Occurrence>,
    pub overlapping: Vec<Occurrence>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.overlapping.is_empty()
    }

    fn spellings(occurrences: &[Occurrence]) -> Vec<&str> {
        let mut words: Vec<&str> = occurrences.iter().map(|o| o.spelling.as_str()).collect();
        words.dedup();
        words
    }

    /// Words with an occurrence no environment covers.
    pub fn missing_words(&self) -> Vec<&str> {
        Self::spellings(&self.missing)
    }

    /// Words with an occurrence several environments cover.
    pub fn overlapping_words(&self) -> Vec<&str> {
        Self::spellings(&self.overlapping)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentEntropy {
    pub environment: String,
    /// Weighted count of the first segment.
    pub first: f64,
    /// Weighted count of the second segment.
    pub second: f64,
    pub entropy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProdResult {
    pub environments: Vec<EnvironmentEntropy>,
    /// Entropy averaged over environments, weighted by their counts.
    pub average: f64,
    pub coverage: CoverageReport,
}

struct Tally {
    counts: Vec<[f64; 2]>,
    occurrences: f64,
    coverage: CoverageReport,
}

fn validate(context: &CorpusContext<'_>, first: &str, second: &str, environments: &[EnvironmentFilter]) -> Result<()> {
    if first == second {
        return Err(PhonoError::Config(format!(
            "predictability needs two different segments, got '{}' twice",
            first
        )));
    }
    if environments.is_empty() {
        return Err(PhonoError::Config("at least one environment is required".into()));
    }
    context.require_segments(&[first, second])
}

/// Count every occurrence of the targets into each environment it matches.
fn tally(
    context: &CorpusContext<'_>,
    targets: [&str; 2],
    environments: &[EnvironmentFilter],
    control: &BatchControl,
) -> Result<Tally> {
    let words = context.words();
    let total = words.len();
    let mut tally = Tally {
        counts: vec![[0.0; 2]; environments.len()],
        occurrences: 0.0,
        coverage: CoverageReport::default(),
    };

    for (i, word) in words.iter().enumerate() {
        control.step(i + 1, total)?;
        for (position, segment) in word.sequence.iter().enumerate() {
            let Some(which) = targets.iter().position(|t| t == segment) else {
                continue;
            };
            tally.occurrences += word.frequency;

            let matched: Vec<usize> = environments
                .iter()
                .enumerate()
                .filter(|(_, env)| env.matches(&word.sequence, position))
                .map(|(k, _)| k)
                .collect();
            for &k in &matched {
                tally.counts[k][which] += word.frequency;
            }
            if matched.len() == 1 {
                continue;
            }

            let occurrence = Occurrence {
                spelling: word.spelling.clone(),
                sequence: word.sequence.clone(),
                position,
                environments: matched,
            };
            if occurrence.environments.is_empty() {
                tally.coverage.missing.push(occurrence);
            } else {
                tally.coverage.overlapping.push(occurrence);
            }
        }
    }
    Ok(tally)
}

/// Report which occurrences of the two segments the environments miss or
/// cover more than once.
pub fn check_environments(
    context: &CorpusContext<'_>,
    first: &str,
    second: &str,
    environments: &[EnvironmentFilter],
) -> Result<CoverageReport> {
    validate(context, first, second, environments)?;
    Ok(tally(context, [first, second], environments, &BatchControl::default())?.coverage)
}

/// Predictability of distribution of `first` and `second` across `environments`.
///
/// Incomplete coverage is logged and returned in the result unless
/// `options.strict` turns it into an error. Occurrences matching several
/// environments count toward each of them.
pub fn calc_prod(
    context: &CorpusContext<'_>,
    first: &str,
    second: &str,
    environments: &[EnvironmentFilter],
    options: &ProdOptions,
    control: &BatchControl,
) -> Result<ProdResult> {
    validate(context, first, second, environments)?;
    let tally = tally(context, [first, second], environments, control)?;

    if tally.occurrences <= 0.0 {
        return Err(PhonoError::NoOccurrences(vec![first.to_string(), second.to_string()]));
    }
    if !tally.coverage.is_complete() {
        if options.strict {
            return Err(PhonoError::Coverage(Box::new(tally.coverage)));
        }
        log::warn!(
            "Environments for {}/{} are incomplete: {} missing ({}), {} overlapping ({})",
            first,
            second,
            tally.coverage.missing.len(),
            tally.coverage.missing_words().join(", "),
            tally.coverage.overlapping.len(),
            tally.coverage.overlapping_words().join(", ")
        );
    }

    let mut weighted = 0.0;
    let mut counted = 0.0;
    let per_environment: Vec<EnvironmentEntropy> = environments
        .iter()
        .zip(&tally.counts)
        .map(|(env, &[a, b])| {
            let h = entropy([a, b]);
            weighted += h * (a + b);
            counted += a + b;
            EnvironmentEntropy {
                environment: env.to_string(),
                first: a,
                second: b,
                entropy: h,
            }
        })
        .collect();
    let average = if counted > 0.0 { weighted / counted } else { 0.0 };

    log::debug!(
        "calc_prod {}/{}: {:.4} over {} environment(s)",
        first,
        second,
        average,
        environments.len()
    );
    Ok(ProdResult {
        environments: per_environment,
        average,
        coverage: tally.coverage,
    })
}

/// Context-free predictability: entropy of the two segments' overall counts.
pub fn calc_prod_all_envs(
    context: &CorpusContext<'_>,
    first: &str,
    second: &str,
    control: &BatchControl,
) -> Result<f64> {
    let wildcard = [EnvironmentFilter::default()];
    validate(context, first, second, &wildcard)?;
    let tally = tally(context, [first, second], &wildcard, control)?;
    if tally.occurrences <= 0.0 {
        return Err(PhonoError::NoOccurrences(vec![first.to_string(), second.to_string()]));
    }
    Ok(entropy(tally.counts[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ContextOptions, Corpus, FrequencyKind, Word};
    use crate::types::FeatureSystem;

    fn corpus(words: &[(&str, &[&str], f64)]) -> Corpus {
        let mut corpus = Corpus::new("prod", FeatureSystem::default());
        for (spelling, transcription, frequency) in words {
            corpus.add_word(Word::new(spelling, transcription, *frequency)).unwrap();
        }
        corpus
    }

    fn before(symbol: &str) -> EnvironmentFilter {
        EnvironmentFilter::from_symbols(&[], &[symbol])
    }

    #[test]
    fn test_complementary_distribution() {
        let corpus = corpus(&[("sa", &["s", "a"], 1.0), ("shi", &["ʃ", "i"], 1.0)]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let envs = [before("a"), before("i")];
        let result = calc_prod(&ctx, "s", "ʃ", &envs, &ProdOptions::default(), &BatchControl::default()).unwrap();
        assert_eq!(result.average, 0.0);
        assert!(result.coverage.is_complete());
        assert_eq!(result.environments[0].environment, "_a");
        assert_eq!(result.environments[0].first, 1.0);
        assert_eq!(result.environments[0].second, 0.0);
    }

    #[test]
    fn test_contrastive_distribution() {
        let corpus = corpus(&[
            ("sa", &["s", "a"], 1.0),
            ("sha", &["ʃ", "a"], 1.0),
            ("si", &["s", "i"], 1.0),
            ("shi", &["ʃ", "i"], 1.0),
        ]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let envs = [before("a"), before("i")];
        let result = calc_prod(&ctx, "s", "ʃ", &envs, &ProdOptions::default(), &BatchControl::default()).unwrap();
        assert!((result.average - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average() {
        let corpus = corpus(&[
            ("sa", &["s", "a"], 1.0),
            ("sha", &["ʃ", "a"], 1.0),
            ("si", &["s", "i"], 1.0),
            ("su", &["s", "u"], 1.0),
        ]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let envs = [before("a"), before("i"), before("u")];
        let result = calc_prod(&ctx, "s", "ʃ", &envs, &ProdOptions::default(), &BatchControl::default()).unwrap();
        // _a has H = 1 over 2 tokens; _i and _u are 0 over 1 token each
        assert!((result.average - 0.5).abs() < 1e-12);
        assert!(result.environments.iter().all(|e| (0.0..=1.0).contains(&e.entropy)));
    }

    #[test]
    fn test_token_frequency_weighting() {
        let corpus = corpus(&[("sa", &["s", "a"], 3.0), ("sha", &["ʃ", "a"], 1.0)]);
        let options = ContextOptions {
            frequency_kind: FrequencyKind::Token,
            ..ContextOptions::default()
        };
        let ctx = CorpusContext::new(&corpus, options).unwrap();
        let result = calc_prod(&ctx, "s", "ʃ", &[before("a")], &ProdOptions::default(), &BatchControl::default()).unwrap();
        let expected = -(0.75f64 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
        assert!((result.average - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_coverage() {
        let corpus = corpus(&[("sa", &["s", "a"], 1.0), ("shi", &["ʃ", "i"], 1.0)]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let envs = [before("a")];

        let lenient = calc_prod(&ctx, "s", "ʃ", &envs, &ProdOptions::default(), &BatchControl::default()).unwrap();
        assert_eq!(lenient.coverage.missing_words(), vec!["shi"]);
        assert_eq!(lenient.coverage.missing[0].position, 0);
        assert_eq!(lenient.average, 0.0);

        let strict = ProdOptions { strict: true };
        match calc_prod(&ctx, "s", "ʃ", &envs, &strict, &BatchControl::default()) {
            Err(PhonoError::Coverage(report)) => {
                assert_eq!(report.missing.len(), 1);
                assert!(report.overlapping.is_empty());
            }
            other => panic!("expected coverage error, got {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_coverage() {
        let corpus = corpus(&[("sa", &["s", "a"], 1.0), ("shi", &["ʃ", "i"], 1.0)]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let initial = EnvironmentFilter::from_symbols(&["#"], &[]);
        let envs = [before("a"), before("i"), initial];

        let report = check_environments(&ctx, "s", "ʃ", &envs).unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.overlapping_words(), vec!["sa", "shi"]);
        assert_eq!(report.overlapping[0].environments, vec![0, 2]);
    }

    #[test]
    fn test_errors() {
        let corpus = corpus(&[("sa", &["s", "a"], 1.0), ("ta", &["t", "a"], 1.0)]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let control = BatchControl::default();
        let options = ProdOptions::default();
        assert!(matches!(
            calc_prod(&ctx, "s", "s", &[before("a")], &options, &control),
            Err(PhonoError::Config(_))
        ));
        assert!(matches!(
            calc_prod(&ctx, "s", "t", &[], &options, &control),
            Err(PhonoError::Config(_))
        ));
        assert!(matches!(
            calc_prod(&ctx, "s", "ʃ", &[before("a")], &options, &control),
            Err(PhonoError::SegmentNotFound(_))
        ));
        assert!(matches!(
            calc_prod_all_envs(&ctx, "s", "s", &control),
            Err(PhonoError::Config(_))
        ));
    }

    #[test]
    fn test_all_envs() {
        let corpus = corpus(&[
            ("sa", &["s", "a"], 1.0),
            ("shi", &["ʃ", "i"], 1.0),
            ("su", &["s", "u"], 1.0),
        ]);
        let ctx = CorpusContext::new(&corpus, ContextOptions::default()).unwrap();
        let h = calc_prod_all_envs(&ctx, "s", "ʃ", &BatchControl::default()).unwrap();
        let expected = -(2.0f64 / 3.0 * (2.0f64 / 3.0).log2() + 1.0 / 3.0 * (1.0f64 / 3.0).log2());
        assert!((h - expected).abs() < 1e-12);
    }
}
