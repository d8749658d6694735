//! Read-only views of a corpus under a variant and frequency policy.
//!
//! A context borrows the corpus and yields owned [`ContextWord`] values, so
//! rescaled frequencies never leak back into the corpus itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, RwLock};

use super::frequency::{FrequencyBase, FrequencyBaseKey};
use super::{Corpus, Word};
use crate::error::{PhonoError, Result};
use crate::types::{FeatureSystem, BOUNDARY};

/// Which attribute of a word analyses read as its sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SequenceType {
    #[default]
    Transcription,
    Spelling,
    Tier(String),
}

impl FromStr for SequenceType {
    type Err = PhonoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transcription" => Ok(SequenceType::Transcription),
            "spelling" => Ok(SequenceType::Spelling),
            _ => match s.strip_prefix("tier:") {
                Some(name) if !name.is_empty() => Ok(SequenceType::Tier(name.to_string())),
                _ => Err(PhonoError::Config(format!(
                    "unknown sequence type '{}'. Available: transcription, spelling, tier:<name>",
                    s
                ))),
            },
        }
    }
}

/// Type counting (every form once) or token counting (by frequency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FrequencyKind {
    #[default]
    Type,
    Token,
}

impl FromStr for FrequencyKind {
    type Err = PhonoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "type" => Ok(FrequencyKind::Type),
            "token" => Ok(FrequencyKind::Token),
            _ => Err(PhonoError::Config(format!(
                "unknown frequency kind '{}'. Available: type, token",
                s
            ))),
        }
    }
}

impl fmt::Display for FrequencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyKind::Type => write!(f, "type"),
            FrequencyKind::Token => write!(f, "token"),
        }
    }
}

/// How pronunciation variants are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VariantPolicy {
    /// The word's own transcription.
    #[default]
    Canonical,
    /// The variant with the highest token count (first on ties).
    MostFrequent,
    /// One item per variant, with the variant's own count.
    SeparatedTokens,
    /// One item per variant, splitting the word's count by variant share.
    Weighted,
}

impl FromStr for VariantPolicy {
    type Err = PhonoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "canonical" => Ok(VariantPolicy::Canonical),
            "most-frequent" => Ok(VariantPolicy::MostFrequent),
            "separated" => Ok(VariantPolicy::SeparatedTokens),
            "weighted" => Ok(VariantPolicy::Weighted),
            _ => Err(PhonoError::Config(format!(
                "unknown variant policy '{}'. Available: canonical, most-frequent, separated, weighted",
                s
            ))),
        }
    }
}

/// Settings for building a [`CorpusContext`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub sequence_type: SequenceType,
    pub frequency_kind: FrequencyKind,
    pub variants: VariantPolicy,
}

/// One item yielded by a context: a copy, never a view into the corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextWord {
    /// Corpus key (spelling, disambiguated for homographs).
    pub spelling: String,
    pub sequence: Vec<String>,
    pub frequency: f64,
}

impl ContextWord {
    pub fn new(spelling: &str, sequence: &[&str], frequency: f64) -> Self {
        Self {
            spelling: spelling.to_string(),
            sequence: sequence.iter().map(|s| s.to_string()).collect(),
            frequency,
        }
    }

    pub fn sequence_string(&self) -> String {
        self.sequence.join("")
    }
}

/// A corpus seen through one sequence type, frequency kind and variant policy.
///
/// Frequency bases are cached per context and live exactly as long as it.
/// The cache is populated on first request; warm it with
/// [`CorpusContext::warm_frequency_base`] before sharing the context
/// across threads.
pub struct CorpusContext<'a> {
    corpus: &'a Corpus,
    options: ContextOptions,
    cache: RwLock<HashMap<FrequencyBaseKey, Arc<FrequencyBase>>>,
    inventory: OnceLock<BTreeSet<String>>,
}

impl<'a> CorpusContext<'a> {
    pub fn new(corpus: &'a Corpus, options: ContextOptions) -> Result<Self> {
        if let SequenceType::Tier(name) = &options.sequence_type {
            if let Some(word) = corpus.words().find(|w| !w.tiers.contains_key(name)) {
                return Err(PhonoError::Config(format!(
                    "tier '{}' is not defined (missing on '{}')",
                    name, word.spelling
                )));
            }
        }
        Ok(Self {
            corpus,
            options,
            cache: RwLock::new(HashMap::new()),
            inventory: OnceLock::new(),
        })
    }

    pub fn corpus(&self) -> &'a Corpus {
        self.corpus
    }

    pub fn features(&self) -> &'a FeatureSystem {
        &self.corpus.features
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn sequence_type(&self) -> &SequenceType {
        &self.options.sequence_type
    }

    pub fn frequency_kind(&self) -> FrequencyKind {
        self.options.frequency_kind
    }

    /// Iterate owned word copies. Under token counting, items whose
    /// frequency is zero, negative or not finite are skipped.
    pub fn iter(&self) -> impl Iterator<Item = ContextWord> + '_ {
        let token = self.options.frequency_kind == FrequencyKind::Token;
        self.corpus
            .entries()
            .flat_map(move |(key, word)| self.resolve(key, word))
            .filter(move |w| !token || (w.frequency.is_finite() && w.frequency > 0.0))
    }

    pub fn words(&self) -> Vec<ContextWord> {
        self.iter().collect()
    }

    /// Sorted symbols observed in the selected sequences, plus the boundary.
    pub fn inventory(&self) -> Vec<String> {
        self.inventory_set().iter().cloned().collect()
    }

    /// Inventory computed on first use and kept for the context's lifetime.
    fn inventory_set(&self) -> &BTreeSet<String> {
        self.inventory.get_or_init(|| {
            let mut symbols: BTreeSet<String> = BTreeSet::new();
            symbols.insert(BOUNDARY.to_string());
            for w in self.iter() {
                symbols.extend(w.sequence);
            }
            log::debug!("Context inventory has {} symbol(s)", symbols.len());
            symbols
        })
    }

    /// Error unless every symbol occurs in the context's inventory.
    pub fn require_segments<S: AsRef<str>>(&self, symbols: &[S]) -> Result<()> {
        let inventory = self.inventory_set();
        for s in symbols {
            let s = s.as_ref();
            if !inventory.contains(s) {
                return Err(PhonoError::SegmentNotFound(s.to_string()));
            }
        }
        Ok(())
    }

    /// First context item for the corpus key `spelling`.
    pub fn find(&self, spelling: &str) -> Result<ContextWord> {
        let word = self.corpus.find(spelling)?;
        self.resolve(spelling, word)
            .into_iter()
            .next()
            .ok_or_else(|| PhonoError::WordNotFound(spelling.to_string()))
    }

    /// Cached frequency base for `key`, built on first request.
    pub fn frequency_base(&self, key: FrequencyBaseKey) -> Result<Arc<FrequencyBase>> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(base) = cache.get(&key) {
                return Ok(Arc::clone(base));
            }
        }

        let items = self.words();
        let base = Arc::new(FrequencyBase::build(
            key,
            items.iter().map(|w| (w.sequence.as_slice(), w.frequency)),
        )?);
        log::debug!(
            "Built frequency base {:?} over {} items (total {:.2})",
            key,
            items.len(),
            base.total()
        );

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(base)))
    }

    /// Populate the cache for `key` ahead of concurrent use.
    pub fn warm_frequency_base(&self, key: FrequencyBaseKey) -> Result<()> {
        self.frequency_base(key).map(|_| ())
    }

    fn base_weight(&self, word: &Word) -> f64 {
        match self.options.frequency_kind {
            FrequencyKind::Type => 1.0,
            FrequencyKind::Token => word.frequency,
        }
    }

    fn canonical_sequence(&self, word: &Word) -> Vec<String> {
        match &self.options.sequence_type {
            SequenceType::Transcription => word.transcription.clone(),
            SequenceType::Spelling => word.spelling_sequence(),
            SequenceType::Tier(name) => word.tiers.get(name).cloned().unwrap_or_default(),
        }
    }

    fn resolve(&self, key: &str, word: &Word) -> Vec<ContextWord> {
        let base = self.base_weight(word);
        let item = |sequence: Vec<String>, frequency: f64| ContextWord {
            spelling: key.to_string(),
            sequence,
            frequency,
        };

        // Variants only apply to transcriptions.
        if word.variants.is_empty() || self.options.sequence_type != SequenceType::Transcription {
            return vec![item(self.canonical_sequence(word), base)];
        }

        match self.options.variants {
            VariantPolicy::Canonical => vec![item(word.transcription.clone(), base)],
            VariantPolicy::MostFrequent => {
                let mut best = &word.variants[0];
                for v in &word.variants[1..] {
                    if v.frequency > best.frequency {
                        best = v;
                    }
                }
                vec![item(best.transcription.clone(), base)]
            }
            VariantPolicy::SeparatedTokens => word
                .variants
                .iter()
                .map(|v| {
                    let f = match self.options.frequency_kind {
                        FrequencyKind::Type => 1.0,
                        FrequencyKind::Token => v.frequency,
                    };
                    item(v.transcription.clone(), f)
                })
                .collect(),
            VariantPolicy::Weighted => {
                let total: f64 = word.variants.iter().map(|v| v.frequency).sum();
                let n = word.variants.len() as f64;
                word.variants
                    .iter()
                    .map(|v| {
                        let share = if total > 0.0 { v.frequency / total } else { 1.0 / n };
                        item(v.transcription.clone(), base * share)
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureSystem;

    fn variant_corpus() -> Corpus {
        let mut corpus = Corpus::new("variants", FeatureSystem::default());
        corpus
            .add_word(
                Word::new("cat", &["k", "æ", "t"], 10.0)
                    .with_variant(&["k", "æ", "t"], 3.0)
                    .with_variant(&["k", "æ", "ʔ"], 1.0),
            )
            .unwrap();
        corpus.add_word(Word::new("dog", &["d", "ɔ", "g"], 4.0)).unwrap();
        corpus.add_word(Word::new("gnu", &["n", "u"], 0.0)).unwrap();
        corpus
    }

    fn context(corpus: &Corpus, kind: FrequencyKind, variants: VariantPolicy) -> CorpusContext<'_> {
        CorpusContext::new(
            corpus,
            ContextOptions {
                sequence_type: SequenceType::Transcription,
                frequency_kind: kind,
                variants,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_type_counting_sets_frequency_to_one() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Type, VariantPolicy::Canonical);
        let words = ctx.words();
        assert_eq!(words.len(), 3);
        assert!(words.iter().all(|w| w.frequency == 1.0));
        // Corpus untouched
        assert_eq!(corpus.find("cat").unwrap().frequency, 10.0);
    }

    #[test]
    fn test_token_counting_skips_zero_frequency() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Token, VariantPolicy::Canonical);
        let words = ctx.words();
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|w| w.spelling != "gnu"));
    }

    #[test]
    fn test_most_frequent_variant() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Token, VariantPolicy::MostFrequent);
        let cat = ctx.find("cat").unwrap();
        assert_eq!(cat.sequence, vec!["k", "æ", "t"]);
        assert_eq!(cat.frequency, 10.0);
    }

    #[test]
    fn test_separated_tokens() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Token, VariantPolicy::SeparatedTokens);
        let cats: Vec<ContextWord> = ctx.iter().filter(|w| w.spelling == "cat").collect();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].frequency, 3.0);
        assert_eq!(cats[1].sequence, vec!["k", "æ", "ʔ"]);
        assert_eq!(cats[1].frequency, 1.0);
    }

    #[test]
    fn test_weighted_variants() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Token, VariantPolicy::Weighted);
        let cats: Vec<ContextWord> = ctx.iter().filter(|w| w.spelling == "cat").collect();
        assert!((cats[0].frequency - 7.5).abs() < 1e-12);
        assert!((cats[1].frequency - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_spelling_sequence_type() {
        let corpus = variant_corpus();
        let ctx = CorpusContext::new(
            &corpus,
            ContextOptions {
                sequence_type: SequenceType::Spelling,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ctx.find("dog").unwrap().sequence, vec!["d", "o", "g"]);
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let corpus = variant_corpus();
        let options = ContextOptions {
            sequence_type: SequenceType::Tier("vowels".into()),
            ..Default::default()
        };
        assert!(matches!(CorpusContext::new(&corpus, options), Err(PhonoError::Config(_))));
    }

    #[test]
    fn test_inventory_and_require() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Type, VariantPolicy::SeparatedTokens);
        let inventory = ctx.inventory();
        assert!(inventory.contains(&"ʔ".to_string()));
        assert!(inventory.contains(&"#".to_string()));
        assert!(ctx.require_segments(&["k", "ʔ"]).is_ok());
        assert!(matches!(
            ctx.require_segments(&["q"]),
            Err(PhonoError::SegmentNotFound(s)) if s == "q"
        ));
    }

    #[test]
    fn test_inventory_computed_once() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Type, VariantPolicy::SeparatedTokens);
        let first: *const BTreeSet<String> = ctx.inventory_set();
        assert!(ctx.require_segments(&["k"]).is_ok());
        assert!(std::ptr::eq(first, ctx.inventory_set()));
        assert_eq!(ctx.inventory(), ctx.inventory_set().iter().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_frequency_base_is_cached() {
        let corpus = variant_corpus();
        let ctx = context(&corpus, FrequencyKind::Type, VariantPolicy::Canonical);
        let a = ctx.frequency_base(FrequencyBaseKey::unigrams()).unwrap();
        let b = ctx.frequency_base(FrequencyBaseKey::unigrams()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.total(), 8.0);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("token".parse::<FrequencyKind>().unwrap(), FrequencyKind::Token);
        assert_eq!("weighted".parse::<VariantPolicy>().unwrap(), VariantPolicy::Weighted);
        assert_eq!(
            "tier:vowels".parse::<SequenceType>().unwrap(),
            SequenceType::Tier("vowels".into())
        );
        assert!("tier:".parse::<SequenceType>().is_err());
        assert!("tokens".parse::<FrequencyKind>().is_err());
    }
}
