//! Words, corpora and the contexts analyses iterate over.

pub mod context;
pub mod frequency;

pub use context::{ContextOptions, ContextWord, CorpusContext, FrequencyKind, SequenceType, VariantPolicy};
pub use frequency::{FrequencyBase, FrequencyBaseKey};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PhonoError, Result};
use crate::types::{satisfies, FeatureBundle, FeatureSystem, BOUNDARY};

/// An alternative pronunciation of a word with its own token count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub transcription: Vec<String>,
    pub frequency: f64,
}

/// A corpus entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub spelling: String,
    pub transcription: Vec<String>,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// Named sub-sequences of the transcription (see [`Corpus::add_tier`]).
    #[serde(default)]
    pub tiers: BTreeMap<String, Vec<String>>,
}

fn default_frequency() -> f64 {
    1.0
}

impl Word {
    pub fn new(spelling: &str, transcription: &[&str], frequency: f64) -> Self {
        Self {
            spelling: spelling.to_string(),
            transcription: transcription.iter().map(|s| s.to_string()).collect(),
            frequency,
            variants: Vec::new(),
            tiers: BTreeMap::new(),
        }
    }

    /// Word whose transcription is its spelling split into characters.
    pub fn from_spelling(spelling: &str, frequency: f64) -> Self {
        let symbols: Vec<String> = spelling.chars().map(|c| c.to_string()).collect();
        Self {
            spelling: spelling.to_string(),
            transcription: symbols,
            frequency,
            variants: Vec::new(),
            tiers: BTreeMap::new(),
        }
    }

    pub fn with_variant(mut self, transcription: &[&str], frequency: f64) -> Self {
        self.variants.push(Variant {
            transcription: transcription.iter().map(|s| s.to_string()).collect(),
            frequency,
        });
        self
    }

    pub fn spelling_sequence(&self) -> Vec<String> {
        self.spelling.chars().map(|c| c.to_string()).collect()
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.spelling == other.spelling && self.transcription == other.transcription
    }
}

fn valid_frequency(f: f64) -> bool {
    f.is_finite() && f >= 0.0
}

/// A keyed collection of words plus the feature system describing them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub name: String,
    pub features: FeatureSystem,
    words: BTreeMap<String, Word>,
}

impl Corpus {
    pub fn new(name: &str, features: FeatureSystem) -> Self {
        Self {
            name: name.to_string(),
            features,
            words: BTreeMap::new(),
        }
    }

    /// Add a word, returning the key it was stored under.
    ///
    /// Duplicate spellings are keyed `spelling(1)`, `spelling(2)`, ...
    pub fn add_word(&mut self, word: Word) -> Result<String> {
        if !valid_frequency(word.frequency) {
            return Err(PhonoError::Config(format!(
                "word '{}' has invalid frequency {}",
                word.spelling, word.frequency
            )));
        }
        if let Some(v) = word.variants.iter().find(|v| !valid_frequency(v.frequency)) {
            return Err(PhonoError::Config(format!(
                "variant of '{}' has invalid frequency {}",
                word.spelling, v.frequency
            )));
        }

        let mut key = word.spelling.clone();
        let mut n = 0;
        while self.words.contains_key(&key) {
            n += 1;
            key = format!("{}({})", word.spelling, n);
        }
        self.words.insert(key.clone(), word);
        Ok(key)
    }

    pub fn find(&self, key: &str) -> Result<&Word> {
        self.words
            .get(key)
            .ok_or_else(|| PhonoError::WordNotFound(key.to_string()))
    }

    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.words.values()
    }

    /// `(key, word)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Word)> {
        self.words.iter().map(|(k, w)| (k.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sorted symbols of every transcription and variant, plus the boundary.
    pub fn inventory(&self) -> Vec<String> {
        let mut symbols: BTreeSet<&str> = BTreeSet::new();
        symbols.insert(BOUNDARY);
        for word in self.words.values() {
            symbols.extend(word.transcription.iter().map(|s| s.as_str()));
            for variant in &word.variants {
                symbols.extend(variant.transcription.iter().map(|s| s.as_str()));
            }
        }
        symbols.into_iter().map(|s| s.to_string()).collect()
    }

    /// Inventory symbols the feature system has no vector for.
    pub fn missing_specifications(&self) -> Vec<String> {
        self.inventory()
            .into_iter()
            .filter(|s| s != BOUNDARY && !self.features.contains(s))
            .collect()
    }

    /// Report missing specifications as an error the caller may ignore.
    pub fn check_specifications(&self) -> Result<()> {
        let missing = self.missing_specifications();
        if missing.is_empty() {
            Ok(())
        } else {
            log::warn!(
                "Corpus '{}': {} segment(s) lack a feature specification",
                self.name,
                missing.len()
            );
            Err(PhonoError::MissingSpecification(missing))
        }
    }

    /// Store on every word the sub-sequence of segments matching `bundle`.
    pub fn add_tier(&mut self, name: &str, bundle: &FeatureBundle) -> Result<()> {
        if bundle.is_empty() {
            return Err(PhonoError::Config(format!("tier '{}' needs at least one feature", name)));
        }
        let features = &self.features;
        for word in self.words.values_mut() {
            let mut tier = Vec::new();
            for symbol in &word.transcription {
                if satisfies(features.specify(symbol)?, bundle) {
                    tier.push(symbol.clone());
                }
            }
            word.tiers.insert(name.to_string(), tier);
        }
        log::debug!("Added tier '{}' to {} words", name, self.words.len());
        Ok(())
    }
}
