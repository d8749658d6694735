//! N-gram frequency bases, computed once per corpus context.

use std::collections::HashMap;

use crate::error::{PhonoError, Result};
use crate::types::BOUNDARY;

/// Identifies one frequency base within a context's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrequencyBaseKey {
    pub gram_size: usize,
    /// Grams touching a word boundary count half.
    pub halve_edges: bool,
    /// Count grams separately for each start position.
    pub preserve_position: bool,
    /// Pad sequences with `#` on both sides before counting.
    pub word_boundaries: bool,
}

impl FrequencyBaseKey {
    pub fn unigrams() -> Self {
        Self {
            gram_size: 1,
            halve_edges: false,
            preserve_position: false,
            word_boundaries: false,
        }
    }

    pub fn bigrams(halve_edges: bool) -> Self {
        Self {
            gram_size: 2,
            halve_edges,
            preserve_position: false,
            word_boundaries: true,
        }
    }
}

type GramKey = (Option<usize>, Vec<String>);

/// Weighted n-gram counts over a corpus context.
#[derive(Debug, Clone, Default)]
pub struct FrequencyBase {
    counts: HashMap<GramKey, f64>,
    total: f64,
}

impl FrequencyBase {
    /// Count grams over `(sequence, weight)` items.
    pub fn build<'a, I>(key: FrequencyBaseKey, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a [String], f64)>,
    {
        if key.gram_size == 0 {
            return Err(PhonoError::Config("n-gram size must be at least 1".into()));
        }

        let mut base = FrequencyBase::default();
        let boundary = BOUNDARY.to_string();
        for (sequence, weight) in items {
            let padded: Vec<&String> = if key.word_boundaries {
                std::iter::once(&boundary)
                    .chain(sequence.iter())
                    .chain(std::iter::once(&boundary))
                    .collect()
            } else {
                sequence.iter().collect()
            };
            if padded.len() < key.gram_size {
                continue;
            }
            for (start, window) in padded.windows(key.gram_size).enumerate() {
                let touches_edge = window.iter().any(|s| s.as_str() == BOUNDARY);
                let w = if key.halve_edges && touches_edge { weight / 2.0 } else { weight };
                let gram: Vec<String> = window.iter().map(|s| s.to_string()).collect();
                let position = key.preserve_position.then_some(start);
                *base.counts.entry((position, gram)).or_insert(0.0) += w;
                base.total += w;
            }
        }
        Ok(base)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Weighted count of `gram` summed over all positions.
    pub fn count(&self, gram: &[String]) -> f64 {
        self.counts
            .iter()
            .filter(|((_, g), _)| g.as_slice() == gram)
            .map(|(_, c)| *c)
            .sum()
    }

    /// Weighted count of `gram` starting at `position` (position-preserving bases only).
    pub fn count_at(&self, position: usize, gram: &[String]) -> f64 {
        self.counts
            .get(&(Some(position), gram.to_vec()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Relative frequency of `gram`; a gram never seen is an error.
    pub fn probability(&self, gram: &[String]) -> Result<f64> {
        let count = self.count(gram);
        if count <= 0.0 || self.total <= 0.0 {
            return Err(PhonoError::GramNotFound(gram.to_vec()));
        }
        Ok(count / self.total)
    }
}
