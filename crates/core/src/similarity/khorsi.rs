//! Frequency-informed string similarity (Khorsi 2012).
//!
//! Shared material is rewarded and unshared material penalised, each
//! segment weighted by its negative log unigram probability, so rare
//! shared segments count for more than common ones.

use std::sync::Arc;

use super::DistanceAlgorithm;
use crate::corpus::{CorpusContext, FrequencyBase, FrequencyBaseKey};
use crate::error::Result;

/// Longest common contiguous run: `(start_in_a, start_in_b, length)`.
///
/// Ties resolve to the run ending earliest in `a`, then in `b`.
pub fn longest_common_substring(a: &[String], b: &[String]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            if curr[j] > best.2 {
                best = (i - curr[j], j - curr[j], curr[j]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

pub struct FrequencyWeightedSimilarity {
    base: Arc<FrequencyBase>,
}

impl FrequencyWeightedSimilarity {
    pub fn new(base: Arc<FrequencyBase>) -> Self {
        Self { base }
    }

    /// Use the context's cached unigram base.
    pub fn from_context(context: &CorpusContext<'_>) -> Result<Self> {
        Ok(Self::new(context.frequency_base(FrequencyBaseKey::unigrams())?))
    }

    fn weight(&self, segments: &[String]) -> Result<f64> {
        let mut total = 0.0;
        for s in segments {
            let p = self.base.probability(std::slice::from_ref(s))?;
            total += (1.0 / p).ln();
        }
        Ok(total)
    }
}

impl DistanceAlgorithm for FrequencyWeightedSimilarity {
    fn name(&self) -> &str {
        "khorsi"
    }

    fn score(&self, a: &[String], b: &[String]) -> Result<f64> {
        let (sa, sb, len) = longest_common_substring(a, b);
        let shared = &a[sa..sa + len];
        let leftover_a: Vec<String> = a[..sa].iter().chain(&a[sa + len..]).cloned().collect();
        let leftover_b: Vec<String> = b[..sb].iter().chain(&b[sb + len..]).cloned().collect();

        Ok(self.weight(shared)? - self.weight(&leftover_a)? - self.weight(&leftover_b)?)
    }

    fn higher_is_closer(&self) -> bool {
        true
    }
}
