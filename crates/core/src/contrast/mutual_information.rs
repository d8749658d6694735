//! Pointwise mutual information between two segments.

use crate::corpus::{CorpusContext, FrequencyBaseKey};
use crate::error::{PhonoError, Result};
use crate::types::BOUNDARY;

/// `log2(p(a, b) / (p(a) p(b)))` for the bigram `(a, b)`.
///
/// By default probabilities come from adjacent bigrams with word edges
/// padded by `#`; `halve_edges` halves the weight of grams touching an
/// edge. With `in_word`, the probabilities are instead the share of words
/// containing each segment, and of words containing both.
pub fn pointwise_mi(
    context: &CorpusContext<'_>,
    bigram: (&str, &str),
    halve_edges: bool,
    in_word: bool,
) -> Result<f64> {
    let (first, second) = bigram;
    context.require_segments(&[first, second])?;
    let mi = if in_word {
        in_word_mi(context, first, second)?
    } else {
        let unigram_key = FrequencyBaseKey {
            halve_edges,
            word_boundaries: true,
            ..FrequencyBaseKey::unigrams()
        };
        let unigrams = context.frequency_base(unigram_key)?;
        let bigrams = context.frequency_base(FrequencyBaseKey::bigrams(halve_edges))?;

        let joint = bigrams.probability(&[first.to_string(), second.to_string()])?;
        let p_first = unigrams.probability(&[first.to_string()])?;
        let p_second = unigrams.probability(&[second.to_string()])?;
        (joint / (p_first * p_second)).log2()
    };
    log::debug!("MI({}, {}) = {:.4}", first, second, mi);
    Ok(mi)
}

fn in_word_mi(context: &CorpusContext<'_>, first: &str, second: &str) -> Result<f64> {
    let contains = |sequence: &[String], segment: &str| segment == BOUNDARY || sequence.iter().any(|s| s == segment);

    let (mut total, mut with_first, mut with_second, mut with_both) = (0.0, 0.0, 0.0, 0.0);
    for word in context.iter() {
        let a = contains(&word.sequence, first);
        let b = contains(&word.sequence, second);
        total += word.frequency;
        if a {
            with_first += word.frequency;
        }
        if b {
            with_second += word.frequency;
        }
        if a && b {
            with_both += word.frequency;
        }
    }

    if total <= 0.0 {
        return Err(PhonoError::NoOccurrences(vec![first.to_string(), second.to_string()]));
    }
    if with_both <= 0.0 {
        return Err(PhonoError::GramNotFound(vec![first.to_string(), second.to_string()]));
    }
    Ok(((with_both / total) / ((with_first / total) * (with_second / total))).log2())
}
