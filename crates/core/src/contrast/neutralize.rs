//! Merging contrasting segments into shared neutralization classes.

use std::collections::{BTreeMap, BTreeSet};

use crate::environment::{satisfies_all, EnvironmentFilter};
use crate::error::{PhonoError, Result};

/// One position of a neutralized sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    Literal(String),
    /// Any member of neutralization class `n`.
    Neutralized(usize),
}

/// Maps target segments to neutralization classes.
///
/// Pairs sharing a segment fall into one class, so adding pairs only ever
/// merges classes.
#[derive(Debug, Clone)]
pub struct Neutralizer {
    classes: BTreeMap<String, usize>,
}

impl Neutralizer {
    pub fn new<S: AsRef<str>>(pairs: &[(S, S)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(PhonoError::Config("at least one segment pair is required".into()));
        }

        let mut classes: BTreeMap<String, usize> = BTreeMap::new();
        for (next_id, (a, b)) in pairs.iter().enumerate() {
            let (a, b) = (a.as_ref(), b.as_ref());
            if a == b {
                return Err(PhonoError::Config(format!(
                    "segment pair ({}, {}) must name two different segments",
                    a, b
                )));
            }
            let class = match (classes.get(a).copied(), classes.get(b).copied()) {
                (Some(ca), Some(cb)) if ca != cb => {
                    for c in classes.values_mut() {
                        if *c == cb {
                            *c = ca;
                        }
                    }
                    ca
                }
                (Some(c), _) | (None, Some(c)) => c,
                (None, None) => next_id,
            };
            classes.insert(a.to_string(), class);
            classes.insert(b.to_string(), class);
        }
        Ok(Self { classes })
    }

    pub fn is_target(&self, segment: &str) -> bool {
        self.classes.contains_key(segment)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|s| s.as_str())
    }

    /// Number of distinct classes.
    pub fn class_count(&self) -> usize {
        self.classes.values().collect::<BTreeSet<_>>().len()
    }

    /// Replace every target at a position satisfying all `filters`.
    ///
    /// Returns the neutralized sequence and whether any position changed.
    pub fn neutralize(&self, sequence: &[String], filters: &[EnvironmentFilter]) -> (Vec<Unit>, bool) {
        let mut changed = false;
        let units = sequence
            .iter()
            .enumerate()
            .map(|(i, s)| match self.classes.get(s) {
                Some(class) if satisfies_all(filters, sequence, i) => {
                    changed = true;
                    Unit::Neutralized(*class)
                }
                _ => Unit::Literal(s.clone()),
            })
            .collect();
        (units, changed)
    }
}
