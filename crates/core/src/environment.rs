//! Left/right context filters restricting where a segment is counted.
//!
//! Text syntax is `LHS_RHS`. Each side is a run of positions written left
//! to right; a position is a segment symbol, `#`, a set `{a,b}` or a feature
//! bundle `[+voice,-son]`. Either side may be empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PhonoError, Result};
use crate::types::{FeatureBundle, FeatureSystem, FeatureValue, BOUNDARY};

/// Acceptable symbols at one position.
pub type SegmentSet = BTreeSet<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFilter {
    /// Positions before the target, the last one adjacent to it.
    pub lhs: Vec<SegmentSet>,
    /// Positions after the target, the first one adjacent to it.
    pub rhs: Vec<SegmentSet>,
}

fn symbol_at(sequence: &[String], position: isize) -> &str {
    if position < 0 {
        return BOUNDARY;
    }
    sequence
        .get(position as usize)
        .map(|s| s.as_str())
        .unwrap_or(BOUNDARY)
}

impl EnvironmentFilter {
    pub fn new(lhs: Vec<SegmentSet>, rhs: Vec<SegmentSet>) -> Self {
        Self { lhs, rhs }
    }

    /// Filter from single-symbol positions, e.g. `from_symbols(&["#"], &["a"])`.
    pub fn from_symbols(lhs: &[&str], rhs: &[&str]) -> Self {
        let to_sets = |side: &[&str]| -> Vec<SegmentSet> {
            side.iter()
                .map(|s| std::iter::once(s.to_string()).collect())
                .collect()
        };
        Self::new(to_sets(lhs), to_sets(rhs))
    }

    pub fn is_wildcard(&self) -> bool {
        self.lhs.is_empty() && self.rhs.is_empty()
    }

    /// True if the context around `sequence[index]` fits this filter.
    ///
    /// Positions beyond either edge of the word read as `#`.
    pub fn matches(&self, sequence: &[String], index: usize) -> bool {
        let index = index as isize;
        let n = self.lhs.len() as isize;
        let left_ok = self
            .lhs
            .iter()
            .enumerate()
            .all(|(k, set)| set.contains(symbol_at(sequence, index - n + k as isize)));
        left_ok
            && self
                .rhs
                .iter()
                .enumerate()
                .all(|(k, set)| set.contains(symbol_at(sequence, index + 1 + k as isize)))
    }

    /// Parse `LHS_RHS` against a feature system and segment inventory.
    pub fn parse(text: &str, system: &FeatureSystem, inventory: &[String]) -> Result<Self> {
        let err = |reason: String| PhonoError::Environment {
            input: text.to_string(),
            reason,
        };

        let parts: Vec<&str> = text.split('_').collect();
        if parts.len() != 2 {
            return Err(err("expected exactly one '_' marking the target".into()));
        }
        let lhs = parse_side(parts[0], system, inventory).map_err(err)?;
        let rhs = parse_side(parts[1], system, inventory).map_err(err)?;
        Ok(Self { lhs, rhs })
    }
}

/// Every filter in `filters` accepts position `index`; no filters accepts all.
pub fn satisfies_all(filters: &[EnvironmentFilter], sequence: &[String], index: usize) -> bool {
    filters.iter().all(|f| f.matches(sequence, index))
}

fn parse_side(
    side: &str,
    system: &FeatureSystem,
    inventory: &[String],
) -> std::result::Result<Vec<SegmentSet>, String> {
    let chars: Vec<char> = side.chars().filter(|c| !c.is_whitespace()).collect();
    let mut positions = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' => {
                let (body, next) = take_bracketed(&chars, i, '}')?;
                let mut set = SegmentSet::new();
                for symbol in body.split(',').filter(|s| !s.is_empty()) {
                    if symbol != BOUNDARY && !inventory.iter().any(|s| s == symbol) {
                        return Err(format!("unknown segment '{}'", symbol));
                    }
                    set.insert(symbol.to_string());
                }
                if set.is_empty() {
                    return Err("empty segment set".into());
                }
                positions.push(set);
                i = next;
            }
            '[' => {
                let (body, next) = take_bracketed(&chars, i, ']')?;
                let bundle = parse_bundle(&body, system)?;
                let matched =
                    system.segments_matching(&bundle, inventory.iter().map(|s| s.as_str()));
                if matched.is_empty() {
                    return Err(format!("[{}] matches no segment in the inventory", body));
                }
                positions.push(matched.into_iter().collect());
                i = next;
            }
            '#' => {
                positions.push(std::iter::once(BOUNDARY.to_string()).collect());
                i += 1;
            }
            _ => {
                // Longest inventory symbol starting here
                let rest: String = chars[i..].iter().collect();
                let symbol = inventory
                    .iter()
                    .filter(|s| s.as_str() != BOUNDARY && rest.starts_with(s.as_str()))
                    .max_by_key(|s| s.chars().count())
                    .ok_or_else(|| format!("no inventory segment at '{}'", rest))?;
                positions.push(std::iter::once(symbol.clone()).collect());
                i += symbol.chars().count();
            }
        }
    }
    Ok(positions)
}

fn take_bracketed(
    chars: &[char],
    open: usize,
    close: char,
) -> std::result::Result<(String, usize), String> {
    let end = chars[open + 1..]
        .iter()
        .position(|&c| c == close)
        .ok_or_else(|| format!("unclosed '{}'", chars[open]))?;
    let body: String = chars[open + 1..open + 1 + end].iter().collect();
    Ok((body, open + end + 2))
}

fn parse_bundle(body: &str, system: &FeatureSystem) -> std::result::Result<FeatureBundle, String> {
    let mut bundle = FeatureBundle::new();
    for spec in body.split(',').filter(|s| !s.is_empty()) {
        let mut chars = spec.chars();
        let value = match chars.next() {
            Some('+') => FeatureValue::Plus,
            Some('-') => FeatureValue::Minus,
            Some('0') => FeatureValue::Unspecified,
            _ => return Err(format!("feature '{}' must start with +, - or 0", spec)),
        };
        let name: String = chars.collect();
        if !system.feature_names.contains(&name) {
            return Err(format!("unknown feature '{}'", name));
        }
        bundle.push((value, name));
    }
    if bundle.is_empty() {
        return Err("empty feature bundle".into());
    }
    Ok(bundle)
}

fn fmt_side(side: &[SegmentSet]) -> String {
    side.iter()
        .map(|set| {
            if set.len() == 1 {
                set.iter().next().cloned().unwrap_or_default()
            } else {
                format!("{{{}}}", set.iter().cloned().collect::<Vec<_>>().join(","))
            }
        })
        .collect()
}

impl fmt::Display for EnvironmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", fmt_side(&self.lhs), fmt_side(&self.rhs))
    }
}
