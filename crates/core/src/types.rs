use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PhonoError, Result};

/// Word-boundary symbol. Never needs a feature specification.
pub const BOUNDARY: &str = "#";

/// Value of a single phonological feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeatureValue {
    Plus,
    Minus,
    /// Underspecified ("0"); also what an absent feature reads as.
    Unspecified,
    /// Any other sign a feature system chooses to use (e.g. "n" for n/a).
    Other(String),
}

impl FeatureValue {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, FeatureValue::Unspecified)
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        match s.as_str() {
            "+" => FeatureValue::Plus,
            "-" => FeatureValue::Minus,
            "0" | "" => FeatureValue::Unspecified,
            _ => FeatureValue::Other(s),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::from(s.to_string())
    }
}

impl From<FeatureValue> for String {
    fn from(v: FeatureValue) -> Self {
        v.to_string()
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Plus => write!(f, "+"),
            FeatureValue::Minus => write!(f, "-"),
            FeatureValue::Unspecified => write!(f, "0"),
            FeatureValue::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Feature name to value. Absent features are unspecified.
pub type FeatureVector = BTreeMap<String, FeatureValue>;

/// Conjunction of feature requirements, e.g. `[+voice, -son]`.
pub type FeatureBundle = Vec<(FeatureValue, String)>;

/// A segment symbol with its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub symbol: String,
    #[serde(default)]
    pub features: FeatureVector,
}

impl Segment {
    pub fn new(symbol: &str, features: &[(&str, &str)]) -> Self {
        Self {
            symbol: symbol.to_string(),
            features: features
                .iter()
                .map(|(name, value)| (name.to_string(), FeatureValue::from(*value)))
                .collect(),
        }
    }

    /// Value of `name`, `Unspecified` when the segment does not list it.
    pub fn feature(&self, name: &str) -> &FeatureValue {
        feature_of(&self.features, name)
    }
}

pub(crate) fn feature_of<'a>(vector: &'a FeatureVector, name: &str) -> &'a FeatureValue {
    static UNSPECIFIED: FeatureValue = FeatureValue::Unspecified;
    vector.get(name).unwrap_or(&UNSPECIFIED)
}

/// True if `vector` satisfies every requirement in `bundle`.
pub fn satisfies(vector: &FeatureVector, bundle: &[(FeatureValue, String)]) -> bool {
    bundle
        .iter()
        .all(|(value, name)| feature_of(vector, name) == value)
}

/// Mapping from segment symbols to feature vectors.
///
/// `feature_names` always covers every feature some segment carries:
/// inserting or deserializing a segment with an unlisted feature appends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFeatureSystem")]
pub struct FeatureSystem {
    /// Ordered feature names; distances sum over these.
    pub feature_names: Vec<String>,
    segments: BTreeMap<String, FeatureVector>,
}

#[derive(Deserialize)]
struct RawFeatureSystem {
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    segments: BTreeMap<String, FeatureVector>,
}

impl From<RawFeatureSystem> for FeatureSystem {
    fn from(raw: RawFeatureSystem) -> Self {
        let mut system = FeatureSystem {
            feature_names: raw.feature_names,
            segments: BTreeMap::new(),
        };
        for (symbol, features) in raw.segments {
            system.insert(Segment { symbol, features });
        }
        system
    }
}

impl FeatureSystem {
    pub fn new(feature_names: &[&str]) -> Self {
        Self {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            segments: BTreeMap::new(),
        }
    }

    /// Build a system from segments, collecting feature names in first-seen order.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut system = FeatureSystem::default();
        for segment in segments {
            system.insert(segment);
        }
        system
    }

    /// Add or replace a segment, registering any feature not yet listed.
    pub fn insert(&mut self, segment: Segment) {
        for name in segment.features.keys() {
            if !self.feature_names.contains(name) {
                log::debug!("Registering feature '{}' from segment '{}'", name, segment.symbol);
                self.feature_names.push(name.clone());
            }
        }
        self.segments.insert(segment.symbol, segment.features);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.segments.contains_key(symbol)
    }

    /// Feature vector for `symbol`.
    pub fn specify(&self, symbol: &str) -> Result<&FeatureVector> {
        self.segments
            .get(symbol)
            .ok_or_else(|| PhonoError::MissingSpecification(vec![symbol.to_string()]))
    }

    pub fn segment(&self, symbol: &str) -> Result<Segment> {
        Ok(Segment {
            symbol: symbol.to_string(),
            features: self.specify(symbol)?.clone(),
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.segments.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Symbols among `candidates` whose vectors satisfy `bundle`.
    ///
    /// Candidates without a specification never match; the boundary is skipped.
    pub fn segments_matching<'a, I>(&self, bundle: &[(FeatureValue, String)], candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|symbol| *symbol != BOUNDARY)
            .filter(|symbol| {
                self.segments
                    .get(*symbol)
                    .map(|vector| satisfies(vector, bundle))
                    .unwrap_or(false)
            })
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_system() -> FeatureSystem {
        FeatureSystem::from_segments(vec![
            Segment::new("s", &[("voice", "-"), ("ant", "+"), ("son", "-")]),
            Segment::new("z", &[("voice", "+"), ("ant", "+"), ("son", "-")]),
            Segment::new("ʃ", &[("voice", "-"), ("ant", "-"), ("son", "-")]),
            Segment::new("a", &[("voice", "+"), ("ant", "0"), ("son", "+")]),
        ])
    }

    #[test]
    fn test_feature_value_parsing() {
        assert_eq!(FeatureValue::from("+"), FeatureValue::Plus);
        assert_eq!(FeatureValue::from("-"), FeatureValue::Minus);
        assert_eq!(FeatureValue::from("0"), FeatureValue::Unspecified);
        assert_eq!(FeatureValue::from("n"), FeatureValue::Other("n".into()));
    }

    #[test]
    fn test_absent_feature_is_unspecified() {
        let seg = Segment::new("s", &[("voice", "-")]);
        assert!(seg.feature("round").is_unspecified());
        assert_eq!(seg.feature("voice"), &FeatureValue::Minus);
    }

    #[test]
    fn test_feature_names_first_seen_order() {
        let system = toy_system();
        assert_eq!(system.feature_names, vec!["ant", "son", "voice"]);
        assert_eq!(system.len(), 4);
    }

    #[test]
    fn test_specify_missing() {
        let system = toy_system();
        assert!(system.specify("s").is_ok());
        match system.specify("q") {
            Err(PhonoError::MissingSpecification(symbols)) => assert_eq!(symbols, vec!["q"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_segments_matching_bundle() {
        let system = toy_system();
        let bundle = vec![(FeatureValue::Minus, "son".to_string()), (FeatureValue::Plus, "ant".to_string())];
        let matched = system.segments_matching(&bundle, system.symbols().collect::<Vec<_>>());
        assert_eq!(matched, vec!["s", "z"]);
    }

    #[test]
    fn test_segments_matching_skips_boundary_and_unknown() {
        let system = toy_system();
        let bundle = vec![(FeatureValue::Minus, "voice".to_string())];
        let matched = system.segments_matching(&bundle, ["#", "s", "q", "ʃ"]);
        assert_eq!(matched, vec!["s", "ʃ"]);
    }

    #[test]
    fn test_insert_registers_unlisted_features() {
        let mut system = FeatureSystem::new(&["nasal"]);
        system.insert(Segment::new("s", &[("nasal", "-"), ("ant", "+")]));
        assert_eq!(system.feature_names, vec!["nasal", "ant"]);
    }

    #[test]
    fn test_deserialize_merges_unlisted_features() {
        let json = r#"{
            "feature_names": ["nasal"],
            "segments": {
                "s": {"nasal": "-", "ant": "+"},
                "ʃ": {"nasal": "-", "ant": "-", "strid": "+"}
            }
        }"#;
        let system: FeatureSystem = serde_json::from_str(json).unwrap();
        assert_eq!(system.feature_names, vec!["nasal", "ant", "strid"]);
        assert_eq!(system.specify("ʃ").unwrap().len(), 3);
    }

    #[test]
    fn test_feature_system_serde_roundtrip() {
        let system = toy_system();
        let json = serde_json::to_string(&system).unwrap();
        assert!(json.contains("\"voice\":\"-\""));
        let back: FeatureSystem = serde_json::from_str(&json).unwrap();
        assert_eq!(system, back);
    }
}
