//! Dynamic-programming alignment of segment sequences.
//!
//! Costs come from a pluggable [`SegmentMetric`]: either categorical
//! (identical or not) or summed feature disagreement. Every cell of the
//! (m+1)×(n+1) matrix records which predecessors reached its minimum;
//! backtracking prefers diagonal, then up (deletion), then left
//! (insertion). Only the total cost is guaranteed independent of that
//! order.

use serde::{Deserialize, Serialize};

use crate::error::{PhonoError, Result};
use crate::types::{feature_of, FeatureSystem, FeatureValue, FeatureVector, BOUNDARY};

/// Multipliers applied to the base segment costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Penalties {
    pub insertion: f64,
    pub deletion: f64,
    pub substitution: f64,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            insertion: 1.0,
            deletion: 1.0,
            substitution: 1.0,
        }
    }
}

/// Per-feature costs for [`FeatureMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureCosts {
    /// Both values specified and different
    pub mismatch: f64,
    /// Exactly one value unspecified
    pub underspecification: f64,
}

impl Default for FeatureCosts {
    fn default() -> Self {
        Self {
            mismatch: 1.0,
            underspecification: 0.25,
        }
    }
}

impl FeatureCosts {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("mismatch", self.mismatch), ("underspecification", self.underspecification)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhonoError::Config(format!(
                    "{} cost must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignerConfig {
    pub penalties: Penalties,
    /// Candidates within this distance of the minimum count as tied.
    pub tolerance: f64,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            penalties: Penalties::default(),
            tolerance: 1e-9,
        }
    }
}

impl AlignerConfig {
    pub fn validate(&self) -> Result<()> {
        let p = &self.penalties;
        for (name, value) in [
            ("insertion", p.insertion),
            ("deletion", p.deletion),
            ("substitution", p.substitution),
            ("tolerance", self.tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhonoError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Base cost of comparing segments, before penalties. Must be symmetric.
pub trait SegmentMetric {
    fn substitution(&self, a: &str, b: &str) -> Result<f64>;

    /// Cost of inserting or deleting `segment`.
    fn indel(&self, segment: &str) -> Result<f64>;
}

/// 0 for identical segments, 1 otherwise; every insertion/deletion costs 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Categorical;

impl SegmentMetric for Categorical {
    fn substitution(&self, a: &str, b: &str) -> Result<f64> {
        Ok(if a == b { 0.0 } else { 1.0 })
    }

    fn indel(&self, _segment: &str) -> Result<f64> {
        Ok(1.0)
    }
}

/// Summed per-feature disagreement over a feature system.
///
/// The boundary symbol reads as an all-unspecified vector.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMetric<'a> {
    system: &'a FeatureSystem,
    costs: FeatureCosts,
}

impl<'a> FeatureMetric<'a> {
    pub fn new(system: &'a FeatureSystem, costs: FeatureCosts) -> Result<Self> {
        costs.validate()?;
        Ok(Self { system, costs })
    }

    fn vector(&self, symbol: &str) -> Result<Option<&'a FeatureVector>> {
        if symbol == BOUNDARY {
            return Ok(None);
        }
        self.system.specify(symbol).map(Some)
    }

    fn value_cost(&self, a: &FeatureValue, b: &FeatureValue) -> f64 {
        if a == b {
            0.0
        } else if a.is_unspecified() || b.is_unspecified() {
            self.costs.underspecification
        } else {
            self.costs.mismatch
        }
    }

    fn compare(&self, a: Option<&FeatureVector>, b: Option<&FeatureVector>) -> f64 {
        static EMPTY: FeatureValue = FeatureValue::Unspecified;
        self.system
            .feature_names
            .iter()
            .map(|name| {
                let va = a.map(|v| feature_of(v, name)).unwrap_or(&EMPTY);
                let vb = b.map(|v| feature_of(v, name)).unwrap_or(&EMPTY);
                self.value_cost(va, vb)
            })
            .sum()
    }
}

impl SegmentMetric for FeatureMetric<'_> {
    fn substitution(&self, a: &str, b: &str) -> Result<f64> {
        let va = self.vector(a)?;
        let vb = self.vector(b)?;
        if a == b {
            return Ok(0.0);
        }
        Ok(self.compare(va, vb))
    }

    fn indel(&self, segment: &str) -> Result<f64> {
        let v = self.vector(segment)?;
        Ok(self.compare(v, None))
    }
}

/// Predecessors that achieved a cell's minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directions {
    pub diagonal: bool,
    pub up: bool,
    pub left: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub cost: f64,
    pub directions: Directions,
}

/// Filled DP matrix; row `i` covers the first `i` segments of the first sequence.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    cells: Vec<Vec<Cell>>,
}

impl SimilarityMatrix {
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn cell(&self, i: usize, j: usize) -> &Cell {
        &self.cells[i][j]
    }

    /// Cost at the bottom-right cell.
    pub fn total_cost(&self) -> f64 {
        self.cells
            .last()
            .and_then(|r| r.last())
            .map(|c| c.cost)
            .unwrap_or(0.0)
    }
}

/// One column of an alignment; `None` marks an insertion or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub left: Option<String>,
    pub right: Option<String>,
}

impl AlignedPair {
    pub fn is_indel(&self) -> bool {
        self.left.is_none() || self.right.is_none()
    }

    pub fn is_identity(&self) -> bool {
        !self.is_indel() && self.left == self.right
    }
}

#[derive(Debug, Clone)]
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    pub cost: f64,
    pub matrix: SimilarityMatrix,
}

impl Alignment {
    /// Longest contiguous run of pairs with no insertion or deletion (first on ties).
    pub fn core(&self) -> &[AlignedPair] {
        let mut best = (0, 0);
        let mut start = 0;
        for (i, pair) in self.pairs.iter().enumerate() {
            if pair.is_indel() {
                start = i + 1;
            } else if i + 1 - start > best.1 - best.0 {
                best = (start, i + 1);
            }
        }
        &self.pairs[best.0..best.1]
    }

    /// Pairs aligning two different segments.
    pub fn substitutions(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| !p.is_indel() && !p.is_identity())
            .count()
    }

    /// True if the core consists only of identities and the alternation
    /// `{s1, s2}`, with at least one alternation.
    pub fn instantiates_alternation(&self, s1: &str, s2: &str) -> bool {
        if s1 == s2 {
            return false;
        }
        let core = self.core();
        let mut alternations = 0;
        for pair in core {
            if pair.is_identity() {
                continue;
            }
            match (pair.left.as_deref(), pair.right.as_deref()) {
                (Some(a), Some(b)) if (a == s1 && b == s2) || (a == s2 && b == s1) => {
                    alternations += 1;
                }
                _ => return false,
            }
        }
        alternations > 0
    }
}

/// Edit-distance aligner over a segment metric.
#[derive(Debug, Clone)]
pub struct Aligner<M> {
    metric: M,
    config: AlignerConfig,
}

impl<M: SegmentMetric> Aligner<M> {
    pub fn new(metric: M, config: AlignerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { metric, config })
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    fn sub_cost(&self, a: &str, b: &str) -> Result<f64> {
        Ok(self.metric.substitution(a, b)? * self.config.penalties.substitution)
    }

    fn del_cost(&self, a: &str) -> Result<f64> {
        Ok(self.metric.indel(a)? * self.config.penalties.deletion)
    }

    fn ins_cost(&self, b: &str) -> Result<f64> {
        Ok(self.metric.indel(b)? * self.config.penalties.insertion)
    }

    /// Fill the full matrix for `a` (rows) against `b` (columns).
    pub fn similarity_matrix(&self, a: &[String], b: &[String]) -> Result<SimilarityMatrix> {
        let m = a.len();
        let n = b.len();
        let blank = Cell {
            cost: 0.0,
            directions: Directions::default(),
        };
        let mut cells = vec![vec![blank; n + 1]; m + 1];

        for i in 1..=m {
            cells[i][0] = Cell {
                cost: cells[i - 1][0].cost + self.del_cost(&a[i - 1])?,
                directions: Directions { up: true, ..Directions::default() },
            };
        }
        for j in 1..=n {
            cells[0][j] = Cell {
                cost: cells[0][j - 1].cost + self.ins_cost(&b[j - 1])?,
                directions: Directions { left: true, ..Directions::default() },
            };
        }

        let tolerance = self.config.tolerance;
        for i in 1..=m {
            for j in 1..=n {
                let diagonal = cells[i - 1][j - 1].cost + self.sub_cost(&a[i - 1], &b[j - 1])?;
                let up = cells[i - 1][j].cost + self.del_cost(&a[i - 1])?;
                let left = cells[i][j - 1].cost + self.ins_cost(&b[j - 1])?;

                let best = diagonal.min(up).min(left);
                cells[i][j] = Cell {
                    cost: best,
                    directions: Directions {
                        diagonal: diagonal - best <= tolerance,
                        up: up - best <= tolerance,
                        left: left - best <= tolerance,
                    },
                };
            }
        }

        Ok(SimilarityMatrix { cells })
    }

    /// Total alignment cost without backtracking.
    pub fn distance(&self, a: &[String], b: &[String]) -> Result<f64> {
        Ok(self.similarity_matrix(a, b)?.total_cost())
    }

    /// Fill the matrix and backtrack one optimal alignment.
    pub fn align(&self, a: &[String], b: &[String]) -> Result<Alignment> {
        let matrix = self.similarity_matrix(a, b)?;
        let pairs = backtrack(&matrix, a, b);
        Ok(Alignment {
            pairs,
            cost: matrix.total_cost(),
            matrix,
        })
    }
}

fn backtrack(matrix: &SimilarityMatrix, a: &[String], b: &[String]) -> Vec<AlignedPair> {
    let (mut i, mut j) = (a.len(), b.len());
    let mut pairs = Vec::with_capacity(i.max(j));

    while i > 0 || j > 0 {
        let d = matrix.cell(i, j).directions;
        if d.diagonal && i > 0 && j > 0 {
            pairs.push(AlignedPair {
                left: Some(a[i - 1].clone()),
                right: Some(b[j - 1].clone()),
            });
            i -= 1;
            j -= 1;
        } else if (d.up || j == 0) && i > 0 {
            pairs.push(AlignedPair {
                left: Some(a[i - 1].clone()),
                right: None,
            });
            i -= 1;
        } else {
            pairs.push(AlignedPair {
                left: None,
                right: Some(b[j - 1].clone()),
            });
            j -= 1;
        }
    }

    pairs.reverse();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn seq(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn categorical() -> Aligner<Categorical> {
        Aligner::new(Categorical, AlignerConfig::default()).unwrap()
    }

    fn features() -> FeatureSystem {
        FeatureSystem::from_segments(vec![
            Segment::new("s", &[("voice", "-"), ("ant", "+"), ("son", "-")]),
            Segment::new("ʃ", &[("voice", "-"), ("ant", "-"), ("son", "-")]),
            Segment::new("a", &[("voice", "+"), ("ant", "0"), ("son", "+")]),
            Segment::new("i", &[("voice", "+"), ("ant", "0"), ("son", "+")]),
            Segment::new("t", &[("voice", "-"), ("ant", "+"), ("son", "-")]),
        ])
    }

    #[test]
    fn test_mata_nata() {
        let alignment = categorical().align(&seq("mata"), &seq("nata")).unwrap();
        assert!((alignment.cost - 1.0).abs() < 1e-12);
        assert_eq!(alignment.pairs.len(), 4);
        assert_eq!(alignment.substitutions(), 1);
        assert_eq!(alignment.pairs.iter().filter(|p| p.is_identity()).count(), 3);
        assert_eq!(alignment.pairs[0].left.as_deref(), Some("m"));
        assert_eq!(alignment.pairs[0].right.as_deref(), Some("n"));
    }

    #[test]
    fn test_identity_zero() {
        let aligner = categorical();
        assert_eq!(aligner.distance(&seq("kitab"), &seq("kitab")).unwrap(), 0.0);

        let system = features();
        let feature = Aligner::new(FeatureMetric::new(&system, FeatureCosts::default()).unwrap(), AlignerConfig::default()).unwrap();
        assert_eq!(feature.distance(&seq("sasi"), &seq("sasi")).unwrap(), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let aligner = categorical();
        let words = ["kitten", "sitting", "", "a", "flaw", "lawn"];
        for a in &words {
            for b in &words {
                let ab = aligner.distance(&seq(a), &seq(b)).unwrap();
                let ba = aligner.distance(&seq(b), &seq(a)).unwrap();
                assert!((ab - ba).abs() < 1e-12, "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_triangle_inequality_categorical() {
        let aligner = categorical();
        let words = ["mata", "nata", "natal", "tal", "", "sasi"];
        for a in &words {
            for b in &words {
                for c in &words {
                    let ac = aligner.distance(&seq(a), &seq(c)).unwrap();
                    let ab = aligner.distance(&seq(a), &seq(b)).unwrap();
                    let bc = aligner.distance(&seq(b), &seq(c)).unwrap();
                    assert!(ac <= ab + bc + 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_classic_edit_distance() {
        assert_eq!(categorical().distance(&seq("kitten"), &seq("sitting")).unwrap(), 3.0);
    }

    #[test]
    fn test_empty_sequences() {
        let aligner = categorical();
        assert_eq!(aligner.distance(&[], &[]).unwrap(), 0.0);
        let alignment = aligner.align(&seq("abc"), &[]).unwrap();
        assert_eq!(alignment.cost, 3.0);
        assert!(alignment.pairs.iter().all(|p| p.right.is_none()));
        let alignment = aligner.align(&[], &seq("ab")).unwrap();
        assert_eq!(alignment.cost, 2.0);
        assert!(alignment.pairs.iter().all(|p| p.left.is_none()));
    }

    #[test]
    fn test_penalties_scale_costs() {
        let config = AlignerConfig {
            penalties: Penalties { insertion: 2.0, deletion: 3.0, substitution: 10.0 },
            ..AlignerConfig::default()
        };
        let aligner = Aligner::new(Categorical, config).unwrap();
        // Substitution (10) loses to deletion + insertion (5)
        let alignment = aligner.align(&seq("a"), &seq("b")).unwrap();
        assert_eq!(alignment.cost, 5.0);
        assert_eq!(alignment.pairs.len(), 2);
        assert_eq!(aligner.distance(&seq("ab"), &[]).unwrap(), 6.0);
        assert_eq!(aligner.distance(&[], &seq("ab")).unwrap(), 4.0);
    }

    #[test]
    fn test_tie_prefers_diagonal() {
        let config = AlignerConfig {
            penalties: Penalties { substitution: 2.0, ..Penalties::default() },
            ..AlignerConfig::default()
        };
        let aligner = Aligner::new(Categorical, config).unwrap();
        let alignment = aligner.align(&seq("a"), &seq("b")).unwrap();
        let d = alignment.matrix.cell(1, 1).directions;
        assert!(d.diagonal && d.up && d.left);
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.cost, 2.0);
    }

    #[test]
    fn test_near_tie_within_tolerance() {
        let config = AlignerConfig {
            penalties: Penalties { insertion: 0.5, deletion: 0.5, substitution: 1.05 },
            tolerance: 0.1,
        };
        let aligner = Aligner::new(Categorical, config).unwrap();
        let alignment = aligner.align(&seq("a"), &seq("b")).unwrap();
        let d = alignment.matrix.cell(1, 1).directions;
        assert!(d.diagonal && d.up && d.left);
        // The recorded cost stays the true minimum
        assert_eq!(alignment.cost, 1.0);
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.pairs[0].left.as_deref(), Some("a"));
        assert_eq!(alignment.pairs[0].right.as_deref(), Some("b"));

        let strict = Aligner::new(Categorical, AlignerConfig { tolerance: 0.01, ..config }).unwrap();
        let alignment = strict.align(&seq("a"), &seq("b")).unwrap();
        assert!(!alignment.matrix.cell(1, 1).directions.diagonal);
        assert_eq!(alignment.cost, 1.0);
        assert_eq!(alignment.pairs.len(), 2);
    }

    #[test]
    fn test_invalid_feature_costs_rejected() {
        let system = features();
        for costs in [
            FeatureCosts { underspecification: -0.5, ..FeatureCosts::default() },
            FeatureCosts { mismatch: f64::NAN, ..FeatureCosts::default() },
        ] {
            assert!(matches!(FeatureMetric::new(&system, costs), Err(PhonoError::Config(_))));
        }
    }

    #[test]
    fn test_features_added_after_construction_are_costed() {
        let mut system = FeatureSystem::new(&["nasal"]);
        system.insert(Segment::new("s", &[("nasal", "-"), ("ant", "+")]));
        system.insert(Segment::new("ʃ", &[("nasal", "-"), ("ant", "-")]));
        let metric = FeatureMetric::new(&system, FeatureCosts::default()).unwrap();
        assert_eq!(metric.substitution("s", "ʃ").unwrap(), 1.0);
    }

    #[test]
    fn test_invalid_penalty_rejected() {
        let config = AlignerConfig {
            penalties: Penalties { insertion: -1.0, ..Penalties::default() },
            ..AlignerConfig::default()
        };
        assert!(matches!(Aligner::new(Categorical, config), Err(PhonoError::Config(_))));
    }

    #[test]
    fn test_feature_metric_costs() {
        let system = features();
        let metric = FeatureMetric::new(&system, FeatureCosts::default()).unwrap();
        assert_eq!(metric.substitution("s", "ʃ").unwrap(), 1.0);
        assert_eq!(metric.substitution("s", "t").unwrap(), 0.0);
        // voice mismatch, son mismatch, ant underspecified
        assert_eq!(metric.substitution("s", "a").unwrap(), 2.25);
        assert_eq!(metric.substitution("a", "s").unwrap(), 2.25);
        assert_eq!(metric.indel("s").unwrap(), 0.75);
        assert_eq!(metric.indel("a").unwrap(), 0.5);
        assert_eq!(metric.indel("#").unwrap(), 0.0);
    }

    #[test]
    fn test_feature_distance_nonnegative() {
        let system = features();
        let aligner = Aligner::new(FeatureMetric::new(&system, FeatureCosts::default()).unwrap(), AlignerConfig::default()).unwrap();
        let words = ["sasi", "ʃaʃi", "tat", "", "i"];
        for a in &words {
            for b in &words {
                assert!(aligner.distance(&seq(a), &seq(b)).unwrap() >= 0.0);
            }
        }
        assert_eq!(aligner.distance(&seq("sasi"), &seq("ʃaʃi")).unwrap(), 2.0);
    }

    #[test]
    fn test_missing_specification_aborts_alignment() {
        let system = features();
        let aligner = Aligner::new(FeatureMetric::new(&system, FeatureCosts::default()).unwrap(), AlignerConfig::default()).unwrap();
        match aligner.distance(&seq("sa"), &seq("qa")) {
            Err(PhonoError::MissingSpecification(s)) => assert_eq!(s, vec!["q"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_alternation_core() {
        let alignment = categorical().align(&seq("sasi"), &seq("ʃaʃi")).unwrap();
        assert!(alignment.instantiates_alternation("s", "ʃ"));
        assert!(alignment.instantiates_alternation("ʃ", "s"));
        assert!(!alignment.instantiates_alternation("s", "z"));

        let same = categorical().align(&seq("sasi"), &seq("sasi")).unwrap();
        assert!(!same.instantiates_alternation("s", "ʃ"));
    }

    #[test]
    fn test_alternation_ignores_indels_outside_core() {
        // "sata" vs "ʃatan": trailing insertion is outside the core
        let alignment = categorical().align(&seq("sata"), &seq("ʃatan")).unwrap();
        assert_eq!(alignment.core().len(), 4);
        assert!(alignment.instantiates_alternation("s", "ʃ"));
    }

    #[test]
    fn test_core_longest_run() {
        let alignment = Alignment {
            pairs: vec![
                AlignedPair { left: Some("a".into()), right: Some("a".into()) },
                AlignedPair { left: Some("b".into()), right: None },
                AlignedPair { left: Some("c".into()), right: Some("c".into()) },
                AlignedPair { left: Some("d".into()), right: Some("e".into()) },
            ],
            cost: 0.0,
            matrix: SimilarityMatrix { cells: vec![] },
        };
        let core = alignment.core();
        assert_eq!(core.len(), 2);
        assert_eq!(core[0].left.as_deref(), Some("c"));
    }
}
