//! Contrast analyses: functional load, predictability of distribution and
//! mutual information.

pub mod functional_load;
pub mod mutual_information;
pub mod neutralize;
pub mod prod;

pub use functional_load::{
    all_pairwise_fls, deltah_fl, minpair_fl, relative_deltah_fl, relative_minpair_fl, DeltaHOptions,
    DeltaHResult, FunctionalLoadMethod, LoadScore, LoadTarget, MinPairOptions, MinPairResult, MinimalPair,
};
pub use mutual_information::pointwise_mi;
pub use neutralize::{Neutralizer, Unit};
pub use prod::{calc_prod, calc_prod_all_envs, check_environments, CoverageReport, ProdOptions, ProdResult};

/// Shannon entropy in bits of the distribution proportional to `weights`.
///
/// Zero weights contribute nothing; an empty or all-zero input gives 0.
pub fn entropy<I>(weights: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let weights: Vec<f64> = weights.into_iter().filter(|w| *w > 0.0).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let h: f64 = weights
        .iter()
        .map(|w| {
            let p = w / total;
            -p * p.log2()
        })
        .sum();
    h.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_uniform() {
        assert!((entropy([1.0, 1.0]) - 1.0).abs() < 1e-12);
        assert!((entropy([2.0, 2.0, 2.0, 2.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_degenerate() {
        assert_eq!(entropy([5.0]), 0.0);
        assert_eq!(entropy([0.0, 3.0]), 0.0);
        assert_eq!(entropy(Vec::<f64>::new()), 0.0);
        assert_eq!(entropy([0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_entropy_skewed() {
        let h = entropy([3.0, 1.0]);
        let expected = -(0.75f64 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
        assert!((h - expected).abs() < 1e-12);
    }
}
