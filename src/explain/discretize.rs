//! Quartile discretization of continuous features.
//!
//! Each feature is cut at its 25th/50th/75th percentiles over the reference
//! dataset. Duplicate cut points are merged, so a heavily tied feature can end
//! up with fewer than four bins.
//!
//! A value's bin is the number of cut points strictly below it, i.e. cut points
//! are inclusive upper bounds (`x <= q25` is bin 0, `x > q75` is the last bin).
//!
//! Besides the cut points we keep, per bin, the statistics needed to draw a
//! realistic continuous value back out of a bin (mean, std, and bounds), and
//! the bin frequencies of the training data.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::domain::FEATURE_COUNT;
use crate::error::AppError;
use crate::io::ingest::ReferenceDataset;
use crate::math::{mean, percentile_sorted, std_dev};

/// Percentiles used as cut points.
const QUARTILES: [f64; 3] = [25.0, 50.0, 75.0];

/// Added to every bin std so a single-valued bin still has a usable scale.
const STD_EPS: f64 = 1e-11;

/// Rejection-sampling attempts before falling back to a uniform draw.
const MAX_REJECTIONS: usize = 64;

/// Bins for one feature.
#[derive(Debug, Clone)]
pub struct FeatureBins {
    pub name: String,
    /// Sorted, deduplicated cut points.
    pub cuts: Vec<f64>,
    /// Human-readable condition per bin.
    pub names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
    /// Fraction of training rows in each bin.
    pub frequencies: Vec<f64>,
}

impl FeatureBins {
    fn fit(name: &str, values: &[f64]) -> Result<Self, AppError> {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let (Some(&lo), Some(&hi)) = (sorted.first(), sorted.last()) else {
            return Err(AppError::refused(format!("No reference values for feature `{name}`.")));
        };

        let mut cuts: Vec<f64> = QUARTILES
            .iter()
            .filter_map(|q| percentile_sorted(&sorted, *q))
            .collect();
        cuts.dedup();

        let n_bins = cuts.len() + 1;
        let mut names = Vec::with_capacity(n_bins);
        names.push(format!("{name} <= {:.2}", cuts[0]));
        for w in cuts.windows(2) {
            names.push(format!("{:.2} < {name} <= {:.2}", w[0], w[1]));
        }
        names.push(format!("{name} > {:.2}", cuts[cuts.len() - 1]));

        let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
        for &v in values {
            members[bin_of(&cuts, v)].push(v);
        }

        let total = values.len() as f64;
        let means = members.iter().map(|m| mean(m).unwrap_or(0.0)).collect();
        let stds = members
            .iter()
            .map(|m| std_dev(m).unwrap_or(0.0) + STD_EPS)
            .collect();
        let frequencies = members.iter().map(|m| m.len() as f64 / total).collect();

        let mut mins = Vec::with_capacity(n_bins);
        mins.push(lo);
        mins.extend_from_slice(&cuts);
        let mut maxs = cuts.clone();
        maxs.push(hi);

        Ok(Self {
            name: name.to_string(),
            cuts,
            names,
            means,
            stds,
            mins,
            maxs,
            frequencies,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.names.len()
    }

    pub fn bin(&self, x: f64) -> usize {
        bin_of(&self.cuts, x)
    }

    /// Draw a continuous value inside `bin` from its truncated normal.
    pub fn sample_value<R: Rng>(&self, bin: usize, rng: &mut R) -> f64 {
        let (lo, hi) = (self.mins[bin], self.maxs[bin]);
        if hi <= lo {
            return lo;
        }
        if let Ok(normal) = Normal::new(self.means[bin], self.stds[bin]) {
            for _ in 0..MAX_REJECTIONS {
                let v = normal.sample(rng);
                if v >= lo && v <= hi {
                    return v;
                }
            }
        }
        rng.gen_range(lo..=hi)
    }
}

fn bin_of(cuts: &[f64], x: f64) -> usize {
    cuts.iter().take_while(|c| **c < x).count()
}

/// Quartile discretizer fitted on a reference dataset.
#[derive(Debug, Clone)]
pub struct QuartileDiscretizer {
    pub features: Vec<FeatureBins>,
}

impl QuartileDiscretizer {
    pub fn fit(dataset: &ReferenceDataset) -> Result<Self, AppError> {
        if dataset.is_empty() {
            return Err(AppError::refused("Cannot discretize an empty reference dataset."));
        }
        let features = (0..FEATURE_COUNT)
            .map(|j| FeatureBins::fit(&dataset.feature_names[j], &dataset.column(j)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { features })
    }

    /// Bin index per feature.
    pub fn discretize(&self, row: &[f64; FEATURE_COUNT]) -> [usize; FEATURE_COUNT] {
        let mut out = [0usize; FEATURE_COUNT];
        for (j, bins) in self.features.iter().enumerate() {
            out[j] = bins.bin(row[j]);
        }
        out
    }

    pub fn condition(&self, feature: usize, bin: usize) -> &str {
        &self.features[feature].names[bin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bins(values: &[f64]) -> FeatureBins {
        FeatureBins::fit("x", values).unwrap()
    }

    #[test]
    fn quartile_cuts_and_names() {
        let b = bins(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(b.cuts, vec![2.0, 3.0, 4.0]);
        assert_eq!(
            b.names,
            vec!["x <= 2.00", "2.00 < x <= 3.00", "3.00 < x <= 4.00", "x > 4.00"]
        );
        assert_eq!(b.mins, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(b.maxs, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(b.frequencies, vec![0.4, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn boundary_values_fall_in_lower_bin() {
        let b = bins(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(b.bin(2.0), 0);
        assert_eq!(b.bin(2.0001), 1);
        assert_eq!(b.bin(4.0), 2);
        assert_eq!(b.bin(100.0), 3);
        assert_eq!(b.bin(-100.0), 0);
    }

    #[test]
    fn tied_values_merge_cuts() {
        let b = bins(&[1.0, 1.0, 1.0, 1.0, 9.0]);
        assert_eq!(b.cuts, vec![1.0]);
        assert_eq!(b.n_bins(), 2);
        assert_eq!(b.frequencies, vec![0.8, 0.2]);
    }

    #[test]
    fn sampled_values_stay_in_bin_bounds() {
        let b = bins(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let mut rng = StdRng::seed_from_u64(7);
        for bin in 0..b.n_bins() {
            for _ in 0..200 {
                let v = b.sample_value(bin, &mut rng);
                assert!(v >= b.mins[bin] && v <= b.maxs[bin], "bin {bin}: {v}");
            }
        }
    }

    #[test]
    fn discretize_row() {
        let rows = (0..8)
            .map(|i| {
                let v = i as f64;
                [v, 10.0 * v, -v, v * v]
            })
            .collect();
        let d = QuartileDiscretizer::fit(&ReferenceDataset::from_rows(rows)).unwrap();
        assert_eq!(d.discretize(&[0.0, 70.0, -3.0, 49.0]), [0, 3, 2, 3]);
        assert!(d.condition(0, 0).starts_with("absolute_magnitude <= "));
    }
}
