//! Perturbed neighborhood generation around one instance.
//!
//! Row 0 is always the instance itself. Every other row draws, per feature, a
//! bin from the training bin frequencies. That gives two views of the same
//! sample:
//!
//! - `binary`: 1 where the drawn bin equals the instance's bin, else 0. This is
//!   the interpretable space the surrogate is fitted in.
//! - `inverse`: a continuous value drawn from inside the drawn bin. This is what
//!   the classifier actually scores.

use nalgebra::DMatrix;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::domain::{FEATURE_COUNT, FeatureVector};
use crate::error::AppError;
use crate::explain::discretize::QuartileDiscretizer;

#[derive(Debug, Clone)]
pub struct Neighborhood {
    /// `num_samples × FEATURE_COUNT` indicator matrix.
    pub binary: DMatrix<f64>,
    /// Classifier inputs, one per row of `binary`.
    pub inverse: Vec<FeatureVector>,
}

/// Sample `num_samples` rows (including the instance) around `instance`.
pub fn sample_neighborhood(
    instance: &FeatureVector,
    discretizer: &QuartileDiscretizer,
    num_samples: usize,
    rng: &mut StdRng,
) -> Result<Neighborhood, AppError> {
    if num_samples < 2 {
        return Err(AppError::input("Explainer needs at least 2 samples."));
    }

    let instance_bins = discretizer.discretize(instance);
    let samplers = discretizer
        .features
        .iter()
        .map(|f| {
            WeightedIndex::new(&f.frequencies)
                .map_err(|e| AppError::compute(format!("Invalid bin frequencies for `{}`: {e}", f.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut binary = DMatrix::<f64>::zeros(num_samples, FEATURE_COUNT);
    let mut inverse = Vec::with_capacity(num_samples);

    for j in 0..FEATURE_COUNT {
        binary[(0, j)] = 1.0;
    }
    inverse.push(*instance);

    for i in 1..num_samples {
        let mut row = [0.0; FEATURE_COUNT];
        for (j, bins) in discretizer.features.iter().enumerate() {
            let bin = samplers[j].sample(rng);
            if bin == instance_bins[j] {
                binary[(i, j)] = 1.0;
            }
            row[j] = bins.sample_value(bin, rng);
        }
        inverse.push(row);
    }

    Ok(Neighborhood { binary, inverse })
}

/// Euclidean distance of each binary row from row 0 (the instance).
pub fn distances_from_instance(binary: &DMatrix<f64>) -> Vec<f64> {
    let origin = binary.row(0);
    binary
        .row_iter()
        .map(|row| (&row - &origin).norm())
        .collect()
}

/// Exponential kernel: `sqrt(exp(-d² / width²))`.
pub fn kernel_weights(distances: &[f64], width: f64) -> Vec<f64> {
    distances
        .iter()
        .map(|d| (-(d * d) / (width * width)).exp().sqrt())
        .collect()
}

/// Default kernel width for `n_features` columns.
pub fn default_kernel_width(n_features: usize) -> f64 {
    0.75 * (n_features as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::ReferenceDataset;

    fn discretizer() -> QuartileDiscretizer {
        let rows = (0..40)
            .map(|i| {
                let v = i as f64;
                [18.0 + v * 0.2, 0.01 * (v + 1.0), 5000.0 + 900.0 * v, 15.0 + v * 0.1]
            })
            .collect();
        QuartileDiscretizer::fit(&ReferenceDataset::from_rows(rows)).unwrap()
    }

    #[test]
    fn row_zero_is_the_instance() {
        let d = discretizer();
        let instance = [22.0, 0.1, 20.0, 500_000.0_f64.ln_1p()];
        let mut rng = StdRng::seed_from_u64(42);
        let n = sample_neighborhood(&instance, &d, 50, &mut rng).unwrap();

        assert_eq!(n.binary.nrows(), 50);
        assert_eq!(n.inverse.len(), 50);
        assert_eq!(n.inverse[0], instance);
        assert!(n.binary.row(0).iter().all(|v| *v == 1.0));
        assert!(n.binary.iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn binary_matches_bins_of_inverse() {
        let d = discretizer();
        let instance = [20.0, 0.2, 20000.0, 17.0];
        let bins0 = d.discretize(&instance);
        let mut rng = StdRng::seed_from_u64(1);
        let n = sample_neighborhood(&instance, &d, 200, &mut rng).unwrap();

        for i in 1..200 {
            let bins = d.discretize(&n.inverse[i]);
            for j in 0..FEATURE_COUNT {
                // Values sit inside the drawn bin; those on a cut belong to the lower bin.
                if bins[j] == bins0[j] {
                    continue;
                }
                assert_eq!(n.binary[(i, j)], 0.0, "row {i} feature {j}");
            }
        }
    }

    #[test]
    fn same_seed_same_neighborhood() {
        let d = discretizer();
        let instance = [20.0, 0.2, 20000.0, 17.0];
        let a = sample_neighborhood(&instance, &d, 30, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = sample_neighborhood(&instance, &d, 30, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.binary, b.binary);
        assert_eq!(a.inverse, b.inverse);
    }

    #[test]
    fn kernel_is_one_at_zero_distance() {
        let binary = DMatrix::from_row_slice(3, 4, &[1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let d = distances_from_instance(&binary);
        assert_eq!(d, vec![0.0, 1.0, 2.0]);
        let w = kernel_weights(&d, default_kernel_width(4));
        assert_eq!(w[0], 1.0);
        assert!(w[1] > w[2]);
        assert!((w[2] - (-(4.0) / 2.25_f64).exp().sqrt()).abs() < 1e-12);
    }

    #[test]
    fn too_few_samples_is_rejected() {
        let d = discretizer();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(sample_neighborhood(&[0.0; 4], &d, 1, &mut rng).is_err());
    }
}
