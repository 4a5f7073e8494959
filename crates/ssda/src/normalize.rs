//! Per-sample pixel normalization.

use burn::prelude::*;
use serde::Deserialize;

/// Substituted for a zero standard deviation or a zero range.
pub const NORM_EPSILON: f64 = 1e-8;

/// How to normalize pixel values after extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMode {
    /// Subtract the mean, divide by the population standard deviation.
    #[default]
    ZScore,
    /// Map `[min, max]` onto `[0, 1]`.
    MinMax,
    /// Leave values untouched (the scale factor still applies).
    None,
}

impl std::fmt::Display for NormMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormMode::ZScore => write!(f, "z_score"),
            NormMode::MinMax => write!(f, "min_max"),
            NormMode::None => write!(f, "none"),
        }
    }
}

/// Normalize a tensor of any rank, then multiply by `scale`.
///
/// Statistics are taken over all elements in `f64` on the host. A constant
/// input has zero standard deviation and zero range; [`NORM_EPSILON`] stands
/// in for the divisor and the input maps to zeros instead of NaN.
pub fn normalize<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    mode: NormMode,
    scale: f64,
) -> Tensor<B, D> {
    let normalized = match mode {
        NormMode::None => tensor,
        _ => {
            let stats = Statistics::of(&tensor);
            if stats.is_constant() {
                // exact zeros: x - min is 0 for every element
                tensor.sub_scalar(stats.min).div_scalar(NORM_EPSILON)
            } else if mode == NormMode::ZScore {
                let std = if stats.std == 0.0 { NORM_EPSILON } else { stats.std };
                tensor.sub_scalar(stats.mean).div_scalar(std)
            } else {
                tensor.sub_scalar(stats.min).div_scalar(stats.max - stats.min)
            }
        }
    };
    normalized.mul_scalar(scale)
}

/// Summary statistics of one tensor.
#[derive(Debug, Clone, Copy)]
struct Statistics {
    mean: f64,
    /// Population standard deviation.
    std: f64,
    min: f64,
    max: f64,
}

impl Statistics {
    fn of<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Self {
        let values: Vec<f64> = tensor.to_data().iter::<f64>().collect();
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self {
            mean,
            std: var.sqrt(),
            min,
            max,
        }
    }

    fn is_constant(&self) -> bool {
        self.max == self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn test_z_score_uses_population_std() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([1.0_f32, 2.0, 3.0, 4.0]), &device);
        let out = values(normalize(t, NormMode::ZScore, 1.0));
        // mean 2.5, population std sqrt(1.25)
        let s = 1.25_f32.sqrt();
        assert_close(&out, &[-1.5 / s, -0.5 / s, 0.5 / s, 1.5 / s]);
    }

    #[test]
    fn test_z_score_constant_input_is_zero() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 3>::ones([2, 3, 3], &device).mul_scalar(7.0);
        let out = values(normalize(t, NormMode::ZScore, 1.0));
        assert!(out.iter().all(|v| v.abs() < 1e-6 && v.is_finite()));
    }

    #[test]
    fn test_min_max_range_and_scale() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[10.0_f32, 20.0], [30.0, 50.0]]),
            &device,
        );
        let out = values(normalize(t, NormMode::MinMax, 0.9));
        assert_close(&out, &[0.0, 0.225, 0.45, 0.9]);
        assert!(out.iter().all(|v| (0.0..=0.9 + 1e-6).contains(v)));
    }

    #[test]
    fn test_z_score_constant_fractional_input_is_zero() {
        // 0.1 is not exact in f32, so a float32 mean drifts off the value
        let device = Default::default();
        let t = Tensor::<TestBackend, 3>::ones([3, 64, 64], &device).mul_scalar(0.1);
        let out = values(normalize(t, NormMode::ZScore, 1.0));
        let worst = out.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!(worst < 1e-6, "max |z| for a constant 0.1 input = {worst}");

        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([0.7_f32; 1000]), &device);
        let out = values(normalize(t, NormMode::MinMax, 0.9));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_min_max_constant_input_is_zero() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([3.0_f32, 3.0, 3.0]), &device);
        let out = values(normalize(t, NormMode::MinMax, 1.0));
        assert_close(&out, &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_none_only_scales() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([1.0_f32, -2.0]), &device);
        let out = values(normalize(t, NormMode::None, 3.0));
        assert_close(&out, &[3.0, -6.0]);
    }

    #[test]
    fn test_min_max_applied_twice_is_stable_for_fixed_scale() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([4.0_f32, 8.0, 6.0]), &device);
        let once = normalize(t, NormMode::MinMax, 2.0);
        let twice = normalize(once.clone(), NormMode::MinMax, 2.0);
        assert_close(&values(twice), &values(once));
    }

    #[test]
    fn test_z_score_applied_twice_rescales_by_scale() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_data(TensorData::from([1.0_f32, 5.0, 9.0, 3.0]), &device);
        let once = normalize(t, NormMode::ZScore, 1.0);
        let twice = normalize(once.clone(), NormMode::ZScore, 1.0);
        assert_close(&values(twice), &values(once.clone()));

        // With scale 3 the second pass undoes the first pass's scaling before
        // re-applying it, so results match a single scaled pass.
        let scaled = normalize(once.clone(), NormMode::ZScore, 3.0);
        let scaled_twice = normalize(scaled.clone(), NormMode::ZScore, 3.0);
        assert_close(&values(scaled_twice), &values(scaled));
    }

    #[test]
    fn test_deserialize_modes() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: NormMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "z_score""#).unwrap();
        assert_eq!(w.mode, NormMode::ZScore);
        let w: Wrapper = toml::from_str(r#"mode = "none""#).unwrap();
        assert_eq!(w.mode, NormMode::None);
        assert_eq!(NormMode::MinMax.to_string(), "min_max");
    }
}
