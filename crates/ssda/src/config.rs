//! Iterator hyperparameters and the derived iteration plan.

use serde::Deserialize;

use crate::error::SsdaError;
use crate::normalize::NormMode;

/// Batch sampler configuration, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SsdaConfig {
    /// Number of passes over the training set.
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Rows per mini-batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-image normalization applied after extraction.
    #[serde(default)]
    pub norm_mode: NormMode,

    /// Multiplier applied after normalization.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Yield the trailing partial chunk in inference mode instead of dropping it.
    #[serde(default)]
    pub drain_remainder: bool,
}

fn default_epochs() -> usize {
    300
}
fn default_batch_size() -> usize {
    20
}
fn default_scale() -> f64 {
    1.0
}

impl Default for SsdaConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            norm_mode: NormMode::default(),
            scale: default_scale(),
            drain_remainder: false,
        }
    }
}

impl SsdaConfig {
    /// Reject hyperparameters the sampler cannot honor.
    pub fn validate(&self) -> Result<(), SsdaError> {
        if self.batch_size == 0 {
            return Err(SsdaError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !self.scale.is_finite() {
            return Err(SsdaError::Configuration(format!(
                "scale must be finite, got {}",
                self.scale
            )));
        }
        if self.epochs == 0 {
            tracing::warn!("epochs = 0, the training sequence will be empty");
        }
        Ok(())
    }
}

/// Number of batches the training sequence yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPlan {
    pub epochs: usize,
    pub batch_size: usize,
    /// Total number of training files across all directories.
    pub dataset_size: usize,
    /// `floor(epochs * max(dataset_size / batch_size, 1))`.
    pub iter_n: usize,
}

impl IterationPlan {
    /// Derive the plan. The ratio is a real division floored to 1, so a
    /// dataset smaller than one batch still runs `epochs` batches.
    ///
    /// `batch_size` must be non-zero (checked by [`SsdaConfig::validate`]).
    pub fn new(epochs: usize, batch_size: usize, dataset_size: usize) -> Self {
        let ratio = (dataset_size as f64 / batch_size as f64).max(1.0);
        let iter_n = (epochs as f64 * ratio) as usize;
        Self {
            epochs,
            batch_size,
            dataset_size,
            iter_n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_exact_multiple() {
        let plan = IterationPlan::new(3, 10, 100);
        assert_eq!(plan.iter_n, 30);
    }

    #[test]
    fn test_plan_fractional_ratio_floors_product() {
        // 2 * (5 / 2) = 5
        let plan = IterationPlan::new(2, 2, 5);
        assert_eq!(plan.iter_n, 5);
        // 3 * (7 / 4) = 5.25 -> 5
        let plan = IterationPlan::new(3, 4, 7);
        assert_eq!(plan.iter_n, 5);
    }

    #[test]
    fn test_plan_small_dataset_floors_to_epochs() {
        let plan = IterationPlan::new(7, 64, 3);
        assert_eq!(plan.iter_n, 7);
        assert!(plan.iter_n >= plan.epochs);
    }

    #[test]
    fn test_default_config() {
        let config = SsdaConfig::default();
        assert_eq!(config.epochs, 300);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.norm_mode, NormMode::ZScore);
        assert!((config.scale - 1.0).abs() < 1e-12);
        assert!(!config.drain_remainder);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let toml_str = r#"
batch_size = 8
norm_mode = "min_max"
scale = 0.9
"#;
        let config: SsdaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.epochs, 300);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.norm_mode, NormMode::MinMax);
        assert!((config.scale - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = SsdaConfig {
            batch_size: 0,
            ..SsdaConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_rejects_nan_scale() {
        let config = SsdaConfig {
            scale: f64::NAN,
            ..SsdaConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
