//! Noise injection for denoising-style training batches.

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use crate::error::SsdaError;

/// Adds stochastic perturbation to a batch. Must preserve the shape.
///
/// All randomness comes from `rng`, so a seeded caller gets the same noise.
pub trait NoiseInjector<B: Backend> {
    fn noise(&self, batch: Tensor<B, 4>, rng: &mut dyn RngCore) -> Tensor<B, 4>;
}

/// Additive Gaussian noise `N(mu, sigma)`.
#[derive(Debug, Clone, Copy)]
pub struct GaussNoise {
    mu: f64,
    sigma: f64,
    normal: Normal<f64>,
}

impl GaussNoise {
    pub fn new(mu: f64, sigma: f64) -> Result<Self, SsdaError> {
        let invalid = || {
            SsdaError::Configuration(format!(
                "invalid Gaussian noise parameters mu={mu} sigma={sigma}"
            ))
        };
        if !mu.is_finite() || !sigma.is_finite() {
            return Err(invalid());
        }
        let normal = Normal::new(mu, sigma).map_err(|_| invalid())?;
        Ok(Self { mu, sigma, normal })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl<B: Backend> NoiseInjector<B> for GaussNoise {
    fn noise(&self, batch: Tensor<B, 4>, rng: &mut dyn RngCore) -> Tensor<B, 4> {
        let dims = batch.dims();
        let len = dims.iter().product();
        let mut buf = Vec::with_capacity(len);
        for _ in 0..len {
            buf.push(self.normal.sample(rng) as f32);
        }
        let noise = Tensor::from_data(TensorData::new(buf, dims), &batch.device());
        batch + noise
    }
}
