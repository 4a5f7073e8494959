//! Mock collaborators for testing the sampler without image files.

use std::path::Path;

use burn::prelude::*;
use rand::RngCore;

use crate::error::SsdaError;
use crate::extractor::Extractor;
use crate::noise::NoiseInjector;
use crate::pretext::{PretextDraw, PretextSampler};

/// Reads a file's text as a single number and fills a fixed-shape tensor
/// with it. Non-numeric content is an extraction error.
#[derive(Debug, Clone, Copy)]
pub struct ConstantExtractor {
    pub channel: usize,
    pub height: usize,
    pub width: usize,
}

impl ConstantExtractor {
    pub fn new(channel: usize, height: usize, width: usize) -> Self {
        Self {
            channel,
            height,
            width,
        }
    }
}

impl<B: Backend> Extractor<B> for ConstantExtractor {
    fn extract(&self, path: &Path, device: &B::Device) -> Result<Tensor<B, 3>, SsdaError> {
        let extraction_err = |source: anyhow::Error| SsdaError::Extraction {
            path: path.to_path_buf(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(|e| extraction_err(e.into()))?;
        let value: f32 = text.trim().parse().map_err(|e: std::num::ParseFloatError| {
            extraction_err(anyhow::anyhow!("{e}: {:?}", text.trim()))
        })?;
        Ok(Tensor::ones([self.channel, self.height, self.width], device).mul_scalar(value))
    }
}

/// Adds a constant offset, so noised batches are easy to tell apart.
#[derive(Debug, Clone, Copy)]
pub struct OffsetNoise(pub f64);

impl<B: Backend> NoiseInjector<B> for OffsetNoise {
    fn noise(&self, batch: Tensor<B, 4>, _rng: &mut dyn RngCore) -> Tensor<B, 4> {
        batch.add_scalar(self.0)
    }
}

/// Pretext sampler whose five outputs are filled with `tag`, shaped like the
/// preprocessed batch.
pub struct TaggedSampler<B: Backend> {
    tag: f32,
    batch: Option<Tensor<B, 4>>,
    pub preprocess_calls: usize,
}

impl<B: Backend> TaggedSampler<B> {
    pub fn new(tag: f32) -> Self {
        Self {
            tag,
            batch: None,
            preprocess_calls: 0,
        }
    }
}

impl<B: Backend> PretextSampler<B> for TaggedSampler<B> {
    fn preprocess(&mut self, batch: Tensor<B, 4>) {
        self.preprocess_calls += 1;
        self.batch = Some(batch);
    }

    fn draw(&mut self, _rng: &mut dyn RngCore) -> Result<PretextDraw<B>, SsdaError> {
        let batch = self.batch.as_ref().ok_or_else(|| {
            SsdaError::InvariantViolation("TaggedSampler::draw before preprocess".to_string())
        })?;
        let filled = Tensor::ones(batch.dims(), &batch.device()).mul_scalar(self.tag);
        Ok(PretextDraw {
            encoded_observed: filled.clone(),
            decoded_observed: filled.clone(),
            encoded_mask: filled.clone(),
            decoded_mask: filled.clone(),
            label: filled,
        })
    }
}
