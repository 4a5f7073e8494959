use burn::prelude::*;
use rand::RngCore;

use crate::error::SsdaError;
use crate::pretext::{PretextBatch, PretextObservations, PretextSampler, PretextTask};

/// Ordered, non-empty collection of pretext samplers.
///
/// Each call runs every sampler in registration order against the same
/// target-domain batch. The collection is owned per instance.
pub struct PretextSamplerChain<B: Backend> {
    samplers: Vec<Box<dyn PretextSampler<B>>>,
}

impl<B: Backend> PretextSamplerChain<B> {
    /// # Errors
    /// `Configuration` if `samplers` is empty.
    pub fn new(samplers: Vec<Box<dyn PretextSampler<B>>>) -> Result<Self, SsdaError> {
        if samplers.is_empty() {
            return Err(SsdaError::Configuration(
                "pretext sampler chain needs at least one sampler".to_string(),
            ));
        }
        Ok(Self { samplers })
    }

    /// Append a sampler; it runs after all previously registered ones.
    pub fn push(&mut self, sampler: Box<dyn PretextSampler<B>>) {
        self.samplers.push(sampler);
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    /// Preprocess and draw from every sampler, collecting index-aligned results.
    pub fn create_pretext_task_samples_list(
        &mut self,
        target_batch: Tensor<B, 4>,
        rng: &mut dyn RngCore,
    ) -> Result<PretextBatch<B>, SsdaError> {
        let mut out = PretextBatch::with_capacity(self.samplers.len());
        for sampler in self.samplers.iter_mut() {
            sampler.preprocess(target_batch.clone());
            out.push(sampler.draw(rng)?);
        }
        Ok(out)
    }
}

impl<B: Backend> PretextTask<B> for PretextSamplerChain<B> {
    type Samples = PretextObservations<B>;
    type Labels = Vec<Tensor<B, 4>>;

    fn create_pretext_task_samples(
        &mut self,
        target_batch: Tensor<B, 4>,
        rng: &mut dyn RngCore,
    ) -> Result<(Self::Samples, Self::Labels), SsdaError> {
        Ok(self
            .create_pretext_task_samples_list(target_batch, rng)?
            .into_parts())
    }
}
