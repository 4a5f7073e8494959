//! Pretext-task generation from target-domain batches.
//!
//! Two extension points:
//!
//! - [`PretextTask`]: a single strategy turning a batch into `(samples, labels)`.
//!   Plugged directly into [`crate::SsdaIterator`].
//! - [`PretextSampler`]: one sampler of a transformer-style multi-task setup.
//!   Samplers are composed by [`PretextSamplerChain`], which itself implements
//!   [`PretextTask`].

use burn::prelude::*;
use rand::RngCore;

use crate::error::SsdaError;

pub mod chain;
pub mod masked;
pub mod tasks;

pub use chain::PretextSamplerChain;
pub use masked::MaskedPatchSampler;
pub use tasks::{ReconstructionTask, RotationTask};

/// Single-task pretext strategy.
///
/// Receives the (possibly noised) target-domain batch `[batch, c, h, w]`.
/// Output shapes are up to the strategy; they only need to suit the
/// downstream loss.
pub trait PretextTask<B: Backend> {
    type Samples;
    type Labels;

    fn create_pretext_task_samples(
        &mut self,
        target_batch: Tensor<B, 4>,
        rng: &mut dyn RngCore,
    ) -> Result<(Self::Samples, Self::Labels), SsdaError>;
}

/// Encoder/decoder inputs, masks and label produced by one sampler draw.
#[derive(Debug, Clone)]
pub struct PretextDraw<B: Backend> {
    pub encoded_observed: Tensor<B, 4>,
    pub decoded_observed: Tensor<B, 4>,
    pub encoded_mask: Tensor<B, 4>,
    pub decoded_mask: Tensor<B, 4>,
    pub label: Tensor<B, 4>,
}

/// One sampler in a multi-task pretext chain.
///
/// `preprocess` loads the batch into the sampler's state; `draw` then
/// produces the five tensors for it.
pub trait PretextSampler<B: Backend> {
    fn preprocess(&mut self, batch: Tensor<B, 4>);

    /// # Errors
    /// `InvariantViolation` if called before `preprocess`.
    fn draw(&mut self, rng: &mut dyn RngCore) -> Result<PretextDraw<B>, SsdaError>;
}

/// The four observation sequences of a [`PretextBatch`].
#[derive(Debug, Clone)]
pub struct PretextObservations<B: Backend> {
    pub encoded_observed: Vec<Tensor<B, 4>>,
    pub decoded_observed: Vec<Tensor<B, 4>>,
    pub encoded_mask: Vec<Tensor<B, 4>>,
    pub decoded_mask: Vec<Tensor<B, 4>>,
}

/// Five index-aligned sequences, entry `i` coming from sampler `i`.
#[derive(Debug, Clone)]
pub struct PretextBatch<B: Backend> {
    pub encoded_observed: Vec<Tensor<B, 4>>,
    pub decoded_observed: Vec<Tensor<B, 4>>,
    pub encoded_mask: Vec<Tensor<B, 4>>,
    pub decoded_mask: Vec<Tensor<B, 4>>,
    pub labels: Vec<Tensor<B, 4>>,
}

impl<B: Backend> PretextBatch<B> {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            encoded_observed: Vec::with_capacity(n),
            decoded_observed: Vec::with_capacity(n),
            encoded_mask: Vec::with_capacity(n),
            decoded_mask: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, draw: PretextDraw<B>) {
        self.encoded_observed.push(draw.encoded_observed);
        self.decoded_observed.push(draw.decoded_observed);
        self.encoded_mask.push(draw.encoded_mask);
        self.decoded_mask.push(draw.decoded_mask);
        self.labels.push(draw.label);
    }

    /// Number of samplers that contributed.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Split into observations and labels.
    pub fn into_parts(self) -> (PretextObservations<B>, Vec<Tensor<B, 4>>) {
        (
            PretextObservations {
                encoded_observed: self.encoded_observed,
                decoded_observed: self.decoded_observed,
                encoded_mask: self.encoded_mask,
                decoded_mask: self.decoded_mask,
            },
            self.labels,
        )
    }
}
