//! Mini-batch iteration and pretext-task sampling for self-supervised domain
//! adaptation (SSDA).
//!
//! Streams image files from three domains (training, test, target) as
//! normalized burn tensors with one-hot domain labels, optional noise, and
//! self-supervised pretext samples synthesized from the target-domain batch.
//!
//! # Key types
//!
//! - [`DomainFileList`] / [`DomainIndex`]: sorted per-directory file indices
//! - [`SsdaIterator`]: the batch sampler (training and inference modes)
//! - [`SsdaConfig`] / [`IterationPlan`]: hyperparameters and derived batch count
//! - [`Extractor`] / [`NoiseInjector`]: traits for decoding and perturbing images
//! - [`PretextTask`] / [`PretextSampler`] / [`PretextSamplerChain`]: pretext
//!   task strategies, single-task and multi-task

pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod iterator;
pub mod mocks;
pub mod noise;
pub mod normalize;
pub mod pretext;

pub use config::{IterationPlan, SsdaConfig};
pub use error::SsdaError;
pub use extractor::{Extractor, ImageExtractor};
pub use index::{DomainFileList, DomainIndex};
pub use iterator::{
    InferenceBatch, InferenceSamples, LearnedBatch, LearnedBatchFor, LearnedSamples, SsdaIterator,
    SsdaTransformerIterator,
};
pub use noise::{GaussNoise, NoiseInjector};
pub use normalize::{normalize, NormMode};
pub use pretext::{
    MaskedPatchSampler, PretextBatch, PretextDraw, PretextObservations, PretextSampler,
    PretextSamplerChain, PretextTask, ReconstructionTask, RotationTask,
};
