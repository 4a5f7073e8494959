//! The SSDA batch sampler.
//!
//! Training mode draws random files from the training, test and target
//! domains and yields normalized batches with one-hot domain labels plus
//! pretext samples built from the target batch. Inference mode walks the
//! shuffled test set in fixed-size chunks, keeping each row's source path.

use std::path::PathBuf;

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{IterationPlan, SsdaConfig};
use crate::error::SsdaError;
use crate::extractor::Extractor;
use crate::index::{DomainFileList, DomainIndex};
use crate::noise::NoiseInjector;
use crate::normalize::normalize;
use crate::pretext::{PretextSamplerChain, PretextTask};

/// One training step's worth of data.
#[derive(Debug, Clone)]
pub struct LearnedBatch<B: Backend, S, L> {
    /// Training images `[batch, c, h, w]`, noised if a noise injector is set.
    pub train_x: Tensor<B, 4>,
    /// One-hot training directory labels `[batch, train_dirs]`.
    pub train_y: Tensor<B, 2>,
    /// Test images `[batch, c, h, w]`, never noised.
    pub test_x: Tensor<B, 4>,
    /// One-hot test directory labels `[batch, test_dirs]`.
    pub test_y: Tensor<B, 2>,
    /// Pretext samples built from the target-domain batch.
    pub pretext_x: S,
    /// Pretext labels.
    pub pretext_y: L,
}

/// Item type of [`LearnedSamples`] for a given pretext strategy.
pub type LearnedBatchFor<B, P> =
    LearnedBatch<B, <P as PretextTask<B>>::Samples, <P as PretextTask<B>>::Labels>;

/// One chunk of the shuffled test set; row `i` was decoded from `file_paths[i]`.
#[derive(Debug, Clone)]
pub struct InferenceBatch<B: Backend> {
    /// Normalized test images `[rows, c, h, w]`, never noised.
    pub test_x: Tensor<B, 4>,
    /// Source file of each row, in row order.
    pub file_paths: Vec<PathBuf>,
}

/// Mini-batch sampler over three domains.
///
/// `E` decodes files, `P` turns target-domain batches into pretext samples.
pub struct SsdaIterator<B: Backend, E, P> {
    extractor: E,
    index: DomainIndex,
    pretext: P,
    noise: Option<Box<dyn NoiseInjector<B>>>,
    config: SsdaConfig,
    plan: IterationPlan,
    device: B::Device,
}

/// Sampler whose pretext stage is a chain of transformer-style samplers.
pub type SsdaTransformerIterator<B, E> = SsdaIterator<B, E, PretextSamplerChain<B>>;

impl<B, E, P> SsdaIterator<B, E, P>
where
    B: Backend,
    E: Extractor<B>,
    P: PretextTask<B>,
{
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(
        extractor: E,
        index: DomainIndex,
        pretext: P,
        config: SsdaConfig,
        device: B::Device,
    ) -> Result<Self, SsdaError> {
        config.validate()?;
        let plan = IterationPlan::new(config.epochs, config.batch_size, index.dataset_size());
        tracing::info!(
            epochs = plan.epochs,
            batch_size = plan.batch_size,
            dataset_size = plan.dataset_size,
            iter_n = plan.iter_n,
            norm_mode = %config.norm_mode,
            scale = config.scale,
            "SsdaIterator initialized"
        );
        Ok(Self {
            extractor,
            index,
            pretext,
            noise: None,
            config,
            plan,
            device,
        })
    }

    /// Apply `noise` to training and target batches.
    pub fn with_noise(mut self, noise: impl NoiseInjector<B> + 'static) -> Self {
        self.noise = Some(Box::new(noise));
        self
    }

    pub fn plan(&self) -> IterationPlan {
        self.plan
    }

    /// Number of batches the training sequence yields.
    pub fn iter_n(&self) -> usize {
        self.plan.iter_n
    }

    pub fn config(&self) -> &SsdaConfig {
        &self.config
    }

    pub fn index(&self) -> &DomainIndex {
        &self.index
    }

    pub fn pretext(&self) -> &P {
        &self.pretext
    }

    pub fn pretext_mut(&mut self) -> &mut P {
        &mut self.pretext
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Normalize one extracted sample with the configured mode and scale.
    pub fn pre_normalize<const D: usize>(&self, tensor: Tensor<B, D>) -> Tensor<B, D> {
        normalize(tensor, self.config.norm_mode, self.config.scale)
    }

    /// Lazy, finite sequence of exactly [`iter_n`](Self::iter_n) training batches.
    ///
    /// Re-invoke to restart. An error is yielded once and ends the sequence.
    pub fn generate_learned_samples<'a, R: Rng>(
        &'a mut self,
        rng: &'a mut R,
    ) -> LearnedSamples<'a, B, E, P, R> {
        let remaining = self.plan.iter_n;
        LearnedSamples {
            sampler: self,
            rng,
            remaining,
            drawn: 0,
        }
    }

    /// Lazy sequence over the shuffled test set in chunks of `batch_size`.
    ///
    /// The trailing partial chunk is dropped unless
    /// [`SsdaConfig::drain_remainder`] is set.
    pub fn generate_inferenced_samples<R: Rng>(&self, rng: &mut R) -> InferenceSamples<'_, B, E, P> {
        let mut paths: Vec<PathBuf> = self.index.test.iter_paths().cloned().collect();
        paths.shuffle(rng);

        let batch_size = self.config.batch_size;
        tracing::info!(
            files = paths.len(),
            full_batches = paths.len() / batch_size,
            remainder = paths.len() % batch_size,
            drain_remainder = self.config.drain_remainder,
            "Starting inference pass"
        );

        InferenceSamples {
            sampler: self,
            paths: paths.into_iter(),
            done: false,
        }
    }

    /// Draw a random file from `files`, returning the normalized sample and
    /// its directory index.
    fn draw_one<R: Rng>(
        &self,
        files: &DomainFileList,
        rng: &mut R,
    ) -> Result<(Tensor<B, 3>, usize), SsdaError> {
        let dir_key = rng.gen_range(0..files.num_dirs());
        let file_key = rng.gen_range(0..files.files(dir_key).len());
        let sample = self
            .extractor
            .extract(files.path(dir_key, file_key), &self.device)?;
        Ok((self.pre_normalize(sample), dir_key))
    }

    fn draw_learned_batch<R: Rng>(&mut self, rng: &mut R) -> Result<LearnedBatchFor<B, P>, SsdaError> {
        let batch_size = self.config.batch_size;
        let mut train_rows = Vec::with_capacity(batch_size);
        let mut test_rows = Vec::with_capacity(batch_size);
        let mut target_rows = Vec::with_capacity(batch_size);
        let mut train_keys = Vec::with_capacity(batch_size);
        let mut test_keys = Vec::with_capacity(batch_size);

        for _ in 0..batch_size {
            let (train, train_key) = self.draw_one(&self.index.training, rng)?;
            let (test, test_key) = self.draw_one(&self.index.test, rng)?;
            let (target, _) = self.draw_one(&self.index.target, rng)?;

            train_rows.push(train);
            test_rows.push(test);
            target_rows.push(target);
            train_keys.push(train_key);
            test_keys.push(test_key);
        }

        let mut train_x: Tensor<B, 4> = Tensor::stack(train_rows, 0);
        let test_x: Tensor<B, 4> = Tensor::stack(test_rows, 0);
        let mut target_x: Tensor<B, 4> = Tensor::stack(target_rows, 0);
        let train_y = one_hot::<B>(&train_keys, self.index.training.num_dirs(), &self.device);
        let test_y = one_hot::<B>(&test_keys, self.index.test.num_dirs(), &self.device);

        if let Some(noise) = &self.noise {
            train_x = noise.noise(train_x, &mut *rng);
            target_x = noise.noise(target_x, &mut *rng);
        }

        let (pretext_x, pretext_y) = self.pretext.create_pretext_task_samples(target_x, rng)?;

        Ok(LearnedBatch {
            train_x,
            train_y,
            test_x,
            test_y,
            pretext_x,
            pretext_y,
        })
    }

    fn stack_inference_batch(&self, rows: Vec<Tensor<B, 3>>, file_paths: Vec<PathBuf>) -> InferenceBatch<B> {
        InferenceBatch {
            test_x: Tensor::stack(rows, 0),
            file_paths,
        }
    }
}

/// One-hot rows `[keys.len(), width]`.
fn one_hot<B: Backend>(keys: &[usize], width: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut flat = vec![0.0_f32; keys.len() * width];
    for (row, &key) in keys.iter().enumerate() {
        flat[row * width + key] = 1.0;
    }
    Tensor::from_data(TensorData::new(flat, [keys.len(), width]), device)
}

/// Training sequence returned by [`SsdaIterator::generate_learned_samples`].
pub struct LearnedSamples<'a, B: Backend, E, P, R> {
    sampler: &'a mut SsdaIterator<B, E, P>,
    rng: &'a mut R,
    remaining: usize,
    drawn: usize,
}

impl<B, E, P, R> Iterator for LearnedSamples<'_, B, E, P, R>
where
    B: Backend,
    E: Extractor<B>,
    P: PretextTask<B>,
    R: Rng,
{
    type Item = Result<LearnedBatchFor<B, P>, SsdaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.sampler.draw_learned_batch(self.rng) {
            Ok(batch) => {
                self.remaining -= 1;
                self.drawn += 1;
                tracing::debug!(
                    step = self.drawn,
                    remaining = self.remaining,
                    "Drew training batch"
                );
                Some(Ok(batch))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Inference sequence returned by [`SsdaIterator::generate_inferenced_samples`].
pub struct InferenceSamples<'a, B: Backend, E, P> {
    sampler: &'a SsdaIterator<B, E, P>,
    paths: std::vec::IntoIter<PathBuf>,
    done: bool,
}

impl<B, E, P> Iterator for InferenceSamples<'_, B, E, P>
where
    B: Backend,
    E: Extractor<B>,
    P: PretextTask<B>,
{
    type Item = Result<InferenceBatch<B>, SsdaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let sampler = self.sampler;
        let batch_size = sampler.config.batch_size;
        let mut rows = Vec::with_capacity(batch_size);
        let mut file_paths = Vec::with_capacity(batch_size);

        for path in self.paths.by_ref() {
            let sample = match sampler.extractor.extract(&path, &sampler.device) {
                Ok(sample) => sampler.pre_normalize(sample),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            rows.push(sample);
            file_paths.push(path);

            if rows.len() == batch_size {
                return Some(Ok(sampler.stack_inference_batch(rows, file_paths)));
            } else if rows.len() > batch_size {
                self.done = true;
                return Some(Err(SsdaError::InvariantViolation(format!(
                    "inference batch grew to {} rows, batch_size is {batch_size}",
                    rows.len()
                ))));
            }
        }

        self.done = true;
        if rows.is_empty() {
            return None;
        }
        if sampler.config.drain_remainder {
            tracing::warn!(rows = rows.len(), "Draining partial inference batch");
            Some(Ok(sampler.stack_inference_batch(rows, file_paths)))
        } else {
            tracing::warn!(rows = rows.len(), "Dropping partial inference batch");
            None
        }
    }
}
