//! Single-task pretext strategies.

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::{Rng, RngCore};

use crate::error::SsdaError;
use crate::pretext::PretextTask;

/// Reconstruction: the target batch is both input and label.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionTask;

impl<B: Backend> PretextTask<B> for ReconstructionTask {
    type Samples = Tensor<B, 4>;
    type Labels = Tensor<B, 4>;

    fn create_pretext_task_samples(
        &mut self,
        target_batch: Tensor<B, 4>,
        _rng: &mut dyn RngCore,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>), SsdaError> {
        Ok((target_batch.clone(), target_batch))
    }
}

/// Rotation prediction: each image is rotated clockwise by `k * 90` degrees,
/// `k` uniform in `0..4`; labels are one-hot over `k`, shape `[batch, 4]`.
///
/// Images must be square.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationTask;

/// Number of rotation classes.
pub const NUM_ROTATIONS: usize = 4;

/// Rotate `[n, c, h, w]` images clockwise by `quarter_turns * 90` degrees.
pub fn rotate_quarter_turns<B: Backend>(images: Tensor<B, 4>, quarter_turns: usize) -> Tensor<B, 4> {
    let mut out = images;
    for _ in 0..quarter_turns % NUM_ROTATIONS {
        // transpose, then mirror columns
        out = out.swap_dims(2, 3).flip([3]);
    }
    out
}

impl<B: Backend> PretextTask<B> for RotationTask {
    type Samples = Tensor<B, 4>;
    type Labels = Tensor<B, 2>;

    fn create_pretext_task_samples(
        &mut self,
        target_batch: Tensor<B, 4>,
        rng: &mut dyn RngCore,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 2>), SsdaError> {
        let [batch_size, _, height, width] = target_batch.dims();
        if height != width {
            return Err(SsdaError::Configuration(format!(
                "rotation pretext task needs square images, got {height}x{width}"
            )));
        }
        let device = target_batch.device();

        let mut rotated = Vec::with_capacity(batch_size);
        let mut one_hot = vec![0.0_f32; batch_size * NUM_ROTATIONS];
        for (row, image) in target_batch.iter_dim(0).enumerate() {
            let k = rng.gen_range(0..NUM_ROTATIONS);
            one_hot[row * NUM_ROTATIONS + k] = 1.0;
            rotated.push(rotate_quarter_turns(image, k));
        }

        let samples = Tensor::cat(rotated, 0);
        let labels = Tensor::from_data(
            TensorData::new(one_hot, [batch_size, NUM_ROTATIONS]),
            &device,
        );
        Ok((samples, labels))
    }
}
