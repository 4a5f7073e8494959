use burn::prelude::*;
use burn::tensor::TensorData;
use rand::RngCore;

use crate::error::SsdaError;
use crate::pretext::{PretextDraw, PretextSampler};

/// Masked-patch reconstruction sampler.
///
/// Splits each image into `patch_size` x `patch_size` patches (edge patches
/// may be smaller) and hides `round(mask_ratio * num_patches)` of them,
/// chosen independently per image.
///
/// Per draw:
/// - encoder mask: 1 on visible pixels, 0 on hidden ones (all channels)
/// - decoder mask: the complement, marking pixels to reconstruct
/// - encoder-observed: batch with hidden pixels zeroed
/// - decoder-observed and label: the unmasked batch
pub struct MaskedPatchSampler<B: Backend> {
    mask_ratio: f64,
    patch_size: usize,
    batch: Option<Tensor<B, 4>>,
}

impl<B: Backend> MaskedPatchSampler<B> {
    pub fn new(mask_ratio: f64, patch_size: usize) -> Result<Self, SsdaError> {
        if !(0.0..=1.0).contains(&mask_ratio) {
            return Err(SsdaError::Configuration(format!(
                "mask_ratio must lie in [0, 1], got {mask_ratio}"
            )));
        }
        if patch_size == 0 {
            return Err(SsdaError::Configuration(
                "patch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            mask_ratio,
            patch_size,
            batch: None,
        })
    }

    pub fn mask_ratio(&self) -> f64 {
        self.mask_ratio
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Build the `[n, c, h, w]` visibility mask as a flat buffer.
    fn visibility_mask(&self, dims: [usize; 4], rng: &mut dyn RngCore) -> Vec<f32> {
        let [n, c, h, w] = dims;
        let grid_h = h.div_ceil(self.patch_size);
        let grid_w = w.div_ceil(self.patch_size);
        let num_patches = grid_h * grid_w;
        let num_hidden = ((self.mask_ratio * num_patches as f64).round() as usize).min(num_patches);

        let plane = h * w;
        let mut mask = vec![1.0_f32; n * c * plane];
        for image in 0..n {
            for patch in rand::seq::index::sample(rng, num_patches, num_hidden).iter() {
                let y0 = (patch / grid_w) * self.patch_size;
                let x0 = (patch % grid_w) * self.patch_size;
                for y in y0..(y0 + self.patch_size).min(h) {
                    for x in x0..(x0 + self.patch_size).min(w) {
                        for channel in 0..c {
                            mask[(image * c + channel) * plane + y * w + x] = 0.0;
                        }
                    }
                }
            }
        }
        mask
    }
}

impl<B: Backend> PretextSampler<B> for MaskedPatchSampler<B> {
    fn preprocess(&mut self, batch: Tensor<B, 4>) {
        self.batch = Some(batch);
    }

    fn draw(&mut self, rng: &mut dyn RngCore) -> Result<PretextDraw<B>, SsdaError> {
        let batch = self.batch.clone().ok_or_else(|| {
            SsdaError::InvariantViolation("MaskedPatchSampler::draw before preprocess".to_string())
        })?;
        let dims = batch.dims();
        let device = batch.device();

        let encoded_mask: Tensor<B, 4> =
            Tensor::from_data(TensorData::new(self.visibility_mask(dims, rng), dims), &device);
        let decoded_mask = encoded_mask.clone().neg().add_scalar(1.0);

        Ok(PretextDraw {
            encoded_observed: batch.clone() * encoded_mask.clone(),
            decoded_observed: batch.clone(),
            encoded_mask,
            decoded_mask,
            label: batch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn values(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_draw_before_preprocess_fails() {
        let mut sampler = MaskedPatchSampler::<TestBackend>::new(0.5, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = sampler.draw(&mut rng).err().unwrap();
        assert!(matches!(err, SsdaError::InvariantViolation(_)));
    }

    #[test]
    fn test_masks_are_complementary_and_count_matches() {
        let device = Default::default();
        // 4x4 image, 2x2 patches -> 4 patches, half hidden
        let batch = Tensor::<TestBackend, 4>::ones([3, 2, 4, 4], &device).mul_scalar(5.0);
        let mut sampler = MaskedPatchSampler::<TestBackend>::new(0.5, 2).unwrap();
        sampler.preprocess(batch);
        let mut rng = StdRng::seed_from_u64(7);
        let draw = sampler.draw(&mut rng).unwrap();

        let enc = values(draw.encoded_mask);
        let dec = values(draw.decoded_mask);
        assert_eq!(enc.len(), 3 * 2 * 16);
        for (e, d) in enc.iter().zip(&dec) {
            assert_eq!(e + d, 1.0);
        }
        // 2 of 4 patches hidden per image: 8 of 16 pixels per channel plane
        for plane in enc.chunks(16) {
            assert_eq!(plane.iter().filter(|&&v| v == 0.0).count(), 8);
        }

        let observed = values(draw.encoded_observed);
        for (o, e) in observed.iter().zip(&enc) {
            assert_eq!(*o, 5.0 * e);
        }
        assert!(values(draw.label).iter().all(|&v| v == 5.0));
        assert!(values(draw.decoded_observed).iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_channels_share_mask() {
        let device = Default::default();
        let batch = Tensor::<TestBackend, 4>::ones([1, 3, 5, 5], &device);
        let mut sampler = MaskedPatchSampler::<TestBackend>::new(0.4, 2).unwrap();
        sampler.preprocess(batch);
        let mut rng = StdRng::seed_from_u64(3);
        let enc = values(sampler.draw(&mut rng).unwrap().encoded_mask);
        assert_eq!(&enc[0..25], &enc[25..50]);
        assert_eq!(&enc[0..25], &enc[50..75]);
    }

    #[test]
    fn test_ratio_extremes() {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(0);

        let mut none = MaskedPatchSampler::<TestBackend>::new(0.0, 2).unwrap();
        none.preprocess(Tensor::ones([1, 1, 4, 4], &device));
        assert!(values(none.draw(&mut rng).unwrap().encoded_mask).iter().all(|&v| v == 1.0));

        let mut all = MaskedPatchSampler::<TestBackend>::new(1.0, 3).unwrap();
        all.preprocess(Tensor::ones([1, 1, 4, 4], &device));
        assert!(values(all.draw(&mut rng).unwrap().encoded_mask).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(MaskedPatchSampler::<TestBackend>::new(1.5, 2).is_err());
        assert!(MaskedPatchSampler::<TestBackend>::new(0.5, 0).is_err());
    }
}
