//! Decoding image files into CHW tensors.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::FilterType;

use crate::error::SsdaError;

/// Maps a file path to a decoded `[channel, height, width]` tensor.
///
/// Implementations must return tensors of a fixed shape so samples can be
/// stacked into batches.
pub trait Extractor<B: Backend> {
    /// Decode the file at `path` onto `device`.
    fn extract(&self, path: &Path, device: &B::Device) -> Result<Tensor<B, 3>, SsdaError>;
}

/// Decodes image files with the `image` crate, resizing to a fixed size.
///
/// Pixel values are emitted raw (0..=255); normalization happens in the
/// iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageExtractor {
    width: u32,
    height: u32,
    channel: usize,
}

impl ImageExtractor {
    /// `channel` selects the color conversion: 1 (luma), 3 (RGB) or 4 (RGBA).
    pub fn new(width: u32, height: u32, channel: usize) -> Result<Self, SsdaError> {
        if width == 0 || height == 0 {
            return Err(SsdaError::Configuration(format!(
                "image size must be non-zero, got {width}x{height}"
            )));
        }
        if !matches!(channel, 1 | 3 | 4) {
            return Err(SsdaError::Configuration(format!(
                "channel must be 1, 3 or 4, got {channel}"
            )));
        }
        Ok(Self {
            width,
            height,
            channel,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Decode into a CHW `f32` buffer.
    fn decode_chw(&self, path: &Path) -> anyhow::Result<Vec<f32>> {
        let img = image::open(path)?;
        let img = if img.width() != self.width || img.height() != self.height {
            img.resize_exact(self.width, self.height, FilterType::Triangle)
        } else {
            img
        };

        // Interleaved HWC bytes
        let raw: Vec<u8> = match self.channel {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            _ => img.to_rgba8().into_raw(),
        };

        let plane = (self.width * self.height) as usize;
        let mut chw = vec![0.0_f32; plane * self.channel];
        for (i, pixel) in raw.chunks_exact(self.channel).enumerate() {
            for (c, &v) in pixel.iter().enumerate() {
                chw[c * plane + i] = v as f32;
            }
        }
        Ok(chw)
    }
}

impl<B: Backend> Extractor<B> for ImageExtractor {
    fn extract(&self, path: &Path, device: &B::Device) -> Result<Tensor<B, 3>, SsdaError> {
        let chw = self.decode_chw(path).map_err(|source| SsdaError::Extraction {
            path: path.to_path_buf(),
            source,
        })?;
        let shape = [self.channel, self.height as usize, self.width as usize];
        Ok(Tensor::from_data(TensorData::new(chw, shape), device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_grayscale_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("g.png");
        GrayImage::from_fn(4, 2, |x, y| Luma([(x + y * 4) as u8]))
            .save(&path)
            .unwrap();

        let extractor = ImageExtractor::new(4, 2, 1).unwrap();
        let t = Extractor::<TestBackend>::extract(&extractor, &path, &Default::default()).unwrap();
        assert_eq!(t.dims(), [1, 2, 4]);
        let values: Vec<f32> = t.into_data().to_vec().unwrap();
        assert_eq!(values, (0..8).map(|v| v as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_rgb_planes_are_channel_first() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.png");
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])).save(&path).unwrap();

        let extractor = ImageExtractor::new(2, 2, 3).unwrap();
        let t = Extractor::<TestBackend>::extract(&extractor, &path, &Default::default()).unwrap();
        assert_eq!(t.dims(), [3, 2, 2]);
        let values: Vec<f32> = t.into_data().to_vec().unwrap();
        assert_eq!(
            values,
            vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0]
        );
    }

    #[test]
    fn test_resizes_to_configured_shape() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.png");
        GrayImage::from_pixel(16, 8, Luma([200])).save(&path).unwrap();

        let extractor = ImageExtractor::new(4, 4, 1).unwrap();
        let t = Extractor::<TestBackend>::extract(&extractor, &path, &Default::default()).unwrap();
        assert_eq!(t.dims(), [1, 4, 4]);
    }

    #[test]
    fn test_corrupt_file_is_extraction_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let extractor = ImageExtractor::new(4, 4, 1).unwrap();
        let err = Extractor::<TestBackend>::extract(&extractor, &path, &Default::default())
            .unwrap_err();
        match err {
            SsdaError::Extraction { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_channel_count() {
        assert!(ImageExtractor::new(4, 4, 2).unwrap_err().is_configuration());
        assert!(ImageExtractor::new(0, 4, 1).is_err());
    }
}
