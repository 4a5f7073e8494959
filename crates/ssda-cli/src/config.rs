//! TOML config loading for the ssda CLI.
//!
//! Deserializes `configs/ssda.toml`, which has `[iterator]`, `[directories]`,
//! `[extractor]` and optional `[noise]` / `[pretext]` sections. Relative
//! directories are resolved against the config file's location.

use std::path::{Path, PathBuf};

use burn::prelude::Backend;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use ssda::{
    DomainIndex, GaussNoise, ImageExtractor, MaskedPatchSampler, PretextSampler,
    PretextSamplerChain, SsdaConfig, SsdaError,
};

/// Top-level structure matching `configs/ssda.toml`.
#[derive(Debug, Deserialize)]
pub struct SsdaToml {
    /// RNG seed. Omit for an entropy-seeded run.
    pub seed: Option<u64>,
    /// Sampler hyperparameters.
    #[serde(default)]
    pub iterator: SsdaConfig,
    pub directories: DirectoriesSection,
    pub extractor: ExtractorSection,
    /// Additive Gaussian noise on training and target batches.
    pub noise: Option<NoiseSection>,
    #[serde(default)]
    pub pretext: PretextSection,
}

/// Per-role directory lists.
#[derive(Debug, Deserialize)]
pub struct DirectoriesSection {
    pub train: Vec<PathBuf>,
    pub target: Vec<PathBuf>,
    /// Falls back to the training directories when absent.
    pub test: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractorSection {
    pub width: u32,
    pub height: u32,
    /// 1 (grayscale), 3 (RGB) or 4 (RGBA).
    #[serde(default = "default_channel")]
    pub channel: usize,
}

#[derive(Debug, Deserialize)]
pub struct NoiseSection {
    #[serde(default)]
    pub mu: f64,
    pub sigma: f64,
}

/// Masked-patch samplers used by `preview`.
#[derive(Debug, Deserialize)]
pub struct PretextSection {
    #[serde(default = "default_mask_ratio")]
    pub mask_ratio: f64,
    #[serde(default = "default_patch_size")]
    pub patch_size: usize,
    /// Number of samplers in the chain.
    #[serde(default = "default_samplers")]
    pub samplers: usize,
}

fn default_channel() -> usize {
    3
}
fn default_mask_ratio() -> f64 {
    0.75
}
fn default_patch_size() -> usize {
    16
}
fn default_samplers() -> usize {
    1
}

impl Default for PretextSection {
    fn default() -> Self {
        Self {
            mask_ratio: default_mask_ratio(),
            patch_size: default_patch_size(),
            samplers: default_samplers(),
        }
    }
}

/// Load and deserialize an `SsdaToml`, resolving relative directories
/// against the config file's parent.
pub fn load_ssda_toml(path: &Path) -> anyhow::Result<SsdaToml> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: SsdaToml = toml::from_str(&contents)?;
    if let Some(base) = path.parent() {
        config.directories.resolve_against(base);
    }
    tracing::info!(path = %path.display(), "Loaded ssda config");
    Ok(config)
}

impl DirectoriesSection {
    fn resolve_against(&mut self, base: &Path) {
        let resolve = |dirs: &mut Vec<PathBuf>| {
            for dir in dirs.iter_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        };
        resolve(&mut self.train);
        resolve(&mut self.target);
        if let Some(test) = self.test.as_mut() {
            resolve(test);
        }
    }
}

impl SsdaToml {
    pub fn build_index(&self) -> Result<DomainIndex, SsdaError> {
        let dirs = &self.directories;
        DomainIndex::build(&dirs.train, &dirs.target, dirs.test.as_deref())
    }

    pub fn build_extractor(&self) -> Result<ImageExtractor, SsdaError> {
        let e = &self.extractor;
        ImageExtractor::new(e.width, e.height, e.channel)
    }

    pub fn build_noise(&self) -> Result<Option<GaussNoise>, SsdaError> {
        self.noise
            .as_ref()
            .map(|n| GaussNoise::new(n.mu, n.sigma))
            .transpose()
    }

    /// Chain of `pretext.samplers` masked-patch samplers.
    pub fn build_pretext_chain<B: Backend>(&self) -> Result<PretextSamplerChain<B>, SsdaError> {
        let p = &self.pretext;
        let mut samplers: Vec<Box<dyn PretextSampler<B>>> = Vec::with_capacity(p.samplers);
        for _ in 0..p.samplers {
            samplers.push(Box::new(MaskedPatchSampler::<B>::new(p.mask_ratio, p.patch_size)?));
        }
        PretextSamplerChain::new(samplers)
    }

    /// Seeded RNG, or entropy-seeded when no seed is configured.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
