//! Subcommand implementations: iteration plans, batch previews and inference
//! manifests.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use burn::backend::ndarray::NdArray;
use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use ssda::{DomainFileList, IterationPlan, ReconstructionTask, SsdaIterator};

use crate::config::load_ssda_toml;

/// Backend used by all subcommands.
pub type CliBackend = NdArray<f32>;

/// Arguments for the `plan` subcommand.
#[derive(Debug)]
pub struct PlanArgs {
    pub config: PathBuf,
    pub json: bool,
}

/// Arguments for the `preview` subcommand.
#[derive(Debug)]
pub struct PreviewArgs {
    pub config: PathBuf,
    /// Upper bound on batches drawn; the iteration plan may yield fewer.
    pub batches: usize,
}

/// Arguments for the `manifest` subcommand.
#[derive(Debug)]
pub struct ManifestArgs {
    pub config: PathBuf,
    /// Output JSONL path.
    pub output: PathBuf,
}

/// Directory and file counts for one sampling role.
#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    pub dirs: usize,
    pub files: usize,
}

impl From<&DomainFileList> for RoleSummary {
    fn from(list: &DomainFileList) -> Self {
        Self {
            dirs: list.num_dirs(),
            files: list.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub train: RoleSummary,
    pub test: RoleSummary,
    pub target: RoleSummary,
    pub test_is_training: bool,
    pub epochs: usize,
    pub batch_size: usize,
    pub dataset_size: usize,
    pub iter_n: usize,
    /// Full inference batches over the test set.
    pub inference_batches: usize,
    /// Test files left out of (or drained into) the last inference batch.
    pub inference_remainder: usize,
}

/// One line of the inference manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestRow {
    pub batch: usize,
    pub row: usize,
    pub path: String,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("valid progress bar template")
            .progress_chars("=> "),
    );
    pb
}

/// Mean, min and max over all elements.
fn tensor_stats<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> (f64, f64, f64) {
    let mean: f64 = tensor.clone().mean().into_scalar().elem();
    let min: f64 = tensor.clone().min().into_scalar().elem();
    let max: f64 = tensor.clone().max().into_scalar().elem();
    (mean, min, max)
}

/// Build the domain index and print the iteration plan.
pub fn run_plan(args: PlanArgs) -> anyhow::Result<()> {
    let toml = load_ssda_toml(&args.config)?;
    toml.iterator.validate()?;
    let index = toml.build_index()?;

    let cfg = &toml.iterator;
    let plan = IterationPlan::new(cfg.epochs, cfg.batch_size, index.dataset_size());
    let test_files = index.test.len();
    let report = PlanReport {
        train: RoleSummary::from(index.training.as_ref()),
        test: RoleSummary::from(index.test.as_ref()),
        target: RoleSummary::from(index.target.as_ref()),
        test_is_training: std::sync::Arc::ptr_eq(&index.training, &index.test),
        epochs: plan.epochs,
        batch_size: plan.batch_size,
        dataset_size: plan.dataset_size,
        iter_n: plan.iter_n,
        inference_batches: test_files / plan.batch_size,
        inference_remainder: test_files % plan.batch_size,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("--- Domain Index ---");
    println!("Train:  {} dirs, {} files", report.train.dirs, report.train.files);
    if report.test_is_training {
        println!("Test:   (training directories)");
    } else {
        println!("Test:   {} dirs, {} files", report.test.dirs, report.test.files);
    }
    println!("Target: {} dirs, {} files", report.target.dirs, report.target.files);
    println!();
    println!("--- Iteration Plan ---");
    println!("Epochs:       {}", report.epochs);
    println!("Batch size:   {}", report.batch_size);
    println!("Dataset size: {}", report.dataset_size);
    println!("Batches:      {}", report.iter_n);
    println!(
        "Inference:    {} batches, {} files {}",
        report.inference_batches,
        report.inference_remainder,
        if cfg.drain_remainder { "drained" } else { "dropped" }
    );
    Ok(())
}

/// Draw training batches through a masked-patch pretext chain and log
/// shapes and statistics.
pub fn run_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let toml = load_ssda_toml(&args.config)?;

    let device = Default::default();
    let mut sampler = SsdaIterator::<CliBackend, _, _>::new(
        toml.build_extractor()?,
        toml.build_index()?,
        toml.build_pretext_chain::<CliBackend>()?,
        toml.iterator.clone(),
        device,
    )?;
    if let Some(noise) = toml.build_noise()? {
        tracing::info!(mu = noise.mu(), sigma = noise.sigma(), "Gaussian noise enabled");
        sampler = sampler.with_noise(noise);
    }

    let total = args.batches.min(sampler.iter_n());
    let mut rng = toml.rng();
    let pb = progress_bar(total);
    let mut drawn = 0usize;

    for batch in sampler.generate_learned_samples(&mut rng).take(total) {
        let batch = batch?;
        drawn += 1;

        let (train_mean, train_min, train_max) = tensor_stats(&batch.train_x);
        let (test_mean, test_min, test_max) = tensor_stats(&batch.test_x);
        tracing::info!(
            batch = drawn,
            train_x = ?batch.train_x.dims(),
            train_y = ?batch.train_y.dims(),
            test_x = ?batch.test_x.dims(),
            test_y = ?batch.test_y.dims(),
            train_mean,
            train_min,
            train_max,
            test_mean,
            test_min,
            test_max,
            "Training batch"
        );
        for (i, mask) in batch.pretext_x.encoded_mask.iter().enumerate() {
            let (visible, _, _) = tensor_stats(mask);
            tracing::debug!(batch = drawn, sampler = i, visible_fraction = visible, "Pretext mask");
        }

        pb.set_message(format!("train mean {train_mean:.3}"));
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("\n--- Preview Summary ---");
    println!("Batches: {drawn}/{}", sampler.iter_n());
    println!("Pretext samplers: {}", sampler.pretext().len());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Run an inference pass over the test set and write one JSON line per row.
pub fn run_manifest(args: ManifestArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let toml = load_ssda_toml(&args.config)?;

    let sampler = SsdaIterator::<CliBackend, _, _>::new(
        toml.build_extractor()?,
        toml.build_index()?,
        ReconstructionTask,
        toml.iterator.clone(),
        Default::default(),
    )?;
    let mut rng = toml.rng();

    let test_files = sampler.index().test.len();
    let batch_size = sampler.config().batch_size;
    let expected = if sampler.config().drain_remainder {
        test_files.div_ceil(batch_size)
    } else {
        test_files / batch_size
    };

    let mut writer = BufWriter::new(File::create(&args.output)?);
    let pb = progress_bar(expected);
    let mut batches = 0usize;
    let mut rows = 0usize;

    for batch in sampler.generate_inferenced_samples(&mut rng) {
        let batch = batch?;
        for (row, path) in batch.file_paths.iter().enumerate() {
            let line = ManifestRow {
                batch: batches,
                row,
                path: path.display().to_string(),
            };
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n")?;
            rows += 1;
        }
        batches += 1;
        pb.inc(1);
    }
    writer.flush()?;
    pb.finish_with_message("done");

    println!("\n--- Manifest Summary ---");
    println!("Batches: {batches}");
    println!("Rows: {rows}/{test_files}");
    println!("Output: {}", args.output.display());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
