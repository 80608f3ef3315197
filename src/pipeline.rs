//! End-to-end color transfer: decode, solve per target, blend, encode.
//!
//! All inputs are decoded and checked before any solve starts, so a bad
//! target aborts the run without writing an output image. Convergence
//! records are kept in memory and written only once the output image is
//! on disk, so a failed or cancelled run leaves no files behind.

use crate::blend::{blend, source_weight};
use crate::cloud::DisplacementField;
use crate::config::TransferConfig;
use crate::diagnostics::{self, MemorySink};
use crate::histogram::{shared_limit, ChannelHistogram};
use crate::image_io::{decode, encode, DecodedImage};
use crate::solver::{CancelToken, SlicedTransportSolver, TransportJob};
use crate::{sliced_wasserstein, Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directions used for the before/after distance report.
const REPORT_PROJECTIONS: usize = 64;

/// Outcome for one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub path: PathBuf,
    pub weight: f32,
    /// Base seed of the solve; replaying with `SeedPolicy::Fixed(seed)` reproduces it.
    pub seed: u64,
    /// Mean per-pixel length of the transport field.
    pub mean_displacement: f32,
    /// Sliced Wasserstein distance from the source to this target.
    pub distance_before: f32,
    /// Sliced Wasserstein distance from the output to this target.
    pub distance_after: f32,
    pub diagnostics: Option<PathBuf>,
}

/// Summary of a finished transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
    /// Implicit weight of the untouched source, `1 - Σ w_k`.
    pub source_weight: f32,
    pub targets: Vec<TargetOutcome>,
    pub histograms: Vec<PathBuf>,
    /// Largest bin count over all histograms, a shared y-axis limit for
    /// plotting them side by side. `None` when histograms were not written.
    pub histogram_y_limit: Option<u64>,
}

/// Run a transfer to completion.
pub fn transfer(cfg: &TransferConfig) -> Result<TransferReport> {
    transfer_with_cancel(cfg, None)
}

/// Run a transfer, stopping at the next iteration boundary once `cancel` fires.
pub fn transfer_with_cancel(cfg: &TransferConfig, cancel: Option<&CancelToken>) -> Result<TransferReport> {
    cfg.validate()?;

    let source = decode(&cfg.source)?;
    info!(
        path = %cfg.source.display(),
        width = source.width,
        height = source.height,
        "loaded source"
    );

    let mut targets = Vec::with_capacity(cfg.targets.len());
    for spec in &cfg.targets {
        let target = decode(&spec.path)?;
        if target.dimensions() != source.dimensions() {
            return Err(Error::ImageDimensions {
                path: spec.path.clone(),
                expected: source.dimensions(),
                found: target.dimensions(),
            });
        }
        targets.push(target);
    }

    let mut fields: Vec<DisplacementField> = Vec::with_capacity(targets.len());
    let mut outcomes = Vec::with_capacity(targets.len());
    let mut records = Vec::with_capacity(targets.len());
    for (k, (spec, target)) in cfg.targets.iter().zip(&targets).enumerate() {
        info!(target = %spec.path.display(), weight = spec.weight, "solving transport");
        let job = TransportJob::new(source.cloud.clone(), target.cloud.clone(), cfg.solver.clone())?;
        let mut solver = SlicedTransportSolver::new(job);
        let seed = solver.seed();

        let diagnostics = cfg
            .diagnostics_dir
            .as_deref()
            .map(|dir| dir.join(format!("{}.target{k}.csv", file_stem(&cfg.output))));
        let mut sink = MemorySink::default();
        solver.run(&mut sink, cancel)?;
        let field = solver.into_field()?;
        records.push(sink.records);

        let distance_before = sliced_wasserstein(&source.cloud, &target.cloud, REPORT_PROJECTIONS, seed)?;
        outcomes.push(TargetOutcome {
            path: spec.path.clone(),
            weight: spec.weight,
            seed,
            mean_displacement: field.mean_magnitude(),
            distance_before,
            distance_after: 0.0,
            diagnostics,
        });
        fields.push(field);
    }

    let pairs: Vec<(&DisplacementField, f32)> = fields
        .iter()
        .zip(&cfg.targets)
        .map(|(f, spec)| (f, spec.weight))
        .collect();
    let output = blend(&source.cloud, &pairs)?;

    for (outcome, target) in outcomes.iter_mut().zip(&targets) {
        outcome.distance_after = sliced_wasserstein(&output, &target.cloud, REPORT_PROJECTIONS, outcome.seed)?;
        info!(
            target = %outcome.path.display(),
            before = outcome.distance_before,
            after = outcome.distance_after,
            "sliced distance to target"
        );
    }

    if let Some(parent) = cfg.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    encode(&cfg.output, source.width, source.height, &output)?;
    info!(path = %cfg.output.display(), "wrote output");

    if let Some(dir) = &cfg.diagnostics_dir {
        std::fs::create_dir_all(dir)?;
    }
    for (outcome, records) in outcomes.iter().zip(&records) {
        if let Some(path) = &outcome.diagnostics {
            diagnostics::write_csv(path, records)?;
        }
    }

    let (histograms, histogram_y_limit) = if cfg.histograms {
        let (paths, limit) = write_histograms(&cfg.output, &source, &targets, &output)?;
        (paths, Some(limit))
    } else {
        (Vec::new(), None)
    };

    Ok(TransferReport {
        width: source.width,
        height: source.height,
        output: cfg.output.clone(),
        source_weight: source_weight(cfg.targets.iter().map(|t| t.weight)),
        targets: outcomes,
        histograms,
        histogram_y_limit,
    })
}

fn write_histograms(
    output_path: &Path,
    source: &DecodedImage,
    targets: &[DecodedImage],
    output: &crate::ColorPointCloud,
) -> Result<(Vec<PathBuf>, u64)> {
    let mut entries = vec![("source".to_string(), ChannelHistogram::from_cloud(&source.cloud))];
    for (k, t) in targets.iter().enumerate() {
        entries.push((format!("target{k}"), ChannelHistogram::from_cloud(&t.cloud)));
    }
    entries.push(("output".to_string(), ChannelHistogram::from_cloud(output)));

    let limit = shared_limit(entries.iter().map(|(_, h)| h));
    let stem = file_stem(output_path);
    let mut written = Vec::with_capacity(entries.len());
    for (label, hist) in &entries {
        let path = output_path.with_file_name(format!("{stem}.{label}.hist.csv"));
        hist.write_csv(&path)?;
        written.push(path);
    }
    info!(files = written.len(), y_limit = limit, "wrote histograms");
    Ok((written, limit))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
