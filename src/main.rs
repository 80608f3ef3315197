//! `colorot` command-line interface.
//!
//! Usage:
//!     colorot transfer --source images/florida1.png --target images/turtle.png --output out/test1.png
//!     colorot transfer --config job.json --iterations 200
//!     colorot histogram --input out/test1.png --output out/test1.hist.csv

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colorot::config::{TargetSpec, TransferConfig};
use colorot::histogram::ChannelHistogram;
use colorot::image_io::decode;
use colorot::pipeline::transfer;
use colorot::{Averaging, SeedPolicy};
use std::path::PathBuf;
use tracing::{error, info};

/// Transfer the color distribution of target images onto a source image.
#[derive(Parser, Debug)]
#[command(name = "colorot", version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match a source image's colors to one or more weighted targets
    Transfer(TransferArgs),

    /// Write per-channel color histograms of an image as CSV
    Histogram {
        /// Image to analyse
        #[arg(short, long)]
        input: PathBuf,

        /// CSV file to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct TransferArgs {
    /// JSON job file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Source image
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Target image as PATH or PATH=WEIGHT (repeatable)
    #[arg(short, long = "target", value_name = "PATH[=WEIGHT]")]
    targets: Vec<String>,

    /// Output image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Solver iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Random directions per iteration
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fixed seed for reproducible runs
    #[arg(long, conflicts_with = "entropy")]
    seed: Option<u64>,

    /// Seed from OS entropy (the seed used is logged)
    #[arg(long)]
    entropy: bool,

    /// How per-direction displacements are averaged
    #[arg(long, value_enum)]
    averaging: Option<AveragingArg>,

    /// Run batch workers on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Directory for per-target convergence CSVs
    #[arg(long, value_name = "DIR")]
    diagnostics_dir: Option<PathBuf>,

    /// Write histogram CSVs for source, targets and output
    #[arg(long)]
    histograms: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AveragingArg {
    Sum,
    Lerp,
}

impl From<AveragingArg> for Averaging {
    fn from(a: AveragingArg) -> Self {
        match a {
            AveragingArg::Sum => Averaging::SumThenDivide,
            AveragingArg::Lerp => Averaging::OnlineLerp,
        }
    }
}

fn build_config(args: TransferArgs) -> anyhow::Result<TransferConfig> {
    // Flags override the file field by field; validation runs on the merge.
    let mut cfg = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            TransferConfig::from_json_partial(path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => TransferConfig::default(),
    };

    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(output) = args.output {
        cfg.output = output;
    }
    if !args.targets.is_empty() {
        cfg.targets = args
            .targets
            .iter()
            .map(|t| TargetSpec::parse(t))
            .collect::<Result<_, _>>()?;
    }
    if let Some(n) = args.iterations {
        cfg.solver.iterations = n;
    }
    if let Some(n) = args.batch_size {
        cfg.solver.batch_size = n;
    }
    if let Some(seed) = args.seed {
        cfg.solver.seed = SeedPolicy::Fixed(seed);
    }
    if args.entropy {
        cfg.solver.seed = SeedPolicy::Entropy;
    }
    if let Some(a) = args.averaging {
        cfg.solver.averaging = a.into();
    }
    if args.sequential {
        cfg.solver.parallel = false;
    }
    if args.diagnostics_dir.is_some() {
        cfg.diagnostics_dir = args.diagnostics_dir;
    }
    if args.histograms {
        cfg.histograms = true;
    }

    cfg.validate().context("configuration validation failed")?;
    Ok(cfg)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Transfer(args) => {
            let cfg = build_config(args)?;
            let report = transfer(&cfg)?;
            println!(
                "{} ({}x{}), source weight {:.3}",
                report.output.display(),
                report.width,
                report.height,
                report.source_weight
            );
            for t in &report.targets {
                println!(
                    "  {} w={:.3} seed={} mean displacement {:.3}, sliced distance {:.3} -> {:.3}",
                    t.path.display(),
                    t.weight,
                    t.seed,
                    t.mean_displacement,
                    t.distance_before,
                    t.distance_after
                );
            }
            for h in &report.histograms {
                println!("  histogram {}", h.display());
            }
        }
        Commands::Histogram { input, output } => {
            let img = decode(&input)?;
            let hist = ChannelHistogram::from_cloud(&img.cloud);
            hist.write_csv(&output)?;
            println!("{} (max bin {})", output.display(), hist.max_count());
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let log_level_filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn transfer_args(argv: &[&str]) -> TransferArgs {
        let cli = Cli::try_parse_from(std::iter::once("colorot").chain(argv.iter().copied())).unwrap();
        match cli.command {
            Commands::Transfer(args) => args,
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    fn write_job(dir: &Path, json: &str) -> String {
        let path = dir.join("job.json");
        std::fs::write(&path, json).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn flags_alone_build_a_run() {
        let cfg = build_config(transfer_args(&[
            "transfer", "-s", "s.png", "-t", "a.png", "-t", "b.png=0.25", "-o", "o.png",
        ]))
        .unwrap();
        assert_eq!(cfg.source, PathBuf::from("s.png"));
        assert_eq!(cfg.output, PathBuf::from("o.png"));
        assert_eq!(cfg.targets, vec![TargetSpec::new("a.png", 1.0), TargetSpec::new("b.png", 0.25)]);
        assert_eq!(cfg.solver.iterations, 100);
        assert!(cfg.solver.parallel);
    }

    #[test]
    fn missing_source_is_rejected() {
        assert!(build_config(transfer_args(&["transfer", "-t", "a.png", "-o", "o.png"])).is_err());
        assert!(build_config(transfer_args(&["transfer", "-s", "s.png", "-t", "a.png"])).is_err());
    }

    #[test]
    fn solver_only_file_takes_paths_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), r#"{"solver":{"iterations":5}}"#);
        let cfg = build_config(transfer_args(&[
            "transfer", "--config", &job, "--source", "a.png", "--target", "t.png", "--output", "o.png",
        ]))
        .unwrap();
        assert_eq!(cfg.solver.iterations, 5);
        assert_eq!(cfg.source, PathBuf::from("a.png"));
        assert_eq!(cfg.targets, vec![TargetSpec::new("t.png", 1.0)]);
        assert_eq!(cfg.output, PathBuf::from("o.png"));

        // Without the flags the file alone is incomplete.
        assert!(build_config(transfer_args(&["transfer", "--config", &job])).is_err());
    }

    #[test]
    fn flags_beat_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(
            dir.path(),
            r#"{"source":"file.png","targets":[{"path":"ft.png","weight":0.5}],"output":"fo.png",
                "solver":{"iterations":5,"batch_size":3,"seed":{"fixed":1}},"histograms":false}"#,
        );

        let kept = build_config(transfer_args(&["transfer", "-c", &job])).unwrap();
        assert_eq!(kept.source, PathBuf::from("file.png"));
        assert_eq!(kept.targets, vec![TargetSpec::new("ft.png", 0.5)]);
        assert_eq!(kept.solver.iterations, 5);
        assert_eq!(kept.solver.seed, SeedPolicy::Fixed(1));

        let cfg = build_config(transfer_args(&[
            "transfer", "-c", &job, "-s", "cli.png", "-t", "ct.png=2", "--iterations", "9",
            "--batch-size", "4", "--diagnostics-dir", "diag", "--histograms",
        ]))
        .unwrap();
        assert_eq!(cfg.source, PathBuf::from("cli.png"));
        assert_eq!(cfg.output, PathBuf::from("fo.png"));
        assert_eq!(cfg.targets, vec![TargetSpec::new("ct.png", 2.0)]);
        assert_eq!(cfg.solver.iterations, 9);
        assert_eq!(cfg.solver.batch_size, 4);
        assert_eq!(cfg.solver.seed, SeedPolicy::Fixed(1));
        assert_eq!(cfg.diagnostics_dir, Some(PathBuf::from("diag")));
        assert!(cfg.histograms);
    }

    #[test]
    fn seed_flags_pick_the_policy() {
        let base = ["transfer", "-s", "s.png", "-t", "t.png", "-o", "o.png"];
        let with = |extra: &[&str]| {
            let argv: Vec<&str> = base.iter().chain(extra).copied().collect();
            build_config(transfer_args(&argv)).unwrap().solver.seed
        };
        assert_eq!(with(&[]), SeedPolicy::Fixed(0));
        assert_eq!(with(&["--seed", "7"]), SeedPolicy::Fixed(7));
        assert_eq!(with(&["--entropy"]), SeedPolicy::Entropy);

        let both = Cli::try_parse_from(
            std::iter::once("colorot").chain(base).chain(["--seed", "7", "--entropy"]),
        );
        assert!(both.is_err());
    }

    #[test]
    fn entropy_flag_overrides_a_fixed_file_seed() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), r#"{"solver":{"seed":{"fixed":3}}}"#);
        let cfg = build_config(transfer_args(&[
            "transfer", "-c", &job, "-s", "s.png", "-t", "t.png", "-o", "o.png", "--entropy",
        ]))
        .unwrap();
        assert_eq!(cfg.solver.seed, SeedPolicy::Entropy);
    }

    #[test]
    fn averaging_and_sequential_flags() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), r#"{"solver":{"averaging":"sum_then_divide","parallel":true}}"#);
        let cfg = build_config(transfer_args(&[
            "transfer", "-c", &job, "-s", "s.png", "-t", "t.png", "-o", "o.png",
            "--averaging", "lerp", "--sequential",
        ]))
        .unwrap();
        assert_eq!(cfg.solver.averaging, Averaging::OnlineLerp);
        assert!(!cfg.solver.parallel);

        let cfg = build_config(transfer_args(&[
            "transfer", "-s", "s.png", "-t", "t.png", "-o", "o.png", "--averaging", "sum",
        ]))
        .unwrap();
        assert_eq!(cfg.solver.averaging, Averaging::SumThenDivide);
        assert!(cfg.solver.parallel);
    }

    #[test]
    fn bad_solver_flags_fail_validation() {
        let base = ["transfer", "-s", "s.png", "-t", "t.png", "-o", "o.png"];
        for extra in [["--iterations", "0"], ["--batch-size", "0"]] {
            let argv: Vec<&str> = base.iter().chain(&extra).copied().collect();
            assert!(build_config(transfer_args(&argv)).is_err());
        }
    }
}
