//! Transfer job configuration.
//!
//! [`TransferConfig`] describes one run end to end: the source image, the
//! weighted targets, where to write the result and how to solve. It is
//! (de)serializable as JSON so a run can be replayed from a file.
//!
//! ```rust
//! use colorot::config::TransferConfig;
//!
//! let json = r#"{
//!     "source": "images/florida1.png",
//!     "targets": [{ "path": "images/turtle.png", "weight": 1.0 }],
//!     "output": "out/test1.png"
//! }"#;
//! let cfg: TransferConfig = serde_json::from_str(json).unwrap();
//! cfg.validate().unwrap();
//! assert_eq!(cfg.solver.iterations, 100);
//! assert_eq!(cfg.solver.batch_size, 16);
//! ```

use crate::solver::SolverConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A target image and its blend weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub path: PathBuf,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl TargetSpec {
    pub fn new(path: impl Into<PathBuf>, weight: f32) -> Self {
        Self {
            path: path.into(),
            weight,
        }
    }

    /// Parse `PATH` or `PATH=WEIGHT`.
    ///
    /// Only a number after the last `=` is taken as a weight; otherwise the
    /// whole string is the path, so file names containing `=` still work.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidConfig("empty target".into()));
        }
        let weighted = s
            .rsplit_once('=')
            .filter(|(path, _)| !path.is_empty())
            .and_then(|(path, weight)| weight.trim().parse::<f32>().ok().map(|w| (path, w)));
        Ok(match weighted {
            Some((path, weight)) => Self::new(path, weight),
            None => Self::new(s, default_weight()),
        })
    }
}

/// Everything needed to run one color transfer.
///
/// Every field has a default so a job file may hold only part of a run,
/// e.g. just a `solver` block, with the rest supplied on the command line.
/// [`TransferConfig::validate`] rejects a run that is still incomplete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Image whose colors are changed.
    #[serde(default)]
    pub source: PathBuf,
    /// Images whose color distributions are blended in.
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// Where the result is written; the format follows the extension.
    #[serde(default)]
    pub output: PathBuf,
    #[serde(default)]
    pub solver: SolverConfig,
    /// Directory for per-target `iteration,mean_displacement` CSV files.
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    /// Write per-channel histogram CSVs next to the output.
    #[serde(default)]
    pub histograms: bool,
}

impl TransferConfig {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            targets: Vec::new(),
            output: output.into(),
            solver: SolverConfig::default(),
            diagnostics_dir: None,
            histograms: false,
        }
    }

    pub fn with_target(mut self, target: TargetSpec) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json(path: &Path) -> Result<Self> {
        let cfg = Self::from_json_partial(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON configuration file without validating it.
    ///
    /// Used when command-line flags still have to fill in missing fields.
    pub fn from_json_partial(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check that the run can start.
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("a source image is required".into()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("an output path is required".into()));
        }
        if self.solver.iterations == 0 {
            return Err(Error::InvalidConfig("iterations must be >= 1".into()));
        }
        self.solver.validate()?;
        if self.targets.is_empty() {
            return Err(Error::InvalidConfig("at least one target is required".into()));
        }
        for t in &self.targets {
            if !t.weight.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "weight for {} must be finite",
                    t.path.display()
                )));
            }
        }
        Ok(())
    }
}
