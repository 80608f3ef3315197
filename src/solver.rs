//! Iterative sliced optimal transport between two color point clouds.
//!
//! Each iteration reads one immutable snapshot of the evolving cloud, runs
//! `batch_size` independent 1D transport steps against the fixed target
//! (one random direction each), averages the contributions and adds the
//! result to the cloud. After the last iteration the transport field is
//! `current - source`, so it can be applied additively to any copy of the
//! source.
//!
//! There is no convergence threshold: the iteration count alone decides
//! when the solve stops.
//!
//! # Example
//!
//! ```rust
//! use colorot::{ColorPointCloud, SolverConfig, TransportJob, solve};
//!
//! let source = ColorPointCloud::from_points(&[[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]]);
//! let target = ColorPointCloud::from_points(&[[100.0, 0.0, 0.0], [110.0, 10.0, 10.0]]);
//! let job = TransportJob::new(source, target, SolverConfig::default()).unwrap();
//! let field = solve(job).unwrap();
//! assert_eq!(field.len(), 2);
//! ```

use crate::average::Averaging;
use crate::cloud::{mean_row_norm, ColorPointCloud, DisplacementField};
use crate::diagnostics::{DiagnosticsSink, IterationRecord, NullSink};
use crate::direction::DirectionSampler;
use crate::slice::{transport_step, SliceWorkspace};
use crate::{Error, Result};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the per-batch random streams get their base seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Use this seed; identical jobs give identical fields.
    Fixed(u64),
    /// Draw a base seed from OS entropy once per job.
    Entropy,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::Fixed(0)
    }
}

impl SeedPolicy {
    /// The base seed for one job.
    pub fn resolve(self) -> u64 {
        match self {
            SeedPolicy::Fixed(seed) => seed,
            SeedPolicy::Entropy => rand::random(),
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of iterations. `0` yields an all-zero field.
    pub iterations: usize,
    /// Random directions per iteration.
    ///
    /// Directions are solved in chunks of at most one per worker thread, so
    /// scratch memory is about `min(batch_size, threads) × 48 × N` bytes for
    /// `N` points: two `f32` projections, two `usize` permutations and a
    /// three-channel `f32` contribution per point and worker. Larger batches
    /// cost time, not memory.
    pub batch_size: usize,
    /// Seeding of the per-batch random streams.
    pub seed: SeedPolicy,
    /// How batch contributions are merged.
    pub averaging: Averaging,
    /// Run batch workers on the rayon pool.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            batch_size: 16,
            seed: SeedPolicy::default(),
            averaging: Averaging::default(),
            parallel: true,
        }
    }
}

impl SolverConfig {
    /// Set the iteration count.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the number of directions per iteration.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the seed policy.
    pub fn with_seed(mut self, seed: SeedPolicy) -> Self {
        self.seed = seed;
        self
    }

    /// Set the averaging policy.
    pub fn with_averaging(mut self, averaging: Averaging) -> Self {
        self.averaging = averaging;
        self
    }

    /// Run batches on the rayon pool or on the calling thread.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject settings the solver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be >= 1".into()));
        }
        Ok(())
    }
}

/// A source cloud, a target cloud and the settings to transport one onto the other.
#[derive(Debug, Clone)]
pub struct TransportJob {
    source: ColorPointCloud,
    target: ColorPointCloud,
    config: SolverConfig,
}

impl TransportJob {
    /// Build a job, failing before any work if the clouds cannot be matched.
    pub fn new(source: ColorPointCloud, target: ColorPointCloud, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        if source.is_empty() {
            return Err(Error::EmptyCloud("source"));
        }
        if target.is_empty() {
            return Err(Error::EmptyCloud("target"));
        }
        if source.len() != target.len() {
            return Err(Error::ShapeMismatch(source.len(), target.len()));
        }
        Ok(Self {
            source,
            target,
            config,
        })
    }

    pub fn source(&self) -> &ColorPointCloud {
        &self.source
    }

    pub fn target(&self) -> &ColorPointCloud {
        &self.target
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

/// Lifecycle of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// No iteration has run.
    Initialized,
    /// `completed` iterations have been applied.
    Iterating { completed: usize },
    /// All iterations have been applied.
    Converged,
}

/// Shared flag that stops a solve at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives the iteration loop for one [`TransportJob`].
#[derive(Debug)]
pub struct SlicedTransportSolver {
    source: ColorPointCloud,
    target: ColorPointCloud,
    config: SolverConfig,
    seed: u64,
    current: ColorPointCloud,
    increment: Array2<f32>,
    workspaces: Vec<SliceWorkspace>,
    state: SolverState,
}

impl SlicedTransportSolver {
    /// Take ownership of a job and allocate all working buffers.
    pub fn new(job: TransportJob) -> Self {
        let TransportJob {
            source,
            target,
            config,
        } = job;
        let n = source.len();
        let seed = config.seed.resolve();
        info!(
            points = n,
            iterations = config.iterations,
            batch_size = config.batch_size,
            averaging = ?config.averaging,
            parallel = config.parallel,
            seed,
            "starting sliced transport"
        );
        let workers = if config.parallel {
            rayon::current_num_threads().max(1)
        } else {
            1
        };
        let state = if config.iterations == 0 {
            SolverState::Converged
        } else {
            SolverState::Initialized
        };
        Self {
            current: source.clone(),
            increment: Array2::zeros((n, 3)),
            workspaces: vec![SliceWorkspace::new(n); workers.min(config.batch_size)],
            source,
            target,
            config,
            seed,
            state,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// The base seed in use; with [`SeedPolicy::Fixed`] it reproduces this solve.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The evolving cloud.
    pub fn current(&self) -> &ColorPointCloud {
        &self.current
    }

    /// Number of iterations applied so far.
    pub fn completed(&self) -> usize {
        match self.state {
            SolverState::Initialized => 0,
            SolverState::Iterating { completed } => completed,
            SolverState::Converged => self.config.iterations,
        }
    }

    /// Run one iteration. Returns `None` once all iterations have run.
    pub fn step(&mut self) -> Option<IterationRecord> {
        let iteration = match self.state {
            SolverState::Initialized => 0,
            SolverState::Iterating { completed } => completed,
            SolverState::Converged => return None,
        };

        let seed = self.seed;
        let averaging = self.config.averaging;
        let batch_size = self.config.batch_size;
        let chunk = self.workspaces.len();
        let current = self.current.view();
        let target = self.target.view();

        let mut start = 0;
        while start < batch_size {
            let active = &mut self.workspaces[..chunk.min(batch_size - start)];
            let work = |(i, ws): (usize, &mut SliceWorkspace)| {
                let direction = DirectionSampler::keyed(seed, iteration, start + i).sample();
                transport_step(&current, &target, direction, ws);
            };
            if self.config.parallel {
                active.par_iter_mut().enumerate().for_each(work);
            } else {
                active.iter_mut().enumerate().for_each(work);
            }

            // Merge in batch order regardless of which worker finished first.
            for (i, ws) in active.iter().enumerate() {
                averaging.accumulate(&mut self.increment, start + i, &ws.contribution());
            }
            start += active.len();
        }
        averaging.finish(&mut self.increment, batch_size);
        let mean_displacement = mean_row_norm(&self.increment.view());
        *self.current.as_array_mut() += &self.increment;

        let completed = iteration + 1;
        self.state = if completed >= self.config.iterations {
            SolverState::Converged
        } else {
            SolverState::Iterating { completed }
        };
        debug!(iteration, mean_displacement, "iteration applied");

        Some(IterationRecord {
            iteration,
            mean_displacement,
        })
    }

    /// Run every remaining iteration, reporting each to `sink`.
    ///
    /// `cancel` is checked before each iteration; a cancelled solve returns
    /// [`Error::Cancelled`] with the number of completed iterations.
    pub fn run<S: DiagnosticsSink>(&mut self, mut sink: S, cancel: Option<&CancelToken>) -> Result<()> {
        while self.state != SolverState::Converged {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(Error::Cancelled(self.completed()));
            }
            match self.step() {
                Some(record) => sink.record(record)?,
                None => break,
            }
        }
        sink.finish()
    }

    /// The displacement from the original source to the current cloud.
    pub fn field(&self) -> Result<DisplacementField> {
        DisplacementField::between(&self.source, &self.current)
    }

    /// Consume the solver and return its transport field.
    pub fn into_field(self) -> Result<DisplacementField> {
        self.field()
    }
}

/// Solve `job` to completion and return the transport field.
pub fn solve(job: TransportJob) -> Result<DisplacementField> {
    solve_with(job, NullSink, None)
}

/// Solve `job`, reporting each iteration to `sink` and honoring `cancel`.
pub fn solve_with<S: DiagnosticsSink>(
    job: TransportJob,
    sink: S,
    cancel: Option<&CancelToken>,
) -> Result<DisplacementField> {
    let mut solver = SlicedTransportSolver::new(job);
    solver.run(sink, cancel)?;
    solver.into_field()
}
