//! Per-iteration convergence records.
//!
//! The solver reports the mean per-point length of each iteration's
//! increment. Sinks only observe; they never influence the solve.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One `(iteration, mean displacement)` record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Mean Euclidean length of the increment applied in this iteration.
    pub mean_displacement: f32,
}

/// Append-only receiver of iteration records.
pub trait DiagnosticsSink {
    /// Record the outcome of one iteration.
    fn record(&mut self, record: IterationRecord) -> Result<()>;

    /// Called once after the last iteration.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&mut self, _record: IterationRecord) -> Result<()> {
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub records: Vec<IterationRecord>,
}

impl DiagnosticsSink for MemorySink {
    fn record(&mut self, record: IterationRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

/// Writes records as CSV rows with an `iteration,mean_displacement` header.
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Create (or truncate) the CSV file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

/// Write `records` to a fresh CSV file at `path`.
pub fn write_csv(path: &Path, records: &[IterationRecord]) -> Result<()> {
    let mut sink = CsvSink::create(path)?;
    for &record in records {
        sink.record(record)?;
    }
    sink.finish()
}

impl DiagnosticsSink for CsvSink {
    fn record(&mut self, record: IterationRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn record(&mut self, record: IterationRecord) -> Result<()> {
        (**self).record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for Box<S> {
    fn record(&mut self, record: IterationRecord) -> Result<()> {
        (**self).record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
