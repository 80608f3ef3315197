//! Per-channel color histograms for plotting.
//!
//! Counts are taken over the values an encoder would write: clamped to
//! `[0, 255]` and rounded. The CSV layout is one row per value with one
//! column per channel, ready for any external plotting tool.

use crate::cloud::{quantize, ColorPointCloud};
use crate::Result;
use serde::Serialize;
use std::path::Path;

/// Number of bins per channel.
pub const BINS: usize = 256;

/// 256-bin counts for each of the three channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHistogram {
    counts: [[u64; BINS]; 3],
}

#[derive(Serialize)]
struct Row {
    value: usize,
    red: u64,
    green: u64,
    blue: u64,
}

impl ChannelHistogram {
    pub fn from_cloud(cloud: &ColorPointCloud) -> Self {
        let mut counts = [[0u64; BINS]; 3];
        for p in cloud.view().outer_iter() {
            for (c, hist) in counts.iter_mut().enumerate() {
                hist[usize::from(quantize(p[c]))] += 1;
            }
        }
        Self { counts }
    }

    /// Counts for channel `c` (0 = red, 1 = green, 2 = blue).
    pub fn channel(&self, c: usize) -> &[u64; BINS] {
        &self.counts[c]
    }

    /// Largest bin count over all channels.
    pub fn max_count(&self) -> u64 {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Write `value,red,green,blue` rows.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for value in 0..BINS {
            wtr.serialize(Row {
                value,
                red: self.counts[0][value],
                green: self.counts[1][value],
                blue: self.counts[2][value],
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// A common y-axis limit for plotting several histograms side by side.
pub fn shared_limit<'a>(histograms: impl IntoIterator<Item = &'a ChannelHistogram>) -> u64 {
    histograms.into_iter().map(ChannelHistogram::max_count).max().unwrap_or(0)
}
