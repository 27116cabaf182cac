//! Layers of toolpaths and their statistics.

use serde::Serialize;

use crate::geometry::{BoundingBox2, Vec2};
use crate::toolpath::path::Path;

/// Minimum, maximum and mean of a series of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl SampleStats {
    /// `None` for an empty series.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let (&first, rest) = samples.split_first()?;
        let (min, max, sum) = rest.iter().fold((first, first, first), |(min, max, sum), &s| {
            (min.min(s), max.max(s), sum + s)
        });

        Some(Self {
            min,
            max,
            avg: sum / samples.len() as f64,
        })
    }
}

/// All paths deposited at one Z height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    paths: Vec<Path>,
    temperature: Option<SampleStats>,
    feedrate: Option<SampleStats>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub(crate) fn paths_mut(&mut self) -> &mut [Path] {
        &mut self.paths
    }

    /// Add one deposited segment.
    ///
    /// Continues the last path when it ends exactly at `source`, otherwise
    /// starts a new one.
    pub fn add_segment(&mut self, source: Vec2, destination: Vec2) {
        match self.paths.last_mut() {
            Some(path) if path.last() == source => path.push(destination),
            _ => self.paths.push(Path::new(source, destination)),
        }
    }

    pub fn temperature(&self) -> Option<SampleStats> {
        self.temperature
    }

    pub fn feedrate(&self) -> Option<SampleStats> {
        self.feedrate
    }

    pub(crate) fn set_statistics(&mut self, temperatures: &[f64], feedrates: &[f64]) {
        self.temperature = SampleStats::from_samples(temperatures);
        self.feedrate = SampleStats::from_samples(feedrates);
    }

    /// Planar bounding box of every path point, `None` without paths.
    pub fn boundaries(&self) -> Option<BoundingBox2> {
        BoundingBox2::from_points(self.paths.iter().flat_map(|p| p.points().iter().copied()))
    }
}
