//! Finalized layered model
//!
//! [`Model`] is immutable once built. Layers are addressed by 1-based index
//! in ascending Z order.

use std::ops::RangeInclusive;

use serde::Serialize;

use crate::geometry::{round3, BoundingBox3};
use crate::toolpath::layer::{Layer, SampleStats};

/// Layered toolpath model produced by the model builder.
#[derive(Debug, Clone)]
pub struct Model {
    layers: Vec<(f64, Layer)>,
    priming: Option<(f64, Layer)>,
    nozzle_diameter: f64,
    boundaries: BoundingBox3,
    boundaries_with_priming: BoundingBox3,
}

impl Model {
    /// Layers may come in any order; they are sorted by Z.
    pub fn new(
        mut layers: Vec<(f64, Layer)>,
        priming: Option<(f64, Layer)>,
        nozzle_diameter: f64,
    ) -> Self {
        layers.sort_by(|a, b| a.0.total_cmp(&b.0));

        let layers_box = layers_boundaries(&layers);
        let priming_box = priming.as_ref().and_then(|(z, layer)| {
            layer
                .boundaries()
                .map(|bbox| BoundingBox3::from_planar(&bbox, z.min(0.0), z.max(0.0)))
        });

        let boundaries = layers_box.unwrap_or_else(BoundingBox3::zero);
        let boundaries_with_priming = match (layers_box, priming_box) {
            (Some(a), Some(b)) => a.merged(&b),
            (a, b) => a.or(b).unwrap_or_else(BoundingBox3::zero),
        };

        Self {
            layers,
            priming,
            nozzle_diameter,
            boundaries,
            boundaries_with_priming,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Available layer indices, `None` for an empty model.
    pub fn layer_range(&self) -> Option<RangeInclusive<usize>> {
        (!self.layers.is_empty()).then(|| 1..=self.layers.len())
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.entry(index).map(|(_, layer)| layer)
    }

    pub fn layer_z(&self, index: usize) -> Option<f64> {
        self.entry(index).map(|(z, _)| *z)
    }

    /// Thickness of the layer at `index`.
    ///
    /// The first layer is as thick as its Z. Other heights are differences
    /// to the layer below, rounded to 3 decimal places.
    pub fn layer_height(&self, index: usize) -> Option<f64> {
        let z = self.layer_z(index)?;
        if index == 1 {
            return Some(z);
        }
        let below = self.layer_z(index - 1)?;
        Some(round3(z - below))
    }

    /// Iterate `(index, z, layer)` in ascending Z order.
    pub fn layers(&self) -> impl Iterator<Item = (usize, f64, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, (z, layer))| (i + 1, *z, layer))
    }

    pub fn priming_layer(&self) -> Option<&Layer> {
        self.priming.as_ref().map(|(_, layer)| layer)
    }

    pub fn priming_layer_z(&self) -> Option<f64> {
        self.priming.as_ref().map(|(z, _)| *z)
    }

    pub fn nozzle_diameter(&self) -> f64 {
        self.nozzle_diameter
    }

    /// Axis-aligned box around every padded path point.
    ///
    /// Z spans from the bed to the highest layer. `with_priming` also takes
    /// the priming layer into account, when there is one.
    pub fn boundaries(&self, with_priming: bool) -> BoundingBox3 {
        if with_priming {
            self.boundaries_with_priming
        } else {
            self.boundaries
        }
    }

    pub fn temperature_min(&self) -> Option<f64> {
        self.fold_stats(Layer::temperature, |s| s.min, f64::min)
    }

    pub fn temperature_max(&self) -> Option<f64> {
        self.fold_stats(Layer::temperature, |s| s.max, f64::max)
    }

    pub fn feedrate_min(&self) -> Option<f64> {
        self.fold_stats(Layer::feedrate, |s| s.min, f64::min)
    }

    pub fn feedrate_max(&self) -> Option<f64> {
        self.fold_stats(Layer::feedrate, |s| s.max, f64::max)
    }

    pub fn layer_height_min(&self) -> Option<f64> {
        self.heights().reduce(f64::min)
    }

    pub fn layer_height_max(&self) -> Option<f64> {
        self.heights().reduce(f64::max)
    }

    /// Serializable snapshot for presentation.
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            layer_count: self.layer_count(),
            layer_range: self.layer_range().map(|r| (*r.start(), *r.end())),
            nozzle_diameter: self.nozzle_diameter,
            priming_layer_z: self.priming_layer_z(),
            boundaries: self.boundaries(true),
            boundaries_without_priming: self.boundaries(false),
            temperature_min: self.temperature_min(),
            temperature_max: self.temperature_max(),
            feedrate_min: self.feedrate_min(),
            feedrate_max: self.feedrate_max(),
            layer_height_min: self.layer_height_min(),
            layer_height_max: self.layer_height_max(),
            layers: self
                .layers()
                .map(|(index, z, layer)| LayerInfo {
                    index,
                    z,
                    height: self.layer_height(index).unwrap_or(z),
                    path_count: layer.paths().len(),
                    point_count: layer.paths().iter().map(|p| p.len()).sum(),
                    temperature: layer.temperature(),
                    feedrate: layer.feedrate(),
                })
                .collect(),
        }
    }

    fn entry(&self, index: usize) -> Option<&(f64, Layer)> {
        index.checked_sub(1).and_then(|i| self.layers.get(i))
    }

    fn heights(&self) -> impl Iterator<Item = f64> + '_ {
        (1..=self.layers.len()).filter_map(|index| self.layer_height(index))
    }

    fn fold_stats(
        &self,
        stats: fn(&Layer) -> Option<SampleStats>,
        pick: fn(SampleStats) -> f64,
        combine: fn(f64, f64) -> f64,
    ) -> Option<f64> {
        self.layers
            .iter()
            .filter_map(|(_, layer)| stats(layer).map(pick))
            .reduce(combine)
    }
}

fn layers_boundaries(layers: &[(f64, Layer)]) -> Option<BoundingBox3> {
    let planar = layers
        .iter()
        .filter_map(|(_, layer)| layer.boundaries())
        .reduce(|a, b| a.merged(&b))?;
    let z_max = layers.iter().map(|(z, _)| *z).fold(0.0, f64::max);
    Some(BoundingBox3::from_planar(&planar, 0.0, z_max))
}

/// Per-layer summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub index: usize,
    pub z: f64,
    pub height: f64,
    pub path_count: usize,
    pub point_count: usize,
    pub temperature: Option<SampleStats>,
    pub feedrate: Option<SampleStats>,
}

/// Summary of a [`Model`], detached from its geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub layer_count: usize,
    pub layer_range: Option<(usize, usize)>,
    pub nozzle_diameter: f64,
    pub priming_layer_z: Option<f64>,
    pub boundaries: BoundingBox3,
    pub boundaries_without_priming: BoundingBox3,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub feedrate_min: Option<f64>,
    pub feedrate_max: Option<f64>,
    pub layer_height_min: Option<f64>,
    pub layer_height_max: Option<f64>,
    pub layers: Vec<LayerInfo>,
}

impl ModelInfo {
    pub fn layer(&self, index: usize) -> Option<&LayerInfo> {
        index.checked_sub(1).and_then(|i| self.layers.get(i))
    }
}
