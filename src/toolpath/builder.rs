//! Model builder
//!
//! Replays a command stream through a [`Machine`] and collects every
//! deposition move into layers. One forward pass, no backtracking.
//!
//! A move deposits material when it stays at the same height, increases
//! the absolute extruder value and names an X or Y coordinate.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::config::BuildSettings;
use crate::error::Result;
use crate::geometry::Vec2;
use crate::parser::{self, ArcMove, Command, CommandKind, LinearMove};
use crate::simulation::{Machine, MachineState};
use crate::toolpath::interpolation::interpolate_arc;
use crate::toolpath::layer::Layer;
use crate::toolpath::model::Model;
use crate::toolpath::priming::{LayerAction, PrimingDetector};

/// Commands simulated between two progress reports
const PROGRESS_INTERVAL: usize = 1024;

/// Build stage reported to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Simulating,
    Padding,
    Statistics,
    Finalizing,
}

type ProgressFn<'a> = Box<dyn FnMut(Stage, f32) + 'a>;

/// Caller-side control over a running build.
///
/// The stop flag is polled between commands and between finalization
/// steps. It can be shared with another thread.
#[derive(Default)]
pub struct BuildControl<'a> {
    stop: Arc<AtomicBool>,
    progress: Option<ProgressFn<'a>>,
    expected_commands: Option<usize>,
}

impl<'a> BuildControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Receive the current stage and its completion in `0.0..=1.0`.
    pub fn with_progress(mut self, progress: impl FnMut(Stage, f32) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Command count used to scale simulation progress.
    pub fn with_expected_commands(mut self, count: usize) -> Self {
        self.expected_commands = Some(count);
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(AtomicOrdering::Relaxed)
    }

    fn report(&mut self, stage: Stage, fraction: f32) {
        if let Some(progress) = self.progress.as_mut() {
            progress(stage, fraction.clamp(0.0, 1.0));
        }
    }

    fn report_simulated(&mut self, handled: usize) {
        if let Some(expected) = self.expected_commands.filter(|n| *n > 0) {
            self.report(Stage::Simulating, handled as f32 / expected as f32);
        }
    }
}

/// Result of a build that did not fail.
#[derive(Debug)]
pub enum BuildOutcome {
    Completed(Model),
    /// The stop flag was raised. No model, no error.
    Cancelled,
}

impl BuildOutcome {
    pub fn into_model(self) -> Option<Model> {
        match self {
            BuildOutcome::Completed(model) => Some(model),
            BuildOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildOutcome::Cancelled)
    }
}

/// Layer height used as a map key.
///
/// Ordered with `total_cmp`; negative zero is folded into zero.
#[derive(Debug, Clone, Copy)]
struct LayerKey(f64);

impl LayerKey {
    fn new(z: f64) -> Self {
        Self(z + 0.0)
    }
}

impl PartialEq for LayerKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LayerKey {}

impl PartialOrd for LayerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LayerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A layer under construction with its raw samples
#[derive(Debug, Default)]
struct LayerEntry {
    layer: Layer,
    temperatures: Vec<f64>,
    feedrates: Vec<f64>,
}

impl LayerEntry {
    fn record(&mut self, state: &MachineState) {
        self.temperatures.push(state.temperature);
        self.feedrates.push(state.feedrate);
    }

    fn finish(mut self, padding: f64) -> Layer {
        for path in self.layer.paths_mut() {
            path.add_padding(padding);
        }
        self.layer.set_statistics(&self.temperatures, &self.feedrates);
        self.layer
    }
}

/// Accumulates layers while commands are replayed.
#[derive(Debug)]
pub struct ModelBuilder {
    settings: BuildSettings,
    machine: Machine,
    layers: BTreeMap<LayerKey, LayerEntry>,
    priming: Option<(f64, LayerEntry)>,
    detector: PrimingDetector,
}

impl ModelBuilder {
    pub fn new(settings: BuildSettings) -> Self {
        Self {
            settings,
            machine: Machine::new(settings.skip_unknown),
            layers: BTreeMap::new(),
            priming: None,
            detector: PrimingDetector::new(),
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Number of regular layers collected so far.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Replay one command.
    pub fn handle_command(&mut self, command: &Command) -> Result<()> {
        self.machine.handle_command(command)?;

        match &command.kind {
            CommandKind::LinearMove(m) => self.handle_linear_move(m),
            CommandKind::ArcMove(m) => self.handle_arc_move(m),
            _ => Ok(()),
        }
    }

    /// Consume a command stream and build the model.
    ///
    /// Stops at the first error. Returns [`BuildOutcome::Cancelled`] as soon
    /// as the stop flag is observed.
    pub fn build<I>(mut self, commands: I, control: &mut BuildControl<'_>) -> Result<BuildOutcome>
    where
        I: IntoIterator<Item = Result<Command>>,
    {
        control.report(Stage::Simulating, 0.0);

        let mut handled = 0;
        for command in commands {
            if control.is_stopped() {
                log::debug!("build cancelled after {} commands", handled);
                return Ok(BuildOutcome::Cancelled);
            }

            self.handle_command(&command?)?;
            handled += 1;

            if handled % PROGRESS_INTERVAL == 0 {
                control.report_simulated(handled);
            }
        }

        log::debug!(
            "simulated {} commands into {} layers",
            handled,
            self.layers.len()
        );
        control.report(Stage::Simulating, 1.0);

        self.finish(control)
    }

    /// Pad every path, compute statistics and freeze the model.
    pub fn finish(self, control: &mut BuildControl<'_>) -> Result<BuildOutcome> {
        let padding = self.settings.nozzle_diameter / 2.0;
        let total = self.layers.len().max(1) as f32;

        let mut layers = Vec::with_capacity(self.layers.len());
        for (done, (key, entry)) in self.layers.into_iter().enumerate() {
            if control.is_stopped() {
                return Ok(BuildOutcome::Cancelled);
            }
            layers.push((key.0, entry.finish(padding)));
            control.report(Stage::Padding, (done + 1) as f32 / total);
        }

        let priming = self.priming.map(|(z, entry)| (z, entry.finish(padding)));

        log::debug!("padded paths by {}mm", padding);
        control.report(Stage::Statistics, 1.0);

        if control.is_stopped() {
            return Ok(BuildOutcome::Cancelled);
        }

        let model = Model::new(layers, priming, self.settings.nozzle_diameter);
        control.report(Stage::Finalizing, 1.0);

        Ok(BuildOutcome::Completed(model))
    }

    /// Pad every path, compute statistics and freeze the model without
    /// polling for cancellation.
    pub fn into_model(self) -> Model {
        let padding = self.settings.nozzle_diameter / 2.0;
        let layers = self
            .layers
            .into_iter()
            .map(|(key, entry)| (key.0, entry.finish(padding)))
            .collect();
        let priming = self.priming.map(|(z, entry)| (z, entry.finish(padding)));
        Model::new(layers, priming, self.settings.nozzle_diameter)
    }

    fn handle_linear_move(&mut self, m: &LinearMove) -> Result<()> {
        if m.x().is_none() && m.y().is_none() {
            return Ok(());
        }
        let Some((source, destination)) = self.deposition() else {
            return Ok(());
        };

        let state = *self.machine.current();
        let entry = self.layer_at(state.absolute_position().z)?;
        entry.layer.add_segment(source, destination);
        entry.record(&state);
        Ok(())
    }

    fn handle_arc_move(&mut self, m: &ArcMove) -> Result<()> {
        let Some((source, destination)) = self.deposition() else {
            return Ok(());
        };

        let unit = self.machine.previous().unit_multiplier();
        let pivot = source + Vec2::new(m.i(), m.j()) * unit;
        let points = interpolate_arc(
            source,
            destination,
            pivot,
            m.direction(),
            self.settings.arc_max_error,
        )?;

        let state = *self.machine.current();
        let entry = self.layer_at(state.absolute_position().z)?;
        for pair in points.windows(2) {
            entry.layer.add_segment(pair[0], pair[1]);
        }
        entry.record(&state);
        Ok(())
    }

    /// Source and destination of the last move when it deposited material.
    fn deposition(&self) -> Option<(Vec2, Vec2)> {
        let previous = self.machine.previous();
        let current = self.machine.current();

        let source = previous.absolute_position();
        let destination = current.absolute_position();

        let same_height = source.z == destination.z;
        let extruded = current.absolute_extruder() > previous.absolute_extruder();

        (same_height && extruded).then(|| (source.xy(), destination.xy()))
    }

    /// The layer at `z`, created on first use.
    fn layer_at(&mut self, z: f64) -> Result<&mut LayerEntry> {
        let key = LayerKey::new(z);
        let exists = self.layers.contains_key(&key);

        match self.detector.resolve(z, exists, self.layers.len())? {
            LayerAction::Reuse | LayerAction::Create => {}
            LayerAction::DemoteAndCreate { priming_z } => {
                if let Some(entry) = self.layers.remove(&LayerKey::new(priming_z)) {
                    log::info!(
                        "priming layer detected at {}mm, next layer at {}mm",
                        priming_z,
                        z
                    );
                    self.priming = Some((priming_z, entry));
                }
            }
        }

        Ok(self.layers.entry(key).or_default())
    }
}

/// Build a model from already parsed commands.
pub fn build_model<I>(commands: I, settings: BuildSettings) -> Result<Model>
where
    I: IntoIterator<Item = Command>,
{
    settings.validate()?;
    let mut builder = ModelBuilder::new(settings);
    for command in commands {
        builder.handle_command(&command)?;
    }
    Ok(builder.into_model())
}

/// Stream a G-code file from disk into a model.
pub fn load_model(
    path: impl AsRef<FsPath>,
    settings: BuildSettings,
    control: &mut BuildControl<'_>,
) -> Result<BuildOutcome> {
    settings.validate()?;
    let path = path.as_ref();
    log::debug!("loading {}", path.display());

    let stream = parser::open_file(path, settings.skip_unknown)?;
    ModelBuilder::new(settings).build(stream, control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, GeometryError};
    use crate::parser::parse_text;

    fn build(text: &str) -> Result<Model> {
        build_model(parse_text(text, true)?, BuildSettings::default())
    }

    #[test]
    fn test_layer_key_normalizes_negative_zero() {
        assert_eq!(LayerKey::new(-0.0), LayerKey::new(0.0));
        assert!(LayerKey::new(0.1) < LayerKey::new(0.2));
    }

    #[test]
    fn test_travel_moves_are_ignored() {
        let model = build("G1 Z0.2\nG0 X10 Y10\nG1 X20 Y10\n").unwrap();
        assert_eq!(model.layer_count(), 0);
    }

    #[test]
    fn test_z_change_is_not_deposition() {
        let model = build("G1 X0 Y0 Z0.2\nG1 X10 Z0.4 E1\n").unwrap();
        assert_eq!(model.layer_count(), 0);
    }

    #[test]
    fn test_extrusion_without_xy_is_not_deposition() {
        let model = build("G1 Z0.2\nG1 E5\n").unwrap();
        assert_eq!(model.layer_count(), 0);
    }

    #[test]
    fn test_segments_join_into_paths() {
        let model = build(
            "G1 Z0.2\n\
             G1 X10 E1\n\
             G1 Y10 E2\n\
             G0 X20 Y20\n\
             G1 X30 E3\n",
        )
        .unwrap();

        let layer = model.layer(1).unwrap();
        assert_eq!(layer.paths().len(), 2);
        assert_eq!(layer.paths()[0].len(), 3);
        assert_eq!(layer.paths()[1].len(), 2);
    }

    #[test]
    fn test_arc_move_is_interpolated() {
        let model = build("G1 X10 Y0 Z0.2\nG3 X0 Y10 I-10 J0 E1\n").unwrap();
        let layer = model.layer(1).unwrap();
        assert_eq!(layer.paths().len(), 1);
        assert!(layer.paths()[0].len() > 3);
    }

    #[test]
    fn test_arc_not_equidistant_fails() {
        let err = build("G1 X10 Y0 Z0.2\nG2 X0 Y20 I-10 J0 E1\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Geometry(GeometryError::ArcNotEquidistant { .. })
        ));
    }

    #[test]
    fn test_samples_recorded_per_layer() {
        let model = build(
            "M104 S200\n\
             G1 Z0.2 F1200\n\
             G1 X10 E1\n\
             M104 S210\n\
             G1 X20 E2 F600\n",
        )
        .unwrap();

        let layer = model.layer(1).unwrap();
        let temperature = layer.temperature().unwrap();
        assert_eq!((temperature.min, temperature.max, temperature.avg), (200.0, 210.0, 205.0));
        let feedrate = layer.feedrate().unwrap();
        assert_eq!((feedrate.min, feedrate.max, feedrate.avg), (600.0, 1200.0, 900.0));
    }

    #[test]
    fn test_stop_flag_cancels() {
        let commands = parse_text("G1 Z0.2\nG1 X10 E1\n", true).unwrap();
        let stop = Arc::new(AtomicBool::new(true));
        let mut control = BuildControl::new().with_stop_flag(Arc::clone(&stop));

        let outcome = ModelBuilder::new(BuildSettings::default())
            .build(commands.into_iter().map(Ok), &mut control)
            .unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.into_model().is_none());
    }

    #[test]
    fn test_progress_reports_stages() {
        let commands = parse_text("G1 Z0.2\nG1 X10 E1\nG1 Z0.4\nG1 X0 E2\n", true).unwrap();
        let mut stages = Vec::new();
        {
            let mut control = BuildControl::new().with_progress(|stage, fraction| {
                assert!((0.0..=1.0).contains(&fraction));
                stages.push(stage);
            });
            ModelBuilder::new(BuildSettings::default())
                .build(commands.into_iter().map(Ok), &mut control)
                .unwrap();
        }

        assert_eq!(stages.first(), Some(&Stage::Simulating));
        assert!(stages.contains(&Stage::Padding));
        assert_eq!(stages.last(), Some(&Stage::Finalizing));
    }
}
