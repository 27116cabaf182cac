//! FDM machine state simulation
//!
//! Replays commands one at a time. Each transition derives the current
//! state from the previous one plus exactly one command.

use crate::error::SimulationError;
use crate::geometry::Point3;
use crate::parser::{ArcMove, Command, CommandKind, Home, LinearMove, SetPosition};

/// Millimetres per inch
pub const INCH: f64 = 25.4;

/// Snapshot of the simulated machine.
///
/// Defaults follow RepRapFirmware: origin, absolute positioning, absolute
/// extruder, millimetres, 40 mm/s feedrate and a cold nozzle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineState {
    /// Raw effector position
    pub position: Point3,
    /// Offset introduced by G92
    pub position_offset: Point3,
    /// Raw E axis value
    pub extruder: f64,
    pub extruder_offset: f64,
    pub feedrate: f64,
    /// Nozzle temperature in degrees Celsius
    pub temperature: f64,
    pub relative_positioning: bool,
    pub relative_extruder: bool,
    pub imperial: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            position: Point3::ORIGIN,
            position_offset: Point3::ORIGIN,
            extruder: 0.0,
            extruder_offset: 0.0,
            feedrate: 40.0,
            temperature: 0.0,
            relative_positioning: false,
            relative_extruder: false,
            imperial: false,
        }
    }
}

impl MachineState {
    /// Effector position in the coordinate system set by G92.
    pub fn absolute_position(&self) -> Point3 {
        self.position - self.position_offset
    }

    /// E axis value in the coordinate system set by G92.
    pub fn absolute_extruder(&self) -> f64 {
        self.extruder - self.extruder_offset
    }

    /// Multiplier converting incoming lengths to millimetres.
    pub fn unit_multiplier(&self) -> f64 {
        if self.imperial { INCH } else { 1.0 }
    }
}

/// Deterministic FDM machine
#[derive(Debug, Clone, Default)]
pub struct Machine {
    previous: MachineState,
    current: MachineState,
    skip_unknown: bool,
}

impl Machine {
    /// With `skip_unknown`, unsupported commands leave the state untouched
    /// instead of failing.
    pub fn new(skip_unknown: bool) -> Self {
        Self {
            skip_unknown,
            ..Self::default()
        }
    }

    /// State before the last handled command
    pub fn previous(&self) -> &MachineState {
        &self.previous
    }

    /// State after the last handled command
    pub fn current(&self) -> &MachineState {
        &self.current
    }

    /// Advance the machine by one command.
    pub fn handle_command(&mut self, command: &Command) -> Result<(), SimulationError> {
        if let CommandKind::Unsupported(code) = &command.kind {
            if self.skip_unknown {
                log::trace!("skipping {} at line {}", code, command.line_number);
                return Ok(());
            }
            return Err(SimulationError::UnknownCommand {
                code: code.to_string(),
                line_number: command.line_number,
            });
        }

        self.current = transition(&self.previous_after(), &command.kind);
        Ok(())
    }

    // The current state becomes the previous one before each transition
    fn previous_after(&mut self) -> MachineState {
        self.previous = self.current;
        self.previous
    }
}

/// Pure transition function: the state that follows `previous` after `kind`.
pub fn transition(previous: &MachineState, kind: &CommandKind) -> MachineState {
    let mut next = *previous;

    match kind {
        CommandKind::LinearMove(m) => apply_linear_move(previous, &mut next, m),
        CommandKind::ArcMove(m) => apply_arc_move(previous, &mut next, m),
        CommandKind::Home(home) => apply_home(&mut next, home),
        CommandKind::SetPosition(p) => apply_set_position(previous, &mut next, p),
        CommandKind::SetUnitsInches => next.imperial = true,
        CommandKind::SetUnitsMillimeters => next.imperial = false,
        CommandKind::SetPositioningAbsolute => next.relative_positioning = false,
        CommandKind::SetPositioningRelative => next.relative_positioning = true,
        CommandKind::SetExtruderAbsolute => next.relative_extruder = false,
        CommandKind::SetExtruderRelative => next.relative_extruder = true,
        CommandKind::SetExtruderTemperature(t) => next.temperature = t.s(),
        CommandKind::SetExtruderTemperatureAndWait(t) => next.temperature = t.s(),
        CommandKind::Unsupported(_) => {}
    }

    next
}

fn apply_linear_move(previous: &MachineState, next: &mut MachineState, m: &LinearMove) {
    apply_feed_and_extrusion(previous, next, m.f(), m.e());
    next.position = moved_position(previous, m.x(), m.y(), m.z());
}

fn apply_arc_move(previous: &MachineState, next: &mut MachineState, m: &ArcMove) {
    apply_feed_and_extrusion(previous, next, m.f(), Some(m.e()));
    next.position = moved_position(previous, Some(m.x()), Some(m.y()), None);
}

fn apply_feed_and_extrusion(
    previous: &MachineState,
    next: &mut MachineState,
    feedrate: Option<f64>,
    extruder: Option<f64>,
) {
    if let Some(f) = feedrate {
        next.feedrate = f;
    }
    if let Some(e) = extruder {
        next.extruder = if previous.relative_extruder {
            previous.extruder + e
        } else {
            e
        };
    }
}

fn moved_position(previous: &MachineState, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Point3 {
    let unit = previous.unit_multiplier();

    if previous.relative_positioning {
        let delta = Point3::new(
            x.unwrap_or(0.0) * unit,
            y.unwrap_or(0.0) * unit,
            z.unwrap_or(0.0) * unit,
        );
        // Bounds accumulated floating point error
        return (previous.position + delta).rounded();
    }

    // Absolute targets overwrite the raw position; the G92 offset only
    // applies when reading it back
    let mut position = previous.position;
    if let Some(x) = x {
        position.x = x * unit;
    }
    if let Some(y) = y {
        position.y = y * unit;
    }
    if let Some(z) = z {
        position.z = z * unit;
    }
    position
}

fn apply_home(next: &mut MachineState, home: &Home) {
    let all = home.is_all_axes();
    if all || home.x {
        next.position.x = 0.0;
        next.position_offset.x = 0.0;
    }
    if all || home.y {
        next.position.y = 0.0;
        next.position_offset.y = 0.0;
    }
    if all || home.z {
        next.position.z = 0.0;
        next.position_offset.z = 0.0;
    }
}

// The raw position stays put; only the offset moves so that the absolute
// value equals the commanded one.
fn apply_set_position(previous: &MachineState, next: &mut MachineState, p: &SetPosition) {
    let unit = previous.unit_multiplier();
    if let Some(x) = p.x() {
        next.position_offset.x = previous.position.x - x * unit;
    }
    if let Some(y) = p.y() {
        next.position_offset.y = previous.position.y - y * unit;
    }
    if let Some(z) = p.z() {
        next.position_offset.z = previous.position.z - z * unit;
    }
    if let Some(e) = p.e() {
        next.extruder_offset = previous.extruder - e;
    }
}
