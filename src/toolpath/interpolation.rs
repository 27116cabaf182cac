//! Circular arc interpolation
//!
//! Expands an arc move into a polyline whose chords stay within a given
//! distance of the true arc.

use std::f64::consts::TAU;

use crate::error::GeometryError;
use crate::geometry::{angle_signed, Vec2};
use crate::parser::ArcDirection;

/// Maximum chordal error used when building models, in millimetres.
pub const DEFAULT_MAX_ERROR: f64 = 0.05;

/// Relative tolerance for the source and destination radii.
pub const RADIUS_TOLERANCE: f64 = 0.01;

/// Upper bound on intermediate points of a single arc.
pub const MAX_ARC_POINTS: usize = 1 << 16;

/// Interpolate a circular arc from `source` to `destination` around `pivot`.
///
/// The result starts with `source` and ends with `destination`, both copied
/// verbatim. Intermediate points are produced by rotating `source` about the
/// pivot, so no error accumulates along the arc. Identical source and
/// destination describe a full circle.
pub fn interpolate_arc(
    source: Vec2,
    destination: Vec2,
    pivot: Vec2,
    direction: ArcDirection,
    max_error: f64,
) -> Result<Vec<Vec2>, GeometryError> {
    let radius = source.distance(pivot);
    let radius_destination = destination.distance(pivot);

    if !is_close(radius, radius_destination, RADIUS_TOLERANCE) {
        return Err(GeometryError::ArcNotEquidistant {
            source_point: (source.x, source.y),
            destination: (destination.x, destination.y),
            pivot: (pivot.x, pivot.y),
        });
    }

    // Degenerate arc, nothing to rotate
    if radius == 0.0 {
        return Ok(vec![source, destination]);
    }

    let total = angle_total(source, destination, pivot, direction);
    let mut step = angle_step(radius, max_error, direction);
    // Arcs shorter than one step start halfway instead of overshooting
    // the destination
    if step.abs() > total.abs() {
        step = total / 2.0;
    }
    let count = step_count(total, step);
    if count == MAX_ARC_POINTS {
        step = total / (count + 1) as f64;
    }

    let mut points = Vec::with_capacity(count + 2);
    points.push(source);

    // Evenly spread over [step, total), never reaching the destination
    let spacing = (total - step) / count as f64;
    points.extend((0..count).map(|k| source.rotated(pivot, step + spacing * k as f64)));

    points.push(destination);
    Ok(points)
}

/// Signed rotation step keeping the chordal error below `max_error`.
///
/// Negative for clockwise arcs. Arcs smaller than the error collapse to a
/// single half turn.
pub fn angle_step(radius: f64, max_error: f64, direction: ArcDirection) -> f64 {
    let cos = (1.0 - max_error / radius).clamp(-1.0, 1.0);
    let step = 2.0 * cos.acos();
    match direction {
        ArcDirection::Clockwise => -step,
        ArcDirection::CounterClockwise => step,
    }
}

/// Signed angle swept from `source` to `destination` in the given direction.
///
/// Counter-clockwise arcs sweep within `(0, 2π]`, clockwise arcs within
/// `[-2π, 0)`.
pub fn angle_total(source: Vec2, destination: Vec2, pivot: Vec2, direction: ArcDirection) -> f64 {
    let angle = angle_signed(source - pivot, destination - pivot);
    match direction {
        ArcDirection::CounterClockwise if angle <= 0.0 => angle + TAU,
        ArcDirection::Clockwise if angle >= 0.0 => angle - TAU,
        _ => angle,
    }
}

/// Number of intermediate points, `ceil(total / step)`, capped at
/// [`MAX_ARC_POINTS`].
///
/// A step too small to represent (tiny error on a huge radius) yields the
/// cap rather than an unbounded count.
pub fn step_count(total: f64, step: f64) -> usize {
    let count = (total / step).ceil();
    if count.is_nan() {
        return 0;
    }
    count.clamp(0.0, MAX_ARC_POINTS as f64) as usize
}

fn is_close(a: f64, b: f64, rel_tol: f64) -> bool {
    (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}
