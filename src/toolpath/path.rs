//! Continuous deposition runs in the XY plane.

use serde::Serialize;

use crate::geometry::Vec2;

/// An ordered polyline traced while depositing material.
///
/// Always holds at least two points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    points: Vec<Vec2>,
}

impl Path {
    pub fn new(first: Vec2, second: Vec2) -> Self {
        Self {
            points: vec![first, second],
        }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn first(&self) -> Vec2 {
        self.points[0]
    }

    pub fn last(&self) -> Vec2 {
        self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true, a path cannot be shorter than one segment.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: Vec2) {
        self.points.push(point);
    }

    /// Shift both open ends outward by `length`, away from their neighbours.
    ///
    /// Approximates the footprint of the nozzle. Interior points are not
    /// touched, and an end coinciding with its neighbour stays in place.
    pub fn add_padding(&mut self, length: f64) {
        let n = self.points.len();

        let start = self.points[0];
        self.points[0] = start + (start - self.points[1]).normalized() * length;

        let end = self.points[n - 1];
        self.points[n - 1] = end + (end - self.points[n - 2]).normalized() * length;
    }
}
