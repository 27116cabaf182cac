//! Priming layer detection
//!
//! Slicers often print a skirt or purge line at some height and then drop
//! the nozzle to start the real first layer. Exactly one such descent is
//! accepted, and only while a single layer exists; the layer printed before
//! it becomes the priming layer.

use crate::error::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimingPhase {
    #[default]
    Normal,
    PrimingDetected,
}

/// What the model builder has to do to obtain the layer at a height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerAction {
    /// A layer already exists at this height.
    Reuse,
    /// Start a new, empty layer.
    Create,
    /// Move the layer at `priming_z` to the priming slot, then start a new
    /// layer.
    DemoteAndCreate { priming_z: f64 },
}

/// Two-state machine tracking deposition heights.
#[derive(Debug, Clone, Default)]
pub struct PrimingDetector {
    last_z: f64,
    phase: PrimingPhase,
}

impl PrimingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PrimingPhase {
        self.phase
    }

    /// Height of the most recent deposition move.
    pub fn last_z(&self) -> f64 {
        self.last_z
    }

    /// Decide how to obtain the layer at `z` for a deposition move.
    ///
    /// `layer_exists` tells whether a layer is already registered at `z`,
    /// `layer_count` how many regular layers exist. The height is recorded
    /// as the latest deposition height unless an error is returned.
    pub fn resolve(
        &mut self,
        z: f64,
        layer_exists: bool,
        layer_count: usize,
    ) -> Result<LayerAction, GeometryError> {
        let action = if layer_exists {
            LayerAction::Reuse
        } else if z < self.last_z {
            self.descend(z, layer_count)?
        } else {
            LayerAction::Create
        };

        self.last_z = z;
        Ok(action)
    }

    fn descend(&mut self, z: f64, layer_count: usize) -> Result<LayerAction, GeometryError> {
        if self.phase == PrimingPhase::PrimingDetected {
            return Err(GeometryError::PostPrimingDescent {
                cur_layer_z: z,
                prev_layer_z: self.last_z,
            });
        }

        if layer_count > 1 {
            return Err(GeometryError::LateEffectorDescent {
                cur_layer_z: z,
                prev_layer_z: self.last_z,
                prev_layer_count: layer_count,
            });
        }

        // Below the bed before anything was printed, nothing to demote
        if layer_count == 0 {
            return Ok(LayerAction::Create);
        }

        self.phase = PrimingPhase::PrimingDetected;
        Ok(LayerAction::DemoteAndCreate {
            priming_z: self.last_z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_heights() {
        let mut detector = PrimingDetector::new();
        assert_eq!(detector.resolve(0.2, false, 0).unwrap(), LayerAction::Create);
        assert_eq!(detector.resolve(0.2, true, 1).unwrap(), LayerAction::Reuse);
        assert_eq!(detector.resolve(0.4, false, 1).unwrap(), LayerAction::Create);
        assert_eq!(detector.phase(), PrimingPhase::Normal);
        assert_eq!(detector.last_z(), 0.4);
    }

    #[test]
    fn test_single_descent_detects_priming() {
        let mut detector = PrimingDetector::new();
        detector.resolve(0.1, false, 0).unwrap();

        let action = detector.resolve(0.05, false, 1).unwrap();
        assert_eq!(action, LayerAction::DemoteAndCreate { priming_z: 0.1 });
        assert_eq!(detector.phase(), PrimingPhase::PrimingDetected);

        assert_eq!(detector.resolve(0.3, false, 1).unwrap(), LayerAction::Create);
    }

    #[test]
    fn test_descent_after_priming() {
        let mut detector = PrimingDetector::new();
        detector.resolve(0.1, false, 0).unwrap();
        detector.resolve(0.05, false, 1).unwrap();
        detector.resolve(0.3, false, 1).unwrap();

        let err = detector.resolve(0.2, false, 2).unwrap_err();
        assert_eq!(
            err,
            GeometryError::PostPrimingDescent {
                cur_layer_z: 0.2,
                prev_layer_z: 0.3
            }
        );
    }

    #[test]
    fn test_late_descent() {
        let mut detector = PrimingDetector::new();
        detector.resolve(0.2, false, 0).unwrap();
        detector.resolve(0.4, false, 1).unwrap();

        let err = detector.resolve(0.3, false, 2).unwrap_err();
        assert_eq!(
            err,
            GeometryError::LateEffectorDescent {
                cur_layer_z: 0.3,
                prev_layer_z: 0.4,
                prev_layer_count: 2
            }
        );
        // Failed lookups leave the last height alone
        assert_eq!(detector.last_z(), 0.4);
    }

    #[test]
    fn test_returning_to_existing_layer_is_not_a_descent() {
        let mut detector = PrimingDetector::new();
        detector.resolve(0.2, false, 0).unwrap();
        detector.resolve(0.4, false, 1).unwrap();
        assert_eq!(detector.resolve(0.2, true, 2).unwrap(), LayerAction::Reuse);
    }

    #[test]
    fn test_negative_first_height() {
        let mut detector = PrimingDetector::new();
        assert_eq!(detector.resolve(-0.1, false, 0).unwrap(), LayerAction::Create);
        assert_eq!(detector.phase(), PrimingPhase::Normal);
    }
}
