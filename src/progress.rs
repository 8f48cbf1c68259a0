//! Progress along the active step and the rest of the route.

use serde::Serialize;

use crate::geo::{bearing, distance, Coordinate};
use crate::route::Step;

/// Where the vehicle stands relative to the current step's maneuver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepProgress {
    /// Straight-line distance to the maneuver location, in meters.
    pub distance_to_maneuver: f64,
    /// Initial bearing toward the maneuver location, in degrees.
    pub bearing_to_maneuver: f64,
    /// The maneuver is close enough to count as done.
    pub step_complete: bool,
}

/// What is left of the route, and how much has been covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Remaining {
    /// Meters still to travel.
    pub distance: f64,
    /// Seconds of travel in steps not yet started.
    pub duration: f64,
    /// Meters already covered.
    pub consumed: f64,
}

/// Measures distance to the next maneuver.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    maneuver_reached_m: f64,
}

impl ProgressTracker {
    pub fn new(maneuver_reached_m: f64) -> Self {
        Self { maneuver_reached_m }
    }

    pub fn measure(&self, step: &Step, position: &Coordinate) -> StepProgress {
        let target = &step.maneuver.location;
        let distance_to_maneuver = distance(position, target);
        StepProgress {
            distance_to_maneuver,
            bearing_to_maneuver: bearing(position, target),
            step_complete: distance_to_maneuver < self.maneuver_reached_m,
        }
    }
}

/// Remaining distance and duration with `current` as the active step.
///
/// Without a measured distance to the maneuver (no position yet) the
/// whole current step counts as remaining. The current step's duration
/// is never included; only steps not yet started contribute time.
pub fn remaining(steps: &[Step], current: usize, distance_to_maneuver: Option<f64>) -> Remaining {
    let Some(step) = steps.get(current) else {
        return Remaining {
            distance: 0.0,
            duration: 0.0,
            consumed: steps.iter().map(|s| s.distance).sum(),
        };
    };

    let ahead = &steps[current + 1..];
    let to_maneuver = distance_to_maneuver.unwrap_or(step.distance);
    let done: f64 = steps[..current].iter().map(|s| s.distance).sum();

    Remaining {
        distance: to_maneuver + ahead.iter().map(|s| s.distance).sum::<f64>(),
        duration: ahead.iter().map(|s| s.duration).sum(),
        consumed: done + (step.distance - to_maneuver).max(0.0),
    }
}
