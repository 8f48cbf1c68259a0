//! Maneuver classification and instruction text.
//!
//! Turns a plain polyline (from a GPX file or an offline rejoin) into
//! navigable steps by classifying the bearing change at each vertex.
//! Vertices where the path goes straight on are folded into the
//! surrounding step.

use crate::error::{NavError, Result};
use crate::geo::{bearing, track_length, Coordinate};
use crate::route::{Maneuver, ManeuverType, Modifier, Route, Step};

/// Build a single-leg route from a polyline.
///
/// Each step ends at a vertex where the path turns; the last step ends
/// with an arrival at the final point. Durations assume a constant
/// `speed_mps`.
pub fn route_from_points(points: &[Coordinate], speed_mps: f64) -> Result<Route> {
    if points.len() < 2 {
        return Err(NavError::InvalidRoute(format!(
            "need at least 2 points, got {}",
            points.len()
        )));
    }
    if !(speed_mps.is_finite() && speed_mps > 0.0) {
        return Err(NavError::InvalidRoute(format!(
            "assumed speed must be positive, got {speed_mps}"
        )));
    }

    let mut steps = Vec::new();
    let mut geometry = vec![points[0]];

    for i in 1..points.len() - 1 {
        geometry.push(points[i]);
        let modifier = modifier_at(&points[i - 1], &points[i], &points[i + 1]);
        if modifier == Modifier::Straight {
            continue;
        }
        steps.push(make_step(
            std::mem::replace(&mut geometry, vec![points[i]]),
            ManeuverType::Turn,
            Some(modifier),
            speed_mps,
        ));
    }

    geometry.push(points[points.len() - 1]);
    steps.push(make_step(geometry, ManeuverType::Arrive, None, speed_mps));

    Ok(Route::from_steps(steps))
}

fn make_step(
    geometry: Vec<Coordinate>,
    kind: ManeuverType,
    modifier: Option<Modifier>,
    speed_mps: f64,
) -> Step {
    let distance = track_length(&geometry);
    // geometry always holds at least the step's start and end
    let location = geometry[geometry.len() - 1];
    Step {
        distance,
        duration: distance / speed_mps,
        geometry,
        maneuver: Maneuver {
            location,
            instruction: describe(kind, modifier),
            kind,
            modifier,
        },
    }
}

/// Turn direction at `b` for a path arriving from `a` and leaving toward `c`.
pub fn modifier_at(a: &Coordinate, b: &Coordinate, c: &Coordinate) -> Modifier {
    // Heading change in (-180, 180], positive to the right
    let change = 180.0 - (bearing(a, b) - bearing(b, c) + 540.0).rem_euclid(360.0);
    classify_turn(change)
}

/// Lower bounds (exclusive) of each turn band, with its right and left
/// modifiers. Anything at or below 20 degrees goes straight on.
const TURN_BANDS: [(f64, Modifier, Modifier); 4] = [
    (170.0, Modifier::UTurn, Modifier::UTurn),
    (120.0, Modifier::SharpRight, Modifier::SharpLeft),
    (60.0, Modifier::Right, Modifier::Left),
    (20.0, Modifier::SlightRight, Modifier::SlightLeft),
];

fn classify_turn(change_deg: f64) -> Modifier {
    TURN_BANDS
        .iter()
        .find(|(above, _, _)| change_deg.abs() > *above)
        .map_or(Modifier::Straight, |&(_, right, left)| {
            if change_deg > 0.0 {
                right
            } else {
                left
            }
        })
}

/// Instruction text for a maneuver that arrived without one.
pub fn describe(kind: ManeuverType, modifier: Option<Modifier>) -> String {
    let text = match (kind, modifier) {
        (ManeuverType::Arrive, _) => "Arrive at your destination",
        (ManeuverType::Depart, _) => "Head out along the route",
        (_, Some(Modifier::UTurn)) => "Make a U-turn",
        (ManeuverType::Roundabout | ManeuverType::Rotary, _) => "Enter the roundabout",
        (ManeuverType::ExitRoundabout, _) => "Exit the roundabout",
        (ManeuverType::Merge, _) => "Merge",
        (ManeuverType::OnRamp, _) => "Take the ramp",
        (ManeuverType::OffRamp, _) => "Take the exit",
        (ManeuverType::Fork, Some(Modifier::Left | Modifier::SlightLeft | Modifier::SharpLeft)) => {
            "Keep left at the fork"
        }
        (ManeuverType::Fork, Some(Modifier::Right | Modifier::SlightRight | Modifier::SharpRight)) => {
            "Keep right at the fork"
        }
        (_, Some(m)) => turn_to_text(m),
        (_, None) => "Continue",
    };
    text.to_string()
}

fn turn_to_text(modifier: Modifier) -> &'static str {
    match modifier {
        Modifier::Straight => "Continue straight",
        Modifier::SlightLeft => "Keep slightly left",
        Modifier::Left => "Turn left",
        Modifier::SharpLeft => "Turn sharp left",
        Modifier::SlightRight => "Keep slightly right",
        Modifier::Right => "Turn right",
        Modifier::SharpRight => "Turn sharp right",
        Modifier::UTurn => "Make a U-turn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    #[test]
    fn turn_bands_at_their_edges() {
        assert_eq!(classify_turn(0.0), Modifier::Straight);
        assert_eq!(classify_turn(20.0), Modifier::Straight);
        assert_eq!(classify_turn(-20.5), Modifier::SlightLeft);
        assert_eq!(classify_turn(60.0), Modifier::SlightRight);
        assert_eq!(classify_turn(60.5), Modifier::Right);
        assert_eq!(classify_turn(-120.5), Modifier::SharpLeft);
        assert_eq!(classify_turn(170.0), Modifier::SharpRight);
        assert_eq!(classify_turn(-170.5), Modifier::UTurn);
        assert_eq!(classify_turn(180.0), Modifier::UTurn);
    }

    #[test]
    fn modifier_across_north() {
        // Heading west, then north: the wraparound must not flip the sign
        let m = modifier_at(&pt(0.0, 0.01), &pt(0.0, 0.0), &pt(0.01, 0.0));
        assert_eq!(m, Modifier::Right);
        // Heading east, then north
        let m = modifier_at(&pt(0.0, -0.01), &pt(0.0, 0.0), &pt(0.01, 0.0));
        assert_eq!(m, Modifier::Left);
    }

    #[test]
    fn doubling_back_is_a_u_turn() {
        let m = modifier_at(&pt(0.0, 0.0), &pt(0.01, 0.0), &pt(0.0, 0.0001));
        assert_eq!(m, Modifier::UTurn);
    }

    #[test]
    fn gentle_bends_stay_in_one_step() {
        // North with two ~11 degree bends
        let points = [pt(0.0, 0.0), pt(0.005, 0.0), pt(0.01, 0.001), pt(0.015, 0.001)];
        let route = route_from_points(&points, 10.0).unwrap();

        assert_eq!(route.step_count(), 1);
        let step = route.steps().next().unwrap();
        assert_eq!(step.geometry, points.to_vec());
        assert_eq!(step.maneuver.kind, ManeuverType::Arrive);
        assert_eq!(step.maneuver.instruction, "Arrive at your destination");
    }

    #[test]
    fn each_step_ends_at_its_turn() {
        // North, right onto an eastbound road, then a slight left
        let points = [
            pt(0.0, 0.0),
            pt(0.01, 0.0),
            pt(0.01, 0.01),
            pt(0.0115, 0.0135),
        ];
        let route = route_from_points(&points, 10.0).unwrap();
        let steps: Vec<&Step> = route.steps().collect();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].maneuver.modifier, Some(Modifier::Right));
        assert_eq!(steps[0].maneuver.instruction, "Turn right");
        assert_eq!(steps[1].maneuver.modifier, Some(Modifier::SlightLeft));
        assert_eq!(steps[1].maneuver.instruction, "Keep slightly left");
        // Consecutive steps share their boundary vertex
        for pair in steps.windows(2) {
            assert_eq!(pair[0].maneuver.location, pair[1].geometry[0]);
            assert_eq!(pair[0].geometry.last(), pair[1].geometry.first());
        }
        assert_eq!(steps[2].maneuver.location, points[3]);
    }

    #[test]
    fn totals_follow_geometry() {
        let points = [pt(0.0, 0.0), pt(0.01, 0.0), pt(0.01, 0.01)];
        let route = route_from_points(&points, 10.0).unwrap();

        let expected = track_length(&points);
        assert!((route.distance - expected).abs() < 1e-6);
        assert!((route.duration - expected / 10.0).abs() < 1e-6);
        assert!(route.validate().is_ok());
    }

    #[test]
    fn too_few_points() {
        let result = route_from_points(&[pt(0.0, 0.0)], 10.0);
        assert!(matches!(result, Err(NavError::InvalidRoute(_))));
    }

    #[test]
    fn zero_speed_rejected() {
        let result = route_from_points(&[pt(0.0, 0.0), pt(0.01, 0.0)], 0.0);
        assert!(matches!(result, Err(NavError::InvalidRoute(_))));
    }

    #[test]
    fn describe_fills_from_type_and_modifier() {
        assert_eq!(describe(ManeuverType::Turn, Some(Modifier::SharpLeft)), "Turn sharp left");
        assert_eq!(describe(ManeuverType::Fork, Some(Modifier::SlightLeft)), "Keep left at the fork");
        assert_eq!(describe(ManeuverType::Continue, None), "Continue");
        assert_eq!(describe(ManeuverType::Arrive, Some(Modifier::Left)), "Arrive at your destination");
    }
}
