//! Route data model.
//!
//! Routes come from a directions service as JSON (legs of steps, each
//! step with a GeoJSON line and a maneuver). They are validated once on
//! receipt and never modified afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::instructions;

/// Kind of action a maneuver asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverType {
    Depart,
    Turn,
    Continue,
    #[serde(rename = "new name")]
    NewName,
    Merge,
    #[serde(rename = "on ramp")]
    OnRamp,
    #[serde(rename = "off ramp")]
    OffRamp,
    Fork,
    #[serde(rename = "end of road")]
    EndOfRoad,
    Roundabout,
    Rotary,
    #[serde(rename = "exit roundabout")]
    ExitRoundabout,
    Arrive,
    Notification,
    #[serde(other)]
    Other,
}

/// Direction of a maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    #[serde(rename = "uturn")]
    UTurn,
    #[serde(rename = "sharp right")]
    SharpRight,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "slight right")]
    SlightRight,
    #[serde(rename = "straight")]
    Straight,
    #[serde(rename = "slight left")]
    SlightLeft,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "sharp left")]
    SharpLeft,
}

/// The action at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub location: Coordinate,
    /// Human-readable instruction. Synthesized from `kind` and `modifier`
    /// when the payload leaves it out.
    #[serde(default)]
    pub instruction: String,
    #[serde(rename = "type")]
    pub kind: ManeuverType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Modifier>,
}

/// One maneuver's worth of a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Length in meters.
    pub distance: f64,
    /// Travel time in seconds.
    pub duration: f64,
    #[serde(with = "line_string")]
    pub geometry: Vec<Coordinate>,
    pub maneuver: Maneuver,
}

/// The part of a route between two waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub steps: Vec<Step>,
}

/// A complete directions result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Total length in meters.
    pub distance: f64,
    /// Total travel time in seconds.
    pub duration: f64,
    pub legs: Vec<Leg>,
}

/// Response envelope of a directions request.
#[derive(Debug, Deserialize)]
struct Directions {
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    message: Option<String>,
}

impl Route {
    /// Build a single-leg route whose totals are the sums over `steps`.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            distance: steps.iter().map(|s| s.distance).sum(),
            duration: steps.iter().map(|s| s.duration).sum(),
            legs: vec![Leg {
                summary: String::new(),
                steps,
            }],
        }
    }

    /// Decode a single route object.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut route: Route = serde_json::from_str(json)?;
        route.fill_missing_instructions();
        Ok(route)
    }

    /// Decode a `{ "routes": [...] }` response and take the first route.
    pub fn from_directions_json(json: &str) -> Result<Self> {
        let directions: Directions = serde_json::from_str(json)?;
        let mut route = directions.routes.into_iter().next().ok_or_else(|| {
            NavError::RecalculationFailed(
                directions
                    .message
                    .unwrap_or_else(|| "no route found".to_string()),
            )
        })?;
        route.fill_missing_instructions();
        Ok(route)
    }

    /// All steps across all legs, in travel order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.legs.iter().flat_map(|leg| leg.steps.iter())
    }

    pub fn step_count(&self) -> usize {
        self.legs.iter().map(|leg| leg.steps.len()).sum()
    }

    /// Location of the final maneuver.
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps().last().map(|s| s.maneuver.location)
    }

    /// Check that the route can be navigated.
    ///
    /// Step geometries are not checked here: an empty geometry only
    /// becomes an error when its step is reached.
    pub fn validate(&self) -> Result<()> {
        if self.legs.is_empty() {
            return Err(NavError::InvalidRoute("route has no legs".to_string()));
        }
        if self.step_count() == 0 {
            return Err(NavError::InvalidRoute("route has no steps".to_string()));
        }
        if !(self.distance.is_finite() && self.distance >= 0.0) {
            return Err(NavError::InvalidRoute(format!(
                "distance must be non-negative, got {}",
                self.distance
            )));
        }
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(NavError::InvalidRoute(format!(
                "duration must be non-negative, got {}",
                self.duration
            )));
        }
        if let Some((i, _)) = self
            .steps()
            .enumerate()
            .find(|(_, s)| !(s.distance >= 0.0 && s.duration >= 0.0))
        {
            return Err(NavError::InvalidRoute(format!(
                "step {i} has a negative or undefined distance or duration"
            )));
        }
        Ok(())
    }

    fn fill_missing_instructions(&mut self) {
        for step in self.legs.iter_mut().flat_map(|leg| leg.steps.iter_mut()) {
            if step.maneuver.instruction.trim().is_empty() {
                step.maneuver.instruction =
                    instructions::describe(step.maneuver.kind, step.maneuver.modifier);
            }
        }
    }
}

/// Step geometry as a GeoJSON `LineString`, or a bare coordinate array.
mod line_string {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::geo::Coordinate;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Bare(Vec<Coordinate>),
        LineString { coordinates: Vec<Coordinate> },
    }

    #[derive(Serialize)]
    struct LineString<'a> {
        #[serde(rename = "type")]
        kind: &'static str,
        coordinates: &'a [Coordinate],
    }

    pub fn serialize<S: Serializer>(coords: &[Coordinate], serializer: S) -> Result<S::Ok, S::Error> {
        LineString {
            kind: "LineString",
            coordinates: coords,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Coordinate>, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(coordinates) => coordinates,
            Wire::LineString { coordinates } => coordinates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTIONS: &str = r#"{
  "code": "Ok",
  "routes": [{
    "distance": 1500.0,
    "duration": 120.0,
    "legs": [{
      "summary": "Ringstrasse",
      "steps": [
        {
          "distance": 1000.0,
          "duration": 80.0,
          "geometry": {"type": "LineString", "coordinates": [[16.37, 48.20], [16.38, 48.20]]},
          "maneuver": {"location": [16.38, 48.20], "instruction": "Turn left onto Ring", "type": "turn", "modifier": "left"}
        },
        {
          "distance": 500.0,
          "duration": 40.0,
          "geometry": [[16.38, 48.20], [16.38, 48.205]],
          "maneuver": {"location": [16.38, 48.205], "type": "arrive"}
        }
      ]
    }]
  }]
}"#;

    fn step(distance: f64) -> Step {
        Step {
            distance,
            duration: distance / 10.0,
            geometry: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.001, 0.0)],
            maneuver: Maneuver {
                location: Coordinate::new(0.001, 0.0),
                instruction: "Continue".to_string(),
                kind: ManeuverType::Continue,
                modifier: None,
            },
        }
    }

    #[test]
    fn decode_directions_response() {
        let route = Route::from_directions_json(DIRECTIONS).unwrap();

        assert_eq!(route.distance, 1500.0);
        assert_eq!(route.legs.len(), 1);
        assert_eq!(route.legs[0].summary, "Ringstrasse");
        assert_eq!(route.step_count(), 2);

        let first = route.steps().next().unwrap();
        assert_eq!(first.geometry.len(), 2);
        assert!((first.geometry[1].lon - 16.38).abs() < 1e-9);
        assert!((first.geometry[1].lat - 48.20).abs() < 1e-9);
        assert_eq!(first.maneuver.kind, ManeuverType::Turn);
        assert_eq!(first.maneuver.modifier, Some(Modifier::Left));
        assert_eq!(first.maneuver.instruction, "Turn left onto Ring");
    }

    #[test]
    fn missing_instruction_is_synthesized() {
        let route = Route::from_directions_json(DIRECTIONS).unwrap();
        let last = route.steps().last().unwrap();
        assert_eq!(last.maneuver.instruction, "Arrive at your destination");
    }

    #[test]
    fn unknown_maneuver_type_decodes_as_other() {
        let json = r#"{"location": [0.0, 0.0], "type": "use lane", "instruction": "Use the left lane"}"#;
        let maneuver: Maneuver = serde_json::from_str(json).unwrap();
        assert_eq!(maneuver.kind, ManeuverType::Other);
    }

    #[test]
    fn empty_routes_is_recalculation_failure() {
        let result = Route::from_directions_json(r#"{"code": "NoRoute", "routes": [], "message": "Impossible route"}"#);
        match result {
            Err(NavError::RecalculationFailed(msg)) => assert_eq!(msg, "Impossible route"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_decode_error() {
        assert!(matches!(Route::from_json("{"), Err(NavError::Decode(_))));
    }

    #[test]
    fn serialized_route_decodes_again() {
        let route = Route::from_directions_json(DIRECTIONS).unwrap();
        let json = serde_json::to_string(&route).unwrap();
        assert!(json.contains(r#""type":"LineString""#));
        assert_eq!(Route::from_json(&json).unwrap(), route);
    }

    #[test]
    fn steps_concatenate_legs_in_order() {
        let route = Route {
            distance: 600.0,
            duration: 60.0,
            legs: vec![
                Leg { summary: String::new(), steps: vec![step(100.0), step(200.0)] },
                Leg { summary: String::new(), steps: vec![step(300.0)] },
            ],
        };
        let distances: Vec<f64> = route.steps().map(|s| s.distance).collect();
        assert_eq!(distances, vec![100.0, 200.0, 300.0]);
        assert_eq!(route.step_count(), 3);
    }

    #[test]
    fn from_steps_sums_totals() {
        let route = Route::from_steps(vec![step(100.0), step(250.0)]);
        assert_eq!(route.distance, 350.0);
        assert!((route.duration - 35.0).abs() < 1e-9);
        assert!(route.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_routes() {
        let no_legs = Route { distance: 0.0, duration: 0.0, legs: vec![] };
        assert!(matches!(no_legs.validate(), Err(NavError::InvalidRoute(_))));

        let no_steps = Route {
            distance: 0.0,
            duration: 0.0,
            legs: vec![Leg { summary: String::new(), steps: vec![] }],
        };
        assert!(matches!(no_steps.validate(), Err(NavError::InvalidRoute(_))));
    }

    #[test]
    fn validate_rejects_negative_totals() {
        let mut route = Route::from_steps(vec![step(100.0)]);
        route.duration = -1.0;
        assert!(matches!(route.validate(), Err(NavError::InvalidRoute(_))));

        let mut route = Route::from_steps(vec![step(100.0)]);
        route.distance = f64::NAN;
        assert!(matches!(route.validate(), Err(NavError::InvalidRoute(_))));
    }

    #[test]
    fn destination_is_last_maneuver() {
        let route = Route::from_directions_json(DIRECTIONS).unwrap();
        let dest = route.destination().unwrap();
        assert!((dest.lat - 48.205).abs() < 1e-9);
    }
}
