//! Collaborators at the edge of the engine.
//!
//! The engine asks a [`RoutingProvider`] for routes and hands prompts to
//! a [`SpeechSink`]. Each platform supplies its own adapters; this module
//! only ships an offline provider that steers back onto a fixed path.

use crate::error::{NavError, Result};
use crate::follower::Prompt;
use crate::geo::{distance, project_on_track, Coordinate};
use crate::instructions::route_from_points;
use crate::route::Route;

/// Source of routes, called at start and on every recalculation.
///
/// Implementations may block; the navigator calls them off the
/// position-update path.
pub trait RoutingProvider: Send + Sync {
    fn route(&self, origin: &Coordinate, destination: &Coordinate) -> Result<Route>;
}

/// Receiver of spoken or displayed prompts.
///
/// Called with the navigator's lock held, so it must return quickly and
/// must not call back into the navigator.
pub trait SpeechSink: Send + Sync {
    fn speak(&self, prompt: &Prompt);
}

impl<F> SpeechSink for F
where
    F: Fn(&Prompt) + Send + Sync,
{
    fn speak(&self, prompt: &Prompt) {
        self(prompt)
    }
}

/// Offline provider over a fixed path, e.g. an imported GPX track.
///
/// A recalculation leads from the origin straight to the closest point of
/// the path and then along the rest of it. The destination is always the
/// end of the path.
pub struct TrackRejoinProvider {
    track: Vec<Coordinate>,
    speed_mps: f64,
}

/// Origins closer than this to the path start on it without a rejoin leg.
const REJOIN_MIN_M: f64 = 1.0;

impl TrackRejoinProvider {
    pub fn new(track: Vec<Coordinate>, speed_mps: f64) -> Result<Self> {
        if track.len() < 2 {
            return Err(NavError::InvalidRoute(format!(
                "rejoin path needs at least 2 points, got {}",
                track.len()
            )));
        }
        Ok(Self { track, speed_mps })
    }

    /// Build a provider from the geometry of an existing route.
    pub fn from_route(route: &Route, speed_mps: f64) -> Result<Self> {
        let mut track: Vec<Coordinate> = Vec::new();
        for c in route.steps().flat_map(|s| s.geometry.iter()) {
            if track.last() != Some(c) {
                track.push(*c);
            }
        }
        Self::new(track, speed_mps)
    }
}

impl RoutingProvider for TrackRejoinProvider {
    fn route(&self, origin: &Coordinate, _destination: &Coordinate) -> Result<Route> {
        let projection = project_on_track(origin, &self.track)
            .ok_or_else(|| NavError::RecalculationFailed("rejoin path too short".to_string()))?;

        let mut points = Vec::with_capacity(self.track.len() - projection.segment_index + 1);
        if projection.distance_m >= REJOIN_MIN_M {
            points.push(*origin);
        }
        points.push(projection.point);
        points.extend(
            self.track[projection.segment_index + 1..]
                .iter()
                .filter(|c| distance(c, &projection.point) > 0.0),
        );

        if points.len() < 2 {
            return Err(NavError::RecalculationFailed(
                "already at the end of the path".to_string(),
            ));
        }

        log::debug!(
            "Rejoining path at segment {} ({:.0} m away)",
            projection.segment_index,
            projection.distance_m
        );
        route_from_points(&points, self.speed_mps)
            .map_err(|e| NavError::RecalculationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{ManeuverType, Modifier};

    fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    fn l_path() -> Vec<Coordinate> {
        vec![pt(0.0, 0.0), pt(0.01, 0.0), pt(0.01, 0.01)]
    }

    #[test]
    fn rejoin_leads_back_to_path() {
        let provider = TrackRejoinProvider::new(l_path(), 10.0).unwrap();
        // ~110 m west of the first leg
        let origin = pt(0.005, -0.001);
        let route = provider.route(&origin, &pt(0.01, 0.01)).unwrap();

        let steps: Vec<_> = route.steps().collect();
        assert_eq!(steps[0].geometry[0], origin);
        // Heading east to the path, then north along it: a left turn
        assert_eq!(steps[0].maneuver.modifier, Some(Modifier::Left));
        assert!((steps[0].maneuver.location.lat - 0.005).abs() < 1e-6);
        assert_eq!(route.destination(), Some(pt(0.01, 0.01)));
        assert_eq!(steps.last().unwrap().maneuver.kind, ManeuverType::Arrive);
    }

    #[test]
    fn origin_on_path_has_no_rejoin_leg() {
        let provider = TrackRejoinProvider::new(l_path(), 10.0).unwrap();
        let route = provider.route(&pt(0.01, 0.004), &pt(0.01, 0.01)).unwrap();

        assert_eq!(route.step_count(), 1);
        let step = route.steps().next().unwrap();
        assert_eq!(step.geometry.len(), 2);
        assert!((route.distance - distance(&pt(0.01, 0.004), &pt(0.01, 0.01))).abs() < 1.0);
    }

    #[test]
    fn origin_past_the_end_fails() {
        let provider = TrackRejoinProvider::new(l_path(), 10.0).unwrap();
        let result = provider.route(&pt(0.01, 0.01), &pt(0.01, 0.01));
        assert!(matches!(result, Err(NavError::RecalculationFailed(_))));
    }

    #[test]
    fn short_path_rejected() {
        assert!(TrackRejoinProvider::new(vec![pt(0.0, 0.0)], 10.0).is_err());
    }

    #[test]
    fn from_route_merges_shared_vertices() {
        let route = route_from_points(&l_path(), 10.0).unwrap();
        let provider = TrackRejoinProvider::from_route(&route, 10.0).unwrap();
        assert_eq!(provider.track, l_path());
    }

    #[test]
    fn closures_are_sinks() {
        use crate::follower::PromptKind;
        use std::sync::Mutex;

        let heard = Mutex::new(Vec::new());
        let sink = |p: &Prompt| heard.lock().unwrap().push(p.text.clone());
        sink.speak(&Prompt { kind: PromptKind::Arrival, text: "Done".to_string() });
        assert_eq!(*heard.lock().unwrap(), vec!["Done".to_string()]);
    }
}
