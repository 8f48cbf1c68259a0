//! Route-following state machine.
//!
//! Consumes a validated route and a stream of position samples and
//! decides, sample by sample, which step is current, whether the vehicle
//! has left the route, and what should be spoken. The follower performs
//! no I/O: it returns [`Event`]s and the caller delivers prompts and runs
//! route recalculations, feeding results back through
//! [`RouteFollower::apply_recalculation`].
//!
//! An off-route episode opens with the first sample beyond the off-route
//! threshold and closes only after several consecutive samples back on
//! the route, or when a recalculated route replaces the old one. Samples
//! that flap around the threshold inside one episode produce neither a
//! second notice nor a second request.
//!
//! Every change of session identity (start, stop, route replacement,
//! end of an off-route episode) bumps a generation counter. Recalculation
//! requests carry the generation they were issued under as their ticket,
//! and a result whose ticket no longer matches is dropped.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::announce::{distance_prompt, AnnouncementScheduler};
use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::geo::{distance_to_polyline_with, Coordinate};
use crate::progress::{remaining, ProgressTracker, Remaining};
use crate::route::{Route, Step};

/// One reading from the position source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub speed_mps: f64,
    pub bearing_deg: f64,
    pub timestamp: Timestamp,
}

/// Externally visible navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    Idle,
    Active,
    OffRoute,
    Arrived,
    Stopped,
}

/// Why a prompt was spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    /// First instruction of a (possibly recalculated) route.
    Start,
    /// A new step became current.
    Step,
    Distance { bucket_m: u32 },
    OffRoute,
    Arrival,
}

/// Text for the speech sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    #[serde(flatten)]
    pub kind: PromptKind,
    pub text: String,
}

/// Ask the routing provider for a fresh route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecalculationRequest {
    /// Hand this back to [`RouteFollower::apply_recalculation`].
    pub ticket: u64,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// Output of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Prompt(Prompt),
    Recalculate(RecalculationRequest),
    Arrived,
}

/// Read-only view of the session for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationStatus {
    pub state: NavState,
    pub step_index: usize,
    pub step_count: usize,
    pub current_instruction: Option<String>,
    pub distance_to_next_maneuver: Option<f64>,
    pub bearing_to_maneuver: Option<f64>,
    pub remaining_distance: f64,
    pub remaining_duration: f64,
    pub estimated_arrival: Option<Timestamp>,
    pub is_off_route: bool,
    pub is_paused: bool,
    pub progress_fraction: f64,
}

struct NavigationSession {
    route: Route,
    steps: Vec<Step>,
    step_index: usize,
    /// Final destination of the route navigation started with.
    destination: Coordinate,
    off_route: bool,
    /// Set from the first off-route sample until the episode closes.
    episode_open: bool,
    on_route_streak: u32,
    paused: bool,
    announcer: AnnouncementScheduler,
    pending_ticket: Option<u64>,
    distance_to_maneuver: Option<f64>,
    bearing_to_maneuver: Option<f64>,
    remaining: Remaining,
    estimated_arrival: Option<Timestamp>,
}

impl NavigationSession {
    fn current_step(&self) -> &Step {
        &self.steps[self.step_index]
    }
}

/// The route-following state machine.
pub struct RouteFollower {
    config: NavConfig,
    tracker: ProgressTracker,
    state: NavState,
    generation: u64,
    session: Option<NavigationSession>,
    /// Status as of the end of the last session.
    last_status: Option<NavigationStatus>,
}

impl RouteFollower {
    pub fn new(config: NavConfig) -> Self {
        let tracker = ProgressTracker::new(config.maneuver_reached_m);
        Self {
            config,
            tracker,
            state: NavState::Idle,
            generation: 0,
            session: None,
            last_status: None,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.paused)
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Start following `route` from its first step.
    ///
    /// Replaces any running session. The first instruction is returned as
    /// a prompt right away.
    pub fn start(&mut self, route: Route) -> Result<Vec<Event>> {
        route.validate()?;
        let destination = route
            .destination()
            .ok_or_else(|| NavError::InvalidRoute("route has no steps".to_string()))?;
        let session = self.new_session(route, destination, false)?;

        if self.session.is_some() {
            log::info!("Replacing active navigation session");
        }
        log::info!(
            "Navigation started: {} steps, {:.0} m, {:.0} s",
            session.steps.len(),
            session.route.distance,
            session.route.duration
        );

        let text = session.current_step().maneuver.instruction.clone();
        self.generation += 1;
        self.session = Some(session);
        self.state = NavState::Active;
        self.last_status = None;

        Ok(vec![Event::Prompt(Prompt {
            kind: PromptKind::Start,
            text,
        })])
    }

    /// Process one position sample.
    ///
    /// Ignored unless navigating and not paused. An empty geometry on the
    /// step that becomes current ends the session with `InvalidGeometry`.
    pub fn update(&mut self, sample: &PositionSample) -> Result<Vec<Event>> {
        if !matches!(self.state, NavState::Active | NavState::OffRoute) {
            log::debug!("Ignoring position sample in state {:?}", self.state);
            return Ok(Vec::new());
        }
        if !sample.coordinate.is_valid() {
            log::warn!(
                "Ignoring invalid position {:.6},{:.6}",
                sample.coordinate.lat,
                sample.coordinate.lon
            );
            return Ok(Vec::new());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(Vec::new());
        };
        if session.paused {
            return Ok(Vec::new());
        }

        let position = sample.coordinate;
        let mut events = Vec::new();
        let mut progress = self.tracker.measure(session.current_step(), &position);

        if progress.step_complete {
            session.step_index += 1;
            if session.step_index == session.steps.len() {
                return Ok(self.arrive(sample.timestamp));
            }
            if session.current_step().geometry.is_empty() {
                let step = session.step_index;
                return Err(self.abort(NavError::InvalidGeometry(format!(
                    "step {step} has no coordinates"
                ))));
            }

            progress = self.tracker.measure(session.current_step(), &position);
            session.announcer.start_step(Some(progress.distance_to_maneuver));
            log::info!(
                "Advanced to step {}/{}",
                session.step_index + 1,
                session.steps.len()
            );
            events.push(Event::Prompt(Prompt {
                kind: PromptKind::Step,
                text: session.current_step().maneuver.instruction.clone(),
            }));
        }

        let off_route_distance = match distance_to_polyline_with(
            &position,
            &session.current_step().geometry,
            self.config.off_route_metric,
        ) {
            Ok(d) => d,
            Err(e) => return Err(self.abort(e)),
        };

        if off_route_distance > self.config.off_route_m {
            session.on_route_streak = 0;
            if !session.off_route {
                session.off_route = true;
                self.state = NavState::OffRoute;
                if session.episode_open {
                    log::debug!(
                        "Off route again: {:.0} m from step {}",
                        off_route_distance,
                        session.step_index
                    );
                } else {
                    log::warn!(
                        "Off route: {:.0} m from step {}",
                        off_route_distance,
                        session.step_index
                    );
                    session.episode_open = true;
                    events.push(Event::Prompt(Prompt {
                        kind: PromptKind::OffRoute,
                        text: self.config.prompts.off_route.clone(),
                    }));
                }
            }
            if session.pending_ticket.is_none() {
                session.pending_ticket = Some(self.generation);
                events.push(Event::Recalculate(RecalculationRequest {
                    ticket: self.generation,
                    origin: position,
                    destination: session.destination,
                }));
            }
        } else if session.episode_open {
            if session.off_route {
                log::info!("Back on route ({:.0} m)", off_route_distance);
                session.off_route = false;
                self.state = NavState::Active;
            }
            session.on_route_streak += 1;
            if session.on_route_streak >= self.config.off_route_clear_samples {
                log::info!("Off-route episode closed after {} samples", session.on_route_streak);
                session.episode_open = false;
                session.on_route_streak = 0;
                session.pending_ticket = None;
                // Any recalculation still in flight belongs to the finished episode
                self.generation += 1;
            }
        }

        if !session.off_route {
            for bucket_m in session.announcer.check(progress.distance_to_maneuver) {
                log::debug!("Announcing {} m bucket for step {}", bucket_m, session.step_index);
                events.push(Event::Prompt(Prompt {
                    kind: PromptKind::Distance { bucket_m },
                    text: distance_prompt(bucket_m, &session.current_step().maneuver.instruction),
                }));
            }
        }

        session.distance_to_maneuver = Some(progress.distance_to_maneuver);
        session.bearing_to_maneuver = Some(progress.bearing_to_maneuver);
        session.remaining = remaining(
            &session.steps,
            session.step_index,
            Some(progress.distance_to_maneuver),
        );
        session.estimated_arrival = eta(sample.timestamp, session.remaining.duration);

        log::debug!(
            "Step {} to maneuver {:.0} m, remaining {:.0} m / {:.0} s",
            session.step_index,
            progress.distance_to_maneuver,
            session.remaining.distance,
            session.remaining.duration
        );

        Ok(events)
    }

    /// Feed back the outcome of a recalculation request.
    ///
    /// Results for an older generation are discarded. A failure, or a
    /// route that does not validate, leaves the session off route; the
    /// next off-route sample issues a new request.
    pub fn apply_recalculation(&mut self, ticket: u64, result: Result<Route>) -> Vec<Event> {
        let generation = self.generation;
        let Some(session) = self.session.as_mut() else {
            log::warn!("Discarding recalculation {ticket}: no active session");
            return Vec::new();
        };
        if ticket != generation || session.pending_ticket != Some(ticket) {
            log::warn!("Discarding stale recalculation {ticket} (generation {generation})");
            return Vec::new();
        }
        session.pending_ticket = None;

        let route = match result.and_then(|r| r.validate().map(|()| r)) {
            Ok(route) => route,
            Err(e) => {
                log::warn!("Route recalculation failed: {e}");
                return Vec::new();
            }
        };

        let destination = session.destination;
        let paused = session.paused;
        let replacement = match self.new_session(route, destination, paused) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Recalculated route rejected: {e}");
                return Vec::new();
            }
        };

        log::info!(
            "Route replaced: {} steps, {:.0} m",
            replacement.steps.len(),
            replacement.route.distance
        );
        let text = replacement.current_step().maneuver.instruction.clone();
        self.generation += 1;
        self.session = Some(replacement);
        self.state = NavState::Active;

        if paused {
            return Vec::new();
        }
        vec![Event::Prompt(Prompt {
            kind: PromptKind::Start,
            text,
        })]
    }

    /// Stop position processing without discarding the session.
    pub fn pause(&mut self) {
        match self.session.as_mut() {
            Some(session) if !session.paused => {
                log::info!("Navigation paused");
                session.paused = true;
            }
            Some(_) => {}
            None => log::debug!("pause: no active session"),
        }
    }

    pub fn resume(&mut self) {
        match self.session.as_mut() {
            Some(session) if session.paused => {
                log::info!("Navigation resumed");
                session.paused = false;
            }
            Some(_) => {}
            None => log::debug!("resume: no active session"),
        }
    }

    /// End navigation. A no-op before the first start.
    pub fn stop(&mut self) {
        if self.state == NavState::Idle {
            log::debug!("stop: no active session");
            return;
        }
        if self.session.is_some() {
            self.last_status = self.status();
            log::info!("Navigation stopped");
        }
        self.session = None;
        self.generation += 1;
        self.state = NavState::Stopped;
        if let Some(status) = self.last_status.as_mut() {
            status.state = NavState::Stopped;
            status.is_paused = false;
        }
    }

    /// Current observable fields; after a session ends, its final values.
    pub fn status(&self) -> Option<NavigationStatus> {
        let Some(session) = self.session.as_ref() else {
            return self.last_status.clone();
        };
        let route_distance = session.route.distance;
        let progress_fraction = if route_distance > 0.0 {
            (session.remaining.consumed / route_distance).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(NavigationStatus {
            state: self.state,
            step_index: session.step_index,
            step_count: session.steps.len(),
            current_instruction: Some(session.current_step().maneuver.instruction.clone()),
            distance_to_next_maneuver: session.distance_to_maneuver,
            bearing_to_maneuver: session.bearing_to_maneuver,
            remaining_distance: session.remaining.distance,
            remaining_duration: session.remaining.duration,
            estimated_arrival: session.estimated_arrival,
            is_off_route: session.off_route,
            is_paused: session.paused,
            progress_fraction,
        })
    }

    fn new_session(
        &self,
        route: Route,
        destination: Coordinate,
        paused: bool,
    ) -> Result<NavigationSession> {
        let steps: Vec<Step> = route.steps().cloned().collect();
        if steps.is_empty() {
            return Err(NavError::InvalidRoute("route has no steps".to_string()));
        }
        if steps[0].geometry.is_empty() {
            return Err(NavError::InvalidGeometry(
                "step 0 has no coordinates".to_string(),
            ));
        }

        let mut announcer = AnnouncementScheduler::new(self.config.announcement_buckets_m.clone());
        announcer.start_step(None);
        let initial = remaining(&steps, 0, None);

        Ok(NavigationSession {
            route,
            steps,
            step_index: 0,
            destination,
            off_route: false,
            episode_open: false,
            on_route_streak: 0,
            paused,
            announcer,
            pending_ticket: None,
            distance_to_maneuver: None,
            bearing_to_maneuver: None,
            remaining: initial,
            estimated_arrival: None,
        })
    }

    fn arrive(&mut self, at: Timestamp) -> Vec<Event> {
        if let Some(session) = self.session.take() {
            log::info!("Arrived after {} steps", session.steps.len());
            self.last_status = Some(NavigationStatus {
                state: NavState::Arrived,
                step_index: session.steps.len(),
                step_count: session.steps.len(),
                current_instruction: None,
                distance_to_next_maneuver: None,
                bearing_to_maneuver: None,
                remaining_distance: 0.0,
                remaining_duration: 0.0,
                estimated_arrival: Some(at),
                is_off_route: false,
                is_paused: false,
                progress_fraction: 1.0,
            });
        }
        self.generation += 1;
        self.state = NavState::Arrived;

        vec![
            Event::Prompt(Prompt {
                kind: PromptKind::Arrival,
                text: self.config.prompts.arrival.clone(),
            }),
            Event::Arrived,
        ]
    }

    fn abort(&mut self, err: NavError) -> NavError {
        log::error!("Navigation aborted: {err}");
        self.last_status = self.status();
        if let Some(status) = self.last_status.as_mut() {
            status.state = NavState::Stopped;
        }
        self.session = None;
        self.generation += 1;
        self.state = NavState::Stopped;
        err
    }
}

fn eta(now: Timestamp, remaining_secs: f64) -> Option<Timestamp> {
    let duration = SignedDuration::try_from_secs_f64(remaining_secs).ok()?;
    now.checked_add(duration).ok()
}
