//! Thread-safe navigation host.
//!
//! Wraps a [`RouteFollower`] for apps where position updates arrive on a
//! background thread while start/stop come from the UI:
//! - All follower state sits behind one mutex.
//! - Prompts are delivered to the sink while that mutex is held, so no
//!   prompt can fire after [`Navigator::stop`] returns.
//! - Recalculations run on their own thread and report back through the
//!   same mutex; results for a superseded generation are dropped by the
//!   follower.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::follower::{
    Event, NavState, NavigationStatus, PositionSample, RecalculationRequest, RouteFollower,
};
use crate::geo::Coordinate;
use crate::provider::{RoutingProvider, SpeechSink};
use crate::route::Route;

/// Position samples kept for diagnostics.
pub const POSITION_HISTORY: usize = 100;

struct Shared {
    follower: Mutex<RouteFollower>,
    provider: Arc<dyn RoutingProvider>,
    sink: Arc<dyn SpeechSink>,
    history: Mutex<VecDeque<PositionSample>>,
    recalculation: Mutex<Option<JoinHandle<()>>>,
}

/// Navigation engine for one app, explicitly constructed and owned.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<Shared>,
}

impl Navigator {
    /// Fails with `Config` if the thresholds do not validate.
    pub fn new(
        config: NavConfig,
        provider: Arc<dyn RoutingProvider>,
        sink: Arc<dyn SpeechSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Shared {
                follower: Mutex::new(RouteFollower::new(config)),
                provider,
                sink,
                history: Mutex::new(VecDeque::with_capacity(POSITION_HISTORY)),
                recalculation: Mutex::new(None),
            }),
        })
    }

    /// Start navigating a route obtained elsewhere.
    pub fn start(&self, route: Route) -> Result<()> {
        let mut follower = self.inner.follower.lock();
        let events = follower.start(route)?;
        dispatch(&self.inner, &mut follower, events);
        Ok(())
    }

    /// Ask the routing provider for a route and start navigating it.
    ///
    /// Blocks on the provider; call it off the UI thread.
    pub fn navigate(&self, origin: Coordinate, destination: Coordinate) -> Result<()> {
        let route = self.inner.provider.route(&origin, &destination)?;
        self.start(route)
    }

    /// Feed one sample from the position source.
    ///
    /// An `InvalidGeometry` error means the session has been stopped.
    pub fn update(&self, sample: PositionSample) -> Result<()> {
        {
            let mut history = self.inner.history.lock();
            if history.len() == POSITION_HISTORY {
                history.pop_front();
            }
            history.push_back(sample);
        }

        let mut follower = self.inner.follower.lock();
        let events = follower.update(&sample)?;
        dispatch(&self.inner, &mut follower, events);
        Ok(())
    }

    pub fn pause(&self) {
        self.inner.follower.lock().pause();
    }

    pub fn resume(&self) {
        self.inner.follower.lock().resume();
    }

    /// Stop navigating. Safe to call at any time, including while a
    /// recalculation is in flight.
    pub fn stop(&self) {
        self.inner.follower.lock().stop();
    }

    pub fn state(&self) -> NavState {
        self.inner.follower.lock().state()
    }

    /// Observable session fields. Fails only if navigation never started.
    pub fn status(&self) -> Result<NavigationStatus> {
        self.inner
            .follower
            .lock()
            .status()
            .ok_or(NavError::SessionNotActive)
    }

    /// The most recent samples, oldest first.
    pub fn recent_positions(&self) -> Vec<PositionSample> {
        self.inner.history.lock().iter().copied().collect()
    }

    /// Wait for the in-flight recalculation, if any, to report back.
    pub fn join_recalculation(&self) {
        let handle = self.inner.recalculation.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Recalculation thread panicked");
            }
        }
    }
}

/// Speak prompts and launch recalculations. Runs with the follower locked.
fn dispatch(shared: &Arc<Shared>, follower: &mut RouteFollower, events: Vec<Event>) {
    for event in events {
        match event {
            Event::Prompt(prompt) => shared.sink.speak(&prompt),
            Event::Recalculate(request) => spawn_recalculation(shared, follower, request),
            Event::Arrived => log::info!("Destination reached"),
        }
    }
}

fn spawn_recalculation(
    shared: &Arc<Shared>,
    follower: &mut RouteFollower,
    request: RecalculationRequest,
) {
    let worker = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name("recalc".into())
        .spawn(move || {
            let result = worker.provider.route(&request.origin, &request.destination);
            let mut follower = worker.follower.lock();
            let events = follower.apply_recalculation(request.ticket, result);
            dispatch(&worker, &mut follower, events);
        });

    match spawned {
        Ok(handle) => {
            // The previous request has already reported back or been superseded
            *shared.recalculation.lock() = Some(handle);
        }
        Err(e) => {
            log::error!("Failed to spawn recalculation thread: {e}");
            let events = follower.apply_recalculation(
                request.ticket,
                Err(NavError::RecalculationFailed(e.to_string())),
            );
            dispatch(shared, follower, events);
        }
    }
}
