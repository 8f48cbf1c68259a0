//! Turn-by-turn route following.
//!
//! [`follower::RouteFollower`] is the sans-IO core: feed it position
//! samples, get back prompts and recalculation requests.
//! [`navigator::Navigator`] wraps it for hosts with a routing service and
//! a speech engine, and [`android_jni`] exposes it to the Android app.

pub mod android_jni;
pub mod announce;
pub mod config;
pub mod error;
pub mod follower;
pub mod geo;
pub mod gpx;
pub mod instructions;
pub mod navigator;
pub mod progress;
pub mod provider;
pub mod route;
pub mod simplify;

pub use config::NavConfig;
pub use error::{NavError, Result};
pub use follower::{Event, NavState, NavigationStatus, PositionSample, Prompt, PromptKind, RouteFollower};
pub use geo::Coordinate;
pub use navigator::Navigator;
pub use provider::{RoutingProvider, SpeechSink, TrackRejoinProvider};
pub use route::Route;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
