//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to a `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! The Kotlin side owns a `Long` handle to a [`RouteFollower`] and drives
//! it directly: it fetches routes itself when a `recalculate` event comes
//! back and reports the outcome with the event's ticket. Every stateful
//! call answers with a JSON object `{ "events": [...], "status": {...},
//! "error": "..." }`.

use jni::objects::{JClass, JString};
use jni::sys::{jdouble, jlong, jstring};
use jni::JNIEnv;
use jiff::Timestamp;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::follower::{Event, NavigationStatus, PositionSample, RouteFollower};
use crate::geo::Coordinate;
use crate::route::Route;

type Handle = Mutex<RouteFollower>;

#[derive(Serialize, Default)]
struct Reply {
    events: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<NavigationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Reply {
    fn from_result(follower: &RouteFollower, result: Result<Vec<Event>>) -> Self {
        let (events, error) = match result {
            Ok(events) => (events, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        Self {
            events,
            status: follower.status(),
            error,
        }
    }

    fn error(message: String) -> Self {
        Self {
            error: Some(message),
            ..Default::default()
        }
    }
}

fn init_logging() {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("RouteGuide"),
    );
}

/// Borrow the follower behind a handle from `nativeCreate`.
///
/// # Safety
///
/// `handle` must come from `nativeCreate` and not yet be passed to
/// `nativeDestroy`.
unsafe fn follower<'a>(handle: jlong) -> Option<&'a Handle> {
    (handle as *const Handle).as_ref()
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Result<String> {
    env.get_string(value)
        .map(String::from)
        .map_err(|e| NavError::Bridge(format!("bad Java string: {e}")))
}

fn to_jstring(env: &JNIEnv, reply: &Reply) -> jstring {
    let json = match serde_json::to_string(reply) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize bridge reply: {e}");
            format!(r#"{{"events":[],"error":"{}"}}"#, e.to_string().replace('"', "'"))
        }
    };
    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            log::error!("Failed to create Java string: {e}");
            std::ptr::null_mut()
        }
    }
}

fn with_follower<F>(env: &JNIEnv, handle: jlong, f: F) -> jstring
where
    F: FnOnce(&mut RouteFollower) -> Result<Vec<Event>>,
{
    // SAFETY: Kotlin only passes handles it got from nativeCreate and
    // clears them after nativeDestroy.
    let reply = match unsafe { follower(handle) } {
        Some(cell) => {
            let mut follower = cell.lock();
            let result = f(&mut follower);
            Reply::from_result(&follower, result)
        }
        None => Reply::error("navigation handle is null".to_string()),
    };
    to_jstring(env, &reply)
}

/// Returns the rust-core library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_version(
    env: JNIEnv,
    _class: JClass,
) -> jstring {
    match env.new_string(crate::VERSION) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Maps to: RustBridge.nativeCreate(configToml: String) -> Long
///
/// An empty string selects the default configuration. Returns 0 when the
/// configuration does not parse.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeCreate(
    mut env: JNIEnv,
    _class: JClass,
    config_toml: JString,
) -> jlong {
    init_logging();
    let config = read_string(&mut env, &config_toml).and_then(|toml| {
        if toml.trim().is_empty() {
            Ok(NavConfig::default())
        } else {
            NavConfig::from_toml_str(&toml)
        }
    });

    match config {
        Ok(config) => Box::into_raw(Box::new(Mutex::new(RouteFollower::new(config)))) as jlong,
        Err(e) => {
            log::error!("nativeCreate: {e}");
            0
        }
    }
}

/// Maps to: RustBridge.nativeDestroy(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeDestroy(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle != 0 {
        // SAFETY: the handle was produced by Box::into_raw in nativeCreate
        // and Kotlin never uses it again after this call.
        drop(unsafe { Box::from_raw(handle as *mut Handle) });
    }
}

/// Maps to: RustBridge.nativeStart(handle: Long, routeJson: String) -> String
///
/// Accepts a bare route object or a directions response with `routes`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeStart(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    route_json: JString,
) -> jstring {
    let route = read_string(&mut env, &route_json).and_then(|json| parse_route(&json));
    with_follower(&env, handle, |follower| follower.start(route?))
}

/// Maps to: RustBridge.nativeUpdate(handle, lat, lon, speed, bearing, timestampMs) -> String
#[allow(clippy::too_many_arguments)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeUpdate(
    env: JNIEnv,
    _class: JClass,
    handle: jlong,
    lat: jdouble,
    lon: jdouble,
    speed: jdouble,
    bearing: jdouble,
    timestamp_ms: jlong,
) -> jstring {
    with_follower(&env, handle, |follower| {
        let timestamp = Timestamp::from_millisecond(timestamp_ms)
            .map_err(|e| NavError::Bridge(format!("bad timestamp: {e}")))?;
        follower.update(&PositionSample {
            coordinate: Coordinate::new(lat, lon),
            speed_mps: speed,
            bearing_deg: bearing,
            timestamp,
        })
    })
}

/// Maps to: RustBridge.nativeRecalculated(handle, ticket, routeJson) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeRecalculated(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    ticket: jlong,
    route_json: JString,
) -> jstring {
    let route = read_string(&mut env, &route_json).and_then(|json| parse_route(&json));
    with_follower(&env, handle, |follower| {
        Ok(follower.apply_recalculation(ticket as u64, route))
    })
}

/// Maps to: RustBridge.nativeRecalculationFailed(handle, ticket, reason) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeRecalculationFailed(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    ticket: jlong,
    reason: JString,
) -> jstring {
    let reason = read_string(&mut env, &reason).unwrap_or_default();
    with_follower(&env, handle, |follower| {
        Ok(follower.apply_recalculation(ticket as u64, Err(NavError::RecalculationFailed(reason))))
    })
}

/// Maps to: RustBridge.nativePause(handle: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativePause(
    env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    with_follower(&env, handle, |follower| {
        follower.pause();
        Ok(Vec::new())
    })
}

/// Maps to: RustBridge.nativeResume(handle: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeResume(
    env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    with_follower(&env, handle, |follower| {
        follower.resume();
        Ok(Vec::new())
    })
}

/// Maps to: RustBridge.nativeStop(handle: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_routeguide_app_RustBridge_nativeStop(
    env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    with_follower(&env, handle, |follower| {
        follower.stop();
        Ok(Vec::new())
    })
}

/// Directions responses carry a `routes` array; bare routes do not.
fn parse_route(json: &str) -> Result<Route> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("routes").is_some() {
        Route::from_directions_json(json)
    } else {
        Route::from_json(json)
    }
}
