//! GPX import.
//!
//! Wraps the `gpx` crate so that a planned route or a recorded track
//! from a GPX 1.1 file can be followed like a route from a directions
//! service. Routes (`<rte>`) are taken as-is; tracks (`<trk>`) are
//! flattened across segments and simplified first.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::instructions::route_from_points;
use crate::route::Route;
use crate::simplify::rdp_simplify;

/// How GPX points are turned into a navigable route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GpxImportOptions {
    /// Assumed travel speed for step durations (m/s, default: 13.9)
    pub speed_mps: f64,
    /// RDP tolerance applied to tracks (meters, default: 10)
    pub simplify_tolerance_m: f64,
}

impl Default for GpxImportOptions {
    fn default() -> Self {
        Self {
            speed_mps: 13.9,
            simplify_tolerance_m: 10.0,
        }
    }
}

/// Parse GPX from any reader and build a route from its first `<rte>`,
/// falling back to its first `<trk>`.
pub fn route_from_gpx<R: Read>(reader: R, options: &GpxImportOptions) -> Result<Route> {
    let points = read_points(reader, options)?;
    log::debug!("GPX import: {} points after simplification", points.len());
    route_from_points(&points, options.speed_mps)
}

/// Parse GPX from a byte slice. Convenience wrapper for JNI.
pub fn route_from_gpx_bytes(data: &[u8], options: &GpxImportOptions) -> Result<Route> {
    route_from_gpx(data, options)
}

fn read_points<R: Read>(reader: R, options: &GpxImportOptions) -> Result<Vec<Coordinate>> {
    let gpx = gpx::read(reader).map_err(|e| NavError::Gpx(e.to_string()))?;

    if let Some(route) = gpx.routes.first() {
        return Ok(route
            .points
            .iter()
            .map(|wp| Coordinate::new(wp.point().y(), wp.point().x()))
            .collect());
    }

    if let Some(track) = gpx.tracks.first() {
        let points: Vec<Coordinate> = track
            .segments
            .iter()
            .flat_map(|seg| seg.points.iter())
            .map(|wp| Coordinate::new(wp.point().y(), wp.point().x()))
            .collect();
        return Ok(rdp_simplify(&points, options.simplify_tolerance_m));
    }

    Err(NavError::InvalidRoute(
        "GPX file has no route or track".to_string(),
    ))
}
