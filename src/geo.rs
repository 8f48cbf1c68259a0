//! Geometry utilities.
//!
//! Great-circle distance, initial bearing and distance from a position
//! to a polyline. All coordinates use WGS84 (lat/lon in degrees) on a
//! spherical Earth.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Earth mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate.
///
/// Serialized as a GeoJSON `[lon, lat]` pair, which is the order used by
/// directions services.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that the coordinate is finite and within WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lon, c.lat]
    }
}

/// How the distance from a position to a polyline is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffRouteMetric {
    /// Per segment, the distance to the nearer endpoint. Reads large in
    /// the middle of long segments even when the position is on the line.
    NearestVertex,
    /// Per segment, the distance to the closest point on the segment.
    #[default]
    Projection,
}

/// Where a position lands on a polyline.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionResult {
    pub point: Coordinate,
    /// The point lies between `track[segment_index]` and `track[segment_index + 1]`.
    pub segment_index: usize,
    /// Meters from the position to `point`.
    pub distance_m: f64,
    /// Meters travelled along the polyline before reaching `point`.
    pub distance_along_m: f64,
}

/// Meters per degree of latitude on the spherical Earth.
const M_PER_DEG_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Flat metric frame anchored at one coordinate.
///
/// Longitude is scaled by the cosine of a reference latitude. Good to a
/// few centimeters over the length of a street segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalFrame {
    origin: Coordinate,
    m_per_deg_lon: f64,
}

impl LocalFrame {
    /// Frame anchored at `a`, scaled for the span from `a` to `b`.
    pub(crate) fn spanning(a: &Coordinate, b: &Coordinate) -> Self {
        let mid_lat = (a.lat + b.lat) / 2.0;
        Self {
            origin: *a,
            m_per_deg_lon: M_PER_DEG_LAT * mid_lat.to_radians().cos(),
        }
    }

    /// East and north offsets from the origin, in meters.
    pub(crate) fn offset(&self, c: &Coordinate) -> (f64, f64) {
        (
            (c.lon - self.origin.lon) * self.m_per_deg_lon,
            (c.lat - self.origin.lat) * M_PER_DEG_LAT,
        )
    }
}

/// Haversine distance between two coordinates in meters.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `from` to `to` in degrees [0, 360).
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees();
    let normalized = (bearing + 360.0) % 360.0;
    // -0.0 and tiny negatives round up to 360.0 after the shift
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Total length of a polyline in meters.
pub fn track_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| distance(&w[0], &w[1]))
        .sum()
}

/// Minimum distance from `point` to any segment of `polyline`.
///
/// A single-coordinate polyline yields the direct distance to it; an empty
/// polyline is an error.
pub fn distance_to_polyline(point: &Coordinate, polyline: &[Coordinate]) -> Result<f64> {
    distance_to_polyline_with(point, polyline, OffRouteMetric::default())
}

/// Minimum distance from `point` to `polyline` using the given metric.
pub fn distance_to_polyline_with(
    point: &Coordinate,
    polyline: &[Coordinate],
    metric: OffRouteMetric,
) -> Result<f64> {
    match polyline {
        [] => Err(NavError::InvalidGeometry("empty polyline".to_string())),
        [only] => Ok(distance(point, only)),
        _ => match metric {
            // Every coordinate is an endpoint of some segment, so the
            // minimum over segments equals the minimum over vertices.
            OffRouteMetric::NearestVertex => Ok(polyline
                .iter()
                .map(|c| distance(point, c))
                .fold(f64::INFINITY, f64::min)),
            OffRouteMetric::Projection => project_on_track(point, polyline)
                .map(|p| p.distance_m)
                .ok_or_else(|| NavError::InvalidGeometry("empty polyline".to_string())),
        },
    }
}

/// The point of `track` closest to `position`.
///
/// Ties go to the earlier segment. `None` for fewer than 2 coordinates.
pub fn project_on_track(position: &Coordinate, track: &[Coordinate]) -> Option<ProjectionResult> {
    let mut best: Option<ProjectionResult> = None;
    let mut along = 0.0;

    for (segment_index, pair) in track.windows(2).enumerate() {
        let (start, end) = (&pair[0], &pair[1]);
        let point = interpolate(start, end, closest_fraction(position, start, end));
        let distance_m = distance(position, &point);

        if best.as_ref().map_or(true, |b| distance_m < b.distance_m) {
            best = Some(ProjectionResult {
                point,
                segment_index,
                distance_m,
                distance_along_m: along + distance(start, &point),
            });
        }
        along += distance(start, end);
    }

    best
}

/// Fraction in [0, 1] along `start`..`end` of the point nearest to `p`.
fn closest_fraction(p: &Coordinate, start: &Coordinate, end: &Coordinate) -> f64 {
    let frame = LocalFrame::spanning(start, end);
    let (ex, ey) = frame.offset(end);
    let (px, py) = frame.offset(p);

    let length_sq = ex * ex + ey * ey;
    // Sub-millimeter segment
    if length_sq < 1e-6 {
        return 0.0;
    }
    ((px * ex + py * ey) / length_sq).clamp(0.0, 1.0)
}

fn interpolate(start: &Coordinate, end: &Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lat: start.lat + t * (end.lat - start.lat),
        lon: start.lon + t * (end.lon - start.lon),
    }
}
