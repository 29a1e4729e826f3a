//! OSRM wire protocol: blocking HTTP client for the match and route services.
//!
//! Both calls share the same failure contract: a request that cannot be
//! completed (connection refused, timeout) is a
//! [`Connectivity`](crate::TraceCleanError::Connectivity) error, while a
//! non-200 response or a body that does not carry the expected shape is the
//! "no match"/"no route" sentinel `Ok(None)` — callers keep the raw
//! coordinates or skip the segment.

use std::time::Duration;

use geo::LineString;
use serde::Deserialize;

use crate::error::{Result, TraceCleanError};
use crate::geo_utils::haversine_distance;

/// Fixed timeout for every OSRM request.
const OSRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful map-match call.
#[derive(Debug, Clone)]
pub struct OsrmMatch {
    /// Snapped `(lat, lng)` per input coordinate; the raw coordinate is used
    /// wherever the service reported no tracepoint
    pub matched: Vec<(f64, f64)>,
    /// Decoded `(lat, lng)` shape of the matched route; may hold more points
    /// than the input
    pub route_geometry: Vec<(f64, f64)>,
    /// Sum of point-wise snap distances in meters
    pub total_snap_distance: f64,
}

/// Result of a successful route call.
#[derive(Debug, Clone)]
pub struct OsrmRoute {
    /// Decoded `(lat, lng)` route shape, endpoints included
    pub geometry: Vec<(f64, f64)>,
    /// Total route distance in meters
    pub distance: f64,
    /// Estimated travel time in seconds
    pub duration: f64,
}

#[derive(Deserialize)]
struct MatchResponse {
    #[serde(default)]
    matchings: Vec<Matching>,
    #[serde(default)]
    tracepoints: Vec<Option<Tracepoint>>,
}

#[derive(Deserialize)]
struct Matching {
    geometry: GeoJsonGeometry,
}

#[derive(Deserialize)]
struct GeoJsonGeometry {
    /// GeoJSON `(lon, lat)` pairs
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct Tracepoint {
    /// `(lon, lat)`
    location: [f64; 2],
}

#[derive(Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Deserialize)]
struct Route {
    /// Encoded polyline, precision 5
    geometry: String,
    distance: f64,
    duration: f64,
}

/// Build the blocking client used for one operation's OSRM calls.
pub fn build_client(service_url: &str) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(OSRM_TIMEOUT)
        .build()
        .map_err(|source| TraceCleanError::Connectivity {
            url: service_url.to_string(),
            source,
        })
}

/// `lon,lat;lon,lat;...` path segment for OSRM request URLs.
fn coordinate_path(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lat, lng)| format!("{lng},{lat}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Request URL for the match service.
pub fn match_request_url(osrm_url: &str, coords: &[(f64, f64)], radius: f64) -> String {
    let radii = vec![radius.to_string(); coords.len()].join(";");
    format!(
        "{osrm_url}{}?overview=full&radiuses={radii}&generate_hints=false\
         &skip_waypoints=false&gaps=ignore&geometries=geojson&annotations=true",
        coordinate_path(coords)
    )
}

/// Request URL for the route service.
pub fn route_request_url(osrm_url: &str, coords: &[(f64, f64)]) -> String {
    format!(
        "{osrm_url}{}?overview=full&annotations=speed",
        coordinate_path(coords)
    )
}

/// Map-match a sequence of coordinates against the road network.
///
/// Returns `Ok(None)` when the service reports no match (non-200) or the
/// body cannot be interpreted; unmatched individual tracepoints fall back to
/// their raw coordinate instead of failing the batch.
pub fn get_osrm_match(
    client: &reqwest::blocking::Client,
    osrm_url: &str,
    coords: &[(f64, f64)],
    radius: f64,
) -> Result<Option<OsrmMatch>> {
    let url = match_request_url(osrm_url, coords, radius);
    let response = client
        .get(&url)
        .send()
        .map_err(|source| TraceCleanError::Connectivity {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Ok(None);
    }

    let body = match response.text() {
        Ok(body) => body,
        Err(_) => return Ok(None),
    };
    Ok(match_from_json(&body, coords))
}

/// Interpret a match-service response body.
///
/// Split from the HTTP call so the parsing and snap-distance logic is
/// testable against fixture bodies.
pub fn match_from_json(body: &str, coords: &[(f64, f64)]) -> Option<OsrmMatch> {
    let response: MatchResponse = serde_json::from_str(body).ok()?;
    let matching = response.matchings.first()?;

    let route_geometry: Vec<(f64, f64)> = matching
        .geometry
        .coordinates
        .iter()
        .map(|&[lng, lat]| (lat, lng))
        .collect();

    let mut matched = Vec::with_capacity(coords.len());
    for (i, &raw) in coords.iter().enumerate() {
        let snapped = response
            .tracepoints
            .get(i)
            .and_then(|tp| tp.as_ref())
            .map(|tp| (tp.location[1], tp.location[0]));
        matched.push(snapped.unwrap_or(raw));
    }

    let total_snap_distance = matched
        .iter()
        .zip(coords)
        .map(|(m, r)| haversine_distance(m.0, m.1, r.0, r.1))
        .sum();

    Some(OsrmMatch {
        matched,
        route_geometry,
        total_snap_distance,
    })
}

/// Fetch a driving route through the given coordinates, in order.
///
/// Returns `Ok(None)` when the service reports no route (non-200), the body
/// cannot be interpreted, or the reported distance is not finite.
pub fn get_osrm_route(
    client: &reqwest::blocking::Client,
    osrm_url: &str,
    coords: &[(f64, f64)],
) -> Result<Option<OsrmRoute>> {
    let url = route_request_url(osrm_url, coords);
    let response = client
        .get(&url)
        .send()
        .map_err(|source| TraceCleanError::Connectivity {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Ok(None);
    }

    let body = match response.text() {
        Ok(body) => body,
        Err(_) => return Ok(None),
    };
    Ok(route_from_json(&body))
}

/// Interpret a route-service response body.
pub fn route_from_json(body: &str) -> Option<OsrmRoute> {
    let response: RouteResponse = serde_json::from_str(body).ok()?;
    let route = response.routes.first()?;

    if !route.distance.is_finite() {
        return None;
    }

    let line: LineString<f64> = polyline::decode_polyline(&route.geometry, 5).ok()?;
    let geometry = line.coords().map(|c| (c.y, c.x)).collect();

    Some(OsrmRoute {
        geometry,
        distance: route.distance,
        duration: route.duration,
    })
}
