use async_trait::async_trait;
use crate::core::geo::path_length;
use crate::core::Waypoint;
use crate::error::RoutingResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSource {
    /// Returned by the external routing lookup
    Lookup,
    /// Straight line substituted after a failed lookup
    Fallback,
    /// Built from the route's own waypoint list
    Explicit,
}

/// An ordered path from start to end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    /// At least two entries
    pub waypoints: Vec<Waypoint>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub source: PathSource,
}

impl RoutePath {
    /// Build a path whose distance is the sum of its segments and whose
    /// duration assumes constant `speed_mps`.
    pub fn from_waypoints(waypoints: Vec<Waypoint>, speed_mps: f64, source: PathSource) -> Self {
        let total_distance_m = path_length(&waypoints);
        Self {
            waypoints,
            total_distance_m,
            total_duration_s: total_distance_m / speed_mps,
            source,
        }
    }

    /// More than two points means the path follows roads
    pub fn is_road_following(&self) -> bool {
        self.waypoints.len() > 2
    }
}

/// Routing mode hint derived from speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingProfile {
    Walking,
    Cycling,
    Driving,
}

impl RoutingProfile {
    /// Up to 2 m/s walks, up to 8 m/s cycles, anything faster drives
    pub fn for_speed(speed_mps: f64) -> Self {
        if speed_mps <= 2.0 {
            RoutingProfile::Walking
        } else if speed_mps <= 8.0 {
            RoutingProfile::Cycling
        } else {
            RoutingProfile::Driving
        }
    }

    /// Profile identifier understood by the directions service
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingProfile::Walking => "foot-walking",
            RoutingProfile::Cycling => "cycling-regular",
            RoutingProfile::Driving => "driving-car",
        }
    }
}

impl fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A start/end lookup request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub start: Waypoint,
    pub end: Waypoint,
    pub profile: RoutingProfile,
}

/// External path lookup
///
/// Implementations:
/// - OpenRouteService-compatible HTTP directions API
/// - Mock backend for tests and offline runs
#[async_trait]
pub trait RoutingBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Look up a path between the request's endpoints
    async fn route(&self, request: &RouteRequest) -> RoutingResult<RoutePath>;
}
