use crate::config::Settings;
use crate::core::geo::haversine_distance;
use crate::core::{GeoPoint, Route, Waypoint};
use crate::error::{RoutingError, RoutingResult};
use crate::routing::backend::{PathSource, RoutePath, RouteRequest, RoutingBackend, RoutingProfile};
use crate::routing::openroute::OpenRouteServiceBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reference speed for fallback durations, m/s (~50 km/h)
pub const FALLBACK_SPEED_MPS: f64 = 13.89;

/// Two-point path straight from `start` to `end`
pub fn straight_line_path(start: &GeoPoint, end: &GeoPoint, reference_speed_mps: f64) -> RoutePath {
    let total_distance_m = haversine_distance(start, end);
    RoutePath {
        waypoints: vec![start.to_waypoint(), end.to_waypoint()],
        total_distance_m,
        total_duration_s: total_distance_m / reference_speed_mps,
        source: PathSource::Fallback,
    }
}

/// Resolves start/end pairs into paths.
///
/// Asks the configured backend first, bounded by `timeout`. Every failure
/// (transport, status, parse, empty result, timeout, no backend) is logged
/// and replaced by [`straight_line_path`]; `resolve` never fails.
#[derive(Clone)]
pub struct RoutingProvider {
    backend: Option<Arc<dyn RoutingBackend>>,
    timeout: Duration,
    fallback_speed_mps: f64,
}

impl RoutingProvider {
    pub fn new(backend: Arc<dyn RoutingBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
            fallback_speed_mps: FALLBACK_SPEED_MPS,
        }
    }

    /// Provider that always uses the straight-line fallback
    pub fn offline() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
            fallback_speed_mps: FALLBACK_SPEED_MPS,
        }
    }

    /// Build the HTTP backend described by `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        let fallback_speed_mps = settings.simulation.fallback_speed_mps;

        if !settings.routing.enabled {
            info!("Routing lookup disabled; using straight-line paths");
            return Self::offline().with_fallback_speed(fallback_speed_mps);
        }

        match OpenRouteServiceBackend::new(&settings.routing) {
            Ok(backend) => Self::new(Arc::new(backend), settings.routing.timeout())
                .with_fallback_speed(fallback_speed_mps),
            Err(e) => {
                warn!("Failed to create routing client, using straight-line paths: {}", e);
                Self::offline().with_fallback_speed(fallback_speed_mps)
            }
        }
    }

    pub fn with_fallback_speed(mut self, speed_mps: f64) -> Self {
        if speed_mps.is_finite() && speed_mps > 0.0 {
            self.fallback_speed_mps = speed_mps;
        }
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("offline")
    }

    /// Resolve a path between two points, falling back to a straight line
    pub async fn resolve(&self, start: &GeoPoint, end: &GeoPoint, speed_mps: f64) -> RoutePath {
        let request = RouteRequest {
            start: start.to_waypoint(),
            end: end.to_waypoint(),
            profile: RoutingProfile::for_speed(speed_mps),
        };

        match self.lookup(&request).await {
            Ok(path) => {
                info!(
                    "Routed via {} ({}): {} points, {:.0} m, {:.0} s",
                    self.backend_name(),
                    request.profile,
                    path.waypoints.len(),
                    path.total_distance_m,
                    path.total_duration_s
                );
                path
            }
            Err(e) => {
                warn!("Routing lookup failed ({}), using straight line", e);
                straight_line_path(start, end, self.fallback_speed_mps)
            }
        }
    }

    /// Path for a route: its own waypoints when it has any, otherwise a lookup
    pub async fn resolve_route(&self, route: &Route) -> RoutePath {
        if route.waypoints.is_empty() {
            return self.resolve(&route.start, &route.end, route.speed_mps).await;
        }

        let waypoints: Vec<Waypoint> = std::iter::once(&route.start)
            .chain(route.waypoints.iter())
            .chain(std::iter::once(&route.end))
            .map(Waypoint::from)
            .collect();

        debug!("Route '{}' has {} explicit waypoints", route.name, route.waypoints.len());
        RoutePath::from_waypoints(waypoints, route.speed_mps, PathSource::Explicit)
    }

    /// Ask the backend, bounded by the timeout, and sanity-check the answer
    pub async fn lookup(&self, request: &RouteRequest) -> RoutingResult<RoutePath> {
        let backend = self.backend.as_ref().ok_or(RoutingError::Disabled)?;

        debug!(
            "Requesting {} route from {} to {} via {}",
            request.profile,
            request.start,
            request.end,
            backend.name()
        );

        let path = tokio::time::timeout(self.timeout, backend.route(request))
            .await
            .map_err(|_| RoutingError::Timeout(self.timeout))??;

        if path.waypoints.len() < 2 || !path.total_distance_m.is_finite() || path.total_distance_m < 0.0 {
            return Err(RoutingError::Empty);
        }

        Ok(path)
    }
}
