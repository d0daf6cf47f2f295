//! OpenRouteService directions client.
//!
//! `GET {base_url}/{profile}?api_key=..&start=lon,lat&end=lon,lat` returns a
//! GeoJSON feature collection. The first feature's line string becomes the
//! path and its `summary` supplies distance and duration.

use async_trait::async_trait;
use crate::config::RoutingSettings;
use crate::core::Waypoint;
use crate::error::{RoutingError, RoutingResult};
use crate::routing::backend::{PathSource, RoutePath, RouteRequest, RoutingBackend};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

/// Longest error body kept in a [`RoutingError::Status`]
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lon, lat]` or `[lon, lat, elevation]`
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

/// HTTP routing backend for OpenRouteService-compatible endpoints
pub struct OpenRouteServiceBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenRouteServiceBackend {
    pub fn new(settings: &RoutingSettings) -> RoutingResult<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    fn url_for(&self, request: &RouteRequest) -> String {
        format!("{}/{}", self.base_url, request.profile.as_str())
    }
}

/// `lon,lat`, the order the service expects
fn lon_lat(point: Waypoint) -> String {
    format!("{},{}", point.longitude, point.latitude)
}

/// Parse a directions response body
pub(crate) fn parse_directions(body: &str) -> RoutingResult<RoutePath> {
    let collection: FeatureCollection = serde_json::from_str(body)?;
    let feature = collection.features.into_iter().next().ok_or(RoutingError::Empty)?;

    let waypoints: Vec<Waypoint> = feature
        .geometry
        .coordinates
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Waypoint::new(c[1], c[0]))
        .collect();

    if waypoints.len() < 2 {
        return Err(RoutingError::Empty);
    }

    Ok(RoutePath {
        waypoints,
        total_distance_m: feature.properties.summary.distance,
        total_duration_s: feature.properties.summary.duration,
        source: PathSource::Lookup,
    })
}

#[async_trait]
impl RoutingBackend for OpenRouteServiceBackend {
    fn name(&self) -> &str {
        "openrouteservice"
    }

    async fn route(&self, request: &RouteRequest) -> RoutingResult<RoutePath> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RoutingError::MissingApiKey("openrouteservice"))?;

        let url = self.url_for(request);
        debug!("Making routing request to: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/geo+json, application/json")
            .query(&[
                ("api_key", api_key.to_string()),
                ("start", lon_lat(request.start)),
                ("end", lon_lat(request.end)),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Routing response: {}, body length: {}", status, body.len());

        if !status.is_success() {
            error!("Routing failed: {}", status);
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(RoutingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let path = parse_directions(&body)?;
        debug!("Parsed route with {} waypoints", path.waypoints.len());
        Ok(path)
    }
}
