use serde::{Deserialize, Serialize};
use std::fmt;

/// Label given to every interpolated position
pub const CURRENT_POSITION_LABEL: &str = "Current Position";

/// A labelled WGS-84 coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, [-90, 90]
    pub latitude: f64,

    /// Longitude in degrees, [-180, 180]
    pub longitude: f64,

    /// Display label (may be empty)
    #[serde(default)]
    pub label: String,
}

impl GeoPoint {
    /// Create a new point with a label
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            label: label.into(),
        }
    }

    /// Create a new point without a label
    pub fn unlabeled(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, "")
    }

    /// Same coordinates, different label
    pub fn with_label(&self, label: impl Into<String>) -> Self {
        Self::new(self.latitude, self.longitude, label)
    }

    /// Strip the label
    pub fn to_waypoint(&self) -> Waypoint {
        Waypoint::new(self.latitude, self.longitude)
    }

    /// Check that both components are finite and inside their ranges
    pub fn is_valid(&self) -> bool {
        is_valid_latitude(self.latitude) && is_valid_longitude(self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A raw routing-path coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Attach a label
    pub fn to_point(self, label: impl Into<String>) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude, label)
    }
}

impl From<&GeoPoint> for Waypoint {
    fn from(point: &GeoPoint) -> Self {
        point.to_waypoint()
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    latitude.is_finite() && (-90.0..=90.0).contains(&latitude)
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    longitude.is_finite() && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_ranges() {
        assert!(GeoPoint::unlabeled(90.0, -180.0).is_valid());
        assert!(GeoPoint::unlabeled(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::unlabeled(90.5, 0.0).is_valid());
        assert!(!GeoPoint::unlabeled(0.0, -180.1).is_valid());
        assert!(!GeoPoint::unlabeled(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_waypoint_conversion_keeps_coordinates() {
        let point = GeoPoint::new(48.8566, 2.3522, "Paris");
        let waypoint = point.to_waypoint();
        assert_eq!(waypoint, Waypoint::new(48.8566, 2.3522));
        assert_eq!(waypoint.to_point("Paris"), point);
    }

    #[test]
    fn test_display_six_decimals() {
        let point = GeoPoint::new(1.0, -2.5, "x");
        assert_eq!(point.to_string(), "1.000000, -2.500000");
    }
}
