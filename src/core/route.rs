use crate::core::point::{is_valid_latitude, is_valid_longitude, GeoPoint};
use crate::error::{RouteError, RouteResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ROUTE_NAME: &str = "Auto Route";
pub const DEFAULT_SPEED_MPS: f64 = 5.0;

/// A route to simulate
///
/// Treated as immutable once built; the controller tracks whether it is
/// running and hands out a copy with `active` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Explicit intermediate points; empty means "ask the routing service"
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
    #[serde(default)]
    pub repeating: bool,
    pub speed_mps: f64,
    /// Time limit in milliseconds, 0 = unbounded
    #[serde(default)]
    pub duration_millis: i64,
    #[serde(default)]
    pub active: bool,
}

impl Route {
    pub fn builder(start: GeoPoint, end: GeoPoint) -> RouteBuilder {
        RouteBuilder::new(start, end)
    }

    /// Check coordinates and speed
    pub fn validate(&self) -> RouteResult<()> {
        check_point("start", &self.start)?;
        check_point("end", &self.end)?;
        for waypoint in &self.waypoints {
            check_point("waypoint", waypoint)?;
        }

        if !self.speed_mps.is_finite() || self.speed_mps <= 0.0 {
            return Err(RouteError::InvalidSpeed(self.speed_mps));
        }

        Ok(())
    }

    pub fn has_time_limit(&self) -> bool {
        self.duration_millis > 0
    }
}

fn check_point(which: &'static str, point: &GeoPoint) -> RouteResult<()> {
    if !is_valid_latitude(point.latitude) {
        return Err(RouteError::InvalidLatitude {
            which,
            value: point.latitude,
        });
    }
    if !is_valid_longitude(point.longitude) {
        return Err(RouteError::InvalidLongitude {
            which,
            value: point.longitude,
        });
    }
    Ok(())
}

/// Builder for [`Route`] with the defaults used by interactive callers
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    id: Option<i64>,
    name: String,
    start: GeoPoint,
    end: GeoPoint,
    waypoints: Vec<GeoPoint>,
    repeating: bool,
    speed_mps: f64,
    duration_millis: i64,
}

impl RouteBuilder {
    /// Start and end keep their coordinates; empty labels become "Start"/"End"
    pub fn new(start: GeoPoint, end: GeoPoint) -> Self {
        let start = if start.label.is_empty() {
            start.with_label("Start")
        } else {
            start
        };
        let end = if end.label.is_empty() {
            end.with_label("End")
        } else {
            end
        };

        Self {
            id: None,
            name: DEFAULT_ROUTE_NAME.to_string(),
            start,
            end,
            waypoints: Vec::new(),
            repeating: false,
            speed_mps: DEFAULT_SPEED_MPS,
            duration_millis: 0,
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Blank names fall back to the default
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.name = if trimmed.is_empty() {
            DEFAULT_ROUTE_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    pub fn waypoints(mut self, waypoints: Vec<GeoPoint>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn repeating(mut self, repeating: bool) -> Self {
        self.repeating = repeating;
        self
    }

    pub fn speed_mps(mut self, speed: f64) -> Self {
        self.speed_mps = speed;
        self
    }

    pub fn speed_preset(self, preset: SpeedPreset) -> Self {
        self.speed_mps(preset.speed_mps())
    }

    pub fn duration_millis(mut self, millis: i64) -> Self {
        self.duration_millis = millis.max(0);
        self
    }

    /// Duration entered as minutes and seconds
    pub fn duration_min_sec(self, minutes: u32, seconds: u32) -> Self {
        let total = (i64::from(minutes) * 60 + i64::from(seconds)) * 1000;
        self.duration_millis(total)
    }

    pub fn build(self) -> RouteResult<Route> {
        let route = Route {
            id: self.id.unwrap_or_else(|| Utc::now().timestamp_millis()),
            name: self.name,
            start: self.start,
            end: self.end,
            waypoints: self.waypoints,
            repeating: self.repeating,
            speed_mps: self.speed_mps,
            duration_millis: self.duration_millis,
            active: false,
        };
        route.validate()?;
        Ok(route)
    }
}

/// Common travel speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedPreset {
    Walking,
    Cycling,
    DrivingSlow,
    DrivingNormal,
    DrivingFast,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 5] = [
        SpeedPreset::Walking,
        SpeedPreset::Cycling,
        SpeedPreset::DrivingSlow,
        SpeedPreset::DrivingNormal,
        SpeedPreset::DrivingFast,
    ];

    pub fn speed_mps(self) -> f64 {
        match self {
            SpeedPreset::Walking => 1.4,
            SpeedPreset::Cycling => 5.6,
            SpeedPreset::DrivingSlow => 13.9,
            SpeedPreset::DrivingNormal => 22.2,
            SpeedPreset::DrivingFast => 33.3,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SpeedPreset::Walking => "Walking (5 km/h)",
            SpeedPreset::Cycling => "Cycling (20 km/h)",
            SpeedPreset::DrivingSlow => "Driving Slow (50 km/h)",
            SpeedPreset::DrivingNormal => "Driving Normal (80 km/h)",
            SpeedPreset::DrivingFast => "Driving Fast (120 km/h)",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            SpeedPreset::Walking => "walking",
            SpeedPreset::Cycling => "cycling",
            SpeedPreset::DrivingSlow => "driving-slow",
            SpeedPreset::DrivingNormal => "driving-normal",
            SpeedPreset::DrivingFast => "driving-fast",
        }
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SpeedPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|preset| preset.short_name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|p| p.short_name()).collect();
                format!("unknown speed preset '{}', expected one of: {}", s, names.join(", "))
            })
    }
}
