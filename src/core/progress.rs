use crate::core::point::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavigationState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationState::Stopped => "stopped",
            NavigationState::Running => "running",
            NavigationState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// One simulation tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub position: GeoPoint,

    /// [0, 100]
    pub progress_percent: f32,

    pub elapsed_millis: i64,

    /// Clamped at zero
    pub remaining_millis: i64,

    /// Exact step fraction this tick was computed from
    #[serde(skip)]
    pub(crate) fraction: f64,
}

impl SimulationProgress {
    pub fn new(position: GeoPoint, fraction: f64, elapsed_millis: i64, remaining_millis: i64) -> Self {
        Self {
            position,
            progress_percent: (fraction * 100.0) as f32,
            elapsed_millis: elapsed_millis.max(0),
            remaining_millis: remaining_millis.max(0),
            fraction,
        }
    }

    /// Progress as a fraction in [0, 1]
    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl fmt::Display for SimulationProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}% at {} (elapsed {}, remaining {})",
            self.progress_percent as u32,
            self.position,
            format_clock(self.elapsed_millis),
            format_clock(self.remaining_millis)
        )
    }
}

/// Format milliseconds as `MM:SS`
pub fn format_clock(millis: i64) -> String {
    let total_seconds = millis.max(0) / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
