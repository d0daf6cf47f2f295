use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides the routing API key
pub const API_KEY_ENV: &str = "ORS_API_KEY";

/// Persistent settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub routing: RoutingSettings,
    pub simulation: SimulationSettings,
}

/// Routing lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Directions endpoint; the profile is appended as a path segment
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// When false every route uses the straight-line fallback
    pub enabled: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org/v2/directions".to_string(),
            api_key: None,
            timeout_secs: 10,
            enabled: true,
        }
    }
}

impl RoutingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Tick loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub tick_interval_ms: u64,
    /// Pause between laps of a repeating route
    pub repeat_pause_ms: u64,
    /// Minimum step count for road-following paths (more than two points)
    pub min_steps_road: u64,
    /// Minimum step count for two-point paths
    pub min_steps_straight: u64,
    /// Reference speed for the straight-line fallback duration (~50 km/h)
    pub fallback_speed_mps: f64,
    /// Buffer size of the navigation event channel
    pub event_capacity: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            repeat_pause_ms: 1000,
            min_steps_road: 100,
            min_steps_straight: 20,
            fallback_speed_mps: 13.89,
            event_capacity: 1024,
        }
    }
}

impl SimulationSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn repeat_pause(&self) -> Duration {
        Duration::from_millis(self.repeat_pause_ms)
    }
}

impl Settings {
    /// Default settings file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("route-sim").join("settings.json"))
    }

    /// Load from the default location; missing file means defaults
    pub fn load() -> Result<Self> {
        let settings = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings.with_env_overrides())
    }

    /// Write to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("No configuration directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.routing.api_key = Some(key.trim().to_string());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.simulation.tick_interval(), Duration::from_millis(50));
        assert_eq!(settings.simulation.repeat_pause(), Duration::from_millis(1000));
        assert_eq!(settings.simulation.min_steps_road, 100);
        assert_eq!(settings.simulation.min_steps_straight, 20);
        assert_eq!(settings.routing.timeout(), Duration::from_secs(10));
        assert!(settings.routing.enabled);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "routing": { "timeout_secs": 3 }, "simulation": { "repeat_pause_ms": 250 } }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.routing.timeout_secs, 3);
        assert_eq!(settings.routing.base_url, RoutingSettings::default().base_url);
        assert_eq!(settings.simulation.repeat_pause_ms, 250);
        assert_eq!(settings.simulation.tick_interval_ms, 50);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("route-sim-settings-{}", std::process::id()));
        let path = dir.join("settings.json");

        let mut settings = Settings::default();
        settings.routing.enabled = false;
        settings.simulation.event_capacity = 64;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert!(!loaded.routing.enabled);
        assert_eq!(loaded.simulation.event_capacity, 64);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = std::env::temp_dir().join(format!("route-sim-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Settings::load_from(&path).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
