pub mod geo;
pub mod point;
pub mod progress;
pub mod route;

pub use geo::{haversine_distance, lerp, path_length};
pub use point::{GeoPoint, Waypoint};
pub use progress::{format_clock, NavigationState, SimulationProgress};
pub use route::{Route, RouteBuilder, SpeedPreset};
