pub mod csv;

pub use self::csv::{load_waypoints, read_waypoints};
