//! Route simulation engine.
//!
//! Replays a route (start, end, optional waypoints, speed, optional time
//! limit, repeat flag) as a stream of interpolated positions at a fixed tick
//! rate, with pause/resume/stop control. Paths come from an external
//! directions service when one is reachable and fall back to a straight line
//! otherwise.
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`core`]       | `GeoPoint`, `Route`, `SimulationProgress`, geo math        |
//! | [`routing`]    | `RoutingProvider`, `RoutingBackend`, OpenRouteService      |
//! | [`simulation`] | `RouteSimulator` tick loop                                 |
//! | [`navigation`] | `NavigationController` state machine and observables       |
//! | [`input`]      | CSV waypoint lists                                         |
//! | [`output`]     | CSV track recording                                        |
//! | [`config`]     | `Settings`                                                 |

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod navigation;
pub mod output;
pub mod routing;
pub mod simulation;

pub use crate::config::Settings;
pub use crate::core::{GeoPoint, NavigationState, Route, SimulationProgress, SpeedPreset, Waypoint};
pub use crate::error::{RouteError, RoutingError};
pub use crate::navigation::{NavigationController, NavigationEvent, NavigationSnapshot};
pub use crate::routing::{RoutePath, RoutingProvider};
pub use crate::simulation::RouteSimulator;
