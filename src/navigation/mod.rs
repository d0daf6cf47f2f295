pub mod controller;
pub mod watcher;

pub use controller::NavigationController;
pub use watcher::FieldWatcher;

use crate::core::{GeoPoint, NavigationState, Route, SimulationProgress};
use crate::routing::RoutePath;
use std::sync::Arc;

/// Everything an observer can see, updated as one value
///
/// `state == Running` or `Paused` always comes with `route` set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationSnapshot {
    pub state: NavigationState,
    pub route: Option<Route>,
    /// Path being followed, once resolved
    pub path: Option<Arc<RoutePath>>,
    pub progress: Option<SimulationProgress>,
    pub position: Option<GeoPoint>,
    /// Loop generation allowed to publish; bumped on start and resume
    pub(crate) generation: u64,
}

impl NavigationSnapshot {
    pub fn is_active(&self) -> bool {
        self.state != NavigationState::Stopped
    }
}

/// Published on the controller's event channel, in snapshot order
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    StateChanged(NavigationState),
    PathResolved(Arc<RoutePath>),
    Tick(SimulationProgress),
    /// A repeating route finished a lap and will restart
    Repeating { lap: u32 },
    /// The run ended on its own
    Completed,
    /// The run was stopped by a command or a failure
    Stopped,
}
