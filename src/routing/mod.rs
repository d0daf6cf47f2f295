pub mod backend;
pub mod mock;
pub mod openroute;
pub mod provider;

pub use backend::{PathSource, RoutePath, RouteRequest, RoutingBackend, RoutingProfile};
pub use mock::MockRoutingBackend;
pub use openroute::OpenRouteServiceBackend;
pub use provider::{straight_line_path, RoutingProvider, FALLBACK_SPEED_MPS};
