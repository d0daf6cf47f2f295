use async_trait::async_trait;
use crate::error::{RoutingError, RoutingResult};
use crate::routing::backend::{RoutePath, RouteRequest, RoutingBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock routing backend for testing without a network
///
/// Answers every request with a fixed path, or fails when none is set.
pub struct MockRoutingBackend {
    path: Option<RoutePath>,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<RouteRequest>>,
}

impl MockRoutingBackend {
    /// Backend that always returns `path`
    pub fn with_path(path: RoutePath) -> Self {
        Self {
            path: Some(path),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Backend that always reports an empty result
    pub fn failing() -> Self {
        Self {
            path: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Wait this long before answering
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of lookups served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RouteRequest> {
        self.last_request.lock().ok().and_then(|r| *r)
    }
}

#[async_trait]
impl RoutingBackend for MockRoutingBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn route(&self, request: &RouteRequest) -> RoutingResult<RoutePath> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(*request);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.path.clone().ok_or(RoutingError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Waypoint;
    use crate::routing::backend::{PathSource, RoutingProfile};

    fn request() -> RouteRequest {
        RouteRequest {
            start: Waypoint::new(1.0, 2.0),
            end: Waypoint::new(3.0, 4.0),
            profile: RoutingProfile::Cycling,
        }
    }

    #[tokio::test]
    async fn test_mock_returns_path_and_records_request() {
        let path = RoutePath::from_waypoints(
            vec![Waypoint::new(1.0, 2.0), Waypoint::new(3.0, 4.0)],
            5.0,
            PathSource::Lookup,
        );
        let backend = MockRoutingBackend::with_path(path.clone());

        assert_eq!(backend.route(&request()).await.unwrap(), path);
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.last_request(), Some(request()));
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let backend = MockRoutingBackend::failing();
        assert!(matches!(backend.route(&request()).await, Err(RoutingError::Empty)));
        assert_eq!(backend.calls(), 1);
    }
}
