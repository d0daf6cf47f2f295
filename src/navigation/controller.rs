use crate::config::{Settings, SimulationSettings};
use crate::core::{GeoPoint, NavigationState, Route, SimulationProgress};
use crate::navigation::watcher::FieldWatcher;
use crate::navigation::{NavigationEvent, NavigationSnapshot};
use crate::routing::{RoutePath, RoutingProvider};
use crate::simulation::{ProgressSink, RouteSimulator, RunOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The loop currently allowed to run
struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
}

/// State shared between the controller and its run task
struct Shared {
    snapshot: watch::Sender<NavigationSnapshot>,
    events: broadcast::Sender<NavigationEvent>,
    /// Serializes commands; never held across an await
    run: Mutex<Option<ActiveRun>>,
    next_generation: AtomicU64,
}

impl Shared {
    fn lock_run(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        // a poisoned lock only means a panic elsewhere; the slot itself is still valid
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: NavigationEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Apply `f` only while `generation` is the running loop
    fn update_running<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut NavigationSnapshot, &broadcast::Sender<NavigationEvent>),
    {
        self.snapshot.send_if_modified(|snap| {
            if snap.generation != generation || snap.state != NavigationState::Running {
                return false;
            }
            f(snap, &self.events);
            true
        })
    }

    /// Clear everything if `generation` still owns the snapshot
    fn end_run(&self, generation: u64, completed: bool) -> bool {
        let mut run = self.lock_run();
        let ended = self.snapshot.send_if_modified(|snap| {
            if snap.generation != generation || !snap.is_active() {
                return false;
            }
            // natural completion only counts while still running
            if completed && snap.state != NavigationState::Running {
                return false;
            }
            *snap = NavigationSnapshot::default();
            let _ = self.events.send(if completed {
                NavigationEvent::Completed
            } else {
                NavigationEvent::Stopped
            });
            let _ = self.events.send(NavigationEvent::StateChanged(NavigationState::Stopped));
            true
        });

        if ended && run.as_ref().is_some_and(|r| r.generation == generation) {
            *run = None;
        }
        ended
    }
}

/// Publishes ticks for one loop generation
struct RunSink {
    shared: Arc<Shared>,
    generation: u64,
}

impl ProgressSink for RunSink {
    fn publish(&self, progress: SimulationProgress) -> bool {
        self.shared.update_running(self.generation, |snap, events| {
            snap.position = Some(progress.position.clone());
            snap.progress = Some(progress.clone());
            let _ = events.send(NavigationEvent::Tick(progress));
        })
    }

    fn lap_finished(&self, lap: u32) -> bool {
        self.shared.update_running(self.generation, |_, events| {
            let _ = events.send(NavigationEvent::Repeating { lap });
        })
    }
}

/// Owns the route simulation lifecycle: start, pause, resume, stop.
///
/// At most one simulation task is alive per controller. State, route,
/// progress and position are published together through a watch cell, so
/// readers always see a consistent snapshot; every tick is also sent on a
/// broadcast channel.
///
/// Commands must be issued from within a Tokio runtime.
pub struct NavigationController {
    shared: Arc<Shared>,
    routing: RoutingProvider,
    settings: SimulationSettings,
}

impl NavigationController {
    pub fn new(routing: RoutingProvider, settings: SimulationSettings) -> Self {
        let (snapshot, _) = watch::channel(NavigationSnapshot::default());
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        Self {
            shared: Arc::new(Shared {
                snapshot,
                events,
                run: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
            routing,
            settings,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(RoutingProvider::from_settings(settings), settings.simulation.clone())
    }

    /// Start simulating `route`, replacing any current run.
    ///
    /// The controller is RUNNING as soon as this returns; the path is
    /// resolved in the background before the first tick.
    pub fn start(&self, route: Route) {
        let mut run = self.shared.lock_run();
        if let Some(previous) = run.take() {
            previous.cancel.cancel();
        }

        let generation = self.shared.next_generation();
        let cancel = CancellationToken::new();
        let route = Route {
            active: true,
            ..route
        };

        info!("Starting navigation for route: {}", route.name);

        let active_route = route.clone();
        self.shared.snapshot.send_modify(|snap| {
            if snap.is_active() {
                let _ = self.shared.events.send(NavigationEvent::Stopped);
            }
            *snap = NavigationSnapshot {
                state: NavigationState::Running,
                route: Some(active_route),
                generation,
                ..NavigationSnapshot::default()
            };
            let _ = self
                .shared
                .events
                .send(NavigationEvent::StateChanged(NavigationState::Running));
        });

        *run = Some(ActiveRun {
            generation,
            cancel: cancel.clone(),
        });
        drop(run);

        self.spawn_run(generation, route, None, 0.0, cancel);
    }

    /// RUNNING → PAUSED; no-op otherwise
    pub fn pause(&self) {
        let run = self.shared.lock_run();

        let paused = self.shared.snapshot.send_if_modified(|snap| {
            if snap.state != NavigationState::Running {
                return false;
            }
            snap.state = NavigationState::Paused;
            let _ = self
                .shared
                .events
                .send(NavigationEvent::StateChanged(NavigationState::Paused));
            true
        });

        if paused {
            if let Some(active) = run.as_ref() {
                active.cancel.cancel();
            }
            info!("Navigation paused");
        }
    }

    /// PAUSED → RUNNING from the last published progress; no-op otherwise
    pub fn resume(&self) {
        let mut run = self.shared.lock_run();

        let generation = self.shared.next_generation();
        let mut resumed = None;
        self.shared.snapshot.send_if_modified(|snap| {
            if snap.state != NavigationState::Paused {
                return false;
            }
            let Some(route) = snap.route.clone() else {
                return false;
            };
            let fraction = snap.progress.as_ref().map_or(0.0, |p| p.fraction());

            snap.state = NavigationState::Running;
            snap.generation = generation;
            resumed = Some((route, snap.path.clone(), fraction));
            let _ = self
                .shared
                .events
                .send(NavigationEvent::StateChanged(NavigationState::Running));
            true
        });

        let Some((route, path, fraction)) = resumed else {
            return;
        };

        info!("Resuming navigation at {:.1}%", fraction * 100.0);

        let cancel = CancellationToken::new();
        if let Some(previous) = run.replace(ActiveRun {
            generation,
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }
        drop(run);

        self.spawn_run(generation, route, path, fraction, cancel);
    }

    /// Any state → STOPPED, clearing route, path, progress and position
    pub fn stop(&self) {
        let mut run = self.shared.lock_run();
        if let Some(active) = run.take() {
            active.cancel.cancel();
        }

        let stopped = self.shared.snapshot.send_if_modified(|snap| {
            if *snap == NavigationSnapshot::default() {
                return false;
            }
            let was_active = snap.is_active();
            *snap = NavigationSnapshot::default();
            if was_active {
                let _ = self.shared.events.send(NavigationEvent::Stopped);
                let _ = self
                    .shared
                    .events
                    .send(NavigationEvent::StateChanged(NavigationState::Stopped));
            }
            true
        });

        if stopped {
            info!("Navigation stopped");
        }
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> NavigationState {
        self.shared.snapshot.borrow().state
    }

    pub fn route(&self) -> Option<Route> {
        self.shared.snapshot.borrow().route.clone()
    }

    pub fn path(&self) -> Option<Arc<RoutePath>> {
        self.shared.snapshot.borrow().path.clone()
    }

    pub fn progress(&self) -> Option<SimulationProgress> {
        self.shared.snapshot.borrow().progress.clone()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.shared.snapshot.borrow().position.clone()
    }

    /// Whole-snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Every event from now on
    pub fn events(&self) -> broadcast::Receiver<NavigationEvent> {
        self.shared.events.subscribe()
    }

    pub fn watch_state(&self) -> FieldWatcher<NavigationState> {
        FieldWatcher::new(self.subscribe(), |s| s.state)
    }

    pub fn watch_route(&self) -> FieldWatcher<Option<Route>> {
        FieldWatcher::new(self.subscribe(), |s| s.route.clone())
    }

    pub fn watch_progress(&self) -> FieldWatcher<Option<SimulationProgress>> {
        FieldWatcher::new(self.subscribe(), |s| s.progress.clone())
    }

    pub fn watch_position(&self) -> FieldWatcher<Option<GeoPoint>> {
        FieldWatcher::new(self.subscribe(), |s| s.position.clone())
    }

    /// Launch the background task for one loop generation.
    ///
    /// A second task waits on the first so that a panic inside the loop
    /// ends the run like `stop()` instead of leaving it RUNNING.
    fn spawn_run(
        &self,
        generation: u64,
        route: Route,
        path: Option<Arc<RoutePath>>,
        fraction: f64,
        cancel: CancellationToken,
    ) {
        let shared = self.shared.clone();
        let routing = self.routing.clone();
        let settings = self.settings.clone();

        let task = tokio::spawn(async move {
            let path = match path {
                Some(path) => path,
                None => {
                    let resolved = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return RunOutcome::Cancelled,
                        path = routing.resolve_route(&route) => Arc::new(path),
                    };

                    let accepted = shared.update_running(generation, |snap, events| {
                        snap.path = Some(resolved.clone());
                        let _ = events.send(NavigationEvent::PathResolved(resolved.clone()));
                    });
                    if !accepted {
                        return RunOutcome::Superseded;
                    }
                    resolved
                }
            };

            let simulator = RouteSimulator::new(route, path, settings);
            let sink = RunSink {
                shared: shared.clone(),
                generation,
            };
            simulator.run(fraction, &sink, &cancel).await
        });

        let shared = self.shared.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(RunOutcome::Completed) => {
                    if shared.end_run(generation, true) {
                        info!("Navigation completed");
                    }
                }
                Ok(outcome) => debug!("Simulation generation {} ended: {:?}", generation, outcome),
                Err(e) => {
                    error!("Simulation task failed: {}", e);
                    if shared.end_run(generation, false) {
                        warn!("Navigation stopped after simulation failure");
                    }
                }
            }
        });
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        if let Some(active) = self.shared.lock_run().take() {
            active.cancel.cancel();
        }
    }
}
