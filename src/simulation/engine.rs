use crate::config::SimulationSettings;
use crate::core::geo::{lerp_waypoint, waypoint_distance};
use crate::core::point::CURRENT_POSITION_LABEL;
use crate::core::{GeoPoint, Route, SimulationProgress, Waypoint};
use crate::routing::RoutePath;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Receives ticks from a running simulator
///
/// Both methods return `false` once the run is no longer the current one
/// (paused, stopped or superseded); the simulator then exits without
/// publishing anything else.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, progress: SimulationProgress) -> bool;

    /// A lap of a repeating route has finished
    fn lap_finished(&self, _lap: u32) -> bool {
        true
    }
}

/// How a call to [`RouteSimulator::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Steps or duration exhausted on a non-repeating route
    Completed,
    /// The cancellation token fired
    Cancelled,
    /// The sink refused a publication
    Superseded,
}

/// Tick-driven replay of one route along one resolved path
pub struct RouteSimulator {
    route: Route,
    path: Arc<RoutePath>,
    /// Distance from the first waypoint to each waypoint
    cumulative: Vec<f64>,
    total_steps: u64,
    settings: SimulationSettings,
}

impl RouteSimulator {
    pub fn new(route: Route, path: Arc<RoutePath>, settings: SimulationSettings) -> Self {
        let mut cumulative = Vec::with_capacity(path.waypoints.len());
        let mut acc = 0.0;
        cumulative.push(0.0);
        for w in path.waypoints.windows(2) {
            acc += waypoint_distance(w[0], w[1]);
            cumulative.push(acc);
        }

        let total_steps = compute_total_steps(&route, &path, &settings);
        debug!(
            "Simulator for '{}': {} points, {:.0} m, {} steps",
            route.name,
            path.waypoints.len(),
            path.total_distance_m,
            total_steps
        );

        Self {
            route,
            path,
            cumulative,
            total_steps,
            settings,
        }
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Expected run time: the route's duration limit, or distance at speed
    pub fn estimated_total_millis(&self) -> i64 {
        if self.route.has_time_limit() {
            self.route.duration_millis
        } else {
            (self.path.total_distance_m / self.route.speed_mps * 1000.0) as i64
        }
    }

    /// First step to publish when (re)starting at `fraction`
    pub fn step_for_fraction(&self, fraction: f64) -> u64 {
        // the epsilon absorbs `k / n * n` landing just under k
        let step = (fraction.clamp(0.0, 1.0) * self.total_steps as f64 + 1e-9).floor() as u64;
        step.min(self.total_steps)
    }

    /// Position at `fraction` of the way along the path
    pub fn position_at(&self, fraction: f64) -> GeoPoint {
        self.waypoint_at(fraction).to_point(CURRENT_POSITION_LABEL)
    }

    fn waypoint_at(&self, fraction: f64) -> Waypoint {
        let waypoints = &self.path.waypoints;
        let (Some(&first), Some(&last)) = (waypoints.first(), waypoints.last()) else {
            return Waypoint::new(0.0, 0.0);
        };

        if fraction >= 1.0 {
            return last;
        }
        if waypoints.len() == 2 {
            return lerp_waypoint(first, last, fraction.max(0.0));
        }

        let total = self.cumulative.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            return first;
        }

        let target = total * fraction.max(0.0);
        // first segment whose far end reaches the target
        let segment = self.cumulative[1..].partition_point(|&d| d < target);
        if segment + 1 >= waypoints.len() {
            return last;
        }

        let seg_start = self.cumulative[segment];
        let seg_len = self.cumulative[segment + 1] - seg_start;
        let t = if seg_len > 0.0 {
            ((target - seg_start) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };

        lerp_waypoint(waypoints[segment], waypoints[segment + 1], t)
    }

    fn tick_at(&self, fraction: f64, elapsed_millis: i64, estimated_millis: i64) -> SimulationProgress {
        SimulationProgress::new(
            self.position_at(fraction),
            fraction,
            elapsed_millis,
            estimated_millis - elapsed_millis,
        )
    }

    /// Run the tick loop starting at `start_fraction` until the route
    /// completes, the token is cancelled, or the sink refuses a tick.
    ///
    /// Elapsed time starts at `start_fraction * estimated_total_millis` so
    /// elapsed and remaining stay continuous across pause and resume.
    pub async fn run(
        &self,
        start_fraction: f64,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let tick = self.settings.tick_interval();
        let estimated = self.estimated_total_millis();
        let mut fraction = start_fraction.clamp(0.0, 1.0);
        let mut lap: u32 = 0;
        // resumed after arrival: that tick and lap were already published
        let mut resumed_at_end = fraction >= 1.0;

        loop {
            let mut step = self.step_for_fraction(fraction);
            let offset_millis = (fraction * estimated as f64) as i64;
            let lap_start = Instant::now();
            let elapsed = || offset_millis + lap_start.elapsed().as_millis() as i64;

            while step < self.total_steps {
                if cancel.is_cancelled() {
                    return RunOutcome::Cancelled;
                }

                let progress = step as f64 / self.total_steps as f64;
                let elapsed_millis = elapsed();
                let tick_progress = self.tick_at(progress, elapsed_millis, estimated);
                trace!("step {}/{}: {}", step, self.total_steps, tick_progress);

                if !sink.publish(tick_progress) {
                    return RunOutcome::Superseded;
                }

                if self.route.has_time_limit() && elapsed_millis >= self.route.duration_millis {
                    debug!("Duration limit of {} ms reached at step {}", self.route.duration_millis, step);
                    break;
                }

                if !sleep_or_cancel(tick, cancel).await {
                    return RunOutcome::Cancelled;
                }
                step += 1;
            }

            if step >= self.total_steps && !resumed_at_end {
                if cancel.is_cancelled() {
                    return RunOutcome::Cancelled;
                }
                if !sink.publish(self.tick_at(1.0, elapsed(), estimated)) {
                    return RunOutcome::Superseded;
                }
            }

            if !self.route.repeating {
                return RunOutcome::Completed;
            }

            if !resumed_at_end {
                lap += 1;
                if !sink.lap_finished(lap) {
                    return RunOutcome::Superseded;
                }
                debug!("Lap {} of '{}' finished, repeating", lap, self.route.name);
            }
            resumed_at_end = false;

            if !sleep_or_cancel(self.settings.repeat_pause(), cancel).await {
                return RunOutcome::Cancelled;
            }
            fraction = 0.0;
        }
    }
}

fn compute_total_steps(route: &Route, path: &RoutePath, settings: &SimulationSettings) -> u64 {
    let min_steps = if path.is_road_following() {
        settings.min_steps_road
    } else {
        settings.min_steps_straight
    };

    let metres_per_tick = route.speed_mps * settings.tick_interval().as_secs_f64();
    let steps = (path.total_distance_m / metres_per_tick).floor();
    let steps = if steps.is_finite() && steps > 0.0 { steps as u64 } else { 0 };

    steps.max(min_steps).max(1)
}

/// `false` if cancelled before `duration` elapsed
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::lerp;
    use crate::routing::{straight_line_path, PathSource, FALLBACK_SPEED_MPS};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        ticks: Mutex<Vec<SimulationProgress>>,
        /// clock reading at each accepted tick
        stamps: Mutex<Vec<Instant>>,
        laps: Mutex<Vec<u32>>,
        /// refuse publication once this many ticks were accepted
        limit: Option<usize>,
    }

    impl CollectingSink {
        fn with_limit(limit: usize) -> Self {
            Self {
                limit: Some(limit),
                ..Self::default()
            }
        }

        fn ticks(&self) -> Vec<SimulationProgress> {
            self.ticks.lock().unwrap().clone()
        }
    }

    impl ProgressSink for CollectingSink {
        fn publish(&self, progress: SimulationProgress) -> bool {
            let mut ticks = self.ticks.lock().unwrap();
            if self.limit.is_some_and(|limit| ticks.len() >= limit) {
                return false;
            }
            ticks.push(progress);
            self.stamps.lock().unwrap().push(Instant::now());
            true
        }

        fn lap_finished(&self, lap: u32) -> bool {
            self.laps.lock().unwrap().push(lap);
            self.limit.map_or(true, |limit| self.ticks.lock().unwrap().len() < limit)
        }
    }

    fn route(start: GeoPoint, end: GeoPoint, speed: f64) -> Route {
        Route::builder(start, end).id(1).speed_mps(speed).build().unwrap()
    }

    fn straight(route: &Route) -> Arc<RoutePath> {
        Arc::new(straight_line_path(&route.start, &route.end, FALLBACK_SPEED_MPS))
    }

    fn equator_route(speed: f64) -> Route {
        route(GeoPoint::unlabeled(0.0, 0.0), GeoPoint::unlabeled(0.0, 1.0), speed)
    }

    fn road_path() -> Arc<RoutePath> {
        Arc::new(RoutePath::from_waypoints(
            vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(0.0, 0.01),
                Waypoint::new(0.01, 0.01),
                Waypoint::new(0.01, 0.03),
            ],
            10.0,
            PathSource::Lookup,
        ))
    }

    #[test]
    fn test_total_steps_long_straight_route() {
        let route = equator_route(1000.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        assert_eq!(sim.total_steps(), 2223);
    }

    #[test]
    fn test_total_steps_minimums() {
        let short = route(GeoPoint::unlabeled(0.0, 0.0), GeoPoint::unlabeled(0.0, 0.00001), 10.0);
        let sim = RouteSimulator::new(short.clone(), straight(&short), SimulationSettings::default());
        assert_eq!(sim.total_steps(), 20);

        let sim = RouteSimulator::new(short, road_path(), SimulationSettings::default());
        // ~4.4 km at 10 m/s is ~8900 steps, well above the road minimum
        assert!(sim.total_steps() > 100);

        let fast = equator_route(1.0e6);
        let sim = RouteSimulator::new(fast, road_path(), SimulationSettings::default());
        assert_eq!(sim.total_steps(), 100);
    }

    #[test]
    fn test_estimated_total_time() {
        let route = equator_route(100.0);
        let path = straight(&route);
        let sim = RouteSimulator::new(route.clone(), path.clone(), SimulationSettings::default());
        assert_eq!(sim.estimated_total_millis(), (path.total_distance_m / 100.0 * 1000.0) as i64);

        let timed = Route {
            duration_millis: 42_000,
            ..route
        };
        let sim = RouteSimulator::new(timed, path, SimulationSettings::default());
        assert_eq!(sim.estimated_total_millis(), 42_000);
    }

    #[test]
    fn test_two_point_position_is_lerp() {
        let route = route(GeoPoint::unlabeled(10.0, 20.0), GeoPoint::unlabeled(11.0, 22.0), 5.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());

        for fraction in [0.0, 0.1, 0.37, 0.5, 0.999] {
            let expected = lerp(&route.start, &route.end, fraction);
            let actual = sim.position_at(fraction);
            assert_eq!(actual.latitude, expected.latitude);
            assert_eq!(actual.longitude, expected.longitude);
            assert_eq!(actual.label, CURRENT_POSITION_LABEL);
        }

        let end = sim.position_at(1.0);
        assert_eq!((end.latitude, end.longitude), (11.0, 22.0));
    }

    #[test]
    fn test_multi_segment_position() {
        let route = equator_route(10.0);
        let path = road_path();
        let sim = RouteSimulator::new(route, path.clone(), SimulationSettings::default());

        let start = sim.position_at(0.0);
        assert_eq!((start.latitude, start.longitude), (0.0, 0.0));

        // segment lengths are roughly 1:1:2, so a quarter lands on the first corner
        let corner = sim.position_at(0.25);
        assert!((corner.latitude - 0.0).abs() < 1e-4);
        assert!((corner.longitude - 0.01).abs() < 1e-4);

        // halfway is the second corner
        let second = sim.position_at(0.5);
        assert!((second.latitude - 0.01).abs() < 1e-4);
        assert!((second.longitude - 0.01).abs() < 1e-4);

        // three quarters is the middle of the last segment
        let late = sim.position_at(0.75);
        assert!((late.latitude - 0.01).abs() < 1e-6);
        assert!((late.longitude - 0.02).abs() < 1e-4);

        let end = sim.position_at(1.0);
        assert_eq!((end.latitude, end.longitude), (0.01, 0.03));
    }

    #[test]
    fn test_stationary_path_stays_put() {
        let here = GeoPoint::unlabeled(45.0, 7.0);
        let route = route(here.clone(), here.clone(), 5.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());

        assert_eq!(sim.total_steps(), 20);
        for fraction in [0.0, 0.5, 0.95] {
            let p = sim.position_at(fraction);
            assert_eq!((p.latitude, p.longitude), (45.0, 7.0));
        }
    }

    #[test]
    fn test_step_for_fraction_roundtrip() {
        let route = equator_route(1000.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        let n = sim.total_steps();

        for step in [0, 1, 37, 1111, n - 1] {
            let fraction = step as f64 / n as f64;
            assert_eq!(sim.step_for_fraction(fraction), step);
        }
        assert_eq!(sim.step_for_fraction(1.5), n);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_completion() {
        let route = route(GeoPoint::unlabeled(0.0, 0.0), GeoPoint::unlabeled(0.0, 0.001), 10.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        let sink = CollectingSink::default();

        let outcome = sim.run(0.0, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);

        let ticks = sink.ticks();
        let n = sim.total_steps() as usize;
        // one tick per step plus the arrival tick
        assert_eq!(ticks.len(), n + 1);
        assert_eq!(ticks[0].progress_percent, 0.0);
        assert_eq!(ticks[0].elapsed_millis, 0);

        let last = ticks.last().unwrap();
        assert_eq!(last.progress_percent, 100.0);
        assert_eq!((last.position.latitude, last.position.longitude), (0.0, 0.001));

        for pair in ticks.windows(2) {
            assert!(pair[1].elapsed_millis >= pair[0].elapsed_millis);
            assert!(pair[1].progress_percent >= pair[0].progress_percent);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_cap() {
        let mut route = equator_route(1.0);
        route.duration_millis = 5000;
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        let sink = CollectingSink::default();

        let outcome = sim.run(0.0, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);

        let last = sink.ticks().last().cloned().unwrap();
        assert!(last.elapsed_millis >= 5000);
        assert!(last.elapsed_millis <= 5050, "elapsed {}", last.elapsed_millis);
        assert_eq!(last.remaining_millis, 0);
        assert!(last.progress_percent < 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_offsets_elapsed() {
        let route = equator_route(1000.0);
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        let sink = CollectingSink::with_limit(1);

        let fraction = 1000.0 / sim.total_steps() as f64;
        let outcome = sim.run(fraction, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Superseded);

        let first = &sink.ticks()[0];
        assert_eq!(first.fraction(), fraction);
        let expected_elapsed = (fraction * sim.estimated_total_millis() as f64) as i64;
        assert_eq!(first.elapsed_millis, expected_elapsed);
        assert_eq!(first.remaining_millis, sim.estimated_total_millis() - expected_elapsed);
        assert_eq!(first.position, sim.position_at(fraction));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_restarts_from_zero() {
        let mut route = route(GeoPoint::unlabeled(0.0, 0.0), GeoPoint::unlabeled(0.0, 0.001), 10.0);
        route.repeating = true;
        let sim = RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default());
        let per_lap = sim.total_steps() as usize + 1;
        let sink = CollectingSink::with_limit(per_lap + 3);

        let outcome = sim.run(0.0, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Superseded);

        let ticks = sink.ticks();
        assert_eq!(ticks[per_lap - 1].progress_percent, 100.0);
        assert_eq!(ticks[per_lap].progress_percent, 0.0);
        assert_eq!(ticks[per_lap].elapsed_millis, 0);
        assert_eq!(*sink.laps.lock().unwrap(), vec![1]);

        let stamps = sink.stamps.lock().unwrap();
        assert_eq!(
            stamps[per_lap] - stamps[per_lap - 1],
            SimulationSettings::default().repeat_pause()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_at_end_does_not_repeat_arrival() {
        let short = route(GeoPoint::unlabeled(0.0, 0.0), GeoPoint::unlabeled(0.0, 0.001), 10.0);
        let sim = RouteSimulator::new(short.clone(), straight(&short), SimulationSettings::default());
        let sink = CollectingSink::default();

        let outcome = sim.run(1.0, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(sink.ticks().is_empty());

        let looping = Route {
            repeating: true,
            ..short
        };
        let sim = RouteSimulator::new(looping.clone(), straight(&looping), SimulationSettings::default());
        let sink = CollectingSink::with_limit(1);
        let resumed = Instant::now();

        let outcome = sim.run(1.0, &sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Superseded);

        // straight into the next lap after the pause
        let ticks = sink.ticks();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].progress_percent, 0.0);
        assert!(sink.laps.lock().unwrap().is_empty());
        assert_eq!(
            sink.stamps.lock().unwrap()[0] - resumed,
            SimulationSettings::default().repeat_pause()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_promptly() {
        let route = equator_route(1.0);
        let sim = Arc::new(RouteSimulator::new(route.clone(), straight(&route), SimulationSettings::default()));
        let sink = Arc::new(CollectingSink::default());
        let cancel = CancellationToken::new();

        let handle = {
            let (sim, sink, cancel) = (sim.clone(), sink.clone(), cancel.clone());
            tokio::spawn(async move { sim.run(0.0, sink.as_ref(), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(520)).await;
        cancel.cancel();
        let published = sink.ticks().len();

        assert_eq!(handle.await.unwrap(), RunOutcome::Cancelled);
        assert_eq!(sink.ticks().len(), published);
        assert!(published >= 10 && published <= 12, "published {}", published);
    }
}
