use anyhow::{Context, Result};
use clap::Parser;
use route_sim::core::format_clock;
use route_sim::input::load_waypoints;
use route_sim::output::TrackRecorder;
use route_sim::{GeoPoint, NavigationController, NavigationEvent, NavigationState, Route, Settings, SpeedPreset};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Simulate travel along a route and log the moving position
#[derive(Debug, Parser)]
#[command(name = "route-sim", version)]
struct Args {
    /// Start latitude
    #[arg(allow_hyphen_values = true)]
    start_lat: f64,
    /// Start longitude
    #[arg(allow_hyphen_values = true)]
    start_lon: f64,
    /// End latitude
    #[arg(allow_hyphen_values = true)]
    end_lat: f64,
    /// End longitude
    #[arg(allow_hyphen_values = true)]
    end_lon: f64,

    /// Route name
    #[arg(long, default_value = "Auto Route")]
    name: String,

    /// Speed in metres per second
    #[arg(long, conflicts_with = "preset")]
    speed: Option<f64>,

    /// walking, cycling, driving-slow, driving-normal or driving-fast
    #[arg(long)]
    preset: Option<SpeedPreset>,

    /// Stop after this many seconds of simulated travel (0 = no limit)
    #[arg(long, default_value_t = 0)]
    duration_secs: u32,

    /// Loop the route until stopped
    #[arg(long)]
    repeat: bool,

    /// CSV file of intermediate waypoints (skips the routing lookup)
    #[arg(long)]
    waypoints: Option<PathBuf>,

    /// Write every tick to this CSV file
    #[arg(long)]
    track: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Never contact the routing service
    #[arg(long)]
    offline: bool,

    /// Write the effective settings to the user config directory
    #[arg(long)]
    save_settings: bool,

    /// Stop the run after this many wall-clock seconds
    #[arg(long)]
    max_runtime_secs: Option<u64>,
}

impl Args {
    fn build_route(&self) -> Result<Route> {
        let mut builder = Route::builder(
            GeoPoint::new(self.start_lat, self.start_lon, "Start"),
            GeoPoint::new(self.end_lat, self.end_lon, "End"),
        )
        .name(self.name.as_str())
        .repeating(self.repeat)
        .duration_min_sec(0, self.duration_secs);

        if let Some(preset) = self.preset {
            builder = builder.speed_preset(preset);
        } else if let Some(speed) = self.speed {
            builder = builder.speed_mps(speed);
        }

        if let Some(path) = &self.waypoints {
            builder = builder.waypoints(load_waypoints(path)?);
        }

        builder.build().context("Invalid route")
    }

    fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        if self.offline {
            settings.routing.enabled = false;
        }
        Ok(settings)
    }
}

/// Log progress about once a second until the run ends
async fn log_progress(mut events: broadcast::Receiver<NavigationEvent>) {
    let mut last_logged: Option<i64> = None;
    loop {
        match events.recv().await {
            Ok(NavigationEvent::Tick(progress)) => {
                let second = progress.elapsed_millis / 1000;
                if last_logged != Some(second) {
                    last_logged = Some(second);
                    info!("{}", progress);
                }
            }
            Ok(NavigationEvent::PathResolved(path)) => {
                info!(
                    "Following {:?} path: {} points, {:.0} m",
                    path.source,
                    path.waypoints.len(),
                    path.total_distance_m
                );
            }
            Ok(NavigationEvent::Repeating { lap }) => info!("Lap {} finished, repeating", lap),
            Ok(NavigationEvent::Completed) => {
                info!("Arrived");
                break;
            }
            Ok(NavigationEvent::Stopped) => break,
            Ok(NavigationEvent::StateChanged(_)) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = args.load_settings()?;
    if args.save_settings {
        let path = settings.save()?;
        info!("Saved settings to {}", path.display());
    }
    let route = args.build_route()?;

    info!(
        "Route '{}' from {} to {} at {:.1} m/s",
        route.name, route.start, route.end, route.speed_mps
    );

    let controller = NavigationController::from_settings(&settings);

    let recorder = match &args.track {
        Some(path) => {
            let mut recorder = TrackRecorder::create(path)?;
            let events = controller.events();
            Some(tokio::spawn(async move { recorder.run(events).await }))
        }
        None => None,
    };
    let logger = tokio::spawn(log_progress(controller.events()));

    let mut state = controller.watch_state();
    let started = std::time::Instant::now();
    controller.start(route);

    let deadline = async {
        match args.max_runtime_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if matches!(changed, None | Some(NavigationState::Stopped)) {
                    break;
                }
            }
            _ = &mut deadline => {
                info!("Maximum runtime reached");
                controller.stop();
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                controller.stop();
                break;
            }
        }
    }

    let _ = logger.await;
    if let Some(recorder) = recorder {
        let rows = recorder.await.context("Track recorder task failed")??;
        info!("Wrote {} track points", rows);
    }

    info!("Finished after {}", format_clock(started.elapsed().as_millis() as i64));
    Ok(())
}
