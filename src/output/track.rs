use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use crate::core::SimulationProgress;
use crate::navigation::NavigationEvent;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// One recorded tick
#[derive(Debug, Clone, Serialize)]
pub struct TrackRow {
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub progress_percent: f32,
    pub elapsed_ms: i64,
    pub remaining_ms: i64,
}

impl TrackRow {
    pub fn new(at: DateTime<Utc>, progress: &SimulationProgress) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            latitude: progress.position.latitude,
            longitude: progress.position.longitude,
            progress_percent: progress.progress_percent,
            elapsed_ms: progress.elapsed_millis,
            remaining_ms: progress.remaining_millis,
        }
    }
}

/// Writes published ticks as CSV rows
pub struct TrackRecorder<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl TrackRecorder<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create track file {}", path.display()))?;
        Ok(Self { writer, rows: 0 })
    }
}

impl<W: Write> TrackRecorder<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            rows: 0,
        }
    }

    pub fn record(&mut self, at: DateTime<Utc>, progress: &SimulationProgress) -> Result<()> {
        self.writer.serialize(TrackRow::new(at, progress))?;
        self.rows += 1;
        Ok(())
    }

    /// Record ticks until the run completes or stops, then flush
    pub async fn run(&mut self, mut events: broadcast::Receiver<NavigationEvent>) -> Result<usize> {
        loop {
            match events.recv().await {
                Ok(NavigationEvent::Tick(progress)) => self.record(Utc::now(), &progress)?,
                Ok(NavigationEvent::Completed | NavigationEvent::Stopped) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Track recorder fell behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        self.writer.flush()?;
        debug!("Track recorder wrote {} rows", self.rows);
        Ok(self.rows)
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush track: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeoPoint;
    use chrono::TimeZone;

    fn tick(fraction: f64, elapsed: i64) -> SimulationProgress {
        SimulationProgress::new(GeoPoint::unlabeled(10.5, -3.25), fraction, elapsed, 1000 - elapsed)
    }

    #[test]
    fn test_record_row_format() {
        let mut recorder = TrackRecorder::from_writer(Vec::new());
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        recorder.record(at, &tick(0.5, 400)).unwrap();

        let text = String::from_utf8(recorder.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,latitude,longitude,progress_percent,elapsed_ms,remaining_ms")
        );
        assert_eq!(lines.next(), Some("2024-03-01T12:00:00.000Z,10.5,-3.25,50.0,400,600"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_run_until_completed() {
        let (tx, rx) = broadcast::channel(16);
        tx.send(NavigationEvent::Tick(tick(0.0, 0))).unwrap();
        tx.send(NavigationEvent::Repeating { lap: 1 }).unwrap();
        tx.send(NavigationEvent::Tick(tick(0.25, 250))).unwrap();
        tx.send(NavigationEvent::Completed).unwrap();
        tx.send(NavigationEvent::Tick(tick(0.5, 500))).unwrap();

        let mut recorder = TrackRecorder::from_writer(Vec::new());
        let rows = recorder.run(rx).await.unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(recorder.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
