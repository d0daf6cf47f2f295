use anyhow::{Context, Result};
use crate::core::GeoPoint;
use std::io::Read;
use std::path::Path;

/// Load an explicit waypoint list from a CSV file
///
/// Supports flexible column names:
/// - lat,lon
/// - latitude,longitude,name
/// - lat,lng,label
pub fn load_waypoints(path: &Path) -> Result<Vec<GeoPoint>> {
    let rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open waypoint file {}", path.display()))?;
    read_waypoints(rdr)
}

/// Read waypoints from any CSV source with a header row
pub fn read_waypoints<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<GeoPoint>> {
    let headers = rdr.headers()?.clone();
    let lat_idx = required_column(&headers, "latitude", &["lat", "latitude"])?;
    let lon_idx = required_column(&headers, "longitude", &["lon", "lng", "long", "longitude"])?;
    let name_idx = column_index(&headers, &["name", "label"]);

    let mut waypoints = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;
        // header is line 1
        let line = row + 2;

        let latitude = parse_coordinate(record.get(lat_idx), "latitude", line)?;
        let longitude = parse_coordinate(record.get(lon_idx), "longitude", line)?;

        let label = name_idx
            .and_then(|idx| record.get(idx))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let point = GeoPoint::new(latitude, longitude, label);
        if !point.is_valid() {
            anyhow::bail!("Coordinates out of range on line {}: {}, {}", line, latitude, longitude);
        }
        waypoints.push(point);
    }

    Ok(waypoints)
}

fn parse_coordinate(field: Option<&str>, what: &str, line: usize) -> Result<f64> {
    let field = field.with_context(|| format!("Missing {} on line {}", what, line))?;
    field
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid {} '{}' on line {}", what, field, line))
}

/// Position of the first header matching one of `aliases`, ignoring case and padding
fn column_index(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| aliases.iter().any(|alias| header.trim().eq_ignore_ascii_case(alias)))
}

fn required_column(headers: &csv::StringRecord, what: &str, aliases: &[&str]) -> Result<usize> {
    column_index(headers, aliases)
        .with_context(|| format!("No {} column; expected one of {:?}", what, aliases))
}
