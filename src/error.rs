//! Error types for route construction and the routing lookup.
//!
//! Lookup errors never reach the navigation controller: the routing
//! provider logs them and substitutes a straight-line path.

use std::time::Duration;
use thiserror::Error;

/// Rejected route input
#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("{which} latitude {value} is outside [-90, 90]")]
    InvalidLatitude { which: &'static str, value: f64 },

    #[error("{which} longitude {value} is outside [-180, 180]")]
    InvalidLongitude { which: &'static str, value: f64 },

    #[error("speed must be a positive number of metres per second, got {0}")]
    InvalidSpeed(f64),
}

pub type RouteResult<T> = Result<T, RouteError>;

/// Failure of the external routing lookup
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed routing response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("routing service returned no usable route")]
    Empty,

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("routing lookup disabled")]
    Disabled,

    #[error("routing lookup timed out after {0:?}")]
    Timeout(Duration),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
