use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres.
    pub accuracy: f64,
    pub captured_at: u64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, captured_at: u64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            captured_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the provider may answer with.
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }

    pub fn cached(timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            high_accuracy: false,
            timeout,
            maximum_age,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("position request timed out")]
    Timeout,
    #[error("geolocation provider error: {0}")]
    Provider(String),
}

/// Device location source.
///
/// Calls return immediately. Results of `request_position` are delivered
/// later through `LocationSession::handle_position` with the same request id,
/// and watch samples through `LocationSession::handle_watch_position`.
pub trait GeolocationProvider {
    fn request_position(&mut self, request: RequestId, options: PositionOptions);

    fn watch_position(&mut self, options: PositionOptions) -> Result<WatchId, GeolocationError>;

    fn clear_watch(&mut self, watch: WatchId);
}
