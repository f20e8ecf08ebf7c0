//! Location tracking with listener fan-out.
//!
//! [`LocationController`] owns a connection to a [`LocationProvider`], caches
//! the latest position and resolved address, and notifies registered
//! [`LocationListener`]s when either changes. Address resolution runs on a
//! background worker through [`geokit_geocoder::AddressLookup`].

#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod listener;
mod provider;

pub mod sys;

#[cfg(test)]
mod test_support;

pub use config::{
    DEFAULT_FASTEST_INTERVAL_MS, DEFAULT_UPDATE_INTERVAL_MS, Priority, UpdateConfig,
};
pub use controller::{ControllerOptions, LocationController};
pub use error::{LocationError, LocationResult};
pub use listener::{ListenerRegistry, LocationListener};
pub use provider::{ConnectionFailure, ConnectionState, LocationProvider, ProviderCallbacks};

pub use geokit_geocoder::{Address, AddressResolver, AddressTask, GeocodeError, Messages};

use serde::{Deserialize, Serialize};

/// A geographic location with coordinates and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Altitude in meters above sea level, if available.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters, if available.
    #[serde(default)]
    pub horizontal_accuracy: Option<f64>,
    /// Vertical accuracy in meters, if available.
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Location {
    /// Creates a location at the given coordinates, stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            horizontal_accuracy: None,
            vertical_accuracy: None,
            timestamp: now_millis(),
        }
    }

    /// Returns a copy with the given horizontal accuracy.
    #[must_use]
    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.horizontal_accuracy = Some(meters);
        self
    }

    /// Whether latitude and longitude are finite and in range.
    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
