//! Reverse geocoding for location controllers.
//!
//! This crate defines the [`AddressResolver`] contract implemented by a host
//! geocoding service, the [`Messages`] collaborator that turns lookup outcomes
//! into user-facing text, and a small task facility ([`Spawner`],
//! [`Dispatcher`], [`AddressLookup`]) that runs the blocking lookup off the
//! calling thread and delivers the result on a caller-chosen target.

#![warn(missing_docs)]

mod lookup;
mod messages;
mod task;

pub use lookup::{MAX_RESULTS, lookup_address};
pub use messages::{EnglishMessages, Messages, TemplateMessages};
#[cfg(feature = "tokio")]
pub use task::TokioSpawner;
pub use task::{
    AddressLookup, AddressTask, DispatchQueue, Dispatcher, ImmediateDispatcher, Job,
    QueueDispatcher, Spawner, ThreadSpawner, dispatch_queue,
};

use serde::{Deserialize, Serialize};

/// A postal address returned by a reverse geocoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Formatted address lines, most specific first (usually the street line).
    #[serde(default)]
    pub lines: Vec<String>,
    /// Locality, usually a city.
    pub locality: Option<String>,
    /// Country name.
    pub country_name: Option<String>,
    /// Postal code, if known.
    pub postal_code: Option<String>,
    /// Latitude of the matched feature, if reported.
    pub latitude: Option<f64>,
    /// Longitude of the matched feature, if reported.
    pub longitude: Option<f64>,
}

impl Address {
    /// Creates an address from a street line, locality and country.
    #[must_use]
    pub fn new(
        street: impl Into<String>,
        locality: impl Into<String>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            lines: vec![street.into()],
            locality: Some(locality.into()),
            country_name: Some(country_name.into()),
            ..Self::default()
        }
    }

    /// Returns the street line, or an empty string if the address has none.
    #[must_use]
    pub fn street_line(&self) -> &str {
        self.lines.first().map_or("", String::as_str)
    }
}

/// Errors reported by an [`AddressResolver`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    /// The geocoding service could not be reached or failed mid-request.
    #[error("geocoder I/O failure: {0}")]
    Io(String),
    /// The coordinates were out of range.
    #[error("invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
    /// No geocoding backend is present.
    #[error("geocoder not available")]
    Unavailable,
}

impl From<std::io::Error> for GeocodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A reverse geocoding backend.
///
/// `resolve` is expected to block (network or disk I/O); callers run it
/// through a [`Spawner`].
pub trait AddressResolver: Send + Sync + std::fmt::Debug {
    /// Whether a geocoding backend is present at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Returns up to `max_results` addresses near the given coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Io`] on service failure and
    /// [`GeocodeError::InvalidCoordinates`] for out-of-range input.
    fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodeError>;
}
