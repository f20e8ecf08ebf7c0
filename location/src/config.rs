use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LocationError, LocationResult};

/// Default interval between location updates.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 5_000;

/// Default ceiling on how fast updates may arrive.
pub const DEFAULT_FASTEST_INTERVAL_MS: u64 = 1_000;

/// Trade-off between accuracy and power use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Most accurate fix available, usually GPS.
    #[default]
    HighAccuracy,
    /// Block-level accuracy.
    BalancedPowerAccuracy,
    /// City-level accuracy.
    LowPower,
    /// Only passively receive fixes requested by others.
    NoPower,
}

/// Configuration for continuous location updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Desired interval between updates in milliseconds.
    pub interval_ms: u64,
    /// Fastest rate the caller can handle, in milliseconds.
    pub fastest_interval_ms: u64,
    /// Accuracy priority.
    pub priority: Priority,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            fastest_interval_ms: DEFAULT_FASTEST_INTERVAL_MS,
            priority: Priority::default(),
        }
    }
}

impl UpdateConfig {
    /// Sets the update interval.
    #[must_use]
    pub const fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Sets the fastest interval ceiling.
    #[must_use]
    pub const fn with_fastest_interval(mut self, fastest_interval_ms: u64) -> Self {
        self.fastest_interval_ms = fastest_interval_ms;
        self
    }

    /// Sets the accuracy priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Update interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Fastest interval as a [`Duration`].
    #[must_use]
    pub const fn fastest_interval(&self) -> Duration {
        Duration::from_millis(self.fastest_interval_ms)
    }

    /// Checks that the intervals are usable.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidConfig`] if the interval is zero or the
    /// fastest interval exceeds it.
    pub fn validate(&self) -> LocationResult<()> {
        if self.interval_ms == 0 {
            return Err(LocationError::InvalidConfig {
                message: "interval must be greater than zero".into(),
            });
        }
        if self.fastest_interval_ms > self.interval_ms {
            return Err(LocationError::InvalidConfig {
                message: format!(
                    "fastest interval {}ms exceeds interval {}ms",
                    self.fastest_interval_ms, self.interval_ms
                ),
            });
        }
        Ok(())
    }

    /// Parses and validates a configuration. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Serialization`] for malformed JSON and
    /// [`LocationError::InvalidConfig`] if validation fails.
    pub fn from_json(json: &str) -> LocationResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> LocationResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
