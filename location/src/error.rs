/// Errors that can occur when talking to a location provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The provider has no active connection.
    #[error("location provider not connected")]
    NotConnected,
    /// An update configuration was rejected.
    #[error("invalid update configuration: {message}")]
    InvalidConfig {
        /// What was wrong with it.
        message: String,
    },
    /// A configuration or payload could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying parser message.
        message: String,
    },
    /// The platform backend reported a failure.
    #[error("platform error: {message}")]
    Platform {
        /// Platform message.
        message: String,
    },
}

impl From<serde_json::Error> for LocationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Convenient result alias for location operations.
pub type LocationResult<T> = Result<T, LocationError>;
