use std::fmt;
use std::sync::Arc;

use crate::{Location, LocationResult, UpdateConfig};

/// Why a provider failed to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFailure {
    /// Platform description of the failure.
    pub message: String,
    /// Whether the platform offers a way for the user to resolve it.
    pub has_resolution: bool,
}

impl ConnectionFailure {
    /// Creates a failure report.
    pub fn new(message: impl Into<String>, has_resolution: bool) -> Self {
        Self {
            message: message.into(),
            has_resolution,
        }
    }
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if self.has_resolution {
            f.write_str(" (resolvable)")?;
        }
        Ok(())
    }
}

/// Connection lifecycle of a provider as seen through its callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, or disconnected by the owner or the platform.
    #[default]
    Disconnected,
    /// `connect` was issued and no outcome has been reported yet.
    Connecting,
    /// The provider reported a connection.
    Connected,
    /// The provider reported a connection failure.
    Failed(ConnectionFailure),
}

/// Events a [`LocationProvider`] reports back to its owner.
///
/// Providers may invoke these from any thread, including synchronously from
/// within `connect` or `disconnect`. Location updates must not be delivered
/// synchronously from `request_updates` or `remove_updates`.
pub trait ProviderCallbacks: Send + Sync {
    /// The provider finished connecting.
    fn on_connected(&self);

    /// The provider lost its connection.
    fn on_disconnected(&self);

    /// A new location arrived from an active update subscription.
    fn on_location_changed(&self, location: Location);

    /// Connecting failed.
    fn on_connection_failed(&self, failure: ConnectionFailure);
}

/// A source of device locations.
///
/// The provider owns its connection lifecycle. Its owner calls
/// [`connect`](Self::connect) once and learns the outcome through the
/// [`ProviderCallbacks`] it passed in.
pub trait LocationProvider: Send + Sync + fmt::Debug {
    /// Starts connecting. The outcome is reported through `callbacks`.
    fn connect(&self, callbacks: Arc<dyn ProviderCallbacks>);

    /// Drops the connection and any update subscription.
    fn disconnect(&self);

    /// Whether the provider is currently connected.
    fn is_connected(&self) -> bool;

    /// Subscribes `callbacks` to continuous updates. Calling again replaces
    /// the previous configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not connected or rejects the
    /// configuration.
    fn request_updates(
        &self,
        config: &UpdateConfig,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> LocationResult<()>;

    /// Cancels the update subscription held by `callbacks`.
    fn remove_updates(&self, callbacks: &Arc<dyn ProviderCallbacks>);

    /// Best last-known location, if the provider has one.
    fn last_location(&self) -> Option<Location>;
}
