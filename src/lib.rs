//! # Geokit
//!
//! A small location toolkit: a controller that owns a connection to a location
//! provider, fans location changes out to registered listeners, and resolves
//! the current position to a human-readable address on a background worker.
//!
//! ## Features
//!
//! - `location`: the [`LocationController`](location::LocationController), listener
//!   registry and provider contracts. Pulls in `geocoder`.
//! - `geocoder`: the address resolver contract, message formatting and the
//!   task facility used to run lookups off the calling thread.
//! - `tokio`: a [`Spawner`](geocoder::Spawner) backed by `tokio::task::spawn_blocking`.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! geokit = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```rust,ignore
//! use geokit::location::{ControllerOptions, LocationController};
//!
//! let controller = LocationController::new(provider, resolver, ControllerOptions::default());
//! controller.register(listener);
//! if let Some(task) = controller.query_latest_address() {
//!     println!("{:?}", task.await);
//! }
//! ```

#[cfg(feature = "geocoder")]
pub use geokit_geocoder as geocoder;

#[cfg(feature = "location")]
pub use geokit_location as location;
