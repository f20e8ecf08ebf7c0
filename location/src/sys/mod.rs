//! Platform-specific location providers.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::GeoClueProvider;
