use log::error;

use crate::{AddressResolver, GeocodeError, Messages};

/// Number of candidates requested from the resolver.
pub const MAX_RESULTS: usize = 1;

/// Resolves coordinates to display text. Blocks for as long as the resolver does.
///
/// Failures never escape: they are logged and turned into the matching
/// [`Messages`] text, so the result is always something to show.
pub fn lookup_address(
    resolver: &dyn AddressResolver,
    messages: &dyn Messages,
    latitude: f64,
    longitude: f64,
) -> String {
    match resolver.resolve(latitude, longitude, MAX_RESULTS) {
        Ok(addresses) => addresses.first().map_or_else(
            || messages.no_address_found(),
            |address| {
                messages.format_address(
                    address.street_line(),
                    address.locality.as_deref().unwrap_or_default(),
                    address.country_name.as_deref().unwrap_or_default(),
                )
            },
        ),
        Err(GeocodeError::InvalidCoordinates { .. }) => {
            let text = messages.invalid_coordinates(latitude, longitude);
            error!("{text}");
            text
        }
        Err(err) => {
            let text = messages.io_error();
            error!("{text}: {err}");
            text
        }
    }
}
