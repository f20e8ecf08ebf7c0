//! Simulated provider and resolver for the demo.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use geokit_geocoder::{Address, AddressResolver, GeocodeError};
use geokit_location::{
    Location, LocationError, LocationProvider, LocationResult, ProviderCallbacks, UpdateConfig,
};
use log::{debug, error};

const CONNECT_DELAY: Duration = Duration::from_millis(200);
const LOOKUP_LATENCY: Duration = Duration::from_millis(80);
const EARTH_RADIUS_KM: f64 = 6371.0;
const MATCH_RADIUS_KM: f64 = 30.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A drive from Paris to Rome with a detour over the Ligurian Sea.
pub fn route() -> Vec<Location> {
    [
        (48.8566, 2.3522),
        (47.3220, 5.0415),
        (45.7640, 4.8357),
        (45.0703, 7.6869),
        (43.6000, 8.5000),
        (44.4056, 8.9463),
        (43.7696, 11.2558),
        (41.9028, 12.4964),
    ]
    .into_iter()
    .map(|(latitude, longitude)| Location::new(latitude, longitude).with_accuracy(15.0))
    .collect()
}

#[derive(Default)]
struct Inner {
    connected: AtomicBool,
    position: Mutex<Option<Location>>,
    driver: Mutex<Option<Arc<AtomicBool>>>,
}

/// Provider replaying a fixed route in a loop.
pub struct SimulatedProvider {
    route: Arc<Vec<Location>>,
    inner: Arc<Inner>,
}

impl fmt::Debug for SimulatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedProvider")
            .field("stops", &self.route.len())
            .field("connected", &self.inner.connected.load(Ordering::SeqCst))
            .finish()
    }
}

impl SimulatedProvider {
    pub fn new(route: Vec<Location>) -> Self {
        let inner = Inner {
            position: Mutex::new(route.first().cloned()),
            ..Inner::default()
        };
        Self {
            route: Arc::new(route),
            inner: Arc::new(inner),
        }
    }

    fn stop_driver(&self) {
        if let Some(stop) = lock(&self.inner.driver).take() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

impl LocationProvider for SimulatedProvider {
    fn connect(&self, callbacks: Arc<dyn ProviderCallbacks>) {
        let inner = self.inner.clone();
        thread::spawn(move || {
            thread::sleep(CONNECT_DELAY);
            inner.connected.store(true, Ordering::SeqCst);
            callbacks.on_connected();
        });
    }

    fn disconnect(&self) {
        self.stop_driver();
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn request_updates(
        &self,
        config: &UpdateConfig,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> LocationResult<()> {
        if !self.is_connected() {
            return Err(LocationError::NotConnected);
        }
        config.validate()?;
        self.stop_driver();

        let stop = Arc::new(AtomicBool::new(false));
        *lock(&self.inner.driver) = Some(stop.clone());
        let route = self.route.clone();
        let inner = self.inner.clone();
        let interval = config.interval();

        thread::spawn(move || {
            for location in route.iter().cycle() {
                thread::sleep(interval);
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                *lock(&inner.position) = Some(location.clone());
                callbacks.on_location_changed(location.clone());
            }
        });
        Ok(())
    }

    fn remove_updates(&self, _callbacks: &Arc<dyn ProviderCallbacks>) {
        self.stop_driver();
    }

    fn last_location(&self) -> Option<Location> {
        lock(&self.inner.position).clone()
    }
}

struct Place {
    street: &'static str,
    locality: &'static str,
    country: &'static str,
    latitude: f64,
    longitude: f64,
}

const fn place(
    street: &'static str,
    locality: &'static str,
    country: &'static str,
    latitude: f64,
    longitude: f64,
) -> Place {
    Place {
        street,
        locality,
        country,
        latitude,
        longitude,
    }
}

/// Resolver matching coordinates against a fixed list of places.
pub struct PlaceTable {
    places: Vec<Place>,
}

impl fmt::Debug for PlaceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceTable")
            .field("places", &self.places.len())
            .finish()
    }
}

impl PlaceTable {
    pub fn europe() -> Self {
        Self {
            places: vec![
                place("5 Avenue Anatole France", "Paris", "France", 48.8584, 2.2945),
                place("Place de la Libération", "Dijon", "France", 47.3215, 5.0411),
                place("Place Bellecour", "Lyon", "France", 45.7578, 4.8320),
                place("Piazza Castello", "Torino", "Italy", 45.0711, 7.6856),
                place("Piazza De Ferrari", "Genova", "Italy", 44.4073, 8.9339),
                place("Piazza della Signoria", "Firenze", "Italy", 43.7696, 11.2556),
                place("Piazza Venezia", "Roma", "Italy", 41.8960, 12.4823),
            ],
        }
    }
}

fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

impl AddressResolver for PlaceTable {
    fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodeError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            error!("rejecting out-of-range coordinates {latitude}, {longitude}");
            return Err(GeocodeError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        thread::sleep(LOOKUP_LATENCY);

        let mut matches: Vec<(f64, &Place)> = self
            .places
            .iter()
            .map(|place| {
                let distance = distance_km(latitude, longitude, place.latitude, place.longitude);
                (distance, place)
            })
            .filter(|(distance, _)| *distance <= MATCH_RADIUS_KM)
            .collect();
        matches.sort_by(|a, b| a.0.total_cmp(&b.0));
        debug!("{} place(s) within {MATCH_RADIUS_KM} km", matches.len());

        Ok(matches
            .into_iter()
            .take(max_results)
            .map(|(_, place)| Address {
                latitude: Some(place.latitude),
                longitude: Some(place.longitude),
                ..Address::new(place.street, place.locality, place.country)
            })
            .collect())
    }
}
