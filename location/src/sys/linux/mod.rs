//! Linux location provider using the GeoClue2 D-Bus service.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use log::{debug, error, warn};
use zbus::Connection;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::{
    ConnectionFailure, Location, LocationError, LocationProvider, LocationResult,
    ProviderCallbacks, UpdateConfig, now_millis,
};

const SERVICE: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_INTERFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_INTERFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_INTERFACE: &str = "org.freedesktop.GeoClue2.Location";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Accuracy levels from the GeoClue2 `GClueAccuracyLevel` enum.
const ACCURACY_CITY: u32 = 4;
const ACCURACY_STREET: u32 = 6;
const ACCURACY_EXACT: u32 = 8;

/// Upper bound on one poll sleep so `remove_updates` takes effect promptly.
const POLL_SLICE: Duration = Duration::from_millis(250);

#[derive(Clone)]
struct Session {
    connection: Connection,
    client_path: OwnedObjectPath,
}

#[derive(Default)]
struct Shared {
    session: Mutex<Option<Session>>,
    last_location: Mutex<Option<Location>>,
    callbacks: Mutex<Option<Arc<dyn ProviderCallbacks>>>,
    poller: Mutex<Option<Arc<AtomicBool>>>,
    disconnect_requested: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Provider backed by GeoClue2 on the system bus.
///
/// `connect` performs the client handshake on a worker thread. Update
/// subscriptions poll the client's current `Location` object at the
/// configured interval.
pub struct GeoClueProvider {
    desktop_id: String,
    shared: Arc<Shared>,
}

impl fmt::Debug for GeoClueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoClueProvider")
            .field("desktop_id", &self.desktop_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl GeoClueProvider {
    /// Creates a provider that identifies itself to GeoClue with `desktop_id`.
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    fn stop_poller(&self) {
        if let Some(stop) = lock(&self.shared.poller).take() {
            stop.store(true, Ordering::SeqCst);
        }
    }

    fn is_polling(&self) -> bool {
        lock(&self.shared.poller).is_some()
    }
}

impl Default for GeoClueProvider {
    fn default() -> Self {
        Self::new("geokit")
    }
}

impl LocationProvider for GeoClueProvider {
    fn connect(&self, callbacks: Arc<dyn ProviderCallbacks>) {
        *lock(&self.shared.callbacks) = Some(callbacks.clone());
        self.shared
            .disconnect_requested
            .store(false, Ordering::SeqCst);
        let shared = self.shared.clone();
        let desktop_id = self.desktop_id.clone();

        let spawned = thread::Builder::new()
            .name("geoclue-connect".into())
            .spawn(move || match block_on(start_client(&desktop_id)) {
                Ok(session) => {
                    {
                        let mut slot = lock(&shared.session);
                        if shared.disconnect_requested.load(Ordering::SeqCst) {
                            drop(slot);
                            debug!("disconnected while GeoClue2 client was starting");
                            if let Err(err) = block_on(stop_client(&session)) {
                                warn!("failed to stop GeoClue2 client: {err}");
                            }
                            return;
                        }
                        *slot = Some(session);
                    }
                    callbacks.on_connected();
                }
                Err(err) => {
                    error!("failed to connect to GeoClue2: {err}");
                    callbacks.on_connection_failed(ConnectionFailure::new(err.to_string(), false));
                }
            });

        if let Err(err) = spawned {
            error!("failed to spawn GeoClue2 connect thread: {err}");
        }
    }

    fn disconnect(&self) {
        self.shared
            .disconnect_requested
            .store(true, Ordering::SeqCst);
        self.stop_poller();
        *lock(&self.shared.last_location) = None;
        let session = lock(&self.shared.session).take();
        if let Some(session) = session {
            if let Err(err) = block_on(stop_client(&session)) {
                warn!("failed to stop GeoClue2 client: {err}");
            }
            let callbacks = lock(&self.shared.callbacks).clone();
            if let Some(callbacks) = callbacks {
                callbacks.on_disconnected();
            }
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.shared.session).is_some()
    }

    fn request_updates(
        &self,
        config: &UpdateConfig,
        callbacks: Arc<dyn ProviderCallbacks>,
    ) -> LocationResult<()> {
        config.validate()?;
        let session = lock(&self.shared.session)
            .clone()
            .ok_or(LocationError::NotConnected)?;

        block_on(set_accuracy(&session, accuracy_level(config)))
            .map_err(|err| LocationError::Platform { message: err.to_string() })?;

        self.stop_poller();
        let stop = Arc::new(AtomicBool::new(false));
        *lock(&self.shared.poller) = Some(stop.clone());

        let shared = self.shared.clone();
        let interval = config.interval();
        thread::Builder::new()
            .name("geoclue-poll".into())
            .spawn(move || poll(&session, &shared, &callbacks, &stop, interval))
            .map_err(|err| LocationError::Platform {
                message: format!("failed to spawn GeoClue2 poll thread: {err}"),
            })?;
        Ok(())
    }

    fn remove_updates(&self, _callbacks: &Arc<dyn ProviderCallbacks>) {
        self.stop_poller();
    }

    fn last_location(&self) -> Option<Location> {
        let cached = lock(&self.shared.last_location).clone();
        // The poller keeps the cache current while a subscription is active.
        if cached.is_some() && self.is_polling() {
            return cached;
        }

        let session = lock(&self.shared.session).clone()?;
        match block_on(read_location(&session)) {
            Ok(location) => {
                *lock(&self.shared.last_location) = Some(location.clone());
                Some(location)
            }
            Err(err) => {
                debug!("GeoClue2 location read failed, using cached fix: {err}");
                cached
            }
        }
    }
}

impl Drop for GeoClueProvider {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

fn accuracy_level(config: &UpdateConfig) -> u32 {
    match config.priority {
        crate::Priority::HighAccuracy => ACCURACY_EXACT,
        crate::Priority::BalancedPowerAccuracy => ACCURACY_STREET,
        crate::Priority::LowPower | crate::Priority::NoPower => ACCURACY_CITY,
    }
}

fn poll(
    session: &Session,
    shared: &Shared,
    callbacks: &Arc<dyn ProviderCallbacks>,
    stop: &AtomicBool,
    interval: Duration,
) {
    while !stop.load(Ordering::SeqCst) {
        match block_on(read_location(session)) {
            Ok(location) => {
                *lock(&shared.last_location) = Some(location.clone());
                callbacks.on_location_changed(location);
            }
            Err(err) => warn!("GeoClue2 location poll failed: {err}"),
        }

        let mut waited = Duration::ZERO;
        while waited < interval && !stop.load(Ordering::SeqCst) {
            let slice = POLL_SLICE.min(interval - waited);
            thread::sleep(slice);
            waited += slice;
        }
    }
}

async fn start_client(desktop_id: &str) -> zbus::Result<Session> {
    let connection = Connection::system().await?;

    let (client_path,): (OwnedObjectPath,) = connection
        .call_method(
            Some(SERVICE),
            MANAGER_PATH,
            Some(MANAGER_INTERFACE),
            "GetClient",
            &(),
        )
        .await?
        .body()
        .deserialize()?;

    // GeoClue2 refuses to start clients without a desktop id.
    connection
        .call_method(
            Some(SERVICE),
            client_path.as_str(),
            Some(PROPERTIES_INTERFACE),
            "Set",
            &(CLIENT_INTERFACE, "DesktopId", Value::from(desktop_id)),
        )
        .await?;

    connection
        .call_method(
            Some(SERVICE),
            client_path.as_str(),
            Some(CLIENT_INTERFACE),
            "Start",
            &(),
        )
        .await?;

    Ok(Session {
        connection,
        client_path,
    })
}

async fn stop_client(session: &Session) -> zbus::Result<()> {
    session
        .connection
        .call_method(
            Some(SERVICE),
            session.client_path.as_str(),
            Some(CLIENT_INTERFACE),
            "Stop",
            &(),
        )
        .await?;
    Ok(())
}

async fn set_accuracy(session: &Session, level: u32) -> zbus::Result<()> {
    session
        .connection
        .call_method(
            Some(SERVICE),
            session.client_path.as_str(),
            Some(PROPERTIES_INTERFACE),
            "Set",
            &(CLIENT_INTERFACE, "RequestedAccuracyLevel", Value::from(level)),
        )
        .await?;
    Ok(())
}

async fn get_property(
    connection: &Connection,
    path: &str,
    interface: &str,
    name: &str,
) -> zbus::Result<OwnedValue> {
    let value: OwnedValue = connection
        .call_method(
            Some(SERVICE),
            path,
            Some(PROPERTIES_INTERFACE),
            "Get",
            &(interface, name),
        )
        .await?
        .body()
        .deserialize()?;
    Ok(value)
}

async fn get_f64(connection: &Connection, path: &str, name: &str) -> zbus::Result<f64> {
    let value = get_property(connection, path, LOCATION_INTERFACE, name).await?;
    Ok(f64::try_from(value)?)
}

async fn read_location(session: &Session) -> zbus::Result<Location> {
    let connection = &session.connection;
    let value = get_property(
        connection,
        session.client_path.as_str(),
        CLIENT_INTERFACE,
        "Location",
    )
    .await?;
    let location_path = OwnedObjectPath::try_from(value)?;
    // GeoClue reports "/" until the first fix arrives.
    if location_path.as_str() == "/" {
        return Err(zbus::Error::Failure("no fix yet".into()));
    }
    let path = location_path.as_str();

    let latitude = get_f64(connection, path, "Latitude").await?;
    let longitude = get_f64(connection, path, "Longitude").await?;
    // GeoClue uses -f64::MAX for an unknown altitude.
    let altitude = get_f64(connection, path, "Altitude")
        .await
        .ok()
        .filter(|altitude| *altitude > -f64::MAX);
    let accuracy = get_f64(connection, path, "Accuracy").await.ok();

    Ok(Location {
        latitude,
        longitude,
        altitude,
        horizontal_accuracy: accuracy,
        vertical_accuracy: None,
        timestamp: now_millis(),
    })
}
