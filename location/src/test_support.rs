//! Fakes shared by the unit tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use geokit_geocoder::{Address, AddressResolver, GeocodeError, Job, Spawner};

use crate::{
    ConnectionFailure, Location, LocationController, LocationError, LocationListener,
    LocationProvider, LocationResult, ProviderCallbacks, UpdateConfig,
};

/// Provider driven by the test through `emit_*`.
#[derive(Default)]
pub struct FakeProvider {
    connected: AtomicBool,
    fail_requests: AtomicBool,
    last: Mutex<Option<Location>>,
    callbacks: Mutex<Option<Arc<dyn ProviderCallbacks>>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    requests: AtomicUsize,
    removals: AtomicUsize,
    request_delay: Mutex<Duration>,
}

impl fmt::Debug for FakeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeProvider")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl FakeProvider {
    fn callbacks(&self) -> Arc<dyn ProviderCallbacks> {
        self.callbacks
            .lock()
            .unwrap()
            .clone()
            .expect("connect was never called")
    }

    pub fn set_last_location(&self, location: Option<Location>) {
        *self.last.lock().unwrap() = location;
    }

    /// Makes `request_updates` block for `delay` before returning.
    pub fn set_request_delay(&self, delay: Duration) {
        *self.request_delay.lock().unwrap() = delay;
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub fn emit_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.callbacks().on_connected();
    }

    pub fn emit_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.callbacks().on_disconnected();
    }

    pub fn emit_failure(&self, failure: ConnectionFailure) {
        self.connected.store(false, Ordering::SeqCst);
        self.callbacks().on_connection_failed(failure);
    }

    pub fn emit_location(&self, location: Location) {
        self.set_last_location(Some(location.clone()));
        self.callbacks().on_location_changed(location);
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn request_calls(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl LocationProvider for FakeProvider {
    fn connect(&self, callbacks: Arc<dyn ProviderCallbacks>) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.callbacks.lock().unwrap() = Some(callbacks);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request_updates(
        &self,
        config: &UpdateConfig,
        _callbacks: Arc<dyn ProviderCallbacks>,
    ) -> LocationResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.request_delay.lock().unwrap();
        thread::sleep(delay);
        config.validate()?;
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(LocationError::Platform {
                message: "request rejected".into(),
            });
        }
        Ok(())
    }

    fn remove_updates(&self, _callbacks: &Arc<dyn ProviderCallbacks>) {
        self.removals.fetch_add(1, Ordering::SeqCst);
    }

    fn last_location(&self) -> Option<Location> {
        self.last.lock().unwrap().clone()
    }
}

/// Resolver returning a canned response and recording its queries.
#[derive(Debug)]
pub struct FakeResolver {
    available: AtomicBool,
    response: Mutex<Result<Vec<Address>, GeocodeError>>,
    queries: Mutex<Vec<(f64, f64)>>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            response: Mutex::new(Ok(Vec::new())),
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl FakeResolver {
    pub fn respond(&self, response: Result<Vec<Address>, GeocodeError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<(f64, f64)> {
        self.queries.lock().unwrap().clone()
    }
}

impl AddressResolver for FakeResolver {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        _max_results: usize,
    ) -> Result<Vec<Address>, GeocodeError> {
        self.queries.lock().unwrap().push((latitude, longitude));
        self.response.lock().unwrap().clone()
    }
}

/// Spawner that holds jobs until the test runs them.
#[derive(Default)]
pub struct ManualSpawner {
    jobs: Mutex<Vec<Job>>,
}

impl fmt::Debug for ManualSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualSpawner")
            .field("queued", &self.queued())
            .finish()
    }
}

impl ManualSpawner {
    pub fn queued(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn run_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job();
        }
    }

    pub fn run_last(&self) {
        let job = self.jobs.lock().unwrap().pop();
        if let Some(job) = job {
            job();
        }
    }
}

impl Spawner for ManualSpawner {
    fn spawn(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LocationChanged,
    Connected,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<(usize, Event, Option<String>)>>>);

impl EventLog {
    fn push(&self, id: usize, event: Event, address: Option<String>) {
        self.0.lock().unwrap().push((id, event, address));
    }

    pub fn ids(&self) -> Vec<(usize, Event)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(id, event, _)| (*id, event.clone()))
            .collect()
    }

    pub fn addresses(&self) -> Vec<Option<String>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, address)| address.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Listener appending what it sees to a shared log.
pub struct RecordingListener {
    id: usize,
    log: EventLog,
    this: Weak<Self>,
    unregister_on_notify: AtomicBool,
}

impl RecordingListener {
    pub fn new(id: usize) -> (Arc<Self>, EventLog) {
        let log = EventLog::default();
        (Self::sharing(id, &log), log)
    }

    pub fn sharing(id: usize, log: &EventLog) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            log: log.clone(),
            this: this.clone(),
            unregister_on_notify: AtomicBool::new(false),
        })
    }

    pub fn unregister_on_notify(&self, enabled: bool) {
        self.unregister_on_notify.store(enabled, Ordering::SeqCst);
    }
}

impl LocationListener for RecordingListener {
    fn on_location_changed(&self, controller: &LocationController) {
        self.log
            .push(self.id, Event::LocationChanged, controller.latest_address());
        if self.unregister_on_notify.load(Ordering::SeqCst) {
            if let Some(this) = self.this.upgrade() {
                controller.unregister(&this);
            }
        }
    }

    fn on_provider_connected(&self, controller: &LocationController) {
        self.log
            .push(self.id, Event::Connected, controller.latest_address());
    }
}
