use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::thread;

use async_channel::{Receiver, Sender, unbounded};
use futures::channel::oneshot;
use log::{error, warn};

use crate::{AddressResolver, Messages, lookup_address};

/// A unit of work handed to a [`Spawner`] or [`Dispatcher`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking work off the calling thread.
pub trait Spawner: Send + Sync + fmt::Debug {
    /// Runs `job` on some worker. Dropping the job instead of running it is
    /// allowed; any [`AddressTask`] waiting on it then resolves to `None`.
    fn spawn(&self, job: Job);
}

/// Target that completion callbacks are delivered on.
pub trait Dispatcher: Send + Sync + fmt::Debug {
    /// Schedules `job` on the dispatch target.
    fn dispatch(&self, job: Job);
}

/// Spawns one named OS thread per job.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    name: String,
}

impl ThreadSpawner {
    /// Creates a spawner whose threads carry the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::named("geokit-address-lookup")
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) {
        if let Err(err) = thread::Builder::new().name(self.name.clone()).spawn(job) {
            error!("failed to spawn {} thread: {err}", self.name);
        }
    }
}

/// Runs jobs on tokio's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioSpawner {
    /// Creates a spawner for the given runtime.
    #[must_use]
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a spawner for the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "tokio")]
impl Spawner for TokioSpawner {
    fn spawn(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

/// Runs completions directly on the worker that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Sending half of a dispatch queue. See [`dispatch_queue`].
#[derive(Clone)]
pub struct QueueDispatcher {
    sender: Sender<Job>,
}

impl fmt::Debug for QueueDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDispatcher")
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, job: Job) {
        if self.sender.try_send(job).is_err() {
            warn!("dropping completion: dispatch queue closed");
        }
    }
}

/// Receiving half of a dispatch queue, drained by the thread that should
/// observe completions (a UI loop, an async task, a test).
pub struct DispatchQueue {
    receiver: Receiver<Job>,
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("queued", &self.receiver.len())
            .finish()
    }
}

impl DispatchQueue {
    /// Runs every queued job without waiting. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits for one job and runs it. Returns `false` once every
    /// [`QueueDispatcher`] is gone and the queue is empty.
    pub async fn run_one(&self) -> bool {
        match self.receiver.recv().await {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Runs jobs as they arrive until every [`QueueDispatcher`] is dropped.
    pub async fn run(&self) {
        while self.run_one().await {}
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Creates a dispatcher whose jobs run wherever the returned queue is drained.
#[must_use]
pub fn dispatch_queue() -> (QueueDispatcher, DispatchQueue) {
    let (sender, receiver) = unbounded();
    (QueueDispatcher { sender }, DispatchQueue { receiver })
}

/// Handle to an in-flight address lookup.
///
/// Resolves to the looked-up text once the completion has run on the
/// dispatcher, or to `None` if the job was dropped first. Dropping the handle
/// does not cancel the lookup.
#[derive(Debug)]
#[must_use = "use `detach` to drop the handle without waiting"]
pub struct AddressTask {
    receiver: oneshot::Receiver<String>,
}

impl AddressTask {
    /// Lets the lookup finish in the background.
    pub fn detach(self) {}

    /// Returns the result if the completion has already run.
    pub fn try_take(&mut self) -> Option<String> {
        self.receiver.try_recv().ok().flatten()
    }
}

impl Future for AddressTask {
    type Output = Option<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs reverse geocoding lookups in the background.
///
/// Each call to [`spawn`](Self::spawn) is independent: concurrent lookups are
/// not serialized, and their completions run in whatever order the workers
/// finish.
#[derive(Debug, Clone)]
pub struct AddressLookup {
    resolver: Arc<dyn AddressResolver>,
    messages: Arc<dyn Messages>,
    spawner: Arc<dyn Spawner>,
    dispatcher: Arc<dyn Dispatcher>,
    pending: Arc<AtomicUsize>,
}

impl AddressLookup {
    /// Creates a lookup runner.
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        messages: Arc<dyn Messages>,
        spawner: Arc<dyn Spawner>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            resolver,
            messages,
            spawner,
            dispatcher,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether the resolver has a backend to talk to.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.resolver.is_available()
    }

    /// Number of lookups spawned whose completion has not run yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolves the coordinates on the spawner, then runs `on_complete` with
    /// the text on the dispatcher before fulfilling the returned task.
    pub fn spawn<F>(&self, latitude: f64, longitude: f64, on_complete: F) -> AddressTask
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let guard = PendingGuard::new(&self.pending);
        let resolver = self.resolver.clone();
        let messages = self.messages.clone();
        let dispatcher = self.dispatcher.clone();

        self.spawner.spawn(Box::new(move || {
            let text = lookup_address(resolver.as_ref(), messages.as_ref(), latitude, longitude);
            dispatcher.dispatch(Box::new(move || {
                on_complete(&text);
                drop(guard);
                // The caller may have detached.
                let _ = sender.send(text);
            }));
        }));

        AddressTask { receiver }
    }
}
