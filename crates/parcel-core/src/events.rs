//! Lifecycle event bus.
//!
//! The orchestrator publishes [`PackageEvent`]s to an injected [`EventBus`];
//! observers hold a [`Subscription`] and drain it at their own pace. Publishing
//! never blocks.
//!
//! The bus and its subscriptions only know each other weakly: the bus keeps
//! the sending half of each subscription, a subscription keeps a [`Weak`]
//! handle back to the bus so it can deregister itself on drop. Neither keeps
//! the other alive.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use parcel_schema::Urn;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::{Error, ErrorKind};
use crate::package::{Artifact, Package};

/// Discriminant of a [`PackageEvent`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FetchStarted,
    FetchCompleted,
    FetchFailed,
    DownloadStarted,
    DownloadProgress,
    DownloadCompleted,
    DownloadFailed,
    InstallStarted,
    InstallProgress,
    InstallCompleted,
    InstallFailed,
}

impl EventKind {
    pub const ALL: [Self; 11] = [
        Self::FetchStarted,
        Self::FetchCompleted,
        Self::FetchFailed,
        Self::DownloadStarted,
        Self::DownloadProgress,
        Self::DownloadCompleted,
        Self::DownloadFailed,
        Self::InstallStarted,
        Self::InstallProgress,
        Self::InstallCompleted,
        Self::InstallFailed,
    ];

    /// Whether this kind ends a step.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::FetchCompleted
                | Self::FetchFailed
                | Self::DownloadCompleted
                | Self::DownloadFailed
                | Self::InstallCompleted
                | Self::InstallFailed
        )
    }
}

/// Snapshot of the record an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub urn: Urn,
    pub title: String,
}

impl From<&Package> for PackageRef {
    fn from(package: &Package) -> Self {
        Self {
            urn: package.urn().clone(),
            title: package.title.clone(),
        }
    }
}

/// Cloneable failure payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for EventError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A lifecycle notification about one package.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageEvent {
    FetchStarted {
        package: PackageRef,
    },
    FetchCompleted {
        package: PackageRef,
    },
    FetchFailed {
        package: PackageRef,
        error: EventError,
    },
    DownloadStarted {
        package: PackageRef,
    },
    DownloadProgress {
        package: PackageRef,
        received: u64,
        total: Option<u64>,
    },
    DownloadCompleted {
        package: PackageRef,
        artifact: Artifact,
    },
    DownloadFailed {
        package: PackageRef,
        error: EventError,
    },
    InstallStarted {
        package: PackageRef,
    },
    /// Fraction in `0.0..=1.0`.
    InstallProgress {
        package: PackageRef,
        fraction: f64,
    },
    InstallCompleted {
        package: PackageRef,
    },
    InstallFailed {
        package: PackageRef,
        error: EventError,
    },
}

impl PackageEvent {
    /// Discriminant used for filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FetchStarted { .. } => EventKind::FetchStarted,
            Self::FetchCompleted { .. } => EventKind::FetchCompleted,
            Self::FetchFailed { .. } => EventKind::FetchFailed,
            Self::DownloadStarted { .. } => EventKind::DownloadStarted,
            Self::DownloadProgress { .. } => EventKind::DownloadProgress,
            Self::DownloadCompleted { .. } => EventKind::DownloadCompleted,
            Self::DownloadFailed { .. } => EventKind::DownloadFailed,
            Self::InstallStarted { .. } => EventKind::InstallStarted,
            Self::InstallProgress { .. } => EventKind::InstallProgress,
            Self::InstallCompleted { .. } => EventKind::InstallCompleted,
            Self::InstallFailed { .. } => EventKind::InstallFailed,
        }
    }

    /// The package this event is about.
    pub fn package(&self) -> &PackageRef {
        match self {
            Self::FetchStarted { package }
            | Self::FetchCompleted { package }
            | Self::FetchFailed { package, .. }
            | Self::DownloadStarted { package }
            | Self::DownloadProgress { package, .. }
            | Self::DownloadCompleted { package, .. }
            | Self::DownloadFailed { package, .. }
            | Self::InstallStarted { package }
            | Self::InstallProgress { package, .. }
            | Self::InstallCompleted { package }
            | Self::InstallFailed { package, .. } => package,
        }
    }

    /// The failure carried by a `*Failed` event.
    pub fn error(&self) -> Option<&EventError> {
        match self {
            Self::FetchFailed { error, .. }
            | Self::DownloadFailed { error, .. }
            | Self::InstallFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Which events a subscription receives.
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(HashSet<EventKind>),
}

impl EventFilter {
    /// Accept only the given kinds.
    pub fn only(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self::Only(kinds.into_iter().collect())
    }

    /// Whether events of `kind` pass this filter.
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

struct Subscriber {
    id: u64,
    filter: EventFilter,
    tx: UnboundedSender<PackageEvent>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Inner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.subscribers().retain(|s| s.id != id);
    }
}

/// Cloneable publish/subscribe handle.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// A bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber receiving events that pass `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();
        self.inner.subscribers().push(Subscriber { id, filter, tx });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            rx,
        }
    }

    /// Deliver `event` to every matching subscriber.
    pub fn publish(&self, event: PackageEvent) {
        let kind = event.kind();
        let mut subscribers = self.inner.subscribers();
        // A failed send means the receiver is gone.
        subscribers.retain(|s| !s.filter.matches(kind) || s.tx.send(event.clone()).is_ok());
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Receiving end of a bus subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    bus: Weak<Inner>,
    rx: UnboundedReceiver<PackageEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<PackageEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<PackageEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<PackageEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop receiving events. Dropping the subscription does the same.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}
