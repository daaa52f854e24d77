//! Status notifications from the engine to a subscriber.
//!
//! The [`StatusBus`] is bounded, ordered, and single-consumer. What happens
//! when it is full is decided by [`OverflowPolicy`]:
//!
//! | policy       | channel                  | full bus                       |
//! |--------------|--------------------------|--------------------------------|
//! | `Block`      | `tokio::sync::mpsc`      | publisher waits for room       |
//! | `DropOldest` | `tokio::sync::broadcast` | oldest snapshot is overwritten |
//!
//! The single receiver is created with the bus, so snapshots published
//! before [`subscribe()`](StatusBus::subscribe) is called are buffered, not
//! lost. With `Block`, a bus whose receiver is never taken stalls publishers
//! once it is full; they still observe cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hc_core::{FileRecord, OverflowPolicy, StatusBusConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// What happened to a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The snapshot was queued for the subscriber.
    Delivered,
    /// The cancellation token fired before the snapshot could be queued.
    Cancelled,
    /// The subscriber dropped its receiver.
    NoReceiver,
}

#[derive(Debug, Default)]
struct BusCounters {
    published: AtomicU64,
    dropped: AtomicU64,
    cancelled: AtomicU64,
    undelivered: AtomicU64,
}

/// Point-in-time bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Snapshots queued.
    pub published: u64,
    /// Snapshots overwritten before the subscriber read them.
    pub dropped: u64,
    /// Publishes abandoned because of cancellation.
    pub cancelled: u64,
    /// Publishes that found no receiver.
    pub undelivered: u64,
}

enum Sender {
    Block(mpsc::Sender<FileRecord>),
    DropOldest(broadcast::Sender<FileRecord>),
}

enum Receiver {
    Block(mpsc::Receiver<FileRecord>),
    DropOldest(broadcast::Receiver<FileRecord>),
}

/// Bounded channel of record snapshots.
///
/// # Examples
///
/// ```
/// use hc_sync::{PublishOutcome, StatusBus};
/// use hc_core::{FileRecord, StatusBusConfig};
/// use camino::Utf8PathBuf;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = StatusBus::new(&StatusBusConfig::default());
/// let mut rx = bus.subscribe().unwrap();
/// assert!(bus.subscribe().is_none());
///
/// let cancel = CancellationToken::new();
/// let record = FileRecord::removed(Utf8PathBuf::from("/watch/a.txt"));
/// assert_eq!(bus.publish(record, &cancel).await, PublishOutcome::Delivered);
///
/// let received = rx.recv().await.unwrap();
/// assert_eq!(received.path.as_str(), "/watch/a.txt");
/// # }
/// ```
pub struct StatusBus {
    policy: OverflowPolicy,
    capacity: usize,
    sender: Sender,
    receiver: Mutex<Option<Receiver>>,
    counters: Arc<BusCounters>,
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("subscribed", &self.receiver.lock().is_none())
            .finish_non_exhaustive()
    }
}

impl StatusBus {
    /// Creates a bus. A zero capacity is raised to one.
    ///
    /// For [`OverflowPolicy::DropOldest`] the capacity is rounded up to the
    /// next power of two.
    #[must_use]
    pub fn new(config: &StatusBusConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = match config.overflow {
            OverflowPolicy::Block => {
                let (tx, rx) = mpsc::channel(capacity);
                (Sender::Block(tx), Receiver::Block(rx))
            }
            OverflowPolicy::DropOldest => {
                let (tx, rx) = broadcast::channel(capacity);
                (Sender::DropOldest(tx), Receiver::DropOldest(rx))
            }
        };

        Self {
            policy: config.overflow,
            capacity,
            sender,
            receiver: Mutex::new(Some(receiver)),
            counters: Arc::new(BusCounters::default()),
        }
    }

    /// Takes the receiver. Returns `None` once it has been taken.
    pub fn subscribe(&self) -> Option<StatusReceiver> {
        self.receiver.lock().take().map(|inner| StatusReceiver {
            inner,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Queues a snapshot for the subscriber.
    ///
    /// Returns [`PublishOutcome::Cancelled`] without queueing if `cancel` has
    /// already fired, or fires while waiting for room.
    pub async fn publish(&self, record: FileRecord, cancel: &CancellationToken) -> PublishOutcome {
        let outcome = if cancel.is_cancelled() {
            PublishOutcome::Cancelled
        } else {
            match &self.sender {
                Sender::Block(tx) => tokio::select! {
                    biased;
                    () = cancel.cancelled() => PublishOutcome::Cancelled,
                    sent = tx.send(record) => match sent {
                        Ok(()) => PublishOutcome::Delivered,
                        Err(_) => PublishOutcome::NoReceiver,
                    },
                },
                Sender::DropOldest(tx) => match tx.send(record) {
                    Ok(_) => PublishOutcome::Delivered,
                    Err(_) => PublishOutcome::NoReceiver,
                },
            }
        };

        let counter = match outcome {
            PublishOutcome::Delivered => &self.counters.published,
            PublishOutcome::Cancelled => &self.counters.cancelled,
            PublishOutcome::NoReceiver => &self.counters.undelivered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Returns the overflow policy.
    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Returns a snapshot of the bus counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let c = &self.counters;
        BusStats {
            published: c.published.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            undelivered: c.undelivered.load(Ordering::Relaxed),
        }
    }
}

/// The subscriber side of a [`StatusBus`].
pub struct StatusReceiver {
    inner: Receiver,
    counters: Arc<BusCounters>,
}

impl std::fmt::Debug for StatusReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReceiver").finish_non_exhaustive()
    }
}

impl StatusReceiver {
    /// Receives the next snapshot.
    ///
    /// Returns `None` once the bus has been dropped and drained. Under
    /// [`OverflowPolicy::DropOldest`], overwritten snapshots are skipped
    /// and counted in [`BusStats::dropped`].
    pub async fn recv(&mut self) -> Option<FileRecord> {
        match &mut self.inner {
            Receiver::Block(rx) => rx.recv().await,
            Receiver::DropOldest(rx) => loop {
                match rx.recv().await {
                    Ok(record) => return Some(record),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        record_lag(&self.counters, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }

    /// Receives a queued snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<FileRecord> {
        match &mut self.inner {
            Receiver::Block(rx) => rx.try_recv().ok(),
            Receiver::DropOldest(rx) => loop {
                match rx.try_recv() {
                    Ok(record) => return Some(record),
                    Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                        record_lag(&self.counters, missed);
                    }
                    Err(_) => return None,
                }
            },
        }
    }

    /// Returns the number of snapshots this receiver has missed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

fn record_lag(counters: &BusCounters, missed: u64) {
    tracing::warn!(missed, "Status subscriber lagged, oldest snapshots dropped");
    counters.dropped.fetch_add(missed, Ordering::Relaxed);
}
