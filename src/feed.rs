//! Latest-snapshot feeds.
//!
//! Each persisted collection publishes its whole current state through a
//! [`Feed`]. Subscribers always see the newest snapshot and recompute whatever
//! they derive from it; intermediate snapshots may be skipped. Feeds are
//! independent of each other, so a consumer can see a schema change before the
//! matching log change.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub struct Feed<T> {
    tx: watch::Sender<T>,
}

impl<T> Feed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the snapshot. Subscribers are only woken when it differs from
    /// the current one. Returns whether anything changed.
    pub fn publish(&self, next: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Stream that yields the current snapshot first, then every change.
    pub fn stream(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
