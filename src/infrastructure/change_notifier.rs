//! Storage change notifications
//!
//! One broadcast channel shared by every category store. Events carry only a
//! sequence number: consumers re-query rather than inspect what changed.
//! The channel is created by the first `subscribe()`; commits before that
//! point are counted but not delivered.

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Monotonic commit counter for this process.
    pub sequence: u64,
}

pub type ChangeStream = BoxStream<'static, ChangeEvent>;

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

#[derive(Debug)]
struct NotifierInner {
    capacity: usize,
    sender: OnceLock<broadcast::Sender<ChangeEvent>>,
    sequence: AtomicU64,
    activations: AtomicUsize,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                capacity: capacity.max(1),
                sender: OnceLock::new(),
                sequence: AtomicU64::new(0),
                activations: AtomicUsize::new(0),
            }),
        }
    }

    /// Stream of events for commits made after this call.
    ///
    /// Sequences are strictly increasing per stream. A subscriber that falls
    /// more than `capacity` events behind receives one catch-up event carrying
    /// the latest sequence; buffered events at or below it are dropped.
    pub fn subscribe(&self) -> ChangeStream {
        let sender = self.inner.sender.get_or_init(|| {
            self.inner.activations.fetch_add(1, Ordering::SeqCst);
            info!(capacity = self.inner.capacity, "📡 Change notifications activated");
            broadcast::channel(self.inner.capacity).0
        });

        let inner = Arc::clone(&self.inner);
        let mut delivered = 0;
        BroadcastStream::new(sender.subscribe())
            .filter_map(move |received| {
                let event = match received {
                    Ok(event) => event,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change subscriber lagged; coalescing");
                        ChangeEvent {
                            sequence: inner.sequence.load(Ordering::SeqCst),
                        }
                    }
                };
                let fresh = event.sequence > delivered;
                if fresh {
                    delivered = event.sequence;
                }
                future::ready(fresh.then_some(event))
            })
            .boxed()
    }

    /// Record one successful commit and wake every subscriber.
    pub fn notify_commit(&self) -> u64 {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sender) = self.inner.sender.get() {
            // No live receivers is not an error.
            let _ = sender.send(ChangeEvent { sequence });
        }
        sequence
    }

    pub fn latest_sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    /// How many times the underlying channel has been created (0 or 1).
    pub fn activations(&self) -> usize {
        self.inner.activations.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.get().map_or(0, broadcast::Sender::receiver_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn activation_happens_once_for_many_subscribers() {
        let notifier = ChangeNotifier::new(8);
        assert_eq!(notifier.activations(), 0);

        let _a = notifier.subscribe();
        let _b = notifier.subscribe();
        let _c = notifier.clone().subscribe();

        assert_eq!(notifier.activations(), 1);
        assert_eq!(notifier.subscriber_count(), 3);
    }

    #[tokio::test]
    async fn each_subscriber_sees_each_commit_once() {
        let notifier = ChangeNotifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.notify_commit();

        assert_eq!(first.next().await, Some(ChangeEvent { sequence: 1 }));
        assert_eq!(second.next().await, Some(ChangeEvent { sequence: 1 }));
        assert!(timeout(Duration::from_millis(50), first.next()).await.is_err());
    }

    #[tokio::test]
    async fn commits_before_subscribe_are_not_replayed() {
        let notifier = ChangeNotifier::new(8);
        notifier.notify_commit();
        notifier.notify_commit();

        let mut stream = notifier.subscribe();
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());
        assert_eq!(notifier.latest_sequence(), 2);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_one_catch_up_event() {
        let notifier = ChangeNotifier::new(2);
        let mut stream = notifier.subscribe();

        for _ in 0..5 {
            notifier.notify_commit();
        }

        let catch_up = stream.next().await.expect("catch-up event");
        assert_eq!(catch_up.sequence, 5);
        // Events still buffered behind the lag are not replayed.
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());

        notifier.notify_commit();
        assert_eq!(stream.next().await, Some(ChangeEvent { sequence: 6 }));
    }
}
