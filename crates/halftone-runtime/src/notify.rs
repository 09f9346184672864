//! Live event notification.
//!
//! Subscribers register per aggregate and receive committed records over
//! a bounded channel, best-effort in emission order. A full queue drops
//! the record for that subscriber rather than stalling the fan-out loop;
//! a closed receiver unregisters itself on the next broadcast.

use std::collections::HashMap;

use halftone_types::{EventRecord, ImageGraphId};
use tokio::sync::mpsc;
use tracing::warn;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<EventRecord>,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<EventRecord>,
}

#[derive(Default)]
struct NotifierInner {
    next_subscriber_id: u64,
    subscribers: HashMap<ImageGraphId, Vec<Subscriber>>,
}

#[derive(Default)]
pub struct Notifier {
    inner: parking_lot::Mutex<NotifierInner>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, graph_id: &ImageGraphId) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut inner = self.inner.lock();
        inner.next_subscriber_id += 1;
        let id = inner.next_subscriber_id;
        inner
            .subscribers
            .entry(graph_id.clone())
            .or_default()
            .push(Subscriber { id, tx });
        Subscription { id, rx }
    }

    pub fn unregister(&self, graph_id: &ImageGraphId, subscriber_id: u64) {
        let mut inner = self.inner.lock();
        if let Some(subscribers) = inner.subscribers.get_mut(graph_id) {
            subscribers.retain(|subscriber| subscriber.id != subscriber_id);
            if subscribers.is_empty() {
                inner.subscribers.remove(graph_id);
            }
        }
    }

    pub fn broadcast(&self, graph_id: &ImageGraphId, record: &EventRecord) {
        let mut inner = self.inner.lock();
        let Some(subscribers) = inner.subscribers.get_mut(graph_id) else {
            return;
        };
        subscribers.retain(|subscriber| match subscriber.tx.try_send(record.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    %graph_id,
                    subscriber = subscriber.id,
                    kind = ?record.kind,
                    "subscriber queue full, dropping event"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if subscribers.is_empty() {
            inner.subscribers.remove(graph_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halftone_types::EventKind;

    fn record(graph_id: &ImageGraphId, version: u64) -> EventRecord {
        EventRecord::new(EventKind::Created, graph_id.clone(), version)
    }

    #[tokio::test]
    async fn broadcast_reaches_only_matching_subscribers() {
        let notifier = Notifier::new();
        let graph_a = ImageGraphId::generate();
        let graph_b = ImageGraphId::generate();

        let mut sub_a = notifier.register(&graph_a);
        let mut sub_b = notifier.register(&graph_b);

        notifier.broadcast(&graph_a, &record(&graph_a, 1));
        assert_eq!(
            sub_a.rx.recv().await.expect("record").aggregate_id,
            graph_a
        );
        assert!(sub_b.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_preserves_emission_order() {
        let notifier = Notifier::new();
        let graph_id = ImageGraphId::generate();
        let mut subscription = notifier.register(&graph_id);

        for version in 1..=5 {
            notifier.broadcast(&graph_id, &record(&graph_id, version));
        }
        for version in 1..=5 {
            assert_eq!(
                subscription
                    .rx
                    .recv()
                    .await
                    .expect("record")
                    .aggregate_version,
                version
            );
        }
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let notifier = Notifier::new();
        let graph_id = ImageGraphId::generate();
        let subscription = notifier.register(&graph_id);

        for version in 0..(SUBSCRIBER_QUEUE_CAPACITY as u64 + 10) {
            notifier.broadcast(&graph_id, &record(&graph_id, version));
        }
        // no deadlock, and the subscriber is still registered
        drop(subscription);
        notifier.broadcast(&graph_id, &record(&graph_id, 0));
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let notifier = Notifier::new();
        let graph_id = ImageGraphId::generate();
        let mut subscription = notifier.register(&graph_id);

        notifier.unregister(&graph_id, subscription.id);
        notifier.broadcast(&graph_id, &record(&graph_id, 1));
        assert!(subscription.rx.try_recv().is_err());
    }
}
