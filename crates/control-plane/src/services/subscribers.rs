// Subscriber registry
//
// Tracks live realtime connections and fans metric samples out to them.
// Decision: parking_lot RwLock map, snapshot-then-iterate, so register/deregister never wait on a broadcast
// Decision: Each subscriber owns a bounded queue drained by its connection task; a send that
//           cannot complete within the timeout evicts the subscriber
// Decision: Broadcasts are serialized so every subscriber sees samples in submission order

use chrono::{DateTime, Utc};
use futures::future::join_all;
use locust_dashboard_core::MetricSample;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Unique subscriber identifier (UUID v7, sortable by connect time)
pub type SubscriberId = Uuid;

/// Why a per-subscriber delivery failed. Never surfaced to the sample submitter.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SendFailure {
    #[error("subscriber connection closed")]
    Closed,

    #[error("subscriber did not accept the sample within {0:?}")]
    TimedOut(Duration),
}

/// Sending half of one subscriber's sample queue
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    connected_at: DateTime<Utc>,
    tx: mpsc::Sender<MetricSample>,
}

impl Subscriber {
    /// Create a subscriber and the receiving end its connection task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MetricSample>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            id: Uuid::now_v7(),
            connected_at: Utc::now(),
            tx,
        };
        (subscriber, rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    async fn deliver(&self, sample: MetricSample, timeout: Duration) -> Result<(), SendFailure> {
        match tokio::time::timeout(timeout, self.tx.send(sample)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendFailure::Closed),
            Err(_) => Err(SendFailure::TimedOut(timeout)),
        }
    }
}

/// Outcome of one broadcast. Observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Subscribers that accepted the sample
    pub delivered: usize,
    /// Subscribers that failed and were deregistered
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Held for the duration of a broadcast to keep per-subscriber ordering
    publish: Mutex<()>,
    send_timeout: Duration,
}

impl SubscriberRegistry {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            publish: Mutex::new(()),
            send_timeout,
        }
    }

    /// Add a subscriber. Returns false if it was already registered.
    pub fn register(&self, subscriber: Subscriber) -> bool {
        let id = subscriber.id;
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        let total = subscribers.len();
        drop(subscribers);

        tracing::info!(subscriber_id = %id, subscribers = total, "Subscriber registered");
        true
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn deregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let removed = subscribers.remove(&id);
        let total = subscribers.len();
        drop(subscribers);

        match removed {
            Some(subscriber) => {
                let connected_for = Utc::now() - subscriber.connected_at();
                tracing::info!(
                    subscriber_id = %id,
                    subscribers = total,
                    connected_secs = connected_for.num_seconds(),
                    "Subscriber deregistered"
                );
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Push `sample` to every registered subscriber.
    ///
    /// Each subscriber gets at most `send_timeout` to accept the sample; all
    /// sends run concurrently, so one stalled subscriber delays the next
    /// broadcast by at most that long. Failed subscribers are deregistered.
    pub async fn broadcast(&self, sample: &MetricSample) -> DeliveryReport {
        let _ordering = self.publish.lock().await;

        let snapshot: Vec<Subscriber> = self.subscribers.read().values().cloned().collect();
        if snapshot.is_empty() {
            return DeliveryReport::default();
        }

        let timeout = self.send_timeout;
        let outcomes = join_all(snapshot.iter().map(|subscriber| {
            let sample = sample.clone();
            async move { (subscriber.id, subscriber.deliver(sample, timeout).await) }
        }))
        .await;

        let mut report = DeliveryReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    report.failed += 1;
                    tracing::warn!(subscriber_id = %id, error = %failure, "Dropping subscriber");
                    self.deregister(id);
                }
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            bytes = sample.len(),
            "Sample broadcast"
        );
        report
    }
}
