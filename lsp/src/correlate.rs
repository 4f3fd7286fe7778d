//! Request correlation: id allocation and pending-response slots.
//!
//! Ids start at 1 and are never reused within a process lifetime. Each
//! in-flight request owns a oneshot slot; the reader task resolves it when
//! the matching response arrives. Responses may complete in any order.
//! A response for an unknown id (late arrival after a timeout, or a server
//! bug) is dropped without affecting any other slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, oneshot};

pub(crate) struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next request id and a slot for its response.
    pub async fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        (id, rx)
    }

    /// Deliver a response body to the slot registered for `id`.
    ///
    /// Returns `false` when no slot is waiting (late or unknown response).
    pub async fn resolve(&self, id: u64, body: Value) -> bool {
        let sender = self.pending.lock().await.remove(&id);
        match sender {
            Some(tx) => tx.send(body).is_ok(),
            None => false,
        }
    }

    /// Drop the slot for `id` without resolving it (timeout or failed write).
    /// A response arriving later is then an id-lookup miss.
    pub async fn abandon(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Reject every outstanding slot. Dropping the senders wakes each
    /// waiter with a channel-closed error, which the request path maps to
    /// a process-exited failure.
    pub async fn fail_all(&self) {
        self.pending.lock().await.clear();
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let correlator = Correlator::new();
        let (id1, _rx1) = correlator.register().await;
        let (id2, _rx2) = correlator.register().await;
        let (id3, _rx3) = correlator.register().await;
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(id3, 3);
    }

    #[tokio::test]
    async fn test_resolve_delivers_exactly_once() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register().await;

        assert!(correlator.resolve(id, json!({"result": 7})).await);
        assert_eq!(rx.await.unwrap()["result"], 7);

        // The slot is gone; a second response for the same id is a miss.
        assert!(!correlator.resolve(id, json!({"result": 8})).await);
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_does_not_disturb_other_slots() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register().await;

        assert!(!correlator.resolve(999, json!({"result": "stray"})).await);

        assert!(correlator.resolve(id, json!({"result": "mine"})).await);
        assert_eq!(rx.await.unwrap()["result"], "mine");
    }

    #[tokio::test]
    async fn test_fail_all_rejects_every_waiter() {
        let correlator = Correlator::new();
        let (_id1, rx1) = correlator.register().await;
        let (_id2, rx2) = correlator.register().await;
        let (_id3, rx3) = correlator.register().await;

        correlator.fail_all().await;

        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
        assert!(rx3.await.is_err());
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_abandon_makes_late_response_a_miss() {
        let correlator = Correlator::new();
        let (id, rx) = correlator.register().await;

        correlator.abandon(id).await;
        drop(rx);

        assert!(!correlator.resolve(id, json!({"result": "late"})).await);
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let correlator = Correlator::new();
        let (id_a, rx_a) = correlator.register().await;
        let (id_b, rx_b) = correlator.register().await;

        // Server answers the second request first.
        assert!(correlator.resolve(id_b, json!({"result": "b"})).await);
        assert!(correlator.resolve(id_a, json!({"result": "a"})).await);

        assert_eq!(rx_a.await.unwrap()["result"], "a");
        assert_eq!(rx_b.await.unwrap()["result"], "b");
    }
}
