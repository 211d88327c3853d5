//! Fire-and-forget refresh requests from the query path.
//!
//! The queue holds at most one pending request. Submitting while one is
//! already pending is a no-op, so a burst of feed queries costs one extra
//! refresh cycle at most.

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Clone)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
}

impl RefreshTrigger {
    /// Never blocks. Returns `true` when a new request was queued and `false`
    /// when it coalesced into one already pending (or the worker is gone).
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Refresh already pending, request coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Receiving end, owned by the refresh worker.
pub struct RefreshRequests {
    rx: mpsc::Receiver<()>,
}

impl RefreshRequests {
    /// Waits for the next request; `None` once every trigger is dropped.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

pub fn refresh_queue() -> (RefreshTrigger, RefreshRequests) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshTrigger { tx }, RefreshRequests { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_coalesce_while_pending() {
        let (trigger, mut requests) = refresh_queue();
        assert!(trigger.request());
        assert!(!trigger.request());
        assert!(!trigger.clone().request());

        assert_eq!(requests.next().await, Some(()));
        assert!(trigger.request());
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_block() {
        let (trigger, requests) = refresh_queue();
        drop(requests);
        assert!(!trigger.request());
    }

    #[tokio::test]
    async fn test_worker_sees_end_of_stream() {
        let (trigger, mut requests) = refresh_queue();
        drop(trigger);
        assert_eq!(requests.next().await, None);
    }
}
