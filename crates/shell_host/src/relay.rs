use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shell_protocol::channel::NotificationSender;
use shell_protocol::{Notification, StreamEvent};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Ordered, uncoalesced delivery of host notifications to the UI.
///
/// Every notification is forwarded exactly once in emission order. Once the
/// receiving side is gone the relay latches into a disconnected state.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    tx: NotificationSender,
    disconnected: Arc<AtomicBool>,
}

impl StreamRelay {
    #[must_use]
    pub fn new(tx: NotificationSender) -> Self {
        Self {
            tx,
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Forwards one turn event. Returns false when the UI side is gone.
    pub fn emit_event(&self, event: StreamEvent) -> bool {
        tracing::debug!(kind = event.kind(), "relay stream event");
        self.notify(Notification::StreamEvent(event))
    }

    pub fn notify(&self, notification: Notification) -> bool {
        if self.tx.send(notification).is_ok() {
            return true;
        }

        if !self.disconnected.swap(true, Ordering::SeqCst) {
            tracing::warn!("notification channel closed; UI is no longer listening");
        }
        false
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    /// Cancels `token` as soon as the UI side disconnects.
    ///
    /// The watch stops when the returned guard is dropped.
    #[must_use]
    pub fn cancel_on_disconnect(&self, token: CancellationToken) -> DropGuard {
        let stop = CancellationToken::new();
        let guard = stop.clone().drop_guard();
        let tx = self.tx.clone();
        let disconnected = Arc::clone(&self.disconnected);

        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tx.closed() => {
                    disconnected.store(true, Ordering::SeqCst);
                    tracing::warn!("UI disconnected mid-turn; cancelling turn");
                    token.cancel();
                }
            }
        });

        guard
    }
}
