//! Single-slot correlator — turns one asynchronous reply into a bounded wait.
//!
//! The slot holds `{pending, reply}`. A cycle is `reset` → publish →
//! `await_reply`, with `deliver` called from the reply routing task.
//!
//! Policies:
//!   - Several deliveries while pending: last write wins.
//!   - Delivery while nothing is pending: discarded. A reply that arrives
//!     after its waiter timed out can never surface in a later cycle.
//!   - Clear on read: once a reply is consumed (or the wait timed out) the
//!     slot is idle, so a second `await_reply` without `reset` waits anew
//!     and times out.
//!   - `abandon` ends the cycle and wakes the waiter with `Abandoned`.
//!
//! One slot serves one outstanding request. Callers that need several in
//! flight use [`PendingReplies`](crate::PendingReplies) instead.

use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("no reply before the deadline")]
    Timeout,
    /// The wait was torn down before a reply or the deadline.
    #[error("wait abandoned")]
    Abandoned,
}

#[derive(Debug, Default)]
struct Slot {
    pending: bool,
    reply: Option<Value>,
}

#[derive(Debug, Default)]
pub struct Correlator {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any stored reply and start waiting for exactly one new one.
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.pending = true;
        slot.reply = None;
    }

    /// Hand a reply to the waiter. Returns false if it was discarded.
    pub fn deliver(&self, reply: Value) -> bool {
        {
            let mut slot = self.lock();
            if !slot.pending {
                return false;
            }
            if slot.reply.is_some() {
                tracing::debug!("unconsumed reply overwritten");
            }
            slot.reply = Some(reply);
        }
        self.notify.notify_waiters();
        true
    }

    /// Wait for a delivery or the deadline, whichever comes first.
    ///
    /// Returns [`CorrelationError::Abandoned`] if [`abandon`](Self::abandon)
    /// ends the cycle while we wait.
    pub async fn await_reply(&self, deadline: Instant) -> Result<Value, CorrelationError> {
        let mut woken = false;
        loop {
            // Register interest before checking the slot so a delivery
            // between the check and the wait still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slot = self.lock();
                if let Some(reply) = slot.reply.take() {
                    slot.pending = false;
                    return Ok(reply);
                }
                if woken && !slot.pending {
                    return Err(CorrelationError::Abandoned);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let mut slot = self.lock();
                slot.pending = false;
                return slot.reply.take().ok_or(CorrelationError::Timeout);
            }
            woken = true;
        }
    }

    /// Return the slot to idle and wake any waiter with `Abandoned`.
    pub fn abandon(&self) {
        {
            let mut slot = self.lock();
            slot.pending = false;
            slot.reply = None;
        }
        self.notify.notify_waiters();
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The slot holds plain data; a panic elsewhere cannot leave it torn.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
