use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::types::PriceUpdate;
use crate::error::PriceFeedError;

/// Callback invoked with each batch of price updates.
pub type PriceListener = Arc<dyn Fn(&[PriceUpdate]) -> anyhow::Result<()> + Send + Sync>;

/// Registered price listeners, in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, PriceListener)>>,
}

impl ListenerRegistry {
    pub fn register(&self, listener: PriceListener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().push((id, listener));
        debug!(listener_id = id, "price listener registered");
        id
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(lid, _)| *lid != id);
        let removed = entries.len() != before;
        if removed {
            debug!(listener_id = id, "price listener removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Deliver a batch to every listener registered at call time.
    ///
    /// The list is copied before delivery so listeners may subscribe or
    /// unsubscribe from inside their callback. Returns how many listeners
    /// accepted the batch.
    pub fn notify(&self, updates: &[PriceUpdate]) -> usize {
        let listeners: Vec<(u64, PriceListener)> = self.entries.lock().clone();

        listeners
            .iter()
            .filter(|(id, listener)| deliver(*id, listener, updates))
            .count()
    }
}

/// Invoke one listener, containing both errors and panics.
pub(crate) fn deliver(id: u64, listener: &PriceListener, updates: &[PriceUpdate]) -> bool {
    let reason = match catch_unwind(AssertUnwindSafe(|| listener(updates))) {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };

    let err = PriceFeedError::Listener {
        listener_id: id,
        reason,
    };
    error!(listener_id = id, error = %err, "error notifying price update listener");
    false
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Handle for a registered price listener.
///
/// Dropping the handle unsubscribes; keep it alive for as long as updates
/// are wanted.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {}

    /// True while the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.entries.lock().iter().any(|(id, _)| *id == self.id))
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
