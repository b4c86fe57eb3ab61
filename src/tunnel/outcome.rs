use parking_lot::Mutex;
use tokio::sync::Notify;

/// Write-once result cell: the first `settle` wins, later attempts are
/// no-ops, and any number of waiters observe the settled value.
pub(crate) struct OutcomeSlot<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T: Clone> OutcomeSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Settle the slot. Returns true when this call performed the settle.
    pub(crate) fn settle(&self, value: T) -> bool {
        {
            let mut slot = self.value.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        self.notify.notify_waiters();
        true
    }

    /// The settled value, if any.
    pub(crate) fn peek(&self) -> Option<T> {
        self.value.lock().clone()
    }

    /// Wait until the slot settles, then return the value.
    pub(crate) async fn wait(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(value) = self.peek() {
                return value;
            }
            notified.await;
        }
    }
}
