use std::sync::Arc;

use tokio::sync::watch;

/// One-shot completion signal with any number of waiters.
///
/// Cloning hands out another handle to the same signal. Once fired, the
/// signal stays fired; firing again has no effect.
#[derive(Debug, Clone)]
pub struct Completion {
    tx: Arc<watch::Sender<bool>>,
}

impl Completion {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal, waking all current waiters. Returns true only for
    /// the call that actually fired it.
    pub fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the signal fires; returns immediately when it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so this cannot fail
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// Fires the wrapped signal when dropped.
pub struct FireOnDrop(pub Completion);

impl Drop for FireOnDrop {
    fn drop(&mut self) {
        self.0.fire();
    }
}
