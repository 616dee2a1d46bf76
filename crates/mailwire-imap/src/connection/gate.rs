//! Upgrade gate.
//!
//! While a stream upgrade is in flight the gate is closed and every caller of
//! [`UpgradeGate::wait`] parks; reopening releases all of them at once.

use tokio::sync::{Mutex, MutexGuard, watch};

/// Blocks I/O callers while the connection swaps its stream.
#[derive(Debug)]
pub(crate) struct UpgradeGate {
    closed: watch::Sender<bool>,
    exclusive: Mutex<()>,
}

impl UpgradeGate {
    pub(crate) fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            closed,
            exclusive: Mutex::new(()),
        }
    }

    /// Closes the gate until the returned guard is dropped.
    ///
    /// Only one holder at a time; a second caller waits for the first guard.
    pub(crate) async fn close(&self) -> GateGuard<'_> {
        let exclusive = self.exclusive.lock().await;
        self.closed.send_replace(true);
        GateGuard {
            gate: self,
            _exclusive: exclusive,
        }
    }

    /// Waits until no upgrade is in flight. Returns at once if the gate is open.
    pub(crate) async fn wait(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|closed| !closed).await;
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Reopens the gate on drop, on every exit path of an upgrade.
pub(crate) struct GateGuard<'a> {
    gate: &'a UpgradeGate,
    _exclusive: MutexGuard<'a, ()>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.closed.send_replace(false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_open_gate_does_not_block() {
        let gate = UpgradeGate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.wait())
            .await
            .unwrap();
        assert!(!gate.is_closed());
    }

    #[tokio::test]
    async fn test_waiters_released_together() {
        let gate = Arc::new(UpgradeGate::new());
        let guard = gate.close().await;
        assert!(gate.is_closed());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        drop(guard);
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
        assert!(!gate.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_exclusive() {
        let gate = Arc::new(UpgradeGate::new());
        let first = gate.close().await;

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _guard = gate.close().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        drop(first);
        second.await.unwrap();
        assert!(!gate.is_closed());
    }
}
