//! Counting admission gate backed by a pre-filled token channel.
//!
//! The gate circulates `capacity` slot tokens through a bounded mpsc
//! channel: taking a token from the receiver is an acquire, sending it back
//! (on `Permit` drop) is the release. Waiters queue on the receiver mutex,
//! so eventual admission is guaranteed as long as holders keep releasing;
//! strict FIFO order is not promised.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Token circulating between the gate and issued permits. Exactly one
/// exists per admission slot; the slot index only shows up in diagnostics.
struct SlotToken {
    slot: usize,
}

/// Construction-time errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("permit capacity must be positive")]
    ZeroCapacity,
}

/// Errors from a blocking [`PermitGate::acquire`].
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("wait for a permit was cancelled")]
    Cancelled,
}

/// Admission guard. Dropping it is the release: the slot token goes back to
/// the gate and the next waiter can be admitted.
pub struct Permit {
    token: Option<SlotToken>,
    return_tx: mpsc::Sender<SlotToken>,
    available: Arc<AtomicUsize>,
}

impl Permit {
    fn new(token: SlotToken, return_tx: mpsc::Sender<SlotToken>, available: Arc<AtomicUsize>) -> Self {
        Self {
            token: Some(token),
            return_tx,
            available,
        }
    }

    /// Index of the admission slot this permit was issued on.
    pub fn slot(&self) -> usize {
        // `token` is only taken in drop.
        self.token.as_ref().map(|t| t.slot).unwrap_or_default()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            let slot = token.slot;
            if self.return_tx.try_send(token).is_ok() {
                self.available.fetch_add(1, Ordering::Release);
                tracing::trace!(slot, "permit returned to gate");
            } else {
                tracing::error!(slot, "failed to return permit to gate");
            }
        }
    }
}

/// Counting admission gate: at most `capacity` permits are out at any
/// instant.
pub struct PermitGate {
    available_rx: Mutex<mpsc::Receiver<SlotToken>>,
    available_tx: mpsc::Sender<SlotToken>,
    capacity: usize,
    available: Arc<AtomicUsize>,
}

impl PermitGate {
    /// Create a gate with `capacity` permits, all initially available.
    pub fn new(capacity: usize) -> Result<Arc<Self>, GateError> {
        if capacity == 0 {
            return Err(GateError::ZeroCapacity);
        }

        let (tx, rx) = mpsc::channel(capacity);
        for slot in 0..capacity {
            // The channel holds exactly `capacity` tokens, so this cannot fill up.
            if let Err(e) = tx.try_send(SlotToken { slot }) {
                tracing::error!(slot, error = %e, "failed to seed gate slot");
            }
        }

        Ok(Arc::new(Self {
            available_rx: Mutex::new(rx),
            available_tx: tx,
            capacity,
            available: Arc::new(AtomicUsize::new(capacity)),
        }))
    }

    /// Block until a permit is free, or until `cancel` fires.
    ///
    /// Cancellation while waiting consumes nothing: the available count is
    /// untouched and no permit is issued.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, AcquireError> {
        // Fail fast: a select between a ready token and a ready cancel picks
        // at random, and an already-cancelled caller must never be admitted.
        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let mut rx = tokio::select! {
            guard = self.available_rx.lock() => guard,
            _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
        };

        let token = tokio::select! {
            token = rx.recv() => {
                // The gate owns a sender for the return path, so the channel
                // cannot close while `self` is alive.
                token.expect("gate holds the permit return sender")
            }
            _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
        };
        drop(rx);

        self.available.fetch_sub(1, Ordering::Release);
        tracing::trace!(slot = token.slot, "permit issued");

        Ok(Permit::new(
            token,
            self.available_tx.clone(),
            Arc::clone(&self.available),
        ))
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut rx = self.available_rx.try_lock().ok()?;
        let token = rx.try_recv().ok()?;
        self.available.fetch_sub(1, Ordering::Release);

        Some(Permit::new(
            token,
            self.available_tx.clone(),
            Arc::clone(&self.available),
        ))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free. Advisory: the value can change before the
    /// caller acts on it.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(PermitGate::new(0), Err(GateError::ZeroCapacity)));
    }

    #[tokio::test]
    async fn new_gate_has_all_permits_available() {
        let gate = PermitGate::new(3).unwrap();
        assert_eq!(gate.capacity(), 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn acquire_decrements_and_drop_restores() {
        let gate = PermitGate::new(2).unwrap();
        let cancel = CancellationToken::new();

        let permit = gate.acquire(&cancel).await.unwrap();
        assert_eq!(gate.available(), 1);

        drop(permit);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn try_acquire_exhausts_at_capacity() {
        let gate = PermitGate::new(2).unwrap();

        let p1 = gate.try_acquire();
        assert!(p1.is_some());

        let p2 = gate.try_acquire();
        assert!(p2.is_some());

        assert!(gate.try_acquire().is_none());

        drop(p1);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn cancelled_acquire_consumes_nothing() {
        let gate = PermitGate::new(1).unwrap();
        let cancel = CancellationToken::new();

        let held = gate.acquire(&cancel).await.unwrap();
        assert_eq!(gate.available(), 0);

        let waiter_cancel = CancellationToken::new();
        let waiter_gate = Arc::clone(&gate);
        let waiter_token = waiter_cancel.clone();
        let waiter = tokio::spawn(async move { waiter_gate.acquire(&waiter_token).await });

        // Let the waiter block, then cancel it.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        waiter_cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(AcquireError::Cancelled)));

        // The held permit is still the only one out.
        assert_eq!(gate.available(), 0);
        drop(held);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn release_wakes_a_blocked_waiter() {
        let gate = PermitGate::new(1).unwrap();
        let cancel = CancellationToken::new();

        let held = gate.acquire(&cancel).await.unwrap();

        let waiter_gate = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            waiter_gate.acquire(&cancel).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn already_cancelled_token_fails_immediately() {
        let gate = PermitGate::new(1).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = gate.acquire(&cancel).await;
        assert!(matches!(result, Err(AcquireError::Cancelled)));
        assert_eq!(gate.available(), 1);
    }
}
