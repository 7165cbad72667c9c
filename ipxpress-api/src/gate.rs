//! Fixed-capacity gate bounding concurrent transform work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ipxpress_core::{require_positive, ConfigError, IpxError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::telemetry::with_metrics;

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Counting semaphore of `capacity` transform slots.
///
/// A slot is represented by a [`GatePermit`]; dropping the permit is the only
/// way to release it, so every exit path releases exactly once. Clones share
/// the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        require_positive("processing_limit", capacity as u64)?;
        Ok(Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        })
    }

    /// Wait for a free slot.
    ///
    /// # Errors
    /// `GateClosed` once [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<GatePermit, IpxError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| IpxError::GateClosed)?;
        Ok(self.admit(permit))
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        Arc::clone(&self.inner.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        with_metrics(|m| m.set_gate_in_flight(now));
        GatePermit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Refuse new acquisitions. Held permits stay valid.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots ever held at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// One held slot. Released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<GateInner>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let now = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        with_metrics(|m| m.set_gate_in_flight(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ConcurrencyGate::new(0),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_permit_released_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let a = gate.try_acquire().unwrap();
        let b = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
        assert_eq!(gate.peak(), 2);
    }

    #[test]
    fn test_permit_released_on_panic() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let cloned = gate.clone();
        let result = std::thread::spawn(move || {
            let _permit = cloned.try_acquire().unwrap();
            panic!("transform blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_closed_gate_refuses() {
        let gate = ConcurrencyGate::new(1).unwrap();
        gate.close();
        assert!(matches!(gate.acquire().await, Err(IpxError::GateClosed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peak_never_exceeds_capacity() {
        let gate = ConcurrencyGate::new(3).unwrap();
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let gate = gate.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                assert!(gate.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(gate.peak() <= 3);
        assert_eq!(gate.in_flight(), 0);
    }
}
