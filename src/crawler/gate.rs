//! Admission gate bounding simultaneous fetch attempts
//!
//! One gate is created per coordinator run and shared by every fetch in that
//! run. A slot is held only for the duration of a single render attempt and is
//! returned when the permit drops, on every exit path.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// A held gate slot; dropping it frees the slot
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Fixed-capacity counting gate
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Creates a gate with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits until a slot is free and takes it
    ///
    /// # Returns
    ///
    /// * `Ok(GatePermit)` - The slot, released on drop
    /// * `Err(AcquireError)` - The gate was closed
    pub async fn acquire(&self) -> Result<GatePermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}
