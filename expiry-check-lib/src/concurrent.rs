//! Concurrency primitives owned by the dispatcher.
//!
//! [`ConcurrencyBudget`] is a counting semaphore limiting how many probes run
//! at once. [`CompletionBarrier`] is a wait group counting outstanding units of
//! work. Both hand out guards, so a unit of work gives its slot back and
//! signals completion on every exit path, panics included.

use crate::error::ExpiryCheckError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Fixed number of probes allowed to run concurrently.
#[derive(Debug, Clone)]
pub struct ConcurrencyBudget {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of the budget. Returned to the budget when dropped.
#[derive(Debug)]
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyBudget {
    /// Create a budget of `capacity` slots. Zero is a configuration error.
    pub fn new(capacity: usize) -> Result<Self, ExpiryCheckError> {
        if capacity == 0 {
            return Err(ExpiryCheckError::config(
                "Concurrency budget must be at least 1",
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Take one slot, waiting while all slots are in use.
    pub async fn acquire(&self) -> Result<ConcurrencySlot, ExpiryCheckError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExpiryCheckError::internal("Concurrency budget is closed"))?;

        Ok(ConcurrencySlot { _permit: permit })
    }

    /// Refuse any further acquisitions. Slots already handed out stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a unit of work.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Counts outstanding units of work and lets the dispatcher wait for all of
/// them to finish.
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    inner: Arc<BarrierState>,
}

#[derive(Debug, Default)]
struct BarrierState {
    outstanding: AtomicUsize,
    notify: Notify,
}

/// Registration of one unit of work with a [`CompletionBarrier`].
/// Dropping it marks the unit as done.
#[derive(Debug)]
pub struct CompletionToken {
    inner: Arc<BarrierState>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding unit of work.
    pub fn add(&self) -> CompletionToken {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        CompletionToken {
            inner: self.inner.clone(),
        }
    }

    /// Number of registered units that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Wait until every registered unit of work has finished.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register interest before checking, so a release between the
            // check and the await is not missed
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }

            notified.await;
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
