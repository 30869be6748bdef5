use std::collections::VecDeque;

use tokio::sync::{Mutex, Semaphore};

use crate::dispatch::job::Job;
use crate::error::{DispatchError, Result};

/// Bounded multi-producer multi-consumer FIFO between the discovery loop
/// and the worker pool.
///
/// Capacity is fixed at construction to the total concurrent capacity of
/// the host fleet, so the queue never holds more admissible work than the
/// fleet could absorb. `insert` blocks when full (the system's primary
/// backpressure point), `take` blocks when empty.
#[derive(Debug)]
pub struct WorkQueue {
    items: Mutex<VecDeque<Job>>,
    /// Free slots; acquired by `insert`, returned by `take`.
    slots: Semaphore,
    /// Queued items; acquired by `take`, returned by `insert`.
    ready: Semaphore,
    capacity: usize,
}

impl WorkQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Append a job, waiting for a free slot when the queue is full.
    /// Fails only once the queue has been closed for shutdown.
    pub async fn insert(&self, job: Job) -> Result<()> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| DispatchError::QueueClosed)?;
        permit.forget();
        self.items.lock().await.push_back(job);
        self.ready.add_permits(1);
        Ok(())
    }

    /// Remove the oldest job, waiting when the queue is empty.
    /// Fails only once the queue has been closed for shutdown.
    pub async fn take(&self) -> Result<Job> {
        let permit = self
            .ready
            .acquire()
            .await
            .map_err(|_| DispatchError::QueueClosed)?;
        permit.forget();
        let job = self
            .items
            .lock()
            .await
            .pop_front()
            // Each ready permit corresponds to exactly one queued job.
            .expect("ready permit without a queued job");
        self.slots.add_permits(1);
        Ok(job)
    }

    /// Close the queue: blocked and future `insert`/`take` calls fail with
    /// `QueueClosed`. Jobs still queued are dropped.
    pub fn close(&self) {
        self.slots.close();
        self.ready.close();
    }
}
