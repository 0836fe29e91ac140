//! Bounded-concurrency task pool.
//!
//! A counting semaphore caps the number of in-flight units. Submission waits
//! for a free slot, so units start strictly in submission order and the
//! backlog is the caller's own iterator.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct BoundedPool {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl BoundedPool {
    /// A pool running at most `limit` units at once (minimum one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Wait for a free slot, then start `work` on the runtime. The slot is
    /// released when `work` finishes, whether or not the handle is joined.
    pub async fn submit<F>(&self, work: F) -> PoolHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        // The semaphore is never closed, so acquisition only ends in a permit.
        let permit = self.permits.clone().acquire_owned().await.ok();
        PoolHandle(tokio::spawn(async move {
            let _permit = permit;
            work.await
        }))
    }

    /// Submit every unit in order and collect outputs in the same order.
    pub async fn run_all<I, F>(&self, units: I) -> Vec<Result<F::Output, DispatchError>>
    where
        I: IntoIterator<Item = F>,
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut handles = Vec::new();
        for unit in units {
            handles.push(self.submit(unit).await);
        }
        let mut outputs = Vec::with_capacity(handles.len());
        for handle in handles {
            outputs.push(handle.join().await);
        }
        outputs
    }
}

/// Handle to one submitted unit.
#[derive(Debug)]
pub struct PoolHandle<T>(JoinHandle<T>);

impl<T> PoolHandle<T> {
    /// Wait for the unit. A panic inside the unit becomes [`DispatchError::Task`].
    pub async fn join(self) -> Result<T, DispatchError> {
        self.0.await.map_err(|err| DispatchError::Task(err.to_string()))
    }
}
