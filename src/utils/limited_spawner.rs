use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

/// Spawns tasks onto the runtime, optionally capping how many run at once.
///
/// Tasks are spawned immediately and wait for a permit inside the task, so
/// every unit has a handle (and can be aborted) before any of them starts.
#[derive(Clone)]
pub struct LimitedSpawner {
    semaphore: Option<Arc<Semaphore>>,
}

impl LimitedSpawner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Some(Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    pub fn unbounded() -> Self {
        Self { semaphore: None }
    }

    pub fn with_limit(max_concurrent: Option<usize>) -> Self {
        match max_concurrent {
            Some(n) => Self::new(n),
            None => Self::unbounded(),
        }
    }

    pub fn spawn<F>(&self, f: F) -> JoinHandle<Result<F::Output, AcquireError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => Some(semaphore.acquire_owned().await?),
                None => None,
            };
            Ok(f.await)
        })
    }

    /// Fails every task still waiting for a permit.
    pub fn close(&self) {
        if let Some(semaphore) = &self.semaphore {
            semaphore.close();
        }
    }
}
