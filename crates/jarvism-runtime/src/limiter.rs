//! Global job limiter
//!
//! One counting semaphore caps concurrent jobs across every flow of a run.
//! A non-positive capacity disables the cap. Each runtime owns a fresh
//! limiter, so nested harnesses never share one.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct JobLimiter {
    sem: Option<Arc<Semaphore>>,
}

impl JobLimiter {
    pub fn new(max_job: i64) -> Self {
        JobLimiter {
            sem: (max_job > 0).then(|| Arc::new(Semaphore::new(max_job as usize))),
        }
    }

    /// Take one slot; `None` when the limiter is disabled
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.sem {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .expect("job limiter semaphore closed"),
            ),
            None => None,
        }
    }
}
