//! Waiting on long-running operations.

use super::{Completed, OperationState};
use crate::error::{ServiceError, ServiceResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Polls an operation until it reaches a terminal state, the deadline passes,
/// or shutdown is signalled.
#[derive(Clone)]
pub struct Waiter {
    timeout: Duration,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Waiter {
    pub fn new(timeout: Duration, poll_interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            timeout,
            poll_interval,
            shutdown,
        }
    }

    /// Query `poll` until the operation finishes.
    ///
    /// `first_delay` is the service's `Retry-After` hint from submission.
    /// Failed operations become [`ServiceError::Vendor`].
    pub async fn wait<T, F, Fut>(
        &self,
        operation: &str,
        first_delay: Option<Duration>,
        mut poll: F,
    ) -> ServiceResult<Completed<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<OperationState<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut shutdown = self.shutdown.clone();
        let mut delay = first_delay;
        let mut attempt = 0u32;

        loop {
            if let Some(delay) = delay {
                self.pause(operation, delay, deadline, &mut shutdown).await?;
            }
            if *shutdown.borrow() {
                return Err(self.cancelled(operation));
            }

            attempt += 1;
            let state = tokio::time::timeout_at(deadline, poll())
                .await
                .map_err(|_| self.timed_out(operation))??;

            match state {
                OperationState::Succeeded(done) => {
                    debug!("{} succeeded after {} status queries", operation, attempt);
                    return Ok(done);
                }
                OperationState::Failed(err) => {
                    return Err(ServiceError::Vendor {
                        code: err.code,
                        message: err.message,
                    });
                }
                OperationState::Running { retry_after } => {
                    debug!("{} still running (query {})", operation, attempt);
                    delay = Some(retry_after.unwrap_or(self.poll_interval));
                }
            }
        }
    }

    async fn pause(
        &self,
        operation: &str,
        delay: Duration,
        deadline: Instant,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ServiceResult<()> {
        let now = Instant::now();
        if now >= deadline {
            return Err(self.timed_out(operation));
        }
        let wake = (now + delay).min(deadline);

        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {}
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return Err(self.cancelled(operation)),
                Ok(()) => {}
                // Sender gone: nobody can cancel any more.
                Err(_) => tokio::time::sleep_until(wake).await,
            },
        }

        if Instant::now() >= deadline {
            return Err(self.timed_out(operation));
        }
        Ok(())
    }

    fn timed_out(&self, operation: &str) -> ServiceError {
        ServiceError::Timeout {
            operation: operation.to_string(),
            secs: self.timeout.as_secs(),
        }
    }

    fn cancelled(&self, operation: &str) -> ServiceError {
        ServiceError::Cancelled {
            operation: operation.to_string(),
        }
    }
}
