use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{LoginError, Result};

/// Cancellation and deadline carried through a login call.
///
/// Passed explicitly from the caller into whichever provider client handles
/// the request. Clients wrap each network await in [`LoginContext::run`] so a
/// cancelled or expired context unblocks the in-flight call.
#[derive(Debug, Clone, Default)]
pub struct LoginContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl LoginContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled whenever `token` is cancelled
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Derive a child context that expires after `timeout`.
    ///
    /// The child shares cancellation with its parent and keeps the parent's
    /// deadline if that one is earlier. A timeout too large to represent as
    /// an instant adds no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(LoginError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                out = fut => Ok(out),
                _ = self.cancel.cancelled() => Err(LoginError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(LoginError::DeadlineExceeded),
            },
            None => tokio::select! {
                out = fut => Ok(out),
                _ = self.cancel.cancelled() => Err(LoginError::Cancelled),
            },
        }
    }
}
