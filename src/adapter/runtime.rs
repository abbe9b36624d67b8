use std::{future::Future, time::Duration};
use tokio::runtime::{EnterGuard, Runtime};

use crate::error::{ManygitError, Result};

/// Current-thread runtime driving one adapter's async client, with every
/// call bounded by the configured timeout.
pub(crate) struct BlockingRuntime {
    rt: Runtime,
    timeout: Duration,
}

impl BlockingRuntime {
    pub fn new(timeout: Duration) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                ManygitError::HostUnavailable(format!(
                    "failed to start client runtime: {err}"
                ))
            })?;

        Ok(Self { rt, timeout })
    }

    /// Make the runtime current so clients that spawn on construction can
    /// find it.
    pub fn enter(&self) -> EnterGuard<'_> {
        self.rt.enter()
    }

    /// Block on `fut`, failing with `HostUnavailable` once the timeout
    /// elapses.
    pub fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.rt
            .block_on(async { tokio::time::timeout(self.timeout, fut).await? })
    }
}
