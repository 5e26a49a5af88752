use std::future::Future;

use anyhow::Context;

use crate::types::HarnessResult;

/// Owns the async runtime that drives the managed processes.
///
/// The harness itself is strictly sequential. The runtime exists so that child processes can be
/// awaited with timeouts and their output forwarded in the background.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
}

impl Executor {
    pub fn new() -> HarnessResult<Self> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        Ok(Self { runtime })
    }

    /// Run async code in place, blocking until it completes.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }

    /// Submit async code to be run in the background.
    ///
    /// Nothing waits for the future to complete. It is dropped when the executor is.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_in_place_returns_future_result() {
        let executor = Executor::new().unwrap();

        let value = executor.execute_in_place(async { Ok(21 * 2) }).unwrap();
        assert_eq!(42, value);

        let err = executor
            .execute_in_place(async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .unwrap_err();
        assert_eq!("boom", err.to_string());
    }

    #[test]
    fn spawned_work_runs_in_background() {
        let executor = Executor::new().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        executor.spawn(async move {
            tx.send("done").unwrap();
        });

        assert_eq!(
            "done",
            rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap()
        );
    }
}
