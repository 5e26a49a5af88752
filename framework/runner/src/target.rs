use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::HarnessResult;

/// The record a client prints to stdout after executing a batch of queries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientResult {
    /// Wall-clock time of the whole batch, in seconds
    #[serde(default)]
    pub wall_time: Option<f64>,
    /// Per-query metadata reported by the server, in query order
    #[serde(default)]
    pub metadatas: Vec<Map<String, Value>>,
}

/// Something that can bring up the system under test.
///
/// A runner is created once per invocation and started once per scenario.
pub trait Runner {
    type Running: RunningTarget;

    /// The name the runner is registered under.
    fn name(&self) -> &str;

    /// The configuration to store with the run record.
    fn config_record(&self) -> HarnessResult<Value>;

    /// Start the system under test and wait until it accepts connections.
    fn start(&self) -> HarnessResult<Self::Running>;
}

/// A started system under test that accepts query batches until it is stopped.
pub trait RunningTarget {
    type Stopped;

    /// Process identifier of the server.
    fn pid(&self) -> u32;

    /// Run one batch of queries through a fresh client and return what the client reported.
    fn execute(&mut self, queries: &[String]) -> HarnessResult<ClientResult>;

    /// Stop everything that was started, tolerating processes that already exited.
    fn stop(self) -> HarnessResult<Self::Stopped>;
}
