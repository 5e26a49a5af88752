mod bin_path;
mod cli;
mod content;
mod executor;
mod init;
mod process;
mod progress;
mod registry;
mod run;
mod scenario;
mod suite;
mod target;
mod types;

pub mod prelude {
    pub use crate::bin_path::resolve_binary;
    pub use crate::cli::{HarnessCli, ProcessRunnerArgs};
    pub use crate::content::{ContentError, FileKind, LoadedContent, Queries, ScenarioFileRef};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::process::{
        ProcessRunner, ProcessRunnerConfig, RunningProcesses, StoppedProcesses, SERVER_CONFIG_ENV,
        SERVER_LOG_TARGET,
    };
    pub use crate::registry::SuiteKind;
    pub use crate::run::{execute, run, RunOutcome};
    pub use crate::scenario::{GroupScenarios, Phase, Scenario, ScenarioConfig, ScenarioLoader};
    pub use crate::suite::{QuerySuite, ScenarioSettings};
    pub use crate::target::{ClientResult, Runner, RunningTarget};
    pub use crate::types::HarnessResult;
}
