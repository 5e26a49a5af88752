use std::path::PathBuf;

use clap::{Args, Parser};
use serde_json::{Map, Value};

use crate::process::ProcessRunnerConfig;

#[derive(Debug, Parser)]
#[command(about, long_about = None)]
pub struct HarnessCli {
    /// The suite to run, for example `QuerySuite`
    pub suite: String,

    /// The runner that executes the suite, for example `ProcessRunner`
    pub runner: String,

    /// Base URL of a collector to submit the run and its measurements to.
    ///
    /// Nothing is submitted when this is not set.
    #[clap(long)]
    pub storage_url: Option<String>,

    /// Groups to run. If none are provided, all groups found under the scenario root are run.
    #[clap(long, num_args = 1..)]
    pub groups: Vec<String>,

    /// Scenarios to run. If none are provided, all scenarios in the selected groups are run.
    #[clap(long, num_args = 1..)]
    pub scenarios: Vec<String>,

    /// Additional fields to add to the run record, as a JSON object.
    ///
    /// These take precedence over the fields the harness sets itself.
    #[clap(long, value_parser = parse_run_fields, default_value = "{}")]
    pub additional_run_fields: Map<String, Value>,

    /// Directory that contains one directory per scenario group
    #[clap(long, env = "QUERY_SCENARIOS_ROOT", default_value = "groups")]
    pub query_scenarios_root: PathBuf,

    /// Continue with the next scenario when one fails to execute, instead of stopping the run.
    #[clap(long, default_value = "false")]
    pub keep_going: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Append the run record to this file as a single line of JSON
    #[clap(long)]
    pub run_summary: Option<PathBuf>,

    #[command(flatten)]
    pub process_runner: ProcessRunnerArgs,
}

/// Options for the `ProcessRunner`.
#[derive(Debug, Clone, Args)]
pub struct ProcessRunnerArgs {
    /// The server binary, a path or a name to look up in `PATH`
    #[clap(long, env = "QUERY_SERVER_BIN", default_value = "memgraph")]
    pub server_bin: PathBuf,

    /// Argument for the server, repeat for several
    #[clap(long = "server-arg", allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// Configuration file exported to the server as `QUERY_SERVER_CONFIG`
    #[clap(long)]
    pub server_config: Option<PathBuf>,

    /// The client binary, a path or a name to look up in `PATH`.
    ///
    /// The client receives queries one per line on stdin and prints a JSON result record.
    #[clap(long, env = "QUERY_CLIENT_BIN", default_value = "query_client")]
    pub client_bin: PathBuf,

    /// Argument for the client, placed before the URI. Repeat for several
    #[clap(long = "client-arg", allow_hyphen_values = true)]
    pub client_args: Vec<String>,

    /// URI the client connects to
    #[clap(long, default_value = "bolt://localhost:7687")]
    pub uri: String,

    /// Ask the client for an encrypted connection
    #[clap(long, default_value = "false")]
    pub encrypt: bool,

    /// Maximum time a single client invocation may take, in milliseconds
    #[clap(long, default_value = "120000")]
    pub execute_timeout_ms: u64,

    /// Do not wait for the server to accept connections on the URI, wait the settle delay instead
    #[clap(long, default_value = "false")]
    pub no_ready_probe: bool,

    /// Maximum time to wait for the server to accept connections, in milliseconds
    #[clap(long, default_value = "10000")]
    pub ready_timeout_ms: u64,

    /// Time to wait after starting the server when it is not probed, in milliseconds
    #[clap(long, default_value = "1000")]
    pub settle_delay_ms: u64,

    /// Directory for temporary query files
    #[clap(long)]
    pub temp_dir: Option<PathBuf>,
}

impl ProcessRunnerArgs {
    pub fn to_config(&self) -> ProcessRunnerConfig {
        ProcessRunnerConfig {
            server_bin: self.server_bin.clone(),
            server_args: self.server_args.clone(),
            server_config: self.server_config.clone(),
            client_bin: self.client_bin.clone(),
            client_args: self.client_args.clone(),
            uri: self.uri.clone(),
            encrypt: self.encrypt,
            execute_timeout_ms: self.execute_timeout_ms,
            ready_probe: !self.no_ready_probe,
            ready_timeout_ms: self.ready_timeout_ms,
            settle_delay_ms: self.settle_delay_ms,
            temp_dir: self.temp_dir.clone(),
        }
    }
}

fn parse_run_fields(s: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str(s)? {
        Value::Object(fields) => Ok(fields),
        other => Err(anyhow::anyhow!(
            "Additional run fields must be a JSON object, got: {other}"
        )),
    }
}
