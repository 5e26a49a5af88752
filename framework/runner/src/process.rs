//! Runs the server under test as a [`Child`] process and feeds query batches to it through a
//! short-lived client process.
//!
//! The lifecycle is encoded in the types: a [`ProcessRunner`] is started into
//! [`RunningProcesses`], which is consumed by `stop` into [`StoppedProcesses`].

use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use query_harness_core::prelude::ExecutionError;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    net::TcpStream,
    process::{Child, Command},
    time::{sleep, timeout},
};

use crate::bin_path::resolve_binary;
use crate::executor::Executor;
use crate::target::{ClientResult, Runner, RunningTarget};
use crate::types::HarnessResult;

/// Environment variable passed to the server when a server configuration file is set.
pub const SERVER_CONFIG_ENV: &str = "QUERY_SERVER_CONFIG";

/// Log target that server output is forwarded to.
pub const SERVER_LOG_TARGET: &str = "query_server";

const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Everything needed to start the server and run the client against it.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRunnerConfig {
    /// The server binary, a path or a name to look up in `PATH`
    pub server_bin: PathBuf,
    pub server_args: Vec<String>,
    /// Exported to the server as [SERVER_CONFIG_ENV] when set
    pub server_config: Option<PathBuf>,
    /// The client binary, a path or a name to look up in `PATH`
    pub client_bin: PathBuf,
    /// Passed to the client before the URI
    pub client_args: Vec<String>,
    /// Where the client connects to, also the address probed for readiness
    pub uri: String,
    /// Ask the client to use an encrypted connection
    pub encrypt: bool,
    /// Upper bound on a single client invocation
    pub execute_timeout_ms: u64,
    /// Probe the URI host and port after starting the server
    pub ready_probe: bool,
    pub ready_timeout_ms: u64,
    /// Fixed wait after starting the server when it is not probed
    pub settle_delay_ms: u64,
    /// Directory for temporary query files, the system default when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ProcessRunnerConfig {
    fn default() -> Self {
        Self {
            server_bin: PathBuf::from("memgraph"),
            server_args: Vec::new(),
            server_config: None,
            client_bin: PathBuf::from("query_client"),
            client_args: Vec::new(),
            uri: "bolt://localhost:7687".to_string(),
            encrypt: false,
            execute_timeout_ms: 120_000,
            ready_probe: true,
            ready_timeout_ms: 10_000,
            settle_delay_ms: 1_000,
            temp_dir: None,
        }
    }
}

impl ProcessRunnerConfig {
    fn client_args(&self) -> Vec<String> {
        let mut args = self.client_args.clone();
        args.push(self.uri.clone());
        if self.encrypt {
            args.push("--encrypt".to_string());
        }
        args
    }

    /// The `host:port` to probe for readiness, if the probe is enabled and the URI names both.
    fn probe_address(&self) -> Option<String> {
        if !self.ready_probe {
            return None;
        }

        let url = match url::Url::parse(&self.uri) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot probe '{}' for readiness: {e}", self.uri);
                return None;
            }
        };
        match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => Some(format!("{host}:{port}")),
            _ => {
                log::warn!(
                    "URI '{}' does not name a host and port to probe for readiness",
                    self.uri
                );
                None
            }
        }
    }
}

/// The unstarted state: a validated configuration and the runtime to drive processes with.
#[derive(Debug)]
pub struct ProcessRunner {
    config: Arc<ProcessRunnerConfig>,
    executor: Arc<Executor>,
}

impl ProcessRunner {
    /// Validate the configuration, resolving both binaries to paths.
    pub fn new(mut config: ProcessRunnerConfig) -> HarnessResult<Self> {
        config.server_bin = resolve_binary(&config.server_bin, "server")?;
        config.client_bin = resolve_binary(&config.client_bin, "client")?;

        Ok(Self {
            config: Arc::new(config),
            executor: Arc::new(Executor::new()?),
        })
    }
}

impl Runner for ProcessRunner {
    type Running = RunningProcesses;

    fn name(&self) -> &str {
        "ProcessRunner"
    }

    fn config_record(&self) -> HarnessResult<Value> {
        serde_json::to_value(self.config.as_ref()).context("Failed to serialize runner config")
    }

    fn start(&self) -> HarnessResult<RunningProcesses> {
        let config = self.config.clone();
        log::info!("Starting query server '{}'", config.server_bin.display());

        let mut server = self.executor.execute_in_place(async {
            let mut command = Command::new(&config.server_bin);
            command
                .args(&config.server_args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(server_config) = &config.server_config {
                command.env(SERVER_CONFIG_ENV, server_config);
            }

            command.spawn().with_context(|| {
                format!(
                    "Failed to run query server '{}'",
                    config.server_bin.display()
                )
            })
        })?;

        if let Some(stdout) = server.stdout.take() {
            self.executor.spawn(forward_output(stdout));
        }
        if let Some(stderr) = server.stderr.take() {
            self.executor.spawn(forward_output(stderr));
        }

        let pid = server
            .id()
            .ok_or_else(|| ExecutionError::new("Query server exited immediately after start"))?;

        self.executor
            .execute_in_place(wait_until_ready(&mut server, &config))?;
        log::info!("Query server is ready with pid {pid}");

        Ok(RunningProcesses {
            config,
            executor: self.executor.clone(),
            server,
            client: None,
            pid,
        })
    }
}

/// The running state: a live server and the most recent client, if any.
#[derive(Debug)]
pub struct RunningProcesses {
    config: Arc<ProcessRunnerConfig>,
    executor: Arc<Executor>,
    server: Child,
    client: Option<Child>,
    pid: u32,
}

impl RunningTarget for RunningProcesses {
    type Stopped = StoppedProcesses;

    fn pid(&self) -> u32 {
        self.pid
    }

    fn execute(&mut self, queries: &[String]) -> HarnessResult<ClientResult> {
        log::debug!("Executing {} queries: {queries:?}", queries.len());

        // Removed from disk when dropped at the end of this call.
        let mut query_file = match &self.config.temp_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .context("Failed to create temporary query file")?;
        query_file
            .write_all(queries.join("\n").as_bytes())
            .context("Writing queries to temporary file failed")?;
        query_file
            .flush()
            .context("Writing queries to temporary file failed")?;
        let stdin = query_file
            .reopen()
            .context("Failed to reopen temporary query file")?;

        let config = self.config.clone();
        let mut client = self.executor.execute_in_place(async {
            Command::new(&config.client_bin)
                .args(config.client_args())
                .stdin(Stdio::from(stdin))
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("Failed to run client '{}'", config.client_bin.display()))
        })?;

        let execute_timeout = Duration::from_millis(config.execute_timeout_ms);
        let finished = self.executor.execute_in_place(async {
            let stdout = client.stdout.take();
            let stderr = client.stderr.take();
            let result = timeout(execute_timeout, async {
                tokio::try_join!(read_all(stdout), read_all(stderr), client.wait())
            })
            .await;
            match result {
                Ok(result) => result.map(Some).context("Failed to wait for client"),
                Err(_) => {
                    terminate(&mut client, "client").await?;
                    Ok(None)
                }
            }
        });
        self.client = Some(client);

        let Some((stdout, stderr, status)) = finished? else {
            return Err(ExecutionError::new(format!(
                "Client timed out after {}ms",
                config.execute_timeout_ms
            ))
            .into());
        };

        if !status.success() {
            log::error!("Error while executing queries {queries:?}, client failed with {status} and stderr:\n{stderr}");
            return Err(ExecutionError::new(format!(
                "Client execution failed with {status}: {}",
                stderr.trim()
            ))
            .into());
        }

        serde_json::from_str(&stdout).map_err(|e| {
            ExecutionError::new(format!("Malformed client result record: {e}\n{stdout}")).into()
        })
    }

    fn stop(mut self) -> HarnessResult<StoppedProcesses> {
        log::info!("Stopping query server with pid {}", self.pid);
        let pid = self.pid;
        let client = self.client.take();
        let mut server = self.server;

        self.executor.execute_in_place(async move {
            if let Some(mut client) = client {
                terminate(&mut client, "client").await?;
            }
            let server_status = terminate(&mut server, "server").await?;
            log::debug!("Query server exited with {server_status}");

            Ok(StoppedProcesses { pid, server_status })
        })
    }
}

/// The stopped state: both processes have been killed and reaped.
#[derive(Debug)]
pub struct StoppedProcesses {
    pub pid: u32,
    pub server_status: ExitStatus,
}

async fn wait_until_ready(server: &mut Child, config: &ProcessRunnerConfig) -> HarnessResult<()> {
    let Some(address) = config.probe_address() else {
        log::debug!(
            "Waiting {}ms for the query server to settle",
            config.settle_delay_ms
        );
        sleep(Duration::from_millis(config.settle_delay_ms)).await;
        return check_alive(server);
    };

    log::debug!("Waiting for the query server to accept connections on {address}");
    timeout(Duration::from_millis(config.ready_timeout_ms), async {
        loop {
            check_alive(server)?;
            match TcpStream::connect(&address).await {
                Ok(_) => return Ok::<(), anyhow::Error>(()),
                Err(e) => log::trace!("Query server not ready yet: {e}"),
            }
            sleep(PROBE_INTERVAL).await;
        }
    })
    .await
    .map_err(|_| {
        ExecutionError::new(format!(
            "Timed out after {}ms waiting for the query server to accept connections on {address}",
            config.ready_timeout_ms
        ))
    })?
}

fn check_alive(server: &mut Child) -> HarnessResult<()> {
    match server
        .try_wait()
        .context("Failed to check query server status")?
    {
        Some(status) => Err(ExecutionError::new(format!(
            "Query server exited with {status} before it was ready"
        ))
        .into()),
        None => Ok(()),
    }
}

/// Kill the process and wait for it. A process that already exited is not an error.
async fn terminate(child: &mut Child, what: &str) -> HarnessResult<ExitStatus> {
    match child.start_kill() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
            log::debug!("The {what} process already exited");
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to kill the {what} process")),
    }

    child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for the {what} process"))
}

async fn forward_output(stream: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log::trace!(target: SERVER_LOG_TARGET, "{line}");
    }
}

async fn read_all(stream: Option<impl AsyncRead + Unpin>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn probe_address_from_uri() {
        let config = ProcessRunnerConfig {
            uri: "bolt://127.0.0.1:7688".to_string(),
            ..Default::default()
        };
        assert_eq!(Some("127.0.0.1:7688".to_string()), config.probe_address());
    }

    #[test]
    fn no_probe_without_port_or_when_disabled() {
        let config = ProcessRunnerConfig {
            uri: "bolt://localhost".to_string(),
            ..Default::default()
        };
        assert_eq!(None, config.probe_address());

        let config = ProcessRunnerConfig {
            ready_probe: false,
            ..Default::default()
        };
        assert_eq!(None, config.probe_address());

        let config = ProcessRunnerConfig {
            uri: "not a uri".to_string(),
            ..Default::default()
        };
        assert_eq!(None, config.probe_address());
    }

    #[test]
    fn client_gets_uri_then_encrypt_flag() {
        let config = ProcessRunnerConfig {
            client_args: vec!["client.py".to_string()],
            encrypt: true,
            ..Default::default()
        };
        assert_eq!(
            vec!["client.py", "bolt://localhost:7687", "--encrypt"],
            config.client_args()
        );
    }

    #[test]
    fn client_result_tolerates_missing_fields() {
        let result: ClientResult = serde_json::from_str(r#"{"wall_time": 0.5}"#).unwrap();
        assert_eq!(Some(0.5), result.wall_time);
        assert!(result.metadatas.is_empty());
    }
}
