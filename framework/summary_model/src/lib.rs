use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha3::Digest;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Unit attached to every time measurement.
pub const TIME_UNIT: &str = "s";

/// Type tag attached to every time measurement.
pub const TIME_TYPE: &str = "time";

/// The timing facts extracted from a client result record.
///
/// The serialized names match the field names used by the query client in its result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementTarget {
    QueryParsingTime,
    QueryPlanningTime,
    QueryPlanExecutionTime,
    WallTime,
}

impl MeasurementTarget {
    /// Column order used by the human-readable summary.
    pub const SUMMARY_ORDER: [MeasurementTarget; 4] = [
        MeasurementTarget::QueryParsingTime,
        MeasurementTarget::QueryPlanningTime,
        MeasurementTarget::QueryPlanExecutionTime,
        MeasurementTarget::WallTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementTarget::QueryParsingTime => "query_parsing_time",
            MeasurementTarget::QueryPlanningTime => "query_planning_time",
            MeasurementTarget::QueryPlanExecutionTime => "query_plan_execution_time",
            MeasurementTarget::WallTime => "wall_time",
        }
    }
}

impl Display for MeasurementTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed timing value from one measured iteration of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// What was measured
    pub target: MeasurementTarget,
    /// The observed value, in [Measurement::unit]
    pub value: f64,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Index of the measured iteration that produced this value, warmup iterations excluded
    pub iteration: usize,
    /// The group the scenario belongs to
    ///
    /// Set by the driver once the scenario has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// The name of the scenario that produced this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// The identifier the remote collector assigned to the [RunRecord] of this invocation
    ///
    /// Only set when measurements are submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<Value>,
}

impl Measurement {
    /// Create a time measurement for the given measured iteration.
    pub fn time(target: MeasurementTarget, value: f64, iteration: usize) -> Self {
        Self {
            target,
            value,
            unit: TIME_UNIT.to_string(),
            kind: TIME_TYPE.to_string(),
            iteration,
            group: None,
            scenario: None,
            run: None,
        }
    }

    /// Attribute this measurement to a scenario within a group
    pub fn with_scenario(mut self, group: &str, scenario: &str) -> Self {
        self.group = Some(group.to_string());
        self.scenario = Some(scenario.to_string());
        self
    }

    /// Link this measurement to the run identifier returned by the collector
    pub fn set_run(&mut self, run: Value) {
        self.run = Some(run);
    }
}

/// Metadata describing one invocation of the harness
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    /// The local run id
    ///
    /// Chosen by the harness. Unique for each invocation. The remote collector assigns its own
    /// identifier which is what measurements refer to.
    pub run_id: String,
    /// The name of the suite that was run
    pub suite: String,
    /// The name of the runner that executed the suite
    pub runner: String,
    /// The configuration the runner was created with
    pub runner_config: Value,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// Fields supplied by the caller to be stored alongside the run
    ///
    /// These are merged into the submitted payload and take precedence over the fields above.
    #[serde(default)]
    pub additional_fields: Map<String, Value>,
}

impl RunRecord {
    /// Create a new run record
    pub fn new(
        run_id: String,
        suite: String,
        runner: String,
        runner_config: Value,
        started_at: i64,
    ) -> Self {
        Self {
            run_id,
            suite,
            runner,
            runner_config,
            started_at,
            additional_fields: Map::with_capacity(0),
        }
    }

    /// Add caller supplied fields to the record
    pub fn with_additional_fields(mut self, fields: Map<String, Value>) -> Self {
        self.additional_fields.extend(fields);
        self
    }

    /// The flat record sent to the remote collector.
    ///
    /// Additional fields overwrite base fields with the same name.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("run_id".to_string(), Value::from(self.run_id.clone()));
        payload.insert("suite".to_string(), Value::from(self.suite.clone()));
        payload.insert("runner".to_string(), Value::from(self.runner.clone()));
        payload.insert("runner_config".to_string(), self.runner_config.clone());
        payload.insert("started_at".to_string(), Value::from(self.started_at));
        payload.insert("fingerprint".to_string(), Value::from(self.fingerprint()));
        for (k, v) in &self.additional_fields {
            payload.insert(k.clone(), v.clone());
        }

        Value::Object(payload)
    }

    /// Compute a fingerprint for this run record
    ///
    /// The fingerprint identifies the configuration used for the run, so that runs with the same
    /// setup can be compared. It uses the
    ///     - Suite name
    ///     - Runner name
    ///     - Runner configuration
    ///     - Additional fields
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.suite.as_bytes());
        Digest::update(&mut hasher, self.runner.as_bytes());
        Digest::update(&mut hasher, self.runner_config.to_string().as_bytes());
        self.additional_fields
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.to_string().as_bytes());
            });

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run record to a file
///
/// The record will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_record(run_record: &RunRecord, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_record(run_record, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run record to a writer
pub fn store_run_record<W: Write>(run_record: &RunRecord, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_record)?;
    Ok(())
}

/// Load run records from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_record].
pub fn load_run_records(path: PathBuf) -> anyhow::Result<Vec<RunRecord>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunRecord = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_run() -> RunRecord {
        RunRecord::new(
            "abc".to_string(),
            "QuerySuite".to_string(),
            "ProcessRunner".to_string(),
            json!({"uri": "bolt://localhost:7687"}),
            1_700_000_000,
        )
    }

    #[test]
    fn measurement_serializes_collector_shape() {
        let mut measurement = Measurement::time(MeasurementTarget::WallTime, 0.25, 2)
            .with_scenario("create", "vertex");
        measurement.set_run(json!("run-1"));

        assert_eq!(
            json!({
                "target": "wall_time",
                "value": 0.25,
                "unit": "s",
                "type": "time",
                "iteration": 2,
                "group": "create",
                "scenario": "vertex",
                "run": "run-1",
            }),
            serde_json::to_value(&measurement).unwrap()
        );
    }

    #[test]
    fn untagged_measurement_omits_optional_fields() {
        let measurement = Measurement::time(MeasurementTarget::QueryPlanningTime, 1.0, 0);
        let value = serde_json::to_value(&measurement).unwrap();

        assert_eq!(None, value.get("group"));
        assert_eq!(None, value.get("run"));
        assert_eq!(Some(&json!("query_planning_time")), value.get("target"));
    }

    #[test]
    fn payload_lets_additional_fields_win() {
        let mut fields = Map::new();
        fields.insert("commit".to_string(), json!("deadbeef"));
        fields.insert("suite".to_string(), json!("Overridden"));
        let run = sample_run().with_additional_fields(fields);

        let payload = run.to_payload();
        assert_eq!(json!("deadbeef"), payload["commit"]);
        assert_eq!(json!("Overridden"), payload["suite"]);
        assert_eq!(json!("ProcessRunner"), payload["runner"]);
        assert_eq!(json!(run.fingerprint()), payload["fingerprint"]);
    }

    #[test]
    fn fingerprint_ignores_run_id_and_start_time() {
        let first = sample_run();
        let mut second = sample_run();
        second.run_id = "other".to_string();
        second.started_at += 60;

        assert_eq!(first.fingerprint(), second.fingerprint());

        let mut fields = Map::new();
        fields.insert("branch".to_string(), json!("main"));
        let third = sample_run().with_additional_fields(fields);
        assert_ne!(first.fingerprint(), third.fingerprint());
    }

    #[test]
    fn run_records_round_trip_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        append_run_record(&sample_run(), path.clone()).unwrap();
        let mut second = sample_run();
        second.run_id = "def".to_string();
        append_run_record(&second, path.clone()).unwrap();

        let loaded = load_run_records(path).unwrap();
        assert_eq!(vec![sample_run(), second], loaded);
    }

    #[test]
    fn summary_order_ends_with_wall_time() {
        assert_eq!(
            vec![
                "query_parsing_time",
                "query_planning_time",
                "query_plan_execution_time",
                "wall_time"
            ],
            MeasurementTarget::SUMMARY_ORDER
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
        );
    }
}
