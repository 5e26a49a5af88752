use anyhow::Context;
use query_harness_core::prelude::{ConfigurationError, ExecutionError};
use query_harness_instruments::{MeasurementSums, SummaryReport};
use query_harness_summary_model::{Measurement, MeasurementTarget};
use serde::Deserialize;

use crate::scenario::{Phase, Scenario, ScenarioConfig};
use crate::target::{ClientResult, Runner, RunningTarget};
use crate::types::HarnessResult;

/// Per scenario settings, read from the record in the `config` phase file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Number of measured iterations
    pub iterations: usize,
    /// Upper bound on the unmeasured iterations run first
    pub warmup: usize,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            iterations: 1,
            warmup: 3,
        }
    }
}

impl ScenarioSettings {
    pub fn from_config(config: &ScenarioConfig) -> HarnessResult<Self> {
        let Some(file) = config.get(Phase::Config) else {
            return Ok(Self::default());
        };

        let record = file.load_record()?;
        serde_json::from_value(record).map_err(|e| {
            ConfigurationError::new(format!(
                "Invalid scenario settings in '{}': {e}",
                file.path().display()
            ))
            .into()
        })
    }

    /// Warmup never runs more often than the measured loop.
    pub fn warmup_iterations(&self) -> usize {
        self.iterations.min(self.warmup)
    }
}

/// Runs query scenarios: an unmeasured setup, warmup iterations, measured iterations and an
/// unmeasured teardown, all against a single start of the system under test.
#[derive(Debug, Default)]
pub struct QuerySuite;

impl QuerySuite {
    pub const NAME: &'static str = "QuerySuite";

    /// Run one scenario and return its measurements in iteration order.
    ///
    /// The runner is stopped whether or not the phases succeed. On success the averages of the
    /// scenario are added to `report`.
    pub fn run<R: Runner>(
        &self,
        scenario: &Scenario,
        runner: &R,
        report: &mut SummaryReport,
    ) -> HarnessResult<Vec<Measurement>> {
        log::debug!("Running scenario '{}' with {:?}", scenario.name, scenario.config);
        let settings = ScenarioSettings::from_config(&scenario.config)?;

        let mut running = runner.start()?;
        log::debug!("Started '{}' with pid {}", runner.name(), running.pid());

        let mut sums = MeasurementSums::new();
        let result = run_phases(&scenario.config, settings, &mut running, &mut sums);
        let stopped = running.stop();

        let measurements = match (result, stopped) {
            (Ok(measurements), Ok(_)) => measurements,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(_)) => return Err(e),
            (Err(e), Err(stop_err)) => {
                log::error!("Failed to stop '{}' after a failed scenario: {stop_err:?}", runner.name());
                return Err(e);
            }
        };

        report.add_scenario(&scenario.name, &sums, settings.iterations);
        Ok(measurements)
    }
}

fn run_phases<T: RunningTarget>(
    config: &ScenarioConfig,
    settings: ScenarioSettings,
    target: &mut T,
    sums: &mut MeasurementSums,
) -> HarnessResult<Vec<Measurement>> {
    execute_phase(config, Phase::Setup, target)?;

    for _ in 0..settings.warmup_iterations() {
        execute_phase(config, Phase::IterSetup, target)?;
        execute_phase(config, Phase::Run, target)?;
        execute_phase(config, Phase::IterTeardown, target)?;
    }

    let mut measurements = Vec::new();
    for iteration in 0..settings.iterations {
        execute_phase(config, Phase::IterSetup, target)?;
        let result = execute_phase(config, Phase::Run, target)?
            .ok_or_else(|| ExecutionError::new("Scenario has no 'run' phase to measure"))?;
        for measurement in measurements_from(&result, iteration)? {
            sums.add(&measurement);
            measurements.push(measurement);
        }
        execute_phase(config, Phase::IterTeardown, target)?;
    }

    execute_phase(config, Phase::Teardown, target)?;

    Ok(measurements)
}

/// Load the queries of `phase` and run them. A phase without a file is skipped.
fn execute_phase<T: RunningTarget>(
    config: &ScenarioConfig,
    phase: Phase,
    target: &mut T,
) -> HarnessResult<Option<ClientResult>> {
    let Some(file) = config.get(phase) else {
        return Ok(None);
    };

    let queries = file
        .load_queries()
        .with_context(|| format!("Failed to load queries for phase '{phase}'"))?
        .collect::<Vec<_>>();

    target
        .execute(&queries)
        .with_context(|| format!("Phase '{phase}' failed"))
        .map(Some)
}

/// Wall time from the result and the server timings from its first metadata entry.
fn measurements_from(result: &ClientResult, iteration: usize) -> HarnessResult<Vec<Measurement>> {
    let metadata = result.metadatas.first().ok_or_else(|| {
        ExecutionError::new("Scenario run must report metadata for at least one query")
    })?;

    let mut measurements = Vec::new();
    if let Some(wall_time) = result.wall_time {
        measurements.push(Measurement::time(
            MeasurementTarget::WallTime,
            wall_time,
            iteration,
        ));
    }

    for target in [
        MeasurementTarget::QueryParsingTime,
        MeasurementTarget::QueryPlanExecutionTime,
        MeasurementTarget::QueryPlanningTime,
    ] {
        match metadata.get(target.as_str()).map(|v| (v, v.as_f64())) {
            Some((_, Some(value))) => {
                measurements.push(Measurement::time(target, value, iteration))
            }
            Some((raw, None)) => {
                log::warn!("Ignoring non-numeric '{target}' in iteration {iteration}: {raw}")
            }
            None => {}
        }
    }

    Ok(measurements)
}
