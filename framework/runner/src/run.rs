use anyhow::Context;
use nanoid::nanoid;
use query_harness_core::prelude::{ConfigurationError, ExecutionError};
use query_harness_instruments::{CollectorClient, SummaryReport};
use query_harness_summary_model::{append_run_record, Measurement, RunRecord};

use crate::cli::HarnessCli;
use crate::content::ContentError;
use crate::process::ProcessRunner;
use crate::progress::ScenarioProgress;
use crate::registry::SuiteKind;
use crate::scenario::{GroupScenarios, Scenario, ScenarioLoader};
use crate::suite::QuerySuite;
use crate::target::Runner;
use crate::types::HarnessResult;

/// Everything one invocation produced, ready to be submitted and summarised.
#[derive(Default)]
pub struct RunOutcome {
    /// Measurements of every successful scenario, tagged with group and scenario
    pub measurements: Vec<Measurement>,
    pub report: SummaryReport,
    /// Set once at least one scenario was selected
    pub run: Option<RunRecord>,
    /// `group.scenario` names skipped because they failed to execute
    pub failed_scenarios: Vec<String>,
}

impl RunOutcome {
    /// Submit the run record, then all measurements tagged with the identifier the collector
    /// returned for it.
    pub fn submit(&mut self, storage_url: &str) -> HarnessResult<()> {
        let Some(run) = &self.run else {
            log::info!("No run to submit");
            return Ok(());
        };

        let client = CollectorClient::new(storage_url);
        let run_id = client.submit_run(run).context("Failed to submit run")?;
        log::info!("Collector stored run as {run_id}");

        log::info!(
            "Sending {} measurements to storage at '{storage_url}'",
            self.measurements.len()
        );
        client
            .submit_measurements(&run_id, &mut self.measurements)
            .context("Failed to submit measurements")?;

        Ok(())
    }
}

/// Run the selected scenarios and submit the results.
///
/// The summary is printed even if submission fails. With `--keep-going` a failed scenario does
/// not stop the run, but still fails the invocation once everything else is done.
pub fn run(cli: HarnessCli) -> HarnessResult<()> {
    log::info!("Query benchmark harness");
    log::info!(
        "Executing for suite '{}', runner '{}', storage '{}'",
        cli.suite,
        cli.runner,
        cli.storage_url.as_deref().unwrap_or("none")
    );

    let mut outcome = execute(&cli)?;
    if outcome.run.is_none() {
        return Ok(());
    }

    let submitted = match &cli.storage_url {
        Some(storage_url) => outcome.submit(storage_url),
        None => Ok(()),
    };

    outcome.report.print();

    if let Err(e) = submitted {
        log::error!("Failed to submit results: {e:?}");
        return Err(e);
    }

    if !outcome.failed_scenarios.is_empty() {
        return Err(ExecutionError::new(format!(
            "{} scenarios failed: {:?}",
            outcome.failed_scenarios.len(),
            outcome.failed_scenarios
        ))
        .into());
    }

    Ok(())
}

/// Validate the invocation, then run every selected scenario.
///
/// Nothing is submitted or printed here.
pub fn execute(cli: &HarnessCli) -> HarnessResult<RunOutcome> {
    let suite: SuiteKind = cli.suite.parse()?;
    suite.validate_runner(&cli.runner)?;

    let group_scenarios = load_selected_groups(cli)?;
    log::info!(
        "Loaded {} groups, with a total of {} scenarios",
        group_scenarios.len(),
        group_scenarios.values().map(Vec::len).sum::<usize>()
    );

    let selected = select_scenarios(group_scenarios, &cli.scenarios)?;
    if selected.is_empty() {
        log::info!("No scenarios to execute");
        return Ok(RunOutcome::default());
    }

    let runner = ProcessRunner::new(cli.process_runner.to_config())?;
    let started_at = chrono::Utc::now().timestamp();

    let mut outcome = run_scenarios(suite, &runner, &selected, cli)?;

    let run = RunRecord::new(
        nanoid!(),
        suite.name().to_string(),
        runner.name().to_string(),
        runner.config_record()?,
        started_at,
    )
    .with_additional_fields(cli.additional_run_fields.clone());
    log::debug!("Run {} has fingerprint {}", run.run_id, run.fingerprint());

    if let Some(path) = &cli.run_summary {
        append_run_record(&run, path.clone()).with_context(|| {
            format!("Failed to append run summary to '{}'", path.display())
        })?;
    }
    outcome.run = Some(run);

    Ok(outcome)
}

/// Load the requested groups, or all groups when none are requested.
fn load_selected_groups(cli: &HarnessCli) -> HarnessResult<GroupScenarios> {
    let loader = ScenarioLoader::new(&cli.query_scenarios_root);
    let available = loader.group_names()?;

    if cli.groups.is_empty() {
        return loader.load_groups(&available);
    }

    for group in &cli.groups {
        if !available.contains(group) {
            return Err(ConfigurationError::new(format!(
                "Group '{group}' isn't available under '{}'. Available groups are: {available:?}",
                loader.root().display()
            ))
            .into());
        }
    }

    for group in available.iter().filter(|g| !cli.groups.contains(g)) {
        log::info!("Skipping group '{group}'");
    }

    loader.load_groups(&cli.groups)
}

fn select_scenarios(
    group_scenarios: GroupScenarios,
    scenarios: &[String],
) -> HarnessResult<Vec<(String, Scenario)>> {
    for name in scenarios {
        let known = group_scenarios
            .values()
            .flatten()
            .any(|scenario| &scenario.name == name);
        if !known {
            return Err(ConfigurationError::new(format!(
                "Scenario '{name}' isn't defined in any of the selected groups"
            ))
            .into());
        }
    }

    Ok(group_scenarios
        .into_iter()
        .flat_map(|(group, group_scenarios)| {
            group_scenarios
                .into_iter()
                .map(move |scenario| (group.clone(), scenario))
        })
        .filter(|(_, scenario)| scenarios.is_empty() || scenarios.contains(&scenario.name))
        .collect())
}

fn run_scenarios<R: Runner>(
    suite: SuiteKind,
    runner: &R,
    selected: &[(String, Scenario)],
    cli: &HarnessCli,
) -> HarnessResult<RunOutcome> {
    log::info!("Executing {} scenarios", selected.len());
    let progress = ScenarioProgress::new(selected.len(), cli.no_progress);
    let mut outcome = RunOutcome::default();

    for (group, scenario) in selected {
        log::info!(
            "Executing group.scenario '{group}.{}' with elements {:?}",
            scenario.name,
            scenario.config.phases().collect::<Vec<_>>()
        );
        progress.start_scenario(group, &scenario.name);

        let result = match suite {
            SuiteKind::Query => QuerySuite.run(scenario, runner, &mut outcome.report),
        };
        progress.finish_scenario();

        match result {
            Ok(measurements) => outcome.measurements.extend(
                measurements
                    .into_iter()
                    .map(|m| m.with_scenario(group, &scenario.name)),
            ),
            Err(e) if cli.keep_going && is_scenario_failure(&e) => {
                log::error!("Scenario '{group}.{}' failed, continuing: {e:?}", scenario.name);
                outcome
                    .failed_scenarios
                    .push(format!("{group}.{}", scenario.name));
            }
            Err(e) => {
                progress.finish();
                return Err(e.context(format!("Scenario '{group}.{}' failed", scenario.name)));
            }
        }
    }

    progress.finish();
    Ok(outcome)
}

/// Failures that only concern the scenario that raised them.
fn is_scenario_failure(e: &anyhow::Error) -> bool {
    e.is::<ExecutionError>() || e.is::<ContentError>()
}
