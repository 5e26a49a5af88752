use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use itertools::Itertools;
use query_harness_core::prelude::ConfigurationError;
use walkdir::WalkDir;

use crate::content::ScenarioFileRef;
use crate::types::HarnessResult;

/// The steps of a scenario that a file can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Config,
    Setup,
    IterSetup,
    Run,
    IterTeardown,
    Teardown,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Config,
        Phase::Setup,
        Phase::IterSetup,
        Phase::Run,
        Phase::IterTeardown,
        Phase::Teardown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Setup => "setup",
            Phase::IterSetup => "itersetup",
            Phase::Run => "run",
            Phase::IterTeardown => "iterteardown",
            Phase::Teardown => "teardown",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ConfigurationError::new(format!("Unknown scenario phase '{s}'")))
    }
}

/// The files that make up a scenario, one per phase.
///
/// Phases without a file are absent rather than empty, and are skipped when the scenario runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioConfig {
    files: BTreeMap<Phase, ScenarioFileRef>,
}

impl ScenarioConfig {
    pub fn get(&self, phase: Phase) -> Option<&ScenarioFileRef> {
        self.files.get(&phase)
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.files.contains_key(&phase)
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.files.keys().copied()
    }

    fn insert(&mut self, phase: Phase, file: ScenarioFileRef) {
        self.files.insert(phase, file);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub config: ScenarioConfig,
}

/// Scenarios by group name. Both levels are in sorted order.
pub type GroupScenarios = BTreeMap<String, Vec<Scenario>>;

/// Discovers scenarios below a root directory.
///
/// Expected layout:
///
/// ```text
/// root/
///     group1/
///         config.json
///         setup.cypher
///         itersetup.cypher
///         iterteardown.cypher
///         teardown.cypher
///         scenario1.config.json
///         scenario1.run.cypher
///         scenario1.setup.py
///         scenario2.run.cypher
///     group2/
///         ...
/// ```
///
/// Files with a single `.` are group defaults, files with two (`<scenario>.<phase>.<ext>`)
/// override the defaults for one scenario. Any other file is ignored.
pub struct ScenarioLoader {
    root: PathBuf,
}

impl ScenarioLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the group directories directly below the root, sorted.
    pub fn group_names(&self) -> HarnessResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| {
                format!("Failed to list scenario root '{}'", self.root.display())
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if !name.starts_with('.') => names.push(name.to_string()),
                Some(_) => {}
                None => log::warn!("Skipping group with non UTF-8 name: {:?}", entry.path()),
            }
        }

        Ok(names)
    }

    /// Load every group below the root.
    pub fn load(&self) -> HarnessResult<GroupScenarios> {
        self.load_groups(&self.group_names()?)
    }

    /// Load only the named groups. Groups that are not named are never parsed.
    pub fn load_groups(&self, groups: &[String]) -> HarnessResult<GroupScenarios> {
        log::info!("Loading query scenarios from root: {}", self.root.display());
        let mut group_scenarios = GroupScenarios::new();
        for group in groups {
            let scenarios = self.load_group(group)?;
            group_scenarios.insert(group.clone(), scenarios);
        }

        Ok(group_scenarios)
    }

    /// Resolve the scenarios of a single group.
    pub fn load_group(&self, group: &str) -> HarnessResult<Vec<Scenario>> {
        log::info!("Loading group: '{group}'");
        let group_dir = self.root.join(group);
        let files = list_files(&group_dir)?;

        let mut group_config = ScenarioConfig::default();
        let group_files = files
            .iter()
            .filter(|f| dot_count(f) == 1)
            .collect::<Vec<_>>();
        fill_config(&mut group_config, &group_dir, group, &group_files)?;

        let mut scenarios = Vec::new();
        let scenario_files = files
            .iter()
            .filter(|f| dot_count(f) == 2)
            .sorted()
            .chunk_by(|f| scenario_prefix(f).to_string());
        for (scenario_name, scenario_files) in &scenario_files {
            log::info!("Loading scenario: '{scenario_name}'");
            let scenario_files = scenario_files.collect::<Vec<_>>();
            let mut config = group_config.clone();
            fill_config(&mut config, &group_dir, group, &scenario_files)?;
            log::debug!("Loaded config for scenario '{scenario_name}'\n{config:?}");

            scenarios.push(Scenario {
                name: scenario_name.to_string(),
                config,
            });
        }

        Ok(scenarios)
    }
}

fn list_files(dir: &Path) -> HarnessResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to list group directory '{}'", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if !name.starts_with('.') => files.push(name.to_string()),
            Some(_) => {}
            None => log::warn!("Skipping file with non UTF-8 name: {:?}", entry.path()),
        }
    }

    Ok(files)
}

fn dot_count(file_name: &str) -> usize {
    file_name.matches('.').count()
}

fn scenario_prefix(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or_default()
}

/// The phase named by a file, which is the segment just before the extension.
fn phase_segment(file_name: &str) -> &str {
    file_name.rsplit('.').nth(1).unwrap_or_default()
}

/// Add an entry per file to `config`, replacing entries for phases that are already present.
///
/// Any file naming an unknown phase fails the whole group, since that is most likely a typo that
/// would otherwise silently drop part of a scenario.
fn fill_config(
    config: &mut ScenarioConfig,
    dir: &Path,
    group: &str,
    files: &[&String],
) -> HarnessResult<()> {
    let mut unknown_phases = BTreeSet::new();
    for file in files {
        log::debug!("Processing config file {file}");
        let phase_name = phase_segment(file);
        let Ok(phase) = phase_name.parse::<Phase>() else {
            unknown_phases.insert(phase_name.to_string());
            continue;
        };

        let file_ref = ScenarioFileRef::new(dir.join(file.as_str())).map_err(|e| {
            ConfigurationError::new(format!("Invalid scenario file in group '{group}': {e}"))
        })?;
        config.insert(phase, file_ref);
    }

    if !unknown_phases.is_empty() {
        return Err(ConfigurationError::new(format!(
            "Unknown scenario config elements {unknown_phases:?} in group '{group}', expected one of {:?}",
            Phase::ALL.map(|p| p.as_str())
        ))
        .into());
    }

    Ok(())
}
