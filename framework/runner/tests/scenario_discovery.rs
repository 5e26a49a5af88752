use std::path::Path;

use pretty_assertions::assert_eq;
use query_harness_core::prelude::ConfigurationError;
use query_harness_runner::prelude::*;

fn write_group(root: &Path, group: &str, files: &[&str]) {
    let dir = root.join(group);
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
        std::fs::write(dir.join(file), "RETURN 1;").unwrap();
    }
}

fn file_name(config: &ScenarioConfig, phase: Phase) -> Option<String> {
    config
        .get(phase)
        .map(|f| f.path().file_name().unwrap().to_string_lossy().into_owned())
}

#[test]
fn scenario_files_shadow_group_files() {
    let root = tempfile::tempdir().unwrap();
    write_group(
        root.path(),
        "create",
        &[
            "config.json",
            "setup.cypher",
            "run.cypher",
            "vertex.run.cypher",
            "vertex.setup.sh",
            "edge.teardown.cypher",
        ],
    );

    let groups = ScenarioLoader::new(root.path()).load().unwrap();
    let scenarios = &groups["create"];

    assert_eq!(
        vec!["edge", "vertex"],
        scenarios.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );

    let edge = &scenarios[0].config;
    assert_eq!(Some("setup.cypher".to_string()), file_name(edge, Phase::Setup));
    assert_eq!(Some("run.cypher".to_string()), file_name(edge, Phase::Run));
    assert_eq!(
        Some("edge.teardown.cypher".to_string()),
        file_name(edge, Phase::Teardown)
    );
    assert!(!edge.contains(Phase::IterSetup));

    let vertex = &scenarios[1].config;
    assert_eq!(
        Some("vertex.setup.sh".to_string()),
        file_name(vertex, Phase::Setup)
    );
    assert_eq!(
        Some("vertex.run.cypher".to_string()),
        file_name(vertex, Phase::Run)
    );
    assert_eq!(
        Some("config.json".to_string()),
        file_name(vertex, Phase::Config)
    );
    assert_eq!(None, file_name(vertex, Phase::Teardown));
    assert_eq!(
        FileKind::Script { interpreter: "sh" },
        vertex.get(Phase::Setup).unwrap().kind()
    );
}

#[test]
fn files_with_other_dot_counts_are_ignored() {
    let root = tempfile::tempdir().unwrap();
    write_group(
        root.path(),
        "match",
        &["README", "a.b.run.cypher", ".hidden.run.cypher", "x.run.cypher"],
    );

    let scenarios = ScenarioLoader::new(root.path()).load_group("match").unwrap();

    assert_eq!(1, scenarios.len());
    assert_eq!("x", scenarios[0].name);
    assert_eq!(
        vec![Phase::Run],
        scenarios[0].config.phases().collect::<Vec<_>>()
    );
}

#[test]
fn group_without_scenario_files_has_empty_entry() {
    let root = tempfile::tempdir().unwrap();
    write_group(root.path(), "empty", &["setup.cypher"]);
    write_group(root.path(), "full", &["a.run.cypher"]);

    let groups = ScenarioLoader::new(root.path()).load().unwrap();

    assert_eq!(
        vec!["empty", "full"],
        groups.keys().map(String::as_str).collect::<Vec<_>>()
    );
    assert!(groups["empty"].is_empty());
    assert_eq!(1, groups["full"].len());
}

#[test]
fn stray_phase_fails_only_its_group() {
    let root = tempfile::tempdir().unwrap();
    write_group(root.path(), "bad", &["a.rn.cypher", "a.run.cypher"]);
    write_group(root.path(), "good", &["a.run.cypher"]);
    let loader = ScenarioLoader::new(root.path());

    let err = loader.load_group("bad").unwrap_err();
    assert!(err.is::<ConfigurationError>());
    let message = err.to_string();
    assert!(message.contains("'bad'"), "{message}");
    assert!(message.contains("rn"), "{message}");

    assert_eq!(1, loader.load_group("good").unwrap().len());
    assert_eq!(
        1,
        loader.load_groups(&["good".to_string()]).unwrap()["good"].len()
    );
    assert!(loader.load().is_err());
}

#[test]
fn stray_group_level_phase_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    write_group(root.path(), "g", &["warmup.cypher", "a.run.cypher"]);

    let err = ScenarioLoader::new(root.path())
        .load_group("g")
        .unwrap_err();
    assert!(err.is::<ConfigurationError>());
    assert!(err.to_string().contains("warmup"));
}

#[test]
fn unsupported_file_kind_is_rejected_at_discovery() {
    let root = tempfile::tempdir().unwrap();
    write_group(root.path(), "g", &["a.run.txt"]);

    let err = ScenarioLoader::new(root.path())
        .load_group("g")
        .unwrap_err();
    assert!(err.is::<ConfigurationError>());
    assert!(err.to_string().contains("Unsupported file kind"));
}

#[test]
fn group_names_are_sorted_directories() {
    let root = tempfile::tempdir().unwrap();
    write_group(root.path(), "update", &[]);
    write_group(root.path(), "aggregation", &[]);
    write_group(root.path(), ".git", &[]);
    std::fs::write(root.path().join("notes.txt"), "").unwrap();

    let names = ScenarioLoader::new(root.path()).group_names().unwrap();

    assert_eq!(vec!["aggregation", "update"], names);
}

#[test]
fn missing_root_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let loader = ScenarioLoader::new(root.path().join("missing"));

    assert!(loader.group_names().is_err());
}
