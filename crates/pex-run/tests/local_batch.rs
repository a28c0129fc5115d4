#![cfg(unix)]

mod common;

use std::fs;

use pex_doc::{Document, Node, PostChange};
use pex_run::{collect_workspace, load_study, materialize_study, run_study, run_study_local, FailureKind, ProcessBackend};
use pex_sample::StrategySpec;

use common::{speed_study, QOI};

#[test]
fn timed_out_job_is_reported_and_excluded_from_qoi() {
    let dir = tempfile::tempdir().unwrap();
    let study = speed_study(dir.path());
    let outcome = run_study(&study).unwrap();

    let names: Vec<_> = outcome.results.iter().map(|result| result.name.as_str()).collect();
    assert_eq!(names, vec!["000000_000000", "000001_000000"]);

    let stalled = &outcome.results[0];
    assert!(!stalled.success);
    assert!(stalled.timed_out);
    assert!(stalled.wall_time.is_nan());
    let failure = stalled.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.excerpt.contains("stalling"));

    let finished = &outcome.results[1];
    assert!(finished.success);
    assert_eq!(finished.exit_code, Some(0));
    assert!(finished.wall_time >= 0.0);

    assert_eq!(outcome.metadata.rows.len(), 2);
    assert_eq!(outcome.metadata.passed(), 1);
    assert_eq!(outcome.qoi.row_count(), 1);
    let table = outcome.qoi.table(QOI).unwrap();
    assert_eq!(table.rows[0].parameter_id, 1);
    assert_eq!(table.rows[0].cells, vec!["0", "12.5"]);

    assert_eq!(outcome.report.totals.total, 2);
    assert_eq!(outcome.report.totals.passed, 1);
    assert_eq!(outcome.report.totals.failed, 1);
    assert_eq!(outcome.report.failures[0].job, "000000_000000");
    assert!(!outcome.report.all_passed());
    assert_eq!(outcome.report.mode, "local");

    let ws = dir.path().join("ws");
    for file in ["parameters.csv", "metadata.csv", "qoi_evacuation_time.csv", "report.json"] {
        assert!(ws.join(file).is_file(), "{file} missing");
    }
    let metadata = fs::read_to_string(ws.join("metadata.csv")).unwrap();
    assert_eq!(metadata.lines().count(), 3);

    let variant = Document::load(&ws.join("000001_000000").join("input.json")).unwrap();
    let speed = variant.resolve(&"speed".parse().unwrap()).unwrap();
    assert_eq!(speed.value, &Node::Float(1.2));
}

#[test]
fn collect_rebuilds_tables_from_status_files() {
    let dir = tempfile::tempdir().unwrap();
    let study = speed_study(dir.path());
    let first = run_study(&study).unwrap();
    fs::remove_file(dir.path().join("ws").join("report.json")).unwrap();

    let collected = collect_workspace(&study).unwrap();
    assert_eq!(collected.report.mode, "collect");
    assert_eq!(collected.report.totals, first.report.totals);
    assert_eq!(collected.qoi, first.qoi);
    assert_eq!(collected.metadata.rows.len(), first.metadata.rows.len());
    assert!(collected.metadata.rows[0].timed_out);
    assert_eq!(collected.metadata.rows[1].exit_code, Some(0));
    assert!(dir.path().join("ws").join("report.json").is_file());
}

#[test]
fn post_changes_and_output_removal() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = speed_study(dir.path());
    study.runs = 2;
    study.keep_output = false;
    study.strategy = serde_yaml::from_str(
        r#"
type: user-defined
points:
  - speed: 1.2
"#,
    )
    .unwrap();
    study.post_changes = vec![
        PostChange::Seed {
            address: "fixedSeed".parse().unwrap(),
        },
        PostChange::Name {
            address: "label".parse().unwrap(),
        },
    ];
    let backend = ProcessBackend::new(&study.executable, Vec::new());
    let outcome = run_study_local(&study, &backend).unwrap();
    assert!(outcome.report.all_passed());
    assert_eq!(outcome.qoi.row_count(), 2);

    let ws = dir.path().join("ws");
    let second = ws.join("000000_000001");
    assert!(!second.join("output").exists());
    assert!(second.join("status.json").is_file());
    let variant = Document::load(&second.join("input.json")).unwrap();
    let label = variant.resolve(&"label".parse().unwrap()).unwrap();
    assert_eq!(label.value, &Node::String("000000_000001".into()));

    let collected = collect_workspace(&study).unwrap();
    assert_eq!(collected.report.totals.passed, 2);
    assert_eq!(collected.qoi.row_count(), 0);
}

#[test]
fn materialize_writes_variants_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let study = speed_study(dir.path());
    let jobs = materialize_study(&study).unwrap();
    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        assert!(job.input.is_file());
        assert!(!job.dir.join("status.json").exists());
    }
    let parameters = fs::read_to_string(dir.path().join("ws").join("parameters.csv")).unwrap();
    assert_eq!(parameters.lines().next(), Some("parameter_id,run_id,speed"));
}

#[test]
fn study_files_resolve_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    speed_study(dir.path());
    fs::write(
        dir.path().join("study.yaml"),
        r#"
name: speed
base_document: scenario.json
executable: simulate.sh
workspace: ws
qoi: [evacuation_time.txt]
timeout_seconds: 1
strategy:
  type: full-grid
  parameters:
    - address: speed
      values: [1.2]
"#,
    )
    .unwrap();
    let study = load_study(&dir.path().join("study.yaml")).unwrap();
    assert!(study.executable.is_absolute());
    assert!(matches!(study.strategy, StrategySpec::FullGrid { .. }));
    let outcome = run_study(&study).unwrap();
    assert!(outcome.report.all_passed());
}

#[test]
fn missing_executable_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    speed_study(dir.path());
    fs::write(
        dir.path().join("study.yaml"),
        r#"
name: speed
base_document: scenario.json
executable: nowhere.sh
workspace: ws
qoi: [evacuation_time.txt]
strategy:
  type: user-defined
  points:
    - speed: 1.2
"#,
    )
    .unwrap();
    let err = load_study(&dir.path().join("study.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config.executable");
}
