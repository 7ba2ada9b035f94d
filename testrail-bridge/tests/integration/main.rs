// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end sessions driven from a JSON-lines event stream.

mod fixtures;

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use pretty_assertions::assert_eq;
use testrail_bridge::{
    config::{BridgeConfig, ConfigOverrides, UserConfigLocation},
    entities::{CaseId, RunId, StatusId},
    errors::{EventStreamError, SessionError, StartupError},
    events::EventReader,
    session::{FinishPolicy, ReportSession, SessionSettings},
};

fn session_stream() -> String {
    let mut stream = concat!(
        r#"{"event": "collection-finished", "items": ["#,
        r#"{"name": "test_a", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}, "#,
        r#"{"name": "test_b", "markers": [{"name": "testrail", "kwargs": {"ids": [10, 20]}}]}, "#,
        r#"{"name": "test_c"}]}"#,
        "\n",
    )
    .to_owned();
    stream.push_str(indoc! {r#"
        {"event": "phase-report", "name": "test_a", "phase": "setup", "outcome": "passed", "duration": 0.001, "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
        {"event": "phase-report", "name": "test_a", "phase": "call", "outcome": "passed", "duration": 0.25, "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
        {"event": "phase-report", "name": "test_a", "phase": "teardown", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}

        {"event": "phase-report", "name": "test_b", "phase": "setup", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"ids": [10, 20]}}]}
        {"event": "phase-report", "name": "test_b", "phase": "call", "outcome": "failed", "duration": 1.5, "longrepr": "assert 1 == 2", "markers": [{"name": "testrail", "kwargs": {"ids": [10, 20]}}]}
        {"event": "phase-report", "name": "test_b", "phase": "teardown", "outcome": "failed", "duration": 0.0, "longrepr": "fixture leaked", "markers": [{"name": "testrail", "kwargs": {"ids": [10, 20]}}]}

        {"event": "phase-report", "name": "test_c", "phase": "setup", "outcome": "passed"}
        {"event": "phase-report", "name": "test_c", "phase": "call", "outcome": "failed", "longrepr": "boom"}
        {"event": "phase-report", "name": "test_c", "phase": "teardown", "outcome": "passed"}
        {"event": "session-finished", "exit-status": 1}
    "#});
    stream
}

fn drive(session: &mut ReportSession<&FakeServer>, stream: &str) -> Result<usize> {
    let mut submitted = 0;
    for event in EventReader::new(stream.as_bytes()) {
        submitted += session.handle(&event?)?;
    }
    Ok(submitted)
}

#[test]
fn run_scoped_to_exercised_cases() -> Result<()> {
    test_init();

    let server = FakeServer::new([10, 30]);
    let mut session = ReportSession::start(&server, settings(FinishPolicy::LeaveOpen))?;
    let submitted = drive(&mut session, &session_stream())?;
    assert_eq!(submitted, 3);

    let runs = server.runs();
    ensure!(runs.len() == 1, "exactly one run is created, found {}", runs.len());
    let run = &runs[0];
    assert_eq!(run.case_ids, vec![CaseId(10)]);
    assert!(!run.include_all);
    assert!(!run.is_completed, "run is left open by default");
    assert!(
        run.name.starts_with("Test run (staging): Project: \"Web Shop\": "),
        "unexpected run name: {}",
        run.name
    );

    let results: Vec<_> = server
        .results()
        .into_iter()
        .map(|(run_id, case_id, result)| (run_id, case_id, result.status_id, result.comment))
        .collect();
    assert_eq!(
        results,
        vec![
            (
                run.id,
                CaseId(10),
                StatusId(1),
                "test_a: passed (call)".to_owned()
            ),
            (
                run.id,
                CaseId(10),
                StatusId(5),
                "test_b: failed (call)\n\nassert 1 == 2".to_owned()
            ),
            (
                run.id,
                CaseId(10),
                StatusId(5),
                "test_b: failed (teardown)\n\nfixture leaked".to_owned()
            ),
        ]
    );

    let elapsed: Vec<_> = server
        .results()
        .into_iter()
        .map(|(_, _, result)| result.elapsed)
        .collect();
    assert_eq!(elapsed, vec!["0.25s", "1.50s", "0.01s"]);

    Ok(())
}

#[test]
fn close_on_finish() -> Result<()> {
    test_init();

    let server = FakeServer::new([10, 30]);
    let mut session = ReportSession::start(&server, settings(FinishPolicy::Close))?;
    drive(&mut session, &session_stream())?;

    let runs = server.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].is_completed);
    Ok(())
}

#[test]
fn nothing_matches() -> Result<()> {
    test_init();

    let server = FakeServer::new([30]);
    let mut session = ReportSession::start(&server, settings(FinishPolicy::LeaveOpen))?;
    assert_eq!(drive(&mut session, &session_stream())?, 0);

    // The run is still created, and is empty.
    let runs = server.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].case_ids.is_empty());
    assert!(server.results().is_empty());
    Ok(())
}

#[test]
fn unknown_project_stops_startup() {
    test_init();

    let server = FakeServer::new([10]);
    let mut settings = settings(FinishPolicy::LeaveOpen);
    settings.project_name = "web shop".to_owned();

    let error = ReportSession::start(&server, settings).unwrap_err();
    assert!(
        matches!(&error, StartupError::ProjectNotFound { name, .. } if name == "web shop"),
        "unexpected error: {error:?}"
    );
    assert_eq!(
        error.to_string(),
        "project `web shop` not found on the server (known projects: `Mobile`, `Web Shop`)"
    );
    assert!(server.runs().is_empty());
}

#[test]
fn report_before_collection_is_rejected() -> Result<()> {
    test_init();

    let server = FakeServer::new([10]);
    let mut session = ReportSession::start(&server, settings(FinishPolicy::LeaveOpen))?;
    let stream = indoc! {r#"
        {"event": "phase-report", "name": "test_a", "phase": "call", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
    "#};

    let error = drive(&mut session, stream).unwrap_err();
    let error = error
        .downcast_ref::<SessionError>()
        .expect("error is a session error");
    assert!(
        matches!(error, SessionError::CollectionNotFinished { .. }),
        "unexpected error: {error:?}"
    );
    Ok(())
}

#[test]
fn malformed_line_reports_line_number() -> Result<()> {
    test_init();

    let server = FakeServer::new([10]);
    let mut session = ReportSession::start(&server, settings(FinishPolicy::LeaveOpen))?;
    let stream = indoc! {r#"
        {"event": "collection-finished", "items": []}

        {"event": "phase-report", "name": "test_a"
    "#};

    let error = drive(&mut session, stream).unwrap_err();
    let error = error
        .downcast_ref::<EventStreamError>()
        .expect("error is an event stream error");
    assert!(
        matches!(error, EventStreamError::Parse { line: 3, .. }),
        "unexpected error: {error:?}"
    );
    Ok(())
}

#[test]
fn session_from_repo_config() -> Result<()> {
    test_init();

    let dir = Utf8TempDir::new()?;
    let config_path = dir.path().join(BridgeConfig::CONFIG_PATH);
    std::fs::create_dir_all(dir.path().join(".config"))?;
    let repo_config = toml::Value::try_from(serde_json::json!({
        "server": {
            "url": "https://example.testrail.io",
            "label": "nightly",
            "user": "ci@example.com",
            "password": "secret",
        },
        "project": {"name": "Web Shop"},
        "run": {"on-finish": "close"},
        "markers": {"name": "case"},
    }))?;
    std::fs::write(&config_path, toml::to_string(&repo_config)?)?;

    let config = BridgeConfig::load(
        dir.path(),
        None,
        UserConfigLocation::Isolated,
        &ConfigOverrides::default(),
    )?;
    let settings = SessionSettings::from_config(&config);
    assert_eq!(settings.server_label, "nightly");
    assert_eq!(settings.marker_name, "case");
    assert_eq!(settings.on_finish, FinishPolicy::Close);

    let server = FakeServer::new([10, 30]);
    let mut session = ReportSession::start(&server, settings)?;
    let stream = indoc! {r#"
        {"event": "collection-finished", "items": [{"name": "test_a", "markers": [{"name": "case", "kwargs": {"id": "C30"}}]}, {"name": "test_b", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}]}
        {"event": "phase-report", "name": "test_a", "phase": "call", "outcome": "skipped", "markers": [{"name": "case", "kwargs": {"id": "C30"}}]}
        {"event": "phase-report", "name": "test_b", "phase": "call", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
        {"event": "session-finished", "exit-status": 0}
    "#};
    assert_eq!(drive(&mut session, stream)?, 1);

    let runs = server.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, RunId(100));
    assert_eq!(runs[0].case_ids, vec![CaseId(30)]);
    assert!(runs[0].is_completed);
    assert_eq!(server.results()[0].2.status_id, StatusId(6));
    Ok(())
}
