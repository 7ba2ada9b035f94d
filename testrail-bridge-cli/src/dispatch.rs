// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    displayer::SessionDisplayer,
    errors::Result,
    exit_codes::BridgeExitCode,
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
};
use testrail_bridge::{
    client::{HttpClient, TestRailClient},
    config::{BridgeConfig, ConfigOverrides, UserConfigLocation},
    errors::{DisplayErrorChain, SessionError},
    events::EventReader,
    markers::CaseReferenceExtractor,
    session::{FinishPolicy, ReportSession, SessionSettings},
};
use tracing::{debug, error};

/// Reports a test session to TestRail.
///
/// The host test runner (or an adapter in front of it) writes the session's
/// events as JSON lines. `testrail-bridge report` reads them, displays each
/// one, and reports it to a run scoped to the cases the session exercises.
#[derive(Debug, Parser)]
#[command(version, name = "testrail-bridge", styles = clap_styles::style())]
pub struct BridgeApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl BridgeApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::Report {
                events,
                close_run,
                on_report_error,
            } => {
                let mut overrides = self.config_opts.overrides();
                if close_run {
                    overrides.on_finish = Some(FinishPolicy::Close);
                }
                let config = self.config_opts.load(&overrides)?;
                let reader = open_events(&events)?;

                let settings = SessionSettings::from_config(&config);
                let mut displayer = SessionDisplayer::new(
                    CaseReferenceExtractor::new(settings.marker_name.clone()),
                    output.verbose,
                );
                if output.stdout_colorized() {
                    displayer.colorize();
                }

                let client = HttpClient::new(&config.server);
                debug!("connecting to {client:?}");
                let mut session = ReportSession::start(client, settings)?;

                let mut stdout = io::stdout().lock();
                drive_session(
                    &mut session,
                    reader,
                    &mut displayer,
                    &mut stdout,
                    on_report_error,
                )
            }
            Command::ShowConfig => {
                let config = self.config_opts.load(&self.config_opts.overrides())?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{config}")
                    .and_then(|()| stdout.flush())
                    .map_err(|err| ExpectedError::WriteOutputError { err })?;
                Ok(BridgeExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Display a session's events and report them to TestRail
    ///
    /// At the end of collection, a run is created with exactly the cases that
    /// collected tests declare and that exist in the project. Each phase
    /// report is then submitted as a result for its cases in that run.
    Report {
        /// File to read JSON-lines events from, or `-` for standard input
        #[arg(long, value_name = "PATH", default_value = "-")]
        events: Utf8PathBuf,

        /// Close the run once the session finishes [default: leave it open]
        #[arg(long)]
        close_run: bool,

        /// What to do when a result fails to submit
        #[arg(long, value_enum, default_value_t, value_name = "POLICY")]
        on_report_error: ReportErrorPolicy,
    },

    /// Print the resolved configuration, with the password redacted
    ShowConfig,
}

/// What to do when a result fails to submit.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum ReportErrorPolicy {
    /// Log the failure, skip the rest of that report, and keep going.
    #[default]
    Continue,

    /// Stop reading events.
    Abort,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Directory containing `.config/testrail-bridge.toml` [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<Utf8PathBuf>,

    /// Config file [default: <root>/.config/testrail-bridge.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// User config file, or `none` to skip user config
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TESTRAIL_BRIDGE_USER_CONFIG_FILE"
    )]
    user_config_file: Option<String>,

    /// TestRail server URL
    #[arg(long, global = true, value_name = "URL", env = "TESTRAIL_URL")]
    server_url: Option<String>,

    /// Name of the TestRail project to report to
    #[arg(long, global = true, value_name = "NAME", env = "TESTRAIL_PROJECT")]
    project: Option<String>,

    /// TestRail user
    #[arg(long, global = true, value_name = "USER", env = "TESTRAIL_USER")]
    user: Option<String>,

    /// TestRail password or API key
    #[arg(
        long,
        global = true,
        value_name = "PASSWORD",
        env = "TESTRAIL_PASSWORD",
        hide_env_values = true
    )]
    password: Option<String>,
}

impl ConfigOpts {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_url: self.server_url.clone(),
            project: self.project.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            on_finish: None,
        }
    }

    fn load(&self, overrides: &ConfigOverrides) -> Result<BridgeConfig> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => current_dir()?,
        };
        let config = BridgeConfig::load(
            &root,
            self.config_file.as_deref(),
            UserConfigLocation::from_cli_or_env(self.user_config_file.as_deref()),
            overrides,
        )?;
        Ok(config)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 {
        path: err.into_path_buf(),
    })
}

fn open_events(path: &Utf8Path) -> Result<EventReader<Box<dyn BufRead>>> {
    if path == "-" {
        return Ok(EventReader::new(Box::new(io::stdin().lock())));
    }
    let file = File::open(path).map_err(|err| ExpectedError::EventsOpenFailed {
        path: path.to_owned(),
        err,
    })?;
    Ok(EventReader::new(Box::new(BufReader::new(file))))
}

/// Displays and reports every event in `events`.
///
/// Each event is displayed before the session handles it. Under
/// [`ReportErrorPolicy::Continue`], submission failures are logged and
/// counted, and reading continues; any other session error stops the stream.
fn drive_session<C: TestRailClient, R: BufRead>(
    session: &mut ReportSession<C>,
    mut events: EventReader<R>,
    displayer: &mut SessionDisplayer,
    writer: &mut dyn Write,
    policy: ReportErrorPolicy,
) -> Result<i32> {
    let mut failed = 0;
    while let Some(event) = events.next() {
        let event = event?;
        displayer
            .write_event(&event, writer)
            .map_err(|err| ExpectedError::WriteOutputError { err })?;

        match session.handle(&event) {
            Ok(submitted) => {
                debug!(
                    "line {}: `{}` submitted {submitted} results",
                    events.line(),
                    event.name()
                );
            }
            Err(err @ (SessionError::SubmitResult { .. } | SessionError::CloseRun(_)))
                if policy == ReportErrorPolicy::Continue =>
            {
                error!("{}", DisplayErrorChain(&err));
                failed += 1;
            }
            Err(err) => return Err(ExpectedError::from_session_error(err, events.line())),
        }
    }
    writer
        .flush()
        .map_err(|err| ExpectedError::WriteOutputError { err })?;

    if failed > 0 {
        Err(ExpectedError::ReportsFailed { failed })
    } else {
        Ok(BridgeExitCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use testrail_bridge::{
        entities::{
            Case, CaseId, NewResult, NewRun, Project, ProjectId, ResultId, Run, RunId, Status,
            SubmittedResult,
        },
        errors::TransportError,
        status::StatusRefreshPolicy,
    };

    #[test]
    fn verify_app() {
        BridgeApp::command().debug_assert();
    }

    #[test]
    fn parse_report_args() {
        let app = BridgeApp::try_parse_from([
            "testrail-bridge",
            "report",
            "--events",
            "events.jsonl",
            "--close-run",
            "--on-report-error",
            "abort",
            "--project",
            "Web Shop",
            "--user-config-file",
            "none",
        ])
        .unwrap();

        match app.command {
            Command::Report {
                events,
                close_run,
                on_report_error,
            } => {
                assert_eq!(events, "events.jsonl");
                assert!(close_run);
                assert_eq!(on_report_error, ReportErrorPolicy::Abort);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(app.config_opts.project.as_deref(), Some("Web Shop"));
        assert_eq!(app.config_opts.user_config_file.as_deref(), Some("none"));
    }

    #[test]
    fn parse_report_defaults() {
        let app = BridgeApp::try_parse_from(["testrail-bridge", "report"]).unwrap();
        match app.command {
            Command::Report {
                events,
                close_run,
                on_report_error,
            } => {
                assert_eq!(events, "-");
                assert!(!close_run);
                assert_eq!(on_report_error, ReportErrorPolicy::Continue);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    /// A client for a project with cases 10 and 20, where submissions for
    /// case 20 fail.
    #[derive(Debug, Default)]
    struct FakeClient {
        submitted: RefCell<Vec<CaseId>>,
    }

    impl TestRailClient for FakeClient {
        fn list_projects(&self) -> Result<Vec<Project>, TransportError> {
            Ok(vec![Project {
                id: ProjectId(1),
                name: "Web Shop".to_owned(),
            }])
        }

        fn list_statuses(&self) -> Result<Vec<Status>, TransportError> {
            Ok(Vec::new())
        }

        fn list_cases(&self, _project_id: ProjectId) -> Result<Vec<Case>, TransportError> {
            Ok([10, 20]
                .into_iter()
                .map(|id| Case {
                    id: CaseId(id),
                    title: String::new(),
                })
                .collect())
        }

        fn create_run(&self, run: &NewRun, _project_id: ProjectId) -> Result<Run, TransportError> {
            Ok(Run {
                id: RunId(7),
                name: run.name.clone(),
                description: None,
                include_all: false,
                case_ids: Vec::new(),
                is_completed: false,
            })
        }

        fn submit_result(
            &self,
            result: &NewResult,
            run_id: RunId,
            case_id: CaseId,
        ) -> Result<SubmittedResult, TransportError> {
            if case_id == CaseId(20) {
                return Err(TransportError::status(
                    format!("add_result_for_case/{run_id}/{case_id}"),
                    503,
                    "Service Unavailable",
                ));
            }
            self.submitted.borrow_mut().push(case_id);
            Ok(SubmittedResult {
                id: ResultId(1),
                status_id: Some(result.status_id),
            })
        }

        fn close_run(&self, _run_id: RunId) -> Result<Run, TransportError> {
            unreachable!("runs are left open in these tests")
        }
    }

    fn session(client: &FakeClient) -> ReportSession<&FakeClient> {
        ReportSession::start(
            client,
            SessionSettings {
                server_label: "test".to_owned(),
                project_name: "Web Shop".to_owned(),
                run_description: String::new(),
                suite_id: None,
                marker_name: "testrail".to_owned(),
                status_refresh: StatusRefreshPolicy::default(),
                on_finish: FinishPolicy::LeaveOpen,
            },
        )
        .unwrap()
    }

    const EVENTS: &str = indoc! {r#"
        {"event": "collection-finished", "items": [{"name": "test_a", "markers": [{"name": "testrail", "kwargs": {"id": 20}}]}, {"name": "test_b", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}]}
        {"event": "phase-report", "name": "test_a", "phase": "call", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"id": 20}}]}
        {"event": "phase-report", "name": "test_b", "phase": "call", "outcome": "failed", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
        {"event": "session-finished", "exit-status": 1}
    "#};

    fn drive(client: &FakeClient, events: &str, policy: ReportErrorPolicy) -> (Result<i32>, String) {
        let mut session = session(client);
        let mut displayer = SessionDisplayer::new(CaseReferenceExtractor::default(), false);
        let mut out = Vec::new();
        let result = drive_session(
            &mut session,
            EventReader::new(events.as_bytes()),
            &mut displayer,
            &mut out,
            policy,
        );
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn continue_after_submit_failure() {
        let client = FakeClient::default();
        let (result, output) = drive(&client, EVENTS, ReportErrorPolicy::Continue);

        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::ReportsFailed { failed: 1 }),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.process_exit_code(), BridgeExitCode::REPORT_FAILED);
        // The later report was still submitted, and everything was displayed.
        assert_eq!(*client.submitted.borrow(), vec![CaseId(10)]);
        assert!(output.contains("Summary"), "{output}");
    }

    #[test]
    fn abort_on_submit_failure() {
        let client = FakeClient::default();
        let (result, output) = drive(&client, EVENTS, ReportErrorPolicy::Abort);

        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::ReportAborted { .. }),
            "unexpected error: {err:?}"
        );
        assert!(client.submitted.borrow().is_empty());
        assert!(!output.contains("test_b"), "{output}");
    }

    #[test]
    fn out_of_order_events() {
        let client = FakeClient::default();
        let events = indoc! {r#"
            {"event": "collection-finished", "items": []}
            {"event": "collection-finished", "items": []}
        "#};
        let (result, _) = drive(&client, events, ReportErrorPolicy::Continue);

        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::EventsOutOfOrder { line: 2, .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(
            err.process_exit_code(),
            BridgeExitCode::MALFORMED_EVENT_STREAM
        );
    }

    #[test]
    fn clean_session() {
        let client = FakeClient::default();
        let events = indoc! {r#"
            {"event": "collection-finished", "items": [{"name": "test_b", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}]}
            {"event": "phase-report", "name": "test_b", "phase": "call", "outcome": "passed", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
            {"event": "session-finished", "exit-status": 0}
        "#};
        let (result, output) = drive(&client, events, ReportErrorPolicy::Continue);

        assert_eq!(result.unwrap(), BridgeExitCode::OK);
        assert_eq!(*client.submitted.borrow(), vec![CaseId(10)]);
        assert!(output.contains("PASS"), "{output}");
    }
}
