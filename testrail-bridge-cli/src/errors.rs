// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{exit_codes::BridgeExitCode, output::StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use testrail_bridge::errors::{
    ConfigParseError, ConfigParseErrorKind, EventStreamError, SessionError, StartupError,
};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholder messages: errors are expected to be
// printed with display_to_stderr, which colorizes them.

/// An expected failure, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to open event stream")]
    EventsOpenFailed {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("session startup failed")]
    StartupFailed {
        #[from]
        err: StartupError,
    },
    #[error("run creation failed")]
    RunCreationFailed {
        #[source]
        err: SessionError,
    },
    #[error("reporting aborted")]
    ReportAborted {
        #[source]
        err: SessionError,
    },
    #[error("{failed} reports failed")]
    ReportsFailed { failed: usize },
    #[error("event stream error")]
    EventStreamError {
        #[from]
        err: EventStreamError,
    },
    #[error("events out of order")]
    EventsOutOfOrder {
        line: usize,
        #[source]
        err: SessionError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Classifies a session error raised while handling the event on `line`.
    ///
    /// Submission failures map to [`Self::ReportAborted`]. Callers apply the
    /// report-error policy before getting here.
    pub(crate) fn from_session_error(err: SessionError, line: usize) -> Self {
        match err {
            SessionError::ListCases { .. } | SessionError::CreateRun { .. } => {
                Self::RunCreationFailed { err }
            }
            SessionError::RunAlreadyCreated
            | SessionError::CollectionNotFinished { .. }
            | SessionError::AlreadyFinished { .. } => Self::EventsOutOfOrder { line, err },
            SessionError::SubmitResult { .. } | SessionError::CloseRun(_) => {
                Self::ReportAborted { err }
            }
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::EventsOpenFailed { .. } => BridgeExitCode::SETUP_ERROR,
            Self::StartupFailed { .. } => BridgeExitCode::STARTUP_FAILED,
            Self::RunCreationFailed { .. } => BridgeExitCode::RUN_CREATION_FAILED,
            Self::ReportAborted { .. } | Self::ReportsFailed { .. } => {
                BridgeExitCode::REPORT_FAILED
            }
            Self::EventStreamError { .. } | Self::EventsOutOfOrder { .. } => {
                BridgeExitCode::MALFORMED_EVENT_STREAM
            }
            Self::WriteOutputError { .. } => BridgeExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirInvalid { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory is not valid UTF-8: {}",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => match err.kind() {
                ConfigParseErrorKind::MissingKey(key) => {
                    error!(
                        "missing required setting `{}` \
                         (set it in a config file, or pass it on the command line)",
                        key.style(styles.bold)
                    );
                    None
                }
                ConfigParseErrorKind::FileNotFound => {
                    error!(
                        "config file not found at `{}`",
                        err.config_file().style(styles.bold)
                    );
                    None
                }
                kind => {
                    error!(
                        "failed to parse config at `{}`",
                        err.config_file().style(styles.bold)
                    );
                    Some(kind as &dyn Error)
                }
            },
            Self::EventsOpenFailed { path, err } => {
                error!("failed to open event stream `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::StartupFailed { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunCreationFailed { err } => {
                error!("{err}");
                error!(
                    target: crate::output::NO_HEADING_TARGET,
                    "{}",
                    "(no results were reported for this session)".style(styles.warning_text)
                );
                err.source()
            }
            Self::ReportAborted { err } => {
                error!("{err}, aborting");
                err.source()
            }
            Self::ReportsFailed { failed } => {
                error!(
                    "{} {} failed to submit",
                    failed.style(styles.bold),
                    if *failed == 1 { "report" } else { "reports" },
                );
                None
            }
            Self::EventStreamError { err } => {
                error!("{err}");
                err.source()
            }
            Self::EventsOutOfOrder { line, err } => {
                error!("event on line {line} is out of order: {err}");
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(
                target: crate::output::NO_HEADING_TARGET,
                "\nCaused by:\n  {}", err
            );
            next_error = err.source();
        }
    }
}
