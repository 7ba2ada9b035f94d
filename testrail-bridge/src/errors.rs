// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the bridge.

use crate::entities::ProjectId;
use camino::{FromPathBufError, Utf8PathBuf};
use config::ConfigError;
use std::{collections::BTreeSet, fmt};
use thiserror::Error;

/// An error returned by a call to the TestRail API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request to `{endpoint}` failed")]
    Request {
        /// The endpoint, e.g. `add_run/1`.
        endpoint: String,

        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },

    /// The server responded with a non-success status.
    #[error("request to `{endpoint}` returned status {status}: {message}")]
    Status {
        /// The endpoint, e.g. `add_run/1`.
        endpoint: String,

        /// The HTTP status code.
        status: u16,

        /// The raw response body.
        body: String,

        /// The message extracted from the body.
        message: String,
    },

    /// The response body could not be deserialized.
    #[error("response from `{endpoint}` could not be parsed")]
    Deserialize {
        /// The endpoint, e.g. `get_projects`.
        endpoint: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

impl TransportError {
    /// Creates a new `Status` error, extracting a readable message from the
    /// body.
    pub fn status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = error_message_from_body(&body);
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body,
            message,
        }
    }

    /// Returns the endpoint this error is associated with.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Request { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Deserialize { endpoint, .. } => endpoint,
        }
    }
}

/// Extracts the `"error"` field from a JSON error body, falling back to the
/// raw body text.
pub(crate) fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.as_str())
                .map(|s| s.to_owned())
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

/// An error that occurred while starting a reporting session.
///
/// These are fatal: no test should run against a missing project.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No project matched the configured name.
    #[error(
        "project `{name}` not found on the server (known projects: {})",
        DisplayKnown(.known),
    )]
    ProjectNotFound {
        /// The configured project name.
        name: String,

        /// The names of the projects the server returned.
        known: BTreeSet<String>,
    },

    /// Listing projects failed.
    #[error("failed to list projects")]
    ListProjects(#[source] TransportError),

    /// Listing statuses failed.
    #[error("failed to list statuses")]
    ListStatuses(#[source] TransportError),
}

struct DisplayKnown<'a>(&'a BTreeSet<String>);

impl fmt::Display for DisplayKnown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "`{name}`")?;
        }
        Ok(())
    }
}

/// An error that occurred while handling a session event.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Listing the project's cases failed.
    #[error("failed to list cases for project {project_id}")]
    ListCases {
        /// The project whose cases were requested.
        project_id: ProjectId,

        /// The underlying error.
        #[source]
        error: TransportError,
    },

    /// Creating the run failed.
    #[error("failed to create run `{name}`")]
    CreateRun {
        /// The name of the run that was being created.
        name: String,

        /// The underlying error.
        #[source]
        error: TransportError,
    },

    /// Submitting a result failed. Results for the remaining case identifiers
    /// of the same report were not submitted.
    #[error("failed to submit result for test `{test_name}` ({submitted} of {total} submitted)")]
    SubmitResult {
        /// The test whose report was being submitted.
        test_name: String,

        /// The number of results submitted before the failure.
        submitted: usize,

        /// The number of results that would have been submitted.
        total: usize,

        /// The underlying error.
        #[source]
        error: TransportError,
    },

    /// Closing the run at session end failed.
    #[error("failed to close run")]
    CloseRun(#[source] TransportError),

    /// Collection finished more than once.
    #[error("a run was already created for this session")]
    RunAlreadyCreated,

    /// A phase report or session end arrived before collection finished.
    #[error("received `{event}` before collection finished")]
    CollectionNotFinished {
        /// The name of the event.
        event: &'static str,
    },

    /// An event arrived after the session finished.
    #[error("received `{event}` after the session finished")]
    AlreadyFinished {
        /// The name of the event.
        event: &'static str,
    },
}

/// An error that occurred while parsing configuration.
#[derive(Debug, Error)]
#[error("failed to parse config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file this error is associated with.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of a [`ConfigParseError`].
#[derive(Debug, Error)]
pub enum ConfigParseErrorKind {
    /// The layered config could not be built.
    #[error(transparent)]
    Build(Box<ConfigError>),

    /// The config could not be deserialized.
    #[error(transparent)]
    Deserialize(Box<serde_path_to_error::Error<ConfigError>>),

    /// A required key was not set by any layer.
    #[error("required key `{0}` is not set")]
    MissingKey(&'static str),

    /// An explicitly requested file does not exist.
    #[error("file does not exist")]
    FileNotFound,

    /// The user config directory is not valid UTF-8.
    #[error("user config directory is not valid UTF-8")]
    NonUtf8Path(#[source] FromPathBufError),
}

/// An error that occurred while reading a stream of session events.
#[derive(Debug, Error)]
pub enum EventStreamError {
    /// Reading from the stream failed.
    #[error("failed to read event stream")]
    Read(#[source] std::io::Error),

    /// A line could not be parsed as an event.
    #[error("invalid event on line {line}")]
    Parse {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// Displays an error along with its chain of sources, one per line.
#[derive(Clone, Copy, Debug)]
pub struct DisplayErrorChain<E>(pub E);

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, "\n  caused by: {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
