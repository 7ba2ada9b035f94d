// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity values exchanged with TestRail.
//!
//! These mirror the JSON bodies of the TestRail v2 API. Only the fields the
//! bridge reads or writes are modeled; unknown fields in responses are
//! ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(
    /// Identifies a project.
    ProjectId
);
id_newtype!(
    /// Identifies a result status (passed, failed, custom statuses, ...).
    StatusId
);
id_newtype!(
    /// Identifies a test case within a project.
    CaseId
);
id_newtype!(
    /// Identifies a test run.
    RunId
);
id_newtype!(
    /// Identifies a submitted result.
    ResultId
);
id_newtype!(
    /// Identifies a test suite within a multi-suite project.
    SuiteId
);

/// A TestRail project.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The project identifier.
    pub id: ProjectId,
    /// The project's display name.
    pub name: String,
}

/// A result status known to the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// The status identifier.
    pub id: StatusId,
    /// The system name, e.g. `passed` or `xfail`.
    pub name: String,
    /// The human-readable label.
    #[serde(default)]
    pub label: String,
}

/// A test case that exists in a project.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// The case identifier.
    pub id: CaseId,
    /// The case title.
    #[serde(default)]
    pub title: String,
}

/// The body sent to create a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewRun {
    /// The run name.
    pub name: String,
    /// A free-form description.
    pub description: String,
    /// Whether the run includes every case in the project. Always false for
    /// runs created by the bridge.
    pub include_all: bool,
    /// The cases included in the run.
    pub case_ids: Vec<CaseId>,
    /// The suite the run belongs to, for multi-suite projects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<SuiteId>,
}

/// A run as returned by the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// The server-assigned run identifier.
    pub id: RunId,
    /// The run name.
    pub name: String,
    /// The run description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the run includes every case in the project.
    #[serde(default)]
    pub include_all: bool,
    /// The cases in the run. The server does not echo these back, so this is
    /// empty unless filled in locally.
    #[serde(default)]
    pub case_ids: Vec<CaseId>,
    /// Whether the run has been closed.
    #[serde(default)]
    pub is_completed: bool,
}

/// The body sent to add a result for a case.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewResult {
    /// The resolved status.
    pub status_id: StatusId,
    /// A human-readable comment.
    pub comment: String,
    /// The time taken, formatted as a timespan (e.g. `1.25s`).
    pub elapsed: String,
}

/// A result as acknowledged by the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubmittedResult {
    /// The server-assigned result identifier.
    pub id: ResultId,
    /// The status the result was recorded with.
    #[serde(default)]
    pub status_id: Option<StatusId>,
}
