// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced by the host test runner.
//!
//! The bridge does not run tests itself. A runner (or an adapter in front of
//! it) emits three kinds of events over the course of a session, which are
//! modeled here as plain values. [`EventReader`] reads them from a JSON-lines
//! stream, one event per line:
//!
//! ```json
//! {"event": "collection-finished", "items": [{"name": "test_login", "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}]}
//! {"event": "phase-report", "name": "test_login", "phase": "call", "outcome": "passed", "duration": 0.42, "markers": [{"name": "testrail", "kwargs": {"id": 10}}]}
//! {"event": "session-finished", "exit-status": 0}
//! ```

use crate::errors::EventStreamError;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    io::BufRead,
    str::FromStr,
};

/// A marker attached to a test item, e.g. `testrail(id=10)`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// The marker name.
    pub name: String,

    /// Keyword arguments passed to the marker.
    #[serde(default)]
    pub kwargs: BTreeMap<String, serde_json::Value>,
}

/// Implemented by events that carry the originating test's markers.
pub trait HasMarkers {
    /// Returns the markers declared on the test, closest first.
    fn markers(&self) -> &[Marker];
}

/// A test collected by the runner.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectedItem {
    /// The test's display name (e.g. a node id).
    pub name: String,

    /// The markers declared on the test.
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl HasMarkers for CollectedItem {
    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

/// One of the three sub-stages of executing a single test.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Fixtures and other setup.
    Setup,
    /// The test body.
    Call,
    /// Cleanup.
    Teardown,
}

impl Phase {
    /// Returns the name of this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification of a single phase.
///
/// Parsing is total: names that aren't recognized are kept as
/// [`Outcome::Other`], which the status resolver treats as a failure.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Outcome {
    /// The phase passed.
    Passed,
    /// The phase failed.
    Failed,
    /// The test was skipped.
    Skipped,
    /// The test failed as expected.
    XFail,
    /// An outcome the bridge does not recognize.
    Other(String),
}

impl Outcome {
    /// Returns the outcome's name.
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::XFail => "xfail",
            Outcome::Other(name) => name,
        }
    }

    /// Returns true if this outcome is `passed`.
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl FromStr for Outcome {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcome = match s.to_ascii_lowercase().as_str() {
            "passed" => Outcome::Passed,
            "failed" => Outcome::Failed,
            "skipped" => Outcome::Skipped,
            "xfail" => Outcome::XFail,
            _ => Outcome::Other(s.to_owned()),
        };
        Ok(outcome)
    }
}

impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Outcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Outcome::from(s.as_str()))
    }
}

/// The report for one phase of one test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// The test's display name.
    pub name: String,

    /// The phase this report is for.
    pub phase: Phase,

    /// The phase's outcome.
    pub outcome: Outcome,

    /// The time the phase took, in seconds.
    #[serde(default)]
    pub duration: f64,

    /// The long representation of the failure, if any.
    #[serde(default)]
    pub longrepr: Option<String>,

    /// The markers declared on the originating test.
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl HasMarkers for PhaseReport {
    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

/// A lifecycle event from the host runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// Collection finished.
    CollectionFinished {
        /// Every collected item.
        items: Vec<CollectedItem>,
    },

    /// A phase of a test finished.
    PhaseReport(PhaseReport),

    /// The session finished.
    SessionFinished {
        /// The runner's exit status.
        #[serde(default, rename = "exit-status")]
        exit_status: i32,
    },
}

impl SessionEvent {
    /// Returns the name of this event, as used in the stream.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::CollectionFinished { .. } => "collection-finished",
            SessionEvent::PhaseReport(_) => "phase-report",
            SessionEvent::SessionFinished { .. } => "session-finished",
        }
    }
}

/// Reads [`SessionEvent`]s from a JSON-lines stream.
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a new reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Returns the number of lines read so far.
    pub fn line(&self) -> usize {
        self.line
    }

    fn read_next(&mut self) -> Result<Option<SessionEvent>, EventStreamError> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .map_err(EventStreamError::Read)?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|error| EventStreamError::Parse {
                    line: self.line,
                    error,
                });
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<SessionEvent, EventStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
