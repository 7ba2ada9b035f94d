// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `testrail-bridge` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum BridgeExitCode {}

impl BridgeExitCode {
    /// No errors occurred and the session was reported.
    pub const OK: i32 = 0;

    /// The configuration could not be loaded, or an input could not be
    /// opened.
    pub const SETUP_ERROR: i32 = 96;

    /// The session could not start: the target project was not found, or
    /// the server could not be queried.
    pub const STARTUP_FAILED: i32 = 97;

    /// One or more results (or closing the run) failed to submit.
    pub const REPORT_FAILED: i32 = 98;

    /// The event stream could not be read, contained a malformed line, or
    /// delivered events out of order.
    pub const MALFORMED_EVENT_STREAM: i32 = 99;

    /// Listing cases or creating the run failed at the end of collection.
    pub const RUN_CREATION_FAILED: i32 = 100;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
