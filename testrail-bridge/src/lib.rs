// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for reporting a local test session to TestRail.
//!
//! The bridge reacts to three events produced by a test runner it does not
//! control:
//!
//! 1. **Collection finished.** The case identifiers declared by the collected
//!    tests are intersected with the cases that exist in the target project,
//!    and exactly one run is created for that intersection.
//! 2. **Phase report.** Each setup, call or teardown report is mapped to a
//!    TestRail status and submitted once per case identifier that belongs to
//!    the run.
//! 3. **Session finished.** The run is left open, or closed if configured.
//!
//! [`session::ReportSession`] ties these together. The transport is abstracted
//! behind [`client::TestRailClient`], with [`client::HttpClient`] as the
//! production implementation.

pub mod client;
pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod markers;
pub mod reporter;
pub mod session;
pub mod status;
#[cfg(test)]
pub(crate) mod test_helpers;
