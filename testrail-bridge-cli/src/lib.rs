// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `testrail-bridge` command-line driver.
//!
//! Reads a test session's events, presents them on the console, and reports
//! them to TestRail through [`testrail_bridge`].

mod dispatch;
mod displayer;
mod errors;
mod exit_codes;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use exit_codes::BridgeExitCode;
#[doc(hidden)]
pub use output::{Color, OutputContext, StderrStyles};
