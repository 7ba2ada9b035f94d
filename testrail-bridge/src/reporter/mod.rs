// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning runner events into TestRail runs and results.
//!
//! [`open_run`] handles the end of collection: it creates the run that the
//! rest of the session reports into. [`ResultEmitter`] handles each phase
//! report after that.

mod emitter;
mod run;

pub use emitter::*;
pub use run::*;
