// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the bridge.
//!
//! Server details, credentials and the target project are assembled before a
//! session starts, from several layers.
//!
//! ## Configuration hierarchy
//!
//! Settings are resolved in the following order (highest priority first):
//!
//! 1. CLI arguments and `TESTRAIL_*` environment variables (e.g.
//!    `--project`, `TESTRAIL_PASSWORD`)
//! 2. Repository config (`.config/testrail-bridge.toml`)
//! 3. User config (`~/.config/testrail-bridge/config.toml`)
//! 4. Built-in defaults
//!
//! Credentials usually live in the user config or the environment, while the
//! repository config names the server and project.

mod discovery;
mod imp;

pub use discovery::*;
pub use imp::*;
