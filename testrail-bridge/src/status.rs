// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping test outcomes to TestRail status identifiers.

use crate::{
    client::TestRailClient,
    entities::{Status, StatusId},
    errors::TransportError,
    events::Outcome,
};
use serde::Deserialize;
use tracing::debug;

/// The status identifiers used for each recognized outcome.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusTable {
    /// Used for `passed`.
    pub passed: StatusId,
    /// Used for `failed` and for every unrecognized outcome.
    pub failed: StatusId,
    /// Used for `skipped`.
    pub skipped: StatusId,
    /// Used for `xfail`.
    pub xfail: StatusId,
}

impl StatusTable {
    /// The built-in table, before any server values are applied.
    ///
    /// `1` and `5` are TestRail's stock `passed` and `failed` statuses.
    /// `skipped` and `xfail` are custom statuses, so they start out as
    /// `passed` until the server says otherwise.
    pub const BASE: Self = Self {
        passed: StatusId(1),
        failed: StatusId(5),
        skipped: StatusId(1),
        xfail: StatusId(1),
    };
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::BASE
    }
}

/// Controls which table entries are refreshed from the server.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusRefreshPolicy {
    /// Also overwrite `passed` from a server status named `passed`.
    ///
    /// Off by default: only `skipped` and `xfail` are looked up.
    #[serde(default)]
    pub resolve_passed: bool,
}

/// Resolves outcomes to status identifiers.
#[derive(Clone, Debug, Default)]
pub struct StatusResolver {
    table: StatusTable,
}

impl StatusResolver {
    /// Creates a resolver over the given table.
    pub fn new(table: StatusTable) -> Self {
        Self { table }
    }

    /// Starts from [`StatusTable::BASE`] and applies the server's status list.
    pub fn refresh(
        client: &impl TestRailClient,
        policy: StatusRefreshPolicy,
    ) -> Result<Self, TransportError> {
        let statuses = client.list_statuses()?;
        Ok(Self::from_statuses(&statuses, policy))
    }

    /// Applies `statuses` on top of [`StatusTable::BASE`].
    pub fn from_statuses(statuses: &[Status], policy: StatusRefreshPolicy) -> Self {
        let mut table = StatusTable::BASE;
        for status in statuses {
            let slot = match status.name.as_str() {
                "skipped" => &mut table.skipped,
                "xfail" => &mut table.xfail,
                "passed" if policy.resolve_passed => &mut table.passed,
                _ => continue,
            };
            debug!("status `{}` resolved to {}", status.name, status.id);
            *slot = status.id;
        }
        Self { table }
    }

    /// Returns the current table.
    pub fn table(&self) -> &StatusTable {
        &self.table
    }

    /// Returns the status identifier for `outcome`.
    pub fn resolve(&self, outcome: &Outcome) -> StatusId {
        match outcome {
            Outcome::Passed => self.table.passed,
            Outcome::Failed | Outcome::Other(_) => self.table.failed,
            Outcome::Skipped => self.table.skipped,
            Outcome::XFail => self.table.xfail,
        }
    }

    /// Returns the status identifier for an outcome name, matched
    /// case-insensitively. Unknown names resolve to the failed status.
    pub fn resolve_name(&self, outcome_name: &str) -> StatusId {
        self.resolve(&Outcome::from(outcome_name))
    }
}
