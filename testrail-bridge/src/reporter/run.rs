// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    client::TestRailClient,
    entities::{CaseId, NewRun, Project, Run, SuiteId},
    errors::SessionError,
    events::CollectedItem,
    markers::{CaseReferenceExtractor, CaseReferenceSet},
};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use tracing::info;

/// The format of the timestamp in run names.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The run to create for a session, computed from the collected items and the
/// cases that exist in the project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunPlan {
    /// Every case identifier declared by a collected item.
    pub declared: BTreeSet<CaseId>,
    /// The declared identifiers that exist in the project.
    pub matching: CaseReferenceSet,
    /// The run to create.
    pub new_run: NewRun,
}

/// Identifies the run being planned.
#[derive(Clone, Copy, Debug)]
pub struct RunTarget<'a> {
    /// The label of the server, used in the run name.
    pub server_label: &'a str,
    /// The target project.
    pub project: &'a Project,
    /// The run description.
    pub description: &'a str,
    /// The suite the run belongs to, for multi-suite projects.
    pub suite_id: Option<SuiteId>,
}

impl RunPlan {
    /// Computes the plan.
    ///
    /// The run covers exactly `declared ∩ existing`. An empty intersection
    /// still produces a run.
    pub fn new<'a>(
        target: RunTarget<'_>,
        extractor: &CaseReferenceExtractor,
        items: impl IntoIterator<Item = &'a CollectedItem>,
        existing: impl IntoIterator<Item = CaseId>,
        timestamp: DateTime<Local>,
    ) -> Self {
        let declared: BTreeSet<CaseId> = items
            .into_iter()
            .filter_map(|item| extractor.extract(item))
            .flatten()
            .collect();
        let existing: BTreeSet<CaseId> = existing.into_iter().collect();
        let matching = CaseReferenceSet::new(declared.intersection(&existing).copied());

        let new_run = NewRun {
            name: run_name(target.server_label, &target.project.name, timestamp),
            description: target.description.to_owned(),
            include_all: false,
            case_ids: matching.iter().collect(),
            suite_id: target.suite_id,
        };

        Self {
            declared,
            matching,
            new_run,
        }
    }
}

/// Builds the name of a run.
pub fn run_name(server_label: &str, project_name: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "Test run ({server_label}): Project: \"{project_name}\": {}",
        timestamp.format(RUN_TIMESTAMP_FORMAT)
    )
}

/// A run created for the session, along with the cases accepted into it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionRun {
    /// The run as returned by the server, with its case ids filled in.
    pub run: Run,
    /// The cases results may be submitted for.
    pub cases: CaseReferenceSet,
}

/// Creates the session's run once collection has finished.
///
/// Lists the cases in the project, intersects them with the cases the
/// collected items declare, and creates a run for the intersection.
pub fn open_run<'a>(
    client: &impl TestRailClient,
    target: RunTarget<'_>,
    extractor: &CaseReferenceExtractor,
    items: impl IntoIterator<Item = &'a CollectedItem>,
) -> Result<SessionRun, SessionError> {
    let project_id = target.project.id;
    let existing = client
        .list_cases(project_id)
        .map_err(|error| SessionError::ListCases { project_id, error })?;

    let plan = RunPlan::new(
        target,
        extractor,
        items,
        existing.into_iter().map(|case| case.id),
        Local::now(),
    );

    let mut run = client
        .create_run(&plan.new_run, project_id)
        .map_err(|error| SessionError::CreateRun {
            name: plan.new_run.name.clone(),
            error,
        })?;
    run.case_ids = plan.new_run.case_ids;

    info!(
        "created run {} `{}` with {} of {} declared cases",
        run.id,
        run.name,
        plan.matching.len(),
        plan.declared.len(),
    );

    Ok(SessionRun {
        run,
        cases: plan.matching,
    })
}
