// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers shared by unit tests.

use crate::{
    client::TestRailClient,
    entities::{
        Case, CaseId, NewResult, NewRun, Project, ProjectId, ResultId, Run, RunId, Status,
        StatusId, SubmittedResult,
    },
    errors::TransportError,
    events::Marker,
    markers::DEFAULT_MARKER_NAME,
};
use serde_json::Value;
use std::{cell::RefCell, collections::BTreeSet};

/// Builds a case marker from a JSON object of keyword arguments.
pub(crate) fn case_marker(kwargs: Value) -> Marker {
    let Value::Object(kwargs) = kwargs else {
        panic!("kwargs must be a JSON object");
    };
    Marker {
        name: DEFAULT_MARKER_NAME.to_owned(),
        kwargs: kwargs.into_iter().collect(),
    }
}

/// A status list with custom `skipped` (6) and `xfail` (7) statuses.
pub(crate) fn status_list() -> Vec<Status> {
    [
        (1, "passed"),
        (2, "blocked"),
        (4, "retest"),
        (5, "failed"),
        (6, "skipped"),
        (7, "xfail"),
    ]
    .into_iter()
    .map(|(id, name)| Status {
        id: StatusId(id),
        name: name.to_owned(),
        label: name.to_owned(),
    })
    .collect()
}

/// An in-memory client that records the calls made to it.
#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    projects: Vec<Project>,
    statuses: Vec<Status>,
    cases: Vec<CaseId>,
    fail_create_run: bool,
    fail_submit_for: BTreeSet<CaseId>,
    created_runs: RefCell<Vec<(ProjectId, NewRun)>>,
    submitted: RefCell<Vec<(RunId, CaseId, NewResult)>>,
    closed_runs: RefCell<Vec<RunId>>,
}

impl RecordingClient {
    /// The id assigned to every created run.
    pub(crate) const RUN_ID: u64 = 42;

    pub(crate) fn builder() -> RecordingClientBuilder {
        RecordingClientBuilder::default()
    }

    pub(crate) fn created_runs(&self) -> Vec<(ProjectId, NewRun)> {
        self.created_runs.borrow().clone()
    }

    /// Returns the results that were accepted, in submission order.
    pub(crate) fn submitted_results(&self) -> Vec<(RunId, CaseId, NewResult)> {
        self.submitted.borrow().clone()
    }

    pub(crate) fn closed_runs(&self) -> Vec<RunId> {
        self.closed_runs.borrow().clone()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingClientBuilder {
    client: RecordingClient,
}

impl RecordingClientBuilder {
    pub(crate) fn projects(mut self, projects: Vec<Project>) -> Self {
        self.client.projects = projects;
        self
    }

    pub(crate) fn statuses(mut self, statuses: Vec<Status>) -> Self {
        self.client.statuses = statuses;
        self
    }

    pub(crate) fn cases(mut self, cases: Vec<CaseId>) -> Self {
        self.client.cases = cases;
        self
    }

    pub(crate) fn fail_create_run(mut self) -> Self {
        self.client.fail_create_run = true;
        self
    }

    pub(crate) fn fail_submit_for(mut self, case_id: CaseId) -> Self {
        self.client.fail_submit_for.insert(case_id);
        self
    }

    pub(crate) fn build(self) -> RecordingClient {
        self.client
    }
}

impl TestRailClient for RecordingClient {
    fn list_projects(&self) -> Result<Vec<Project>, TransportError> {
        Ok(self.projects.clone())
    }

    fn list_statuses(&self) -> Result<Vec<Status>, TransportError> {
        Ok(self.statuses.clone())
    }

    fn list_cases(&self, _project_id: ProjectId) -> Result<Vec<Case>, TransportError> {
        Ok(self
            .cases
            .iter()
            .map(|&id| Case {
                id,
                title: format!("case {id}"),
            })
            .collect())
    }

    fn create_run(&self, run: &NewRun, project_id: ProjectId) -> Result<Run, TransportError> {
        if self.fail_create_run {
            return Err(TransportError::status(
                format!("add_run/{project_id}"),
                400,
                r#"{"error": "Field :case_ids contains invalid cases"}"#,
            ));
        }
        self.created_runs
            .borrow_mut()
            .push((project_id, run.clone()));
        Ok(Run {
            id: RunId(Self::RUN_ID),
            name: run.name.clone(),
            description: Some(run.description.clone()),
            include_all: run.include_all,
            case_ids: Vec::new(),
            is_completed: false,
        })
    }

    fn submit_result(
        &self,
        result: &NewResult,
        run_id: RunId,
        case_id: CaseId,
    ) -> Result<SubmittedResult, TransportError> {
        if self.fail_submit_for.contains(&case_id) {
            return Err(TransportError::status(
                format!("add_result_for_case/{run_id}/{case_id}"),
                500,
                "Internal Server Error",
            ));
        }
        let mut submitted = self.submitted.borrow_mut();
        submitted.push((run_id, case_id, result.clone()));
        Ok(SubmittedResult {
            id: ResultId(submitted.len() as u64),
            status_id: Some(result.status_id),
        })
    }

    fn close_run(&self, run_id: RunId) -> Result<Run, TransportError> {
        self.closed_runs.borrow_mut().push(run_id);
        Ok(Run {
            id: run_id,
            name: String::new(),
            description: None,
            include_all: false,
            case_ids: Vec::new(),
            is_completed: true,
        })
    }
}
