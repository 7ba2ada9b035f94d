// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the TestRail API.
//!
//! The bridge only ever talks to the server through [`TestRailClient`]. Every
//! call blocks the calling event handler until the server responds.

mod http;

pub use http::*;

use crate::{
    entities::{
        Case, CaseId, NewResult, NewRun, Project, ProjectId, Run, RunId, Status, SubmittedResult,
    },
    errors::TransportError,
};

/// An authenticated connection to a TestRail server.
pub trait TestRailClient {
    /// Lists every project visible to the user.
    fn list_projects(&self) -> Result<Vec<Project>, TransportError>;

    /// Lists every result status, including custom ones.
    fn list_statuses(&self) -> Result<Vec<Status>, TransportError>;

    /// Lists every case in a project.
    fn list_cases(&self, project_id: ProjectId) -> Result<Vec<Case>, TransportError>;

    /// Creates a run in a project. The server assigns the run's id.
    fn create_run(&self, run: &NewRun, project_id: ProjectId) -> Result<Run, TransportError>;

    /// Adds a result for a case in a run.
    fn submit_result(
        &self,
        result: &NewResult,
        run_id: RunId,
        case_id: CaseId,
    ) -> Result<SubmittedResult, TransportError>;

    /// Closes a run, archiving it.
    fn close_run(&self, run_id: RunId) -> Result<Run, TransportError>;
}

impl<T: TestRailClient + ?Sized> TestRailClient for &T {
    fn list_projects(&self) -> Result<Vec<Project>, TransportError> {
        (**self).list_projects()
    }

    fn list_statuses(&self) -> Result<Vec<Status>, TransportError> {
        (**self).list_statuses()
    }

    fn list_cases(&self, project_id: ProjectId) -> Result<Vec<Case>, TransportError> {
        (**self).list_cases(project_id)
    }

    fn create_run(&self, run: &NewRun, project_id: ProjectId) -> Result<Run, TransportError> {
        (**self).create_run(run, project_id)
    }

    fn submit_result(
        &self,
        result: &NewResult,
        run_id: RunId,
        case_id: CaseId,
    ) -> Result<SubmittedResult, TransportError> {
        (**self).submit_result(result, run_id, case_id)
    }

    fn close_run(&self, run_id: RunId) -> Result<Run, TransportError> {
        (**self).close_run(run_id)
    }
}
