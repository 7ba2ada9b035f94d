// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    sync::Once,
};
use testrail_bridge::{
    client::TestRailClient,
    entities::{
        Case, CaseId, NewResult, NewRun, Project, ProjectId, ResultId, Run, RunId, Status,
        StatusId, SubmittedResult,
    },
    errors::TransportError,
    session::{FinishPolicy, SessionSettings},
    status::StatusRefreshPolicy,
};

pub(crate) const PROJECT_NAME: &str = "Web Shop";
pub(crate) const PROJECT_ID: ProjectId = ProjectId(3);

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = color_eyre::install();
    });
}

pub(crate) fn settings(on_finish: FinishPolicy) -> SessionSettings {
    SessionSettings {
        server_label: "staging".to_owned(),
        project_name: PROJECT_NAME.to_owned(),
        run_description: "integration".to_owned(),
        suite_id: None,
        marker_name: "testrail".to_owned(),
        status_refresh: StatusRefreshPolicy::default(),
        on_finish,
    }
}

/// An in-memory TestRail server holding a single project.
#[derive(Debug)]
pub(crate) struct FakeServer {
    cases: Vec<CaseId>,
    next_run_id: Cell<u64>,
    runs: RefCell<BTreeMap<RunId, Run>>,
    results: RefCell<Vec<(RunId, CaseId, NewResult)>>,
}

impl FakeServer {
    pub(crate) fn new(cases: impl IntoIterator<Item = u64>) -> Self {
        Self {
            cases: cases.into_iter().map(CaseId).collect(),
            next_run_id: Cell::new(100),
            runs: RefCell::new(BTreeMap::new()),
            results: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn runs(&self) -> Vec<Run> {
        self.runs.borrow().values().cloned().collect()
    }

    pub(crate) fn results(&self) -> Vec<(RunId, CaseId, NewResult)> {
        self.results.borrow().clone()
    }
}

impl TestRailClient for FakeServer {
    fn list_projects(&self) -> Result<Vec<Project>, TransportError> {
        Ok(vec![
            Project {
                id: ProjectId(1),
                name: "Mobile".to_owned(),
            },
            Project {
                id: PROJECT_ID,
                name: PROJECT_NAME.to_owned(),
            },
        ])
    }

    fn list_statuses(&self) -> Result<Vec<Status>, TransportError> {
        Ok([(1, "passed"), (5, "failed"), (6, "skipped"), (7, "xfail")]
            .into_iter()
            .map(|(id, name)| Status {
                id: StatusId(id),
                name: name.to_owned(),
                label: name.to_uppercase(),
            })
            .collect())
    }

    fn list_cases(&self, project_id: ProjectId) -> Result<Vec<Case>, TransportError> {
        if project_id != PROJECT_ID {
            return Err(TransportError::status(
                format!("get_cases/{project_id}"),
                400,
                r#"{"error": "Field :project_id is not a valid or accessible project."}"#,
            ));
        }
        Ok(self
            .cases
            .iter()
            .map(|&id| Case {
                id,
                title: format!("case {id}"),
            })
            .collect())
    }

    fn create_run(&self, run: &NewRun, _project_id: ProjectId) -> Result<Run, TransportError> {
        let id = RunId(self.next_run_id.get());
        self.next_run_id.set(id.0 + 1);
        let created = Run {
            id,
            name: run.name.clone(),
            description: Some(run.description.clone()),
            include_all: run.include_all,
            case_ids: run.case_ids.clone(),
            is_completed: false,
        };
        self.runs.borrow_mut().insert(id, created.clone());
        Ok(created)
    }

    fn submit_result(
        &self,
        result: &NewResult,
        run_id: RunId,
        case_id: CaseId,
    ) -> Result<SubmittedResult, TransportError> {
        let in_run = self
            .runs
            .borrow()
            .get(&run_id)
            .is_some_and(|run| run.case_ids.contains(&case_id));
        if !in_run {
            return Err(TransportError::status(
                format!("add_result_for_case/{run_id}/{case_id}"),
                400,
                r#"{"error": "No (active) test found for the run/case combination."}"#,
            ));
        }

        let mut results = self.results.borrow_mut();
        results.push((run_id, case_id, result.clone()));
        Ok(SubmittedResult {
            id: ResultId(results.len() as u64),
            status_id: Some(result.status_id),
        })
    }

    fn close_run(&self, run_id: RunId) -> Result<Run, TransportError> {
        let mut runs = self.runs.borrow_mut();
        match runs.get_mut(&run_id) {
            Some(run) => {
                run.is_completed = true;
                Ok(run.clone())
            }
            None => Err(TransportError::status(
                format!("close_run/{run_id}"),
                400,
                r#"{"error": "Field :run_id is not a valid test run."}"#,
            )),
        }
    }
}
