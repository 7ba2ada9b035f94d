// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A reporting session, from startup to the end of the test run.
//!
//! A [`ReportSession`] is created once, before any test runs, and owns
//! everything the bridge knows for the rest of the session: the client, the
//! target project, the status table and, once collection finishes, the run
//! and the cases accepted into it. The runner's three events map to
//! [`ReportSession::on_collection_finished`],
//! [`ReportSession::on_phase_report`] and
//! [`ReportSession::on_session_finished`].

use crate::{
    client::TestRailClient,
    config::BridgeConfig,
    entities::{Project, Run, SuiteId},
    errors::{SessionError, StartupError},
    events::{CollectedItem, PhaseReport, SessionEvent},
    markers::CaseReferenceExtractor,
    reporter::{ResultEmitter, RunTarget, SessionRun, open_run},
    status::{StatusRefreshPolicy, StatusResolver},
};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// What to do with the run when the session finishes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishPolicy {
    /// Leave the run open, e.g. for manual review.
    #[default]
    LeaveOpen,

    /// Close the run.
    Close,
}

impl fmt::Display for FinishPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishPolicy::LeaveOpen => write!(f, "leave-open"),
            FinishPolicy::Close => write!(f, "close"),
        }
    }
}

/// Settings for a session.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// The label of the server, used in the run name.
    pub server_label: String,
    /// The display name of the target project.
    pub project_name: String,
    /// The description attached to the run.
    pub run_description: String,
    /// The suite the run belongs to, for multi-suite projects.
    pub suite_id: Option<SuiteId>,
    /// The name of the case marker.
    pub marker_name: String,
    /// Which statuses are looked up on the server.
    pub status_refresh: StatusRefreshPolicy,
    /// What to do with the run when the session finishes.
    pub on_finish: FinishPolicy,
}

impl SessionSettings {
    /// Extracts session settings from a resolved config.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            server_label: config.server.label().to_owned(),
            project_name: config.project_name.clone(),
            run_description: config.run.description.clone(),
            suite_id: config.server.suite_id,
            marker_name: config.markers.name.clone(),
            status_refresh: config.statuses,
            on_finish: config.run.on_finish,
        }
    }
}

/// A reporting session against one project.
#[derive(Debug)]
pub struct ReportSession<C> {
    client: C,
    settings: SessionSettings,
    project: Project,
    statuses: StatusResolver,
    extractor: CaseReferenceExtractor,
    emitter: ResultEmitter,
    run: Option<SessionRun>,
    finished: bool,
}

impl<C: TestRailClient> ReportSession<C> {
    /// Starts a session: looks up the target project and the server's
    /// statuses.
    ///
    /// Fails if no project is named `settings.project_name`. In that case no
    /// test should run.
    pub fn start(client: C, settings: SessionSettings) -> Result<Self, StartupError> {
        let projects = client.list_projects().map_err(StartupError::ListProjects)?;
        let project = match projects
            .iter()
            .find(|project| project.name == settings.project_name)
        {
            Some(project) => project.clone(),
            None => {
                return Err(StartupError::ProjectNotFound {
                    name: settings.project_name.clone(),
                    known: projects.into_iter().map(|project| project.name).collect(),
                });
            }
        };
        debug!("target project: {} `{}`", project.id, project.name);

        let statuses = StatusResolver::refresh(&client, settings.status_refresh)
            .map_err(StartupError::ListStatuses)?;

        let extractor = CaseReferenceExtractor::new(settings.marker_name.clone());
        let emitter = ResultEmitter::new(extractor.clone());

        info!(
            "reporting to project `{}` on {}, tracking tests marked `{}`",
            project.name,
            settings.server_label,
            extractor.marker_name(),
        );

        Ok(Self {
            client,
            settings,
            project,
            statuses,
            extractor,
            emitter,
            run: None,
            finished: false,
        })
    }

    /// Returns the target project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Returns the status resolver.
    pub fn statuses(&self) -> &StatusResolver {
        &self.statuses
    }

    /// Returns the session's run, once collection has finished.
    pub fn run(&self) -> Option<&SessionRun> {
        self.run.as_ref()
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Handles the end of collection by creating the session's run.
    ///
    /// Must be called exactly once, before the session finishes.
    pub fn on_collection_finished(
        &mut self,
        items: &[CollectedItem],
    ) -> Result<&SessionRun, SessionError> {
        self.ensure_not_finished("collection-finished")?;
        if self.run.is_some() {
            return Err(SessionError::RunAlreadyCreated);
        }

        let target = RunTarget {
            server_label: &self.settings.server_label,
            project: &self.project,
            description: &self.settings.run_description,
            suite_id: self.settings.suite_id,
        };
        let session_run = open_run(&self.client, target, &self.extractor, items)?;
        Ok(self.run.insert(session_run))
    }

    /// Handles a phase report, submitting its results.
    ///
    /// Returns the number of results submitted. A submission failure stops
    /// the rest of this report's submissions, but the session remains usable
    /// for later reports.
    pub fn on_phase_report(&self, report: &PhaseReport) -> Result<usize, SessionError> {
        self.ensure_not_finished("phase-report")?;
        let session_run = self
            .run
            .as_ref()
            .ok_or(SessionError::CollectionNotFinished {
                event: "phase-report",
            })?;

        self.emitter.emit(
            &self.client,
            session_run.run.id,
            report,
            &session_run.cases,
            &self.statuses,
        )
    }

    /// Handles the end of the session.
    ///
    /// Applies the configured [`FinishPolicy`]. Returns the closed run if the
    /// run was closed.
    ///
    /// The session is finished afterwards even if closing the run failed: every
    /// later event, including another session end, is rejected.
    pub fn on_session_finished(&mut self, exit_status: i32) -> Result<Option<Run>, SessionError> {
        self.ensure_not_finished("session-finished")?;
        self.finished = true;

        let Some(session_run) = &self.run else {
            debug!("session finished (exit status {exit_status}) without a run");
            return Ok(None);
        };

        match self.settings.on_finish {
            FinishPolicy::LeaveOpen => {
                info!(
                    "session finished (exit status {exit_status}), leaving run {} open",
                    session_run.run.id
                );
                Ok(None)
            }
            FinishPolicy::Close => {
                let closed = self
                    .client
                    .close_run(session_run.run.id)
                    .map_err(SessionError::CloseRun)?;
                info!(
                    "session finished (exit status {exit_status}), closed run {}",
                    closed.id
                );
                Ok(Some(closed))
            }
        }
    }

    fn ensure_not_finished(&self, event: &'static str) -> Result<(), SessionError> {
        if self.finished {
            Err(SessionError::AlreadyFinished { event })
        } else {
            Ok(())
        }
    }

    /// Dispatches a runner event to the matching handler.
    ///
    /// Returns the number of results submitted.
    pub fn handle(&mut self, event: &SessionEvent) -> Result<usize, SessionError> {
        match event {
            SessionEvent::CollectionFinished { items } => {
                self.on_collection_finished(items)?;
                Ok(0)
            }
            SessionEvent::PhaseReport(report) => self.on_phase_report(report),
            SessionEvent::SessionFinished { exit_status } => {
                self.on_session_finished(*exit_status)?;
                Ok(0)
            }
        }
    }
}
