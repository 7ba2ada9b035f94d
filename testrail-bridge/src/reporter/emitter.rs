// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    client::TestRailClient,
    entities::{CaseId, NewResult, RunId},
    errors::SessionError,
    events::{Outcome, Phase, PhaseReport},
    markers::{CaseReferenceExtractor, CaseReferenceSet},
    status::StatusResolver,
};
use swrite::{SWrite, swrite};
use tracing::debug;

/// The shortest elapsed time reported, in seconds. TestRail rejects a zero
/// timespan.
pub const MIN_ELAPSED_SECS: f64 = 0.01;

/// What to do with a phase report.
#[derive(Clone, Debug, PartialEq)]
pub enum Emission {
    /// Submit `result` once for each of `case_ids`.
    Submit {
        /// The result to submit.
        result: NewResult,
        /// The cases to submit it for, in declaration order.
        case_ids: Vec<CaseId>,
    },

    /// Submit nothing.
    Skip(SkipReason),
}

/// Why a phase report produced no results.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The test carries no case marker.
    Untracked,
    /// None of the test's cases belong to the run.
    NotInRun,
    /// A passing setup or teardown phase. Only the call phase is reported
    /// for passing tests.
    PassingOutsideCall,
}

/// Decides which results a phase report produces, and submits them.
#[derive(Clone, Debug, Default)]
pub struct ResultEmitter {
    extractor: CaseReferenceExtractor,
}

impl ResultEmitter {
    /// Creates a new emitter.
    pub fn new(extractor: CaseReferenceExtractor) -> Self {
        Self { extractor }
    }

    /// Decides what to emit for `report`, without side effects.
    pub fn plan(
        &self,
        report: &PhaseReport,
        cases: &CaseReferenceSet,
        statuses: &StatusResolver,
    ) -> Emission {
        let Some(declared) = self.extractor.extract(report) else {
            return Emission::Skip(SkipReason::Untracked);
        };
        let case_ids = cases.filter(&declared);
        if case_ids.is_empty() {
            return Emission::Skip(SkipReason::NotInRun);
        }

        let status_id = match (&report.outcome, report.phase) {
            (Outcome::Passed, Phase::Call) => statuses.resolve(&Outcome::Passed),
            (Outcome::Passed, Phase::Setup | Phase::Teardown) => {
                return Emission::Skip(SkipReason::PassingOutsideCall);
            }
            // Setup and teardown failures are reported too: the test did not
            // succeed.
            (outcome, _) => statuses.resolve(outcome),
        };

        Emission::Submit {
            result: NewResult {
                status_id,
                comment: comment(report),
                elapsed: format_elapsed(report.duration),
            },
            case_ids,
        }
    }

    /// Plans `report` and submits the resulting results to `run_id`.
    ///
    /// Results are submitted one case at a time. The first failure stops the
    /// remaining submissions for this report and is returned. Returns the
    /// number of results submitted.
    pub fn emit(
        &self,
        client: &impl TestRailClient,
        run_id: RunId,
        report: &PhaseReport,
        cases: &CaseReferenceSet,
        statuses: &StatusResolver,
    ) -> Result<usize, SessionError> {
        let (result, case_ids) = match self.plan(report, cases, statuses) {
            Emission::Submit { result, case_ids } => (result, case_ids),
            Emission::Skip(_) => return Ok(0),
        };

        let total = case_ids.len();
        for (submitted, case_id) in case_ids.into_iter().enumerate() {
            let acknowledged = client
                .submit_result(&result, run_id, case_id)
                .map_err(|error| SessionError::SubmitResult {
                    test_name: report.name.clone(),
                    submitted,
                    total,
                    error,
                })?;
            debug!(
                "submitted result {} for case {case_id} ({} {})",
                acknowledged.id, report.outcome, report.phase
            );
        }
        Ok(total)
    }
}

/// Formats a duration in seconds as a TestRail timespan, with a floor of
/// [`MIN_ELAPSED_SECS`].
pub fn format_elapsed(duration_secs: f64) -> String {
    // f64::max ignores NaN, so a NaN duration also lands on the floor.
    format!("{:.2}s", duration_secs.max(MIN_ELAPSED_SECS))
}

fn comment(report: &PhaseReport) -> String {
    let mut comment = String::new();
    swrite!(
        comment,
        "{}: {} ({})",
        report.name,
        report.outcome,
        report.phase
    );
    if report.outcome == Outcome::Failed
        && let Some(longrepr) = report.longrepr.as_deref().filter(|s| !s.is_empty())
    {
        swrite!(comment, "\n\n{longrepr}");
    }
    comment
}
