// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Case references declared on tests through markers.
//!
//! A test declares the TestRail cases it covers with a marker, either a single
//! case (`testrail(id=10)`) or several (`testrail(ids=[10, 20])`).

use crate::{entities::CaseId, events::HasMarkers};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// The default name of the case marker.
pub const DEFAULT_MARKER_NAME: &str = "testrail";

/// Reads the case identifiers declared on a test item or report.
#[derive(Clone, Debug)]
pub struct CaseReferenceExtractor {
    marker_name: String,
}

impl Default for CaseReferenceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_NAME)
    }
}

impl CaseReferenceExtractor {
    /// Creates an extractor recognizing markers with the given name.
    pub fn new(marker_name: impl Into<String>) -> Self {
        Self {
            marker_name: marker_name.into(),
        }
    }

    /// Returns the recognized marker name.
    pub fn marker_name(&self) -> &str {
        &self.marker_name
    }

    /// Returns the case identifiers declared on `item`, in declaration order.
    ///
    /// Returns `None` if the item carries no case marker. A marker whose
    /// values cannot denote a case yields `Some` with an empty list: the test
    /// is tracked, it just references nothing usable.
    pub fn extract(&self, item: &impl HasMarkers) -> Option<Vec<CaseId>> {
        let marker = item
            .markers()
            .iter()
            .find(|marker| marker.name == self.marker_name)?;

        if let Some(value) = marker.kwargs.get("id") {
            return Some(case_ids_from_values(std::slice::from_ref(value)));
        }
        match marker.kwargs.get("ids") {
            Some(Value::Array(values)) => Some(case_ids_from_values(values)),
            Some(other) => Some(case_ids_from_values(std::slice::from_ref(other))),
            None => {
                debug!(
                    "marker `{}` has neither `id` nor `ids`, ignoring",
                    self.marker_name
                );
                None
            }
        }
    }
}

fn case_ids_from_values(values: &[Value]) -> Vec<CaseId> {
    values
        .iter()
        .filter_map(|value| {
            let id = parse_case_id(value);
            if id.is_none() {
                debug!("ignoring case reference {value} that is not a case identifier");
            }
            id
        })
        .collect()
}

/// Parses a case identifier from an integer, a numeric string, or a string
/// with TestRail's `C` display prefix.
fn parse_case_id(value: &Value) -> Option<CaseId> {
    match value {
        Value::Number(n) => n.as_u64().map(CaseId),
        Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix('C')
                .or_else(|| s.strip_prefix('c'))
                .unwrap_or(s);
            digits.parse().ok().map(CaseId)
        }
        _ => None,
    }
}

/// The set of case identifiers accepted into the session's run.
///
/// Computed once when collection finishes and never modified afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CaseReferenceSet {
    ids: BTreeSet<CaseId>,
}

impl CaseReferenceSet {
    /// Creates a new set.
    pub fn new(ids: impl IntoIterator<Item = CaseId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Returns true if `id` belongs to the run.
    pub fn contains(&self, id: CaseId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns the ids of `declared` that belong to the run, preserving order.
    pub fn filter(&self, declared: &[CaseId]) -> Vec<CaseId> {
        declared
            .iter()
            .copied()
            .filter(|id| self.contains(*id))
            .collect()
    }

    /// Iterates over the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = CaseId> + '_ {
        self.ids.iter().copied()
    }

    /// Returns the number of ids in the set.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no case belongs to the run.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
