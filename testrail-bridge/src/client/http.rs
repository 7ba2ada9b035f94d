// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestRailClient;
use crate::{
    config::ServerConfig,
    entities::{
        Case, CaseId, NewResult, NewRun, Project, ProjectId, Run, RunId, Status, SubmittedResult,
        SuiteId,
    },
    errors::TransportError,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use tracing::debug;
use ureq::{Agent, Body, http::Response};

/// A [`TestRailClient`] speaking the TestRail v2 HTTP API.
///
/// Requests are blocking and are never retried.
pub struct HttpClient {
    agent: Agent,
    base_url: String,
    authorization: String,
    suite_id: Option<SuiteId>,
}

impl HttpClient {
    /// Creates a client for the given server.
    pub fn new(server: &ServerConfig) -> Self {
        let config = Agent::config_builder()
            // Non-success statuses are turned into TransportError::Status with
            // the body attached, so ureq must hand them back.
            .http_status_as_error(false)
            .timeout_global(Some(server.timeout))
            .build();
        let credentials = format!("{}:{}", server.user, server.password);

        Self {
            agent: Agent::new_with_config(config),
            base_url: server.url.trim_end_matches('/').to_owned(),
            authorization: format!("Basic {}", BASE64_STANDARD.encode(credentials)),
            suite_id: server.suite_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/index.php?/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    fn get(&self, endpoint: &str) -> Result<Value, TransportError> {
        self.get_path(endpoint, &format!("api/v2/{endpoint}"))
    }

    fn get_path(&self, endpoint: &str, path: &str) -> Result<Value, TransportError> {
        debug!("GET {path}");
        let response = self
            .agent
            .get(self.url(path))
            .header("Authorization", self.authorization.as_str())
            .call();
        read_response(endpoint, response)
    }

    fn post(&self, endpoint: &str, body: Option<&impl Serialize>) -> Result<Value, TransportError> {
        debug!("POST api/v2/{endpoint}");
        let request = self
            .agent
            .post(self.url(&format!("api/v2/{endpoint}")))
            .header("Authorization", self.authorization.as_str());
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.send_empty(),
        };
        read_response(endpoint, response)
    }

    /// Fetches every page of a listing endpoint.
    fn get_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        key: &str,
    ) -> Result<Vec<T>, TransportError> {
        let mut out = Vec::new();
        let mut page = self.get(endpoint)?;
        loop {
            let (items, next) = split_listing(page, key);
            out.extend(decode::<Vec<T>>(endpoint, items)?);
            match next {
                Some(next) => page = self.get_path(endpoint, &next)?,
                None => return Ok(out),
            }
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("authorization", &"Basic <redacted>")
            .field("suite_id", &self.suite_id)
            .finish_non_exhaustive()
    }
}

impl TestRailClient for HttpClient {
    fn list_projects(&self) -> Result<Vec<Project>, TransportError> {
        self.get_all("get_projects", "projects")
    }

    fn list_statuses(&self) -> Result<Vec<Status>, TransportError> {
        self.get_all("get_statuses", "statuses")
    }

    fn list_cases(&self, project_id: ProjectId) -> Result<Vec<Case>, TransportError> {
        let endpoint = match self.suite_id {
            Some(suite_id) => format!("get_cases/{project_id}&suite_id={suite_id}"),
            None => format!("get_cases/{project_id}"),
        };
        self.get_all(&endpoint, "cases")
    }

    fn create_run(&self, run: &NewRun, project_id: ProjectId) -> Result<Run, TransportError> {
        let endpoint = format!("add_run/{project_id}");
        let value = self.post(&endpoint, Some(run))?;
        decode(&endpoint, value)
    }

    fn submit_result(
        &self,
        result: &NewResult,
        run_id: RunId,
        case_id: CaseId,
    ) -> Result<SubmittedResult, TransportError> {
        let endpoint = format!("add_result_for_case/{run_id}/{case_id}");
        let value = self.post(&endpoint, Some(result))?;
        decode(&endpoint, value)
    }

    fn close_run(&self, run_id: RunId) -> Result<Run, TransportError> {
        let endpoint = format!("close_run/{run_id}");
        let value = self.post(&endpoint, None::<&()>)?;
        decode(&endpoint, value)
    }
}

fn read_response(
    endpoint: &str,
    response: Result<Response<Body>, ureq::Error>,
) -> Result<Value, TransportError> {
    let request_error = |error: ureq::Error| TransportError::Request {
        endpoint: endpoint.to_owned(),
        error: Box::new(error),
    };

    let mut response = response.map_err(request_error)?;
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(request_error)?;

    if !status.is_success() {
        return Err(TransportError::status(endpoint, status.as_u16(), body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|error| TransportError::Deserialize {
        endpoint: endpoint.to_owned(),
        error,
    })
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, TransportError> {
    serde_json::from_value(value).map_err(|error| TransportError::Deserialize {
        endpoint: endpoint.to_owned(),
        error,
    })
}

/// Splits a listing response into its items and the path of the next page.
///
/// Older servers return a bare array. Newer ones wrap the items in an
/// envelope keyed by the entity name, with a `_links.next` path.
fn split_listing(page: Value, key: &str) -> (Value, Option<String>) {
    match page {
        Value::Object(mut map) => {
            let next = map
                .get("_links")
                .and_then(|links| links.get("next"))
                .and_then(|next| next.as_str())
                .map(|next| next.to_owned());
            let items = map.remove(key).unwrap_or(Value::Array(Vec::new()));
            (items, next)
        }
        other => (other, None),
    }
}
