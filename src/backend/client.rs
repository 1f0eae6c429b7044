// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP implementation of [`BackendClient`].
//!
//! All calls go through [`HttpBackendClient::request`], which retries transient
//! failures (429, 5xx, connection errors) with exponential backoff and fails
//! immediately on everything else. Stale-revision rejections (412) and
//! responses carrying a fatal backend error code reach the caller unchanged,
//! even when the HTTP status alone would be retried.

use super::{BackendBinding, BackendClient};
use crate::binding_errors::BackendError;
use crate::constants::{BINDING_PATH_SEGMENT, RESOURCE_TYPE_BINDING, TAG_SCOPE_CLUSTER};
use crate::hierarchy::TreeNode;
use crate::reconcilers::retry::{http_backoff, is_retryable_http_status};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Path of the hierarchical bulk-write endpoint
const ORG_ROOT_PATH: &str = "/policy/api/v1/org-root";

/// Path of the tag search endpoint
const SEARCH_PATH: &str = "/policy/api/v1/search/query";

/// Credentials presented to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendAuth {
    #[default]
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<BackendBinding>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Backend client speaking the policy HTTP API.
#[derive(Clone)]
pub struct HttpBackendClient {
    http: HttpClient,
    base_url: String,
    auth: BackendAuth,
}

impl HttpBackendClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, auth: BackendAuth, timeout: Duration) -> Result<Self, BackendError> {
        Url::parse(base_url).map_err(|e| BackendError::Transport {
            url: base_url.to_string(),
            reason: format!("invalid backend URL: {e}"),
        })?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport {
                url: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| BackendError::Transport {
            url: raw,
            reason: e.to_string(),
        })
    }

    /// Execute a request with automatic retry of transient failures.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        body: Option<&TreeNode>,
    ) -> Result<String, BackendError> {
        let mut backoff = http_backoff();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.request_once(method.clone(), url, body).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!(
                            method = %method,
                            url = %url,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            "Backend call succeeded after retries"
                        );
                    }
                    return Ok(text);
                }
                Err(e) => e,
            };

            if !is_retryable(&err) {
                error!(
                    method = %method,
                    url = %url,
                    error = %err,
                    "Non-retryable backend error, failing immediately"
                );
                return Err(err);
            }

            let Some(duration) = backoff.next_delay() else {
                error!(
                    method = %method,
                    url = %url,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    error = %err,
                    "Backoff exhausted, giving up"
                );
                return Err(err);
            };

            warn!(
                method = %method,
                url = %url,
                attempt = attempt,
                retry_after = ?duration,
                error = %err,
                "Retryable backend error, will retry"
            );
            tokio::time::sleep(duration).await;
        }
    }

    async fn request_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&TreeNode>,
    ) -> Result<String, BackendError> {
        debug!(method = %method, url = %url, "Backend request");

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(payload) = body {
            request = request.json(payload);
        }
        request = match &self.auth {
            BackendAuth::None => request,
            BackendAuth::Bearer(token) => request.bearer_auth(token),
            BackendAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        let response = request.send().await.map_err(|e| BackendError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BackendError::Transport {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorBody>(&text).ok();
            let error_code = parsed.as_ref().and_then(|b| b.error_code);
            let message = parsed
                .and_then(|b| b.error_message)
                .unwrap_or_else(|| text.clone());
            return Err(BackendError::Request {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                error_code,
                message,
            });
        }

        Ok(text)
    }

    /// Follow `cursor` pagination of a list endpoint.
    async fn list_all(&self, mut url: Url) -> Result<Vec<BackendBinding>, BackendError> {
        let base_query: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "cursor")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut all = Vec::new();
        let mut pages = 0;

        loop {
            pages += 1;
            let text = self.request(Method::GET, &url, None).await?;
            let page: ListResponse =
                serde_json::from_str(&text).map_err(|e| BackendError::Decode {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            all.extend(page.results);

            match page.cursor.filter(|c| !c.is_empty()) {
                Some(cursor) => {
                    let mut pairs = url.query_pairs_mut();
                    pairs.clear();
                    for (k, v) in &base_query {
                        pairs.append_pair(k, v);
                    }
                    pairs.append_pair("cursor", &cursor);
                }
                None => break,
            }
        }

        debug!(url = %url, pages = pages, items = all.len(), "Listed backend objects");
        Ok(all)
    }
}

fn is_retryable(err: &BackendError) -> bool {
    if err.is_fatal() {
        return false;
    }
    match err {
        BackendError::Request { status, .. } => StatusCode::from_u16(*status)
            .map(is_retryable_http_status)
            .unwrap_or(false),
        BackendError::Transport { .. } => true,
        _ => false,
    }
}

#[async_trait::async_trait]
impl BackendClient for HttpBackendClient {
    async fn bulk_write(&self, tree: &TreeNode) -> Result<(), BackendError> {
        let mut url = self.endpoint(ORG_ROOT_PATH)?;
        url.query_pairs_mut()
            .append_pair("enforce_revision_check", "true");

        self.request(Method::PATCH, &url, Some(tree)).await?;
        info!(url = %url, leaves = tree.leaf_count(), "Bulk write committed");
        Ok(())
    }

    async fn list_by_path(
        &self,
        org: &str,
        project: &str,
        vpc: &str,
        subnet: &str,
    ) -> Result<Vec<BackendBinding>, BackendError> {
        let url = self.endpoint(&format!(
            "/policy/api/v1/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}/{BINDING_PATH_SEGMENT}"
        ))?;
        self.list_all(url).await
    }

    async fn list_by_cluster(&self, cluster: &str) -> Result<Vec<BackendBinding>, BackendError> {
        let scope = TAG_SCOPE_CLUSTER.replace('/', "\\/");
        let query = format!(
            "resource_type:{RESOURCE_TYPE_BINDING} AND tags.scope:{scope} AND tags.tag:{cluster}"
        );
        let mut url = self.endpoint(SEARCH_PATH)?;
        url.query_pairs_mut().append_pair("query", &query);
        self.list_all(url).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
