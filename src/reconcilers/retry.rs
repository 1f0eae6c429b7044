// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry with exponential backoff for Kubernetes and backend calls.
//!
//! Only transient failures are retried: HTTP 429, 5xx and transport errors.
//! A stale-revision rejection (412) is a client error and always reaches the
//! caller on the first attempt.

use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Kubernetes API calls: 100ms doubling to 30s, for at most 5 minutes.
const KUBE_INITIAL_DELAY: Duration = Duration::from_millis(100);
const KUBE_MAX_DELAY: Duration = Duration::from_secs(30);
const KUBE_BUDGET: Duration = Duration::from_secs(300);

/// Backend calls: 200ms doubling to 10s, for at most 1 minute.
///
/// A reconcile worker is blocked while the backend is retried.
const HTTP_INITIAL_DELAY: Duration = Duration::from_millis(200);
const HTTP_MAX_DELAY: Duration = Duration::from_secs(10);
const HTTP_BUDGET: Duration = Duration::from_secs(60);

/// Jitter applied to every delay (±10%)
const JITTER: f64 = 0.1;

/// Doubling delay sequence with jitter and an overall time budget.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    budget: Duration,
    jitter: f64,
    started: Instant,
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration, budget: Duration, jitter: f64) -> Self {
        Self {
            next: initial,
            max,
            budget,
            jitter,
            started: Instant::now(),
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= self.budget {
            return None;
        }
        let base = self.next;
        self.next = base.saturating_mul(2).min(self.max);
        Some(with_jitter(base, self.jitter))
    }
}

fn with_jitter(base: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return base;
    }
    let secs = base.as_secs_f64();
    let spread = secs * factor;
    let jittered = rand::rng().random_range(secs - spread..=secs + spread);
    Duration::from_secs_f64(jittered.max(0.0))
}

/// Backoff used for Kubernetes API calls.
#[must_use]
pub fn kube_backoff() -> Backoff {
    Backoff::new(KUBE_INITIAL_DELAY, KUBE_MAX_DELAY, KUBE_BUDGET, JITTER)
}

/// Backoff used for backend HTTP calls.
#[must_use]
pub fn http_backoff() -> Backoff {
    Backoff::new(HTTP_INITIAL_DELAY, HTTP_MAX_DELAY, HTTP_BUDGET, JITTER)
}

/// Whether a backend HTTP status is worth retrying (429 and 5xx gateway/server errors).
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Run a Kubernetes API call, retrying transient failures.
///
/// The original `kube::Error` is returned so callers can still match on 404.
///
/// # Errors
///
/// Returns the first permanent error, or the last transient one once the
/// backoff budget is spent.
pub async fn retry_api_call<T, F, Fut>(mut call: F, operation: &str) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = kube_backoff();
    let mut attempt = 1;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable_error(&err) {
            debug!(operation, error = %err, "Kubernetes API call failed permanently");
            return Err(err);
        }
        let Some(delay) = backoff.next_delay() else {
            warn!(operation, attempt, error = %err, "Giving up on Kubernetes API call");
            return Err(err);
        };

        warn!(operation, attempt, retry_after = ?delay, error = %err, "Retrying Kubernetes API call");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(status) => status.code == 429 || (500..600).contains(&status.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

/// Whether a Kubernetes error is a 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(status) if status.code == 404)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
