// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Periodic background tasks tied to the process lifecycle.
//!
//! A [`ScheduledTask`] runs its job once per interval until its cancellation
//! token fires. The first run happens one full interval after start. A job
//! that overruns its interval delays the next tick instead of bursting.
//! Cancellation is observed between runs; a running job is never interrupted.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Smallest accepted period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct ScheduledTask {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `job` to run every `period` until `token` (or [`Self::stop`]) cancels it.
    pub fn start<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        token: &CancellationToken,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let name = name.into();
        let token = token.child_token();
        let period = period.max(MIN_PERIOD);

        let task_name = name.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(task = %task_name, period = ?period, "Scheduled task started");

            loop {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!(task = %task_name, "Running scheduled task");
                        job().await;
                    }
                }
            }
            info!(task = %task_name, "Scheduled task stopped");
        });

        Self {
            name,
            token,
            handle,
        }
    }

    /// Cancel the task and wait for the current run, if any, to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(task = %self.name, error = %e, "Scheduled task ended abnormally");
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
