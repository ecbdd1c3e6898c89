// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Polling Scheduler
//!
//! Lifecycle-bound periodic fetch engine. The presentation layer calls
//! [`PollingScheduler::start`] when a screen becomes visible and
//! [`PollingScheduler::stop`] when it goes away, usually from a thread that
//! is not part of the async runtime. The scheduler therefore holds a
//! [`Handle`] and spawns onto it.
//!
//! ## Strategy
//!
//! `start()` spawns a loop that fetches immediately and then every
//! `interval` (default 3 s). The loop awaits each fetch before waiting for
//! the next tick and skips ticks missed meanwhile, so scheduled fetches
//! never overlap. A forced fetch runs on its own task and may overlap a
//! scheduled one.
//!
//! ## Shutdown
//!
//! `stop()` cancels the loop through a `tokio_util` `CancellationToken`. A
//! fetch already in flight is allowed to finish; the contract decides what
//! to do with its result. A `start()` issued before that fetch finishes
//! waits for it, so a stop/start pair never runs two scheduled fetches at
//! once.
//!
//! Two specializations exist: [`authorizations`] (all pending
//! authorizations across connections) and [`authorization`] (one
//! authorization by id).

pub mod authorization;
pub mod authorizations;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use authorization::{AuthorizationPoller, AuthorizationTarget, SingleAuthorizationContract};
pub use authorizations::{AuthorizationsContract, AuthorizationsPoller};

/// One unit of periodic work.
#[async_trait]
pub trait PollingTask: Send + Sync + 'static {
    /// Name used in log events.
    fn name(&self) -> &'static str;

    /// Run one fetch. Must report faults through its own contract, never panic.
    async fn fetch(&self);
}

struct PollLoop {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodic driver for a [`PollingTask`].
pub struct PollingScheduler<T: PollingTask> {
    task: Arc<T>,
    interval: Duration,
    runtime: Handle,
    current: Mutex<Option<PollLoop>>,
}

impl<T: PollingTask> PollingScheduler<T> {
    /// Fetches are spawned on `runtime`; `start`, `stop` and `forced_fetch`
    /// may then be called from any thread.
    pub fn new(task: Arc<T>, interval: Duration, runtime: Handle) -> Self {
        Self {
            task,
            interval,
            runtime,
            current: Mutex::new(None),
        }
    }

    pub fn task(&self) -> &Arc<T> {
        &self.task
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin fetching now and then every interval.
    ///
    /// Calling `start()` while already running keeps the existing schedule.
    pub fn start(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current
            .as_ref()
            .is_some_and(|running| !running.shutdown.is_cancelled())
        {
            debug!(poller = self.task.name(), "Poller already running");
            return;
        }

        let previous = current.take().map(|stopped| stopped.task);
        let shutdown = CancellationToken::new();
        let task = self.runtime.spawn(run(
            self.task.clone(),
            self.interval,
            shutdown.clone(),
            previous,
        ));
        *current = Some(PollLoop { shutdown, task });
        info!(
            poller = self.task.name(),
            interval_ms = self.interval.as_millis() as u64,
            "Poller started"
        );
    }

    /// Cancel future ticks. Idempotent.
    pub fn stop(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(running) = current.as_ref() {
            if !running.shutdown.is_cancelled() {
                running.shutdown.cancel();
                info!(poller = self.task.name(), "Poller stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|running| !running.shutdown.is_cancelled())
    }

    /// Run one fetch outside the schedule, e.g. on pull-to-refresh.
    ///
    /// Does not start or resume periodic ticking.
    pub fn forced_fetch(&self) -> JoinHandle<()> {
        let task = self.task.clone();
        self.runtime.spawn(async move { task.fetch().await })
    }
}

impl<T: PollingTask> Drop for PollingScheduler<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<T: PollingTask>(
    task: Arc<T>,
    interval: Duration,
    shutdown: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = previous => {},
        }
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(poller = task.name(), "Poller loop exiting");
                return;
            }
            _ = ticker.tick() => {},
        }
        task.fetch().await;
    }
}
