// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! List polling: every pending authorization across the connections the
//! contract names.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::debug;

use crate::channel::{AuthorizationChannel, ConnectionAuthorizations};

use super::{PollingScheduler, PollingTask};

/// Supplies the connections to poll and receives each tick's results.
///
/// Both methods are called on the scheduler's task; they must not block.
pub trait AuthorizationsContract: Send + Sync + 'static {
    /// Guids to fetch for this tick. Re-read on every tick.
    fn connections_to_poll(&self) -> Vec<String>;

    /// Results in the order of [`Self::connections_to_poll`].
    fn on_authorizations_fetched(&self, results: Vec<ConnectionAuthorizations>);
}

pub struct AuthorizationsPoller<C: AuthorizationsContract> {
    channel: AuthorizationChannel,
    contract: Arc<C>,
}

impl<C: AuthorizationsContract> AuthorizationsPoller<C> {
    pub fn new(channel: AuthorizationChannel, contract: Arc<C>) -> Self {
        Self { channel, contract }
    }

    /// Scheduler ticking at the channel's configured poll interval.
    pub fn into_scheduler(self, runtime: Handle) -> PollingScheduler<Self> {
        let interval = self.channel.config().poll_interval;
        PollingScheduler::new(Arc::new(self), interval, runtime)
    }

    pub fn contract(&self) -> &Arc<C> {
        &self.contract
    }
}

#[async_trait]
impl<C: AuthorizationsContract> PollingTask for AuthorizationsPoller<C> {
    fn name(&self) -> &'static str {
        "authorizations"
    }

    async fn fetch(&self) {
        let guids = self.contract.connections_to_poll();
        if guids.is_empty() {
            debug!("No connections to poll");
            self.contract.on_authorizations_fetched(Vec::new());
            return;
        }

        let results = self.channel.fetch_authorizations(&guids).await;
        let failed = results.iter().filter(|r| r.result.is_err()).count();
        debug!(connections = results.len(), failed, "Authorization poll complete");
        self.contract.on_authorizations_fetched(results);
    }
}
