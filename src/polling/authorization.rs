// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-item polling: one authorization by id, used while its detail
//! screen is open.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::debug;

use crate::channel::AuthorizationChannel;
use crate::error::ChannelResult;
use crate::models::Authorization;

use super::{PollingScheduler, PollingTask};

/// The authorization a detail screen is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationTarget {
    pub connection_guid: String,
    pub authorization_id: String,
}

impl AuthorizationTarget {
    pub fn new(connection_guid: impl Into<String>, authorization_id: impl Into<String>) -> Self {
        Self {
            connection_guid: connection_guid.into(),
            authorization_id: authorization_id.into(),
        }
    }
}

pub trait SingleAuthorizationContract: Send + Sync + 'static {
    /// `None` skips the tick, e.g. after the screen resolved the item.
    fn authorization_to_poll(&self) -> Option<AuthorizationTarget>;

    fn on_authorization_fetched(
        &self,
        target: &AuthorizationTarget,
        result: ChannelResult<Authorization>,
    );
}

pub struct AuthorizationPoller<C: SingleAuthorizationContract> {
    channel: AuthorizationChannel,
    contract: Arc<C>,
}

impl<C: SingleAuthorizationContract> AuthorizationPoller<C> {
    pub fn new(channel: AuthorizationChannel, contract: Arc<C>) -> Self {
        Self { channel, contract }
    }

    pub fn into_scheduler(self, runtime: Handle) -> PollingScheduler<Self> {
        let interval = self.channel.config().poll_interval;
        PollingScheduler::new(Arc::new(self), interval, runtime)
    }

    pub fn contract(&self) -> &Arc<C> {
        &self.contract
    }
}

#[async_trait]
impl<C: SingleAuthorizationContract> PollingTask for AuthorizationPoller<C> {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn fetch(&self) {
        let Some(target) = self.contract.authorization_to_poll() else {
            debug!("No authorization to poll");
            return;
        };

        let result = self
            .channel
            .fetch_authorization(&target.connection_guid, &target.authorization_id)
            .await;
        self.contract.on_authorization_fetched(&target, result);
    }
}
