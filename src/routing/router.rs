//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store channel routes
//! - Dispatch commands to the controller registered for their channel
//! - Fall back to the default controller for everything else

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::StreamRouteConfig;
use crate::node::{Command, CommandResult, ConnectResult, Controller, SessionEnv};
use crate::routing::streams::SignedStreamController;
use crate::BoxError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route for channel {0} is already registered")]
    Duplicate(String),

    #[error("no default controller configured")]
    NoDefault,
}

#[derive(Deserialize)]
struct ChannelIdentifier {
    channel: String,
}

/// Channel name from a subscription identifier, if it has one.
pub fn channel_of(identifier: &str) -> Option<String> {
    serde_json::from_str::<ChannelIdentifier>(identifier)
        .ok()
        .map(|id| id.channel)
}

#[derive(Default)]
pub struct RouterController {
    routes: HashMap<String, Arc<dyn Controller>>,
    default: Option<Arc<dyn Controller>>,
}

impl RouterController {
    pub fn new(default: Option<Arc<dyn Controller>>) -> Self {
        Self {
            routes: HashMap::new(),
            default,
        }
    }

    /// Router with a signed stream controller per configured route.
    pub fn from_config(routes: &[StreamRouteConfig]) -> Result<Self, RouteError> {
        let mut router = Self::new(None);
        for route in routes {
            router.route(
                &route.channel,
                Arc::new(SignedStreamController::new(&route.secret)),
            )?;
        }
        Ok(router)
    }

    pub fn route(&mut self, channel: &str, controller: Arc<dyn Controller>) -> Result<(), RouteError> {
        if self.routes.contains_key(channel) {
            return Err(RouteError::Duplicate(channel.to_string()));
        }
        self.routes.insert(channel.to_string(), controller);
        Ok(())
    }

    pub fn set_default(&mut self, controller: Arc<dyn Controller>) {
        self.default = Some(controller);
    }

    /// Registered channel names, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut names: Vec<_> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn default_controller(&self) -> Result<&Arc<dyn Controller>, BoxError> {
        self.default.as_ref().ok_or_else(|| RouteError::NoDefault.into())
    }
}

#[async_trait]
impl Controller for RouterController {
    async fn start(&self) -> Result<(), BoxError> {
        match &self.default {
            Some(controller) => controller.start().await,
            None => Ok(()),
        }
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        match &self.default {
            Some(controller) => controller.shutdown().await,
            None => Ok(()),
        }
    }

    async fn authenticate(&self, sid: &str, env: &SessionEnv) -> Result<ConnectResult, BoxError> {
        self.default_controller()?.authenticate(sid, env).await
    }

    async fn command(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError> {
        let routed = channel_of(&command.identifier).and_then(|channel| self.routes.get(&channel));

        match routed {
            Some(controller) => controller.command(sid, env, identifiers, command).await,
            None => {
                self.default_controller()?
                    .command(sid, env, identifiers, command)
                    .await
            }
        }
    }

    async fn disconnect(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        subscriptions: &[String],
    ) -> Result<(), BoxError> {
        self.default_controller()?
            .disconnect(sid, env, identifiers, subscriptions)
            .await
    }
}
