//! Client message handling for `graphql-ws` sessions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::apollo::encoder::{self, ApolloEncoder};
use crate::apollo::identifier;
use crate::config::ApolloConfig;
use crate::encoders::Frame;
use crate::node::{Command, Executor, Node, Session, SessionError};

pub struct ApolloExecutor {
    node: Arc<Node>,
    channel: String,
    action: String,
}

impl ApolloExecutor {
    pub fn new(node: Arc<Node>, config: &ApolloConfig) -> Self {
        Self {
            node,
            channel: config.channel.clone(),
            action: config.action.clone(),
        }
    }

    /// Subscribe to the operation channel, then run the query through it.
    async fn start(
        &self,
        session: &Arc<Session>,
        id: &str,
        payload: Option<Value>,
    ) -> Result<(), SessionError> {
        let identifier = identifier(&self.channel, id);

        self.node
            .handle_command(session, &Command::subscribe(&identifier))
            .await?;
        if !session.has_subscription(&identifier) {
            return Ok(());
        }

        let mut data = match payload {
            Some(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        data.insert("action".to_string(), Value::String(self.action.clone()));

        self.node
            .handle_command(
                session,
                &Command::message(&identifier, &Value::Object(data).to_string()),
            )
            .await
    }

    async fn stop(&self, session: &Arc<Session>, id: &str) -> Result<(), SessionError> {
        let identifier = identifier(&self.channel, id);
        self.node
            .handle_command(session, &Command::unsubscribe(&identifier))
            .await?;
        session.send(&ApolloEncoder::complete(&identifier));
        Ok(())
    }
}

#[async_trait]
impl Executor for ApolloExecutor {
    async fn handle_frame(&self, session: &Arc<Session>, frame: Frame) -> Result<(), SessionError> {
        let message = encoder::parse(&frame)?;

        match (message.kind.as_str(), message.id.as_deref()) {
            ("connection_init", _) => self.node.authenticate(session).await.map(|_| ()),
            ("start", Some(id)) => self.start(session, id, message.payload).await,
            ("stop", Some(id)) => self.stop(session, id).await,
            ("connection_terminate", _) => {
                session.close("terminated", false);
                Ok(())
            }
            (kind, _) => {
                tracing::warn!(sid = session.id(), kind, "Unsupported GraphQL message");
                Ok(())
            }
        }
    }
}
