//! HTTP broadcast endpoint.
//!
//! Accepts `POST` requests with a single `{"stream": "...", "data": "..."}`
//! message or an array of them.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde::Deserialize;

use crate::config::BroadcastConfig;
use crate::http::{HttpServer, ServerError, ServerOptions};
use crate::node::StreamMessage;
use crate::pubsub::{Handler, Subscriber};
use crate::BoxError;

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Batch(Vec<StreamMessage>),
    Single(StreamMessage),
}

pub struct HttpSubscriber {
    server: HttpServer,
    path: String,
}

impl HttpSubscriber {
    pub fn new(
        handler: Arc<dyn Handler>,
        config: &BroadcastConfig,
        options: &ServerOptions,
    ) -> Result<Self, ServerError> {
        let server = HttpServer::for_port(config.port, options)?;
        server.handle(&config.path, post(receive).with_state(handler));

        Ok(Self {
            server,
            path: config.path.clone(),
        })
    }

    /// Base URL of the broadcast endpoint.
    pub fn address(&self) -> String {
        format!("{}{}", self.server.address(), self.path)
    }
}

async fn receive(State(handler): State<Arc<dyn Handler>>, body: Bytes) -> StatusCode {
    let payload: Payload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed broadcast payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let messages = match payload {
        Payload::Batch(messages) => messages,
        Payload::Single(message) => vec![message],
    };

    tracing::debug!(count = messages.len(), "Broadcast received");
    for message in messages {
        handler.broadcast(message);
    }

    StatusCode::CREATED
}

#[async_trait]
impl Subscriber for HttpSubscriber {
    async fn start(&self) -> Result<(), BoxError> {
        tracing::info!("Accept broadcast requests at {}", self.address());

        match self.server.start_and_announce("broadcast server").await {
            Err(_) if self.server.stopped() => Ok(()),
            result => result.map_err(Into::into),
        }
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.server.shutdown();
        Ok(())
    }
}
