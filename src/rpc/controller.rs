//! Stock controller backed by the RPC service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RpcConfig;
use crate::node::{
    Command, CommandKind, CommandResult, ConnectResult, Controller, Reply, SessionEnv, Status,
};
use crate::rpc::{
    ClientHandler, CommandMessage, ConnectionRequest, DisconnectRequest, HttpRpcClient, RpcDial,
    RpcError, RpcService,
};
use crate::BoxError;

pub struct RpcController {
    service: Arc<dyn RpcService>,
    handler: Option<Arc<dyn ClientHandler>>,
    target: String,
}

impl RpcController {
    /// Controller dialing the implementation selected in `config.dial`.
    pub fn from_config(config: &RpcConfig) -> Result<Self, RpcError> {
        match &config.dial {
            RpcDial::Network => Ok(Self {
                service: Arc::new(HttpRpcClient::from_config(config)?),
                handler: None,
                target: config.url.clone(),
            }),
            RpcDial::InProcess { service, handler } => Ok(Self {
                service: service.clone(),
                handler: Some(handler.clone()),
                target: "in-process".to_string(),
            }),
        }
    }
}

/// Parse raw JSON transmissions; malformed ones are dropped.
fn parse_transmissions(raw: Vec<String>) -> Vec<Reply> {
    raw.into_iter()
        .filter_map(|text| match serde_json::from_str(&text) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed transmission");
                None
            }
        })
        .collect()
}

fn command_name(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Subscribe => "subscribe",
        CommandKind::Unsubscribe => "unsubscribe",
        CommandKind::Message => "message",
        CommandKind::Unknown => "unknown",
    }
}

#[async_trait]
impl Controller for RpcController {
    async fn start(&self) -> Result<(), BoxError> {
        if let Some(handler) = &self.handler {
            handler.ready().await?;
        }
        tracing::info!(target_url = %self.target, "RPC controller initialized");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        if let Some(handler) = &self.handler {
            handler.close();
        }
        Ok(())
    }

    async fn authenticate(&self, _sid: &str, env: &SessionEnv) -> Result<ConnectResult, BoxError> {
        let response = self
            .service
            .connect(ConnectionRequest { env: env.clone() })
            .await?;

        if response.status == Status::Error {
            return Err(RpcError::Application(response.error_msg).into());
        }

        Ok(ConnectResult {
            status: response.status,
            identifiers: response.identifiers,
            transmissions: parse_transmissions(response.transmissions),
        })
    }

    async fn command(
        &self,
        _sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError> {
        let response = self
            .service
            .command(CommandMessage {
                command: command_name(command.command).to_string(),
                identifier: command.identifier.clone(),
                connection_identifiers: identifiers.to_string(),
                data: command.data.clone().unwrap_or_default(),
                env: env.clone(),
            })
            .await?;

        if response.status == Status::Error {
            return Err(RpcError::Application(response.error_msg).into());
        }

        Ok(CommandResult {
            status: response.status,
            disconnect: response.disconnect,
            stop_all_streams: response.stop_streams,
            streams: response.streams,
            stopped_streams: response.stopped_streams,
            transmissions: parse_transmissions(response.transmissions),
        })
    }

    async fn disconnect(
        &self,
        _sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        subscriptions: &[String],
    ) -> Result<(), BoxError> {
        let response = self
            .service
            .disconnect(DisconnectRequest {
                identifiers: identifiers.to_string(),
                subscriptions: subscriptions.to_vec(),
                env: env.clone(),
            })
            .await?;

        if response.status == Status::Error {
            return Err(RpcError::Application(response.error_msg).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ReplyType;
    use crate::rpc::{CommandResponse, ConnectionResponse, DisconnectResponse};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Scripted {
        closed: AtomicBool,
    }

    #[async_trait]
    impl RpcService for Scripted {
        async fn connect(&self, request: ConnectionRequest) -> Result<ConnectionResponse, RpcError> {
            Ok(ConnectionResponse {
                status: Status::Success,
                identifiers: request.env.url,
                transmissions: vec![r#"{"type":"welcome"}"#.into(), "garbage".into()],
                error_msg: String::new(),
            })
        }

        async fn command(&self, request: CommandMessage) -> Result<CommandResponse, RpcError> {
            Ok(CommandResponse {
                status: Status::Error,
                disconnect: false,
                stop_streams: false,
                streams: Vec::new(),
                stopped_streams: Vec::new(),
                transmissions: Vec::new(),
                error_msg: format!("{} failed", request.command),
            })
        }

        async fn disconnect(&self, _: DisconnectRequest) -> Result<DisconnectResponse, RpcError> {
            Ok(DisconnectResponse {
                status: Status::Success,
                error_msg: String::new(),
            })
        }
    }

    #[async_trait]
    impl ClientHandler for Scripted {
        async fn ready(&self) -> Result<(), RpcError> {
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn controller(service: Arc<Scripted>) -> RpcController {
        RpcController::from_config(&RpcConfig {
            dial: RpcDial::InProcess {
                service: service.clone(),
                handler: service,
            },
            ..RpcConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn maps_connect_response() {
        let controller = controller(Arc::new(Scripted::default()));

        let result = controller
            .authenticate("sid", &SessionEnv::new("ws://localhost/cable"))
            .await
            .unwrap();

        assert_eq!(result.identifiers, "ws://localhost/cable");
        assert_eq!(result.transmissions.len(), 1);
        assert_eq!(result.transmissions[0].kind, Some(ReplyType::Welcome));
    }

    #[tokio::test]
    async fn error_status_becomes_error() {
        let controller = controller(Arc::new(Scripted::default()));
        let err = controller
            .command("sid", &SessionEnv::default(), "", &Command::subscribe("chat"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subscribe failed"));
    }

    #[tokio::test]
    async fn lifecycle_reaches_client_handler() {
        let service = Arc::new(Scripted::default());
        let controller = controller(service.clone());

        controller.start().await.unwrap();
        controller.shutdown().await.unwrap();
        assert!(service.closed.load(Ordering::SeqCst));
    }
}
