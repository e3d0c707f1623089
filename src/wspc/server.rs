//! In-process RPC acceptor server.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::any;

use crate::config::WsRpcConfig;
use crate::http::{HttpServer, ServerError, ServerOptions};
use crate::rpc::{
    ClientHandler, CommandMessage, CommandResponse, ConnectionRequest, ConnectionResponse,
    DisconnectRequest, DisconnectResponse, RpcError, RpcService,
};

pub struct Server {
    config: WsRpcConfig,
    server: HttpServer,
}

impl Server {
    pub fn new(config: &WsRpcConfig, options: &ServerOptions) -> Result<Self, ServerError> {
        let server = HttpServer::for_port(config.port, options)?;
        server.handle(&config.path, any(|| async { StatusCode::NOT_IMPLEMENTED }));

        Ok(Self {
            config: config.clone(),
            server,
        })
    }

    pub fn address(&self) -> String {
        self.server.address()
    }

    /// Serve until closed. Errors after an intentional close are swallowed.
    pub async fn start(&self) -> Result<(), ServerError> {
        tracing::info!(
            context = "wspc",
            "Handle RPC clients at {}{}",
            self.server.address(),
            self.config.path
        );

        match self.server.start_and_announce("WS RPC server").await {
            Err(_) if self.server.stopped() => Ok(()),
            result => result,
        }
    }

    /// Release the listening socket. Idempotent.
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

#[async_trait]
impl ClientHandler for Server {
    async fn ready(&self) -> Result<(), RpcError> {
        Ok(())
    }

    fn close(&self) {
        self.shutdown();
    }
}

#[async_trait]
impl RpcService for Server {
    async fn connect(&self, _request: ConnectionRequest) -> Result<ConnectionResponse, RpcError> {
        Err(RpcError::NotImplemented)
    }

    async fn command(&self, _request: CommandMessage) -> Result<CommandResponse, RpcError> {
        Err(RpcError::NotImplemented)
    }

    async fn disconnect(&self, _request: DisconnectRequest) -> Result<DisconnectResponse, RpcError> {
        Err(RpcError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SessionEnv;
    use std::sync::Arc;
    use std::time::Duration;

    fn server() -> Arc<Server> {
        let config = WsRpcConfig {
            path: "/rpc".into(),
            port: 0,
        };
        let options = ServerOptions {
            host: "127.0.0.1".into(),
            ..ServerOptions::default()
        };
        Arc::new(Server::new(&config, &options).unwrap())
    }

    #[tokio::test]
    async fn procedures_are_not_implemented() {
        let server = server();

        assert!(server.ready().await.is_ok());
        let err = server
            .connect(ConnectionRequest {
                env: SessionEnv::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::NotImplemented));
        assert_eq!(err.to_string(), "Not implemented");
    }

    #[tokio::test]
    async fn close_stops_serving_quietly() {
        let server = server();
        let runner = server.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        server.close();
        server.close();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("acceptor did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn endpoint_answers_not_implemented() {
        let server = server();
        let runner = server.clone();
        tokio::spawn(async move { runner.start().await });

        let url = format!("{}/rpc", server.address());
        let mut status = None;
        for _ in 0..50 {
            if let Ok(response) = reqwest::get(&url).await {
                status = Some(response.status().as_u16());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(501));
        server.close();
    }
}
