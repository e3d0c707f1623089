//! HTTP RPC client.
//!
//! Each procedure is a JSON `POST` to `<url>/<procedure>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RpcConfig;
use crate::resilience::{retry, Backoff};
use crate::rpc::{
    CommandMessage, CommandResponse, ConnectionRequest, ConnectionResponse, DisconnectRequest,
    DisconnectResponse, RpcError, RpcService,
};

pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
    backoff: Backoff,
}

impl HttpRpcClient {
    pub fn from_config(config: &RpcConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::from_config(config),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<Req, Resp>(&self, procedure: &str, request: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let endpoint = format!("{}/{}", self.url, procedure);
        let endpoint = endpoint.as_str();
        let client = &self.client;

        retry(self.max_attempts, self.backoff, move || async move {
            let response = client.post(endpoint).json(request).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::Status(status.as_u16()));
            }

            Ok(response.json::<Resp>().await?)
        })
        .await
    }
}

#[async_trait]
impl RpcService for HttpRpcClient {
    async fn connect(&self, request: ConnectionRequest) -> Result<ConnectionResponse, RpcError> {
        self.call("connect", &request).await
    }

    async fn command(&self, request: CommandMessage) -> Result<CommandResponse, RpcError> {
        self.call("command", &request).await
    }

    async fn disconnect(&self, request: DisconnectRequest) -> Result<DisconnectResponse, RpcError> {
        self.call("disconnect", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{SessionEnv, Status};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn backend(failures: u32) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let app = Router::new().route(
            "/_anycable/connect",
            post(move |Json(_): Json<ConnectionRequest>| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        return Err(axum::http::StatusCode::SERVICE_UNAVAILABLE);
                    }
                    Ok(Json(ConnectionResponse {
                        status: Status::Success,
                        identifiers: "user".into(),
                        transmissions: vec![r#"{"type":"welcome"}"#.into()],
                        error_msg: String::new(),
                    }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{}/_anycable", addr), calls)
    }

    fn config(url: String) -> RpcConfig {
        RpcConfig {
            url,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..RpcConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_unavailable_backend() {
        let (url, calls) = backend(2).await;
        let client = HttpRpcClient::from_config(&config(url)).unwrap();

        let response = client
            .connect(ConnectionRequest {
                env: SessionEnv::new("ws://localhost/cable"),
            })
            .await
            .unwrap();

        assert_eq!(response.identifiers, "user");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (url, calls) = backend(10).await;
        let client = HttpRpcClient::from_config(&config(url)).unwrap();

        let err = client
            .connect(ConnectionRequest {
                env: SessionEnv::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Status(503)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
