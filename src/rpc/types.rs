//! RPC request and response messages (JSON over HTTP).

use serde::{Deserialize, Serialize};

use crate::node::{SessionEnv, Status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub env: SessionEnv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub status: Status,
    #[serde(default)]
    pub identifiers: String,
    /// Raw JSON replies to send to the client.
    #[serde(default)]
    pub transmissions: Vec<String>,
    #[serde(default)]
    pub error_msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    pub identifier: String,
    pub connection_identifiers: String,
    #[serde(default)]
    pub data: String,
    pub env: SessionEnv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: Status,
    #[serde(default)]
    pub disconnect: bool,
    #[serde(default)]
    pub stop_streams: bool,
    #[serde(default)]
    pub streams: Vec<String>,
    #[serde(default)]
    pub stopped_streams: Vec<String>,
    #[serde(default)]
    pub transmissions: Vec<String>,
    #[serde(default)]
    pub error_msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectRequest {
    pub identifiers: String,
    pub subscriptions: Vec<String>,
    pub env: SessionEnv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub status: Status,
    #[serde(default)]
    pub error_msg: String,
}
