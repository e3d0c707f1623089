//! GraphQL-over-websocket front-end (`graphql-ws` subprotocol).
//!
//! GraphQL operations are mapped onto a single channel: every `start`
//! becomes a subscription to `apollo.channel` keyed by the operation id,
//! followed by a `perform` of `apollo.action` carrying the query.

pub mod encoder;
pub mod executor;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use encoder::ApolloEncoder;
pub use executor::ApolloExecutor;

/// Websocket subprotocol spoken by Apollo clients.
pub const PROTOCOL: &str = "graphql-ws";

/// A `graphql-ws` message, in either direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApolloMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ApolloMessage {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Channel identifier for a GraphQL operation.
pub fn identifier(channel: &str, operation_id: &str) -> String {
    serde_json::json!({ "channel": channel, "channelId": operation_id }).to_string()
}

/// Operation id carried by a channel identifier.
pub fn operation_id(identifier: &str) -> Option<String> {
    let value: Value = serde_json::from_str(identifier).ok()?;
    match value.get("channelId")? {
        Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_carries_operation_id() {
        let id = identifier("GraphqlChannel", "7");
        assert_eq!(id, r#"{"channel":"GraphqlChannel","channelId":"7"}"#);
        assert_eq!(operation_id(&id).as_deref(), Some("7"));
        assert_eq!(operation_id("chat"), None);
    }
}
