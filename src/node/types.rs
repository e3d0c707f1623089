//! Protocol messages exchanged between sessions, the node and controllers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of server-to-client reply. Broadcast messages carry no type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyType {
    Welcome,
    Ping,
    Disconnect,
    ConfirmSubscription,
    RejectSubscription,
}

/// Server-to-client message.
///
/// `sid`, `stream_id` and `offset` are extended fields, only sent to clients
/// speaking the extended protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReplyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Reply {
    pub fn welcome(sid: &str) -> Self {
        Self {
            kind: Some(ReplyType::Welcome),
            sid: Some(sid.to_string()),
            ..Self::default()
        }
    }

    pub fn ping(timestamp: u64) -> Self {
        Self {
            kind: Some(ReplyType::Ping),
            message: Some(Value::from(timestamp)),
            ..Self::default()
        }
    }

    pub fn disconnect(reason: &str, reconnect: bool) -> Self {
        Self {
            kind: Some(ReplyType::Disconnect),
            reason: Some(reason.to_string()),
            reconnect: Some(reconnect),
            ..Self::default()
        }
    }

    pub fn confirm(identifier: &str) -> Self {
        Self {
            kind: Some(ReplyType::ConfirmSubscription),
            identifier: Some(identifier.to_string()),
            ..Self::default()
        }
    }

    pub fn reject(identifier: &str) -> Self {
        Self {
            kind: Some(ReplyType::RejectSubscription),
            identifier: Some(identifier.to_string()),
            ..Self::default()
        }
    }

    /// Broadcast payload delivered to one subscription.
    pub fn message(identifier: &str, message: Value) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            message: Some(message),
            ..Self::default()
        }
    }

    /// Drop the extended protocol fields.
    pub fn strip_extended(mut self) -> Self {
        self.sid = None;
        self.stream_id = None;
        self.offset = None;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Subscribe,
    Unsubscribe,
    Message,
    #[serde(other)]
    Unknown,
}

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command: CommandKind,
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Command {
    pub fn subscribe(identifier: &str) -> Self {
        Self {
            command: CommandKind::Subscribe,
            identifier: identifier.to_string(),
            data: None,
        }
    }

    pub fn unsubscribe(identifier: &str) -> Self {
        Self {
            command: CommandKind::Unsubscribe,
            identifier: identifier.to_string(),
            data: None,
        }
    }

    pub fn message(identifier: &str, data: &str) -> Self {
        Self {
            command: CommandKind::Message,
            identifier: identifier.to_string(),
            data: Some(data.to_string()),
        }
    }
}

/// Request context captured at upgrade time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEnv {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl SessionEnv {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Value of a query parameter in the request URL.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let parsed = url::Url::parse(&self.url)
            .or_else(|_| url::Url::parse("http://localhost").and_then(|base| base.join(&self.url)))
            .ok()?;
        parsed
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Payload published to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub stream: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
    Error,
}

/// Outcome of authenticating a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectResult {
    pub status: Status,
    pub identifiers: String,
    pub transmissions: Vec<Reply>,
}

impl ConnectResult {
    pub fn success(identifiers: impl Into<String>, transmissions: Vec<Reply>) -> Self {
        Self {
            status: Status::Success,
            identifiers: identifiers.into(),
            transmissions,
        }
    }

    pub fn failure(transmissions: Vec<Reply>) -> Self {
        Self {
            status: Status::Failure,
            identifiers: String::new(),
            transmissions,
        }
    }
}

/// Outcome of a subscribe, unsubscribe or message command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub status: Status,
    pub disconnect: bool,
    pub stop_all_streams: bool,
    pub streams: Vec<String>,
    pub stopped_streams: Vec<String>,
    pub transmissions: Vec<Reply>,
}

impl CommandResult {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            disconnect: false,
            stop_all_streams: false,
            streams: Vec::new(),
            stopped_streams: Vec::new(),
            transmissions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replies_omit_empty_fields() {
        let encoded = serde_json::to_value(Reply::confirm("{\"channel\":\"ChatChannel\"}")).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "confirm_subscription", "identifier": "{\"channel\":\"ChatChannel\"}"})
        );

        let encoded = serde_json::to_value(Reply::message("id", json!({"text": "hi"}))).unwrap();
        assert_eq!(encoded, json!({"identifier": "id", "message": {"text": "hi"}}));
    }

    #[test]
    fn strips_extended_fields() {
        let reply = Reply::welcome("abc").strip_extended();
        assert_eq!(serde_json::to_value(reply).unwrap(), json!({"type": "welcome"}));
    }

    #[test]
    fn unknown_commands_still_parse() {
        let command: Command =
            serde_json::from_str(r#"{"command":"history","identifier":"x"}"#).unwrap();
        assert_eq!(command.command, CommandKind::Unknown);
    }

    #[test]
    fn reads_query_params() {
        let env = SessionEnv::new("ws://example.com/cable?jid=token&x=1");
        assert_eq!(env.query_param("jid").as_deref(), Some("token"));
        assert_eq!(env.query_param("missing"), None);

        let relative = SessionEnv::new("/cable?jid=abc");
        assert_eq!(relative.query_param("jid").as_deref(), Some("abc"));
    }
}
