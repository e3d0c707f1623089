//! Reply encoding for `graphql-ws` clients.

use serde_json::json;

use crate::apollo::{operation_id, ApolloMessage};
use crate::encoders::{EncodeError, Encoder, Frame};
use crate::node::{Command, Reply, ReplyType};

#[derive(Debug, Default, Clone, Copy)]
pub struct ApolloEncoder;

impl ApolloEncoder {
    /// Marker reply encoded as `complete`: an identifier with no payload.
    pub fn complete(identifier: &str) -> Reply {
        Reply {
            identifier: Some(identifier.to_string()),
            ..Reply::default()
        }
    }

    fn translate(reply: &Reply) -> Option<ApolloMessage> {
        let id = reply.identifier.as_deref().and_then(operation_id);

        let message = match reply.kind {
            Some(ReplyType::Welcome) => ApolloMessage::new("connection_ack"),
            Some(ReplyType::Ping) => ApolloMessage::new("ka"),
            Some(ReplyType::ConfirmSubscription) => return None,
            Some(ReplyType::RejectSubscription) => ApolloMessage::new("error")
                .with_payload(json!({ "message": "Subscription rejected" })),
            Some(ReplyType::Disconnect) => {
                let reason = reply.reason.as_deref().unwrap_or("disconnected");
                return Some(
                    ApolloMessage::new("connection_error").with_payload(json!({ "message": reason })),
                );
            }
            None => match &reply.message {
                Some(message) => {
                    // Channel results wrap the execution result as `{"result": ..}`.
                    let payload = message.get("result").cloned().unwrap_or_else(|| message.clone());
                    ApolloMessage::new("data").with_payload(payload)
                }
                None => ApolloMessage::new("complete"),
            },
        };

        Some(match id {
            Some(id) => message.with_id(id),
            None => message,
        })
    }
}

impl Encoder for ApolloEncoder {
    fn id(&self) -> &'static str {
        "apollo"
    }

    fn encode(&self, reply: &Reply) -> Result<Option<Frame>, EncodeError> {
        match Self::translate(reply) {
            Some(message) => Ok(Some(Frame::Text(serde_json::to_string(&message)?))),
            None => Ok(None),
        }
    }

    /// Client messages are interpreted by the executor, not decoded into commands.
    fn decode(&self, _frame: &Frame) -> Result<Command, EncodeError> {
        Err(EncodeError::Unsupported(self.id()))
    }
}

/// Decode a client message.
pub(crate) fn parse(frame: &Frame) -> Result<ApolloMessage, EncodeError> {
    match frame {
        Frame::Text(text) => Ok(serde_json::from_str(text)?),
        Frame::Binary(_) => Err(EncodeError::UnexpectedFrame {
            encoder: "apollo",
            kind: "binary",
        }),
    }
}
