//! Protobuf encoder.
//!
//! Replies and commands travel as binary frames. Free-form payloads
//! (`message`) are carried as JSON strings inside the protobuf envelope.

use prost::Message as _;

use crate::encoders::{EncodeError, Encoder, Frame};
use crate::node::types::{Command, CommandKind, Reply, ReplyType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtoReplyType {
    NoType = 0,
    Welcome = 1,
    Disconnect = 2,
    Ping = 3,
    ConfirmSubscription = 4,
    RejectSubscription = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtoCommandType {
    UnknownCommand = 0,
    Subscribe = 1,
    Unsubscribe = 2,
    Message = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoReply {
    #[prost(enumeration = "ProtoReplyType", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub identifier: String,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(string, tag = "4")]
    pub reason: String,
    #[prost(bool, tag = "5")]
    pub reconnect: bool,
    #[prost(string, tag = "6")]
    pub sid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoCommand {
    #[prost(enumeration = "ProtoCommandType", tag = "1")]
    pub command: i32,
    #[prost(string, tag = "2")]
    pub identifier: String,
    #[prost(string, tag = "3")]
    pub data: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProtobufEncoder;

impl Encoder for ProtobufEncoder {
    fn id(&self) -> &'static str {
        "protobuf"
    }

    fn encode(&self, reply: &Reply) -> Result<Option<Frame>, EncodeError> {
        let kind = match reply.kind {
            None => ProtoReplyType::NoType,
            Some(ReplyType::Welcome) => ProtoReplyType::Welcome,
            Some(ReplyType::Disconnect) => ProtoReplyType::Disconnect,
            Some(ReplyType::Ping) => ProtoReplyType::Ping,
            Some(ReplyType::ConfirmSubscription) => ProtoReplyType::ConfirmSubscription,
            Some(ReplyType::RejectSubscription) => ProtoReplyType::RejectSubscription,
        };

        let message = match &reply.message {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        let proto = ProtoReply {
            kind: kind as i32,
            identifier: reply.identifier.clone().unwrap_or_default(),
            message,
            reason: reply.reason.clone().unwrap_or_default(),
            reconnect: reply.reconnect.unwrap_or(false),
            sid: reply.sid.clone().unwrap_or_default(),
        };

        Ok(Some(Frame::Binary(proto.encode_to_vec())))
    }

    fn decode(&self, frame: &Frame) -> Result<Command, EncodeError> {
        let Frame::Binary(bytes) = frame else {
            return Err(EncodeError::UnexpectedFrame {
                encoder: self.id(),
                kind: "text",
            });
        };

        let proto = ProtoCommand::decode(bytes.as_slice())?;
        let command = match ProtoCommandType::try_from(proto.command) {
            Ok(ProtoCommandType::Subscribe) => CommandKind::Subscribe,
            Ok(ProtoCommandType::Unsubscribe) => CommandKind::Unsubscribe,
            Ok(ProtoCommandType::Message) => CommandKind::Message,
            Ok(ProtoCommandType::UnknownCommand) | Err(_) => CommandKind::Unknown,
        };

        Ok(Command {
            command,
            identifier: proto.identifier,
            data: (!proto.data.is_empty()).then_some(proto.data),
        })
    }
}
