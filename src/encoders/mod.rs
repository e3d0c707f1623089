//! Wire encoders.
//!
//! A session picks its encoder from the negotiated websocket subprotocol:
//!
//! | Subprotocol                 | Encoder                 | Frames |
//! |-----------------------------|-------------------------|--------|
//! | `actioncable-v1-json`       | [`JsonEncoder`]         | text   |
//! | `actioncable-v1-ext-json`   | [`ExtendedJsonEncoder`] | text   |
//! | `actioncable-v1-protobuf`   | [`ProtobufEncoder`]     | binary |

pub mod json;
pub mod protobuf;

use std::sync::Arc;

use thiserror::Error;

use crate::node::types::{Command, Reply};

pub use json::{ExtendedJsonEncoder, JsonEncoder};
pub use protobuf::ProtobufEncoder;

pub const JSON_PROTOCOL: &str = "actioncable-v1-json";
pub const EXTENDED_JSON_PROTOCOL: &str = "actioncable-v1-ext-json";
pub const PROTOBUF_PROTOCOL: &str = "actioncable-v1-protobuf";

/// Subprotocols offered on the primary websocket endpoint.
pub const PROTOCOLS: [&str; 3] = [JSON_PROTOCOL, EXTENDED_JSON_PROTOCOL, PROTOBUF_PROTOCOL];

/// A single websocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid protobuf message: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("{encoder} does not accept {kind} frames")]
    UnexpectedFrame {
        encoder: &'static str,
        kind: &'static str,
    },

    #[error("{0} does not decode client commands")]
    Unsupported(&'static str),
}

/// Converts replies to frames and frames to commands.
pub trait Encoder: Send + Sync {
    /// Encoder identity, used in logs.
    fn id(&self) -> &'static str;

    /// Encode a reply. `None` means the reply has no representation in this
    /// protocol and is silently skipped.
    fn encode(&self, reply: &Reply) -> Result<Option<Frame>, EncodeError>;

    fn decode(&self, frame: &Frame) -> Result<Command, EncodeError>;
}

/// Encoder for a negotiated subprotocol; plain JSON when none was agreed.
pub fn for_protocol(protocol: Option<&str>) -> Arc<dyn Encoder> {
    match protocol {
        Some(EXTENDED_JSON_PROTOCOL) => Arc::new(ExtendedJsonEncoder),
        Some(PROTOBUF_PROTOCOL) => Arc::new(ProtobufEncoder),
        _ => Arc::new(JsonEncoder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_encoder_by_protocol() {
        assert_eq!(for_protocol(None).id(), "json");
        assert_eq!(for_protocol(Some(JSON_PROTOCOL)).id(), "json");
        assert_eq!(for_protocol(Some(EXTENDED_JSON_PROTOCOL)).id(), "extended_json");
        assert_eq!(for_protocol(Some(PROTOBUF_PROTOCOL)).id(), "protobuf");
    }
}
