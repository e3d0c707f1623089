//! JSON encoders.

use crate::encoders::{EncodeError, Encoder, Frame};
use crate::node::types::{Command, Reply};

/// Plain Action Cable JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

/// JSON with the extended fields (session id, stream position) kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtendedJsonEncoder;

fn decode_text(encoder: &'static str, frame: &Frame) -> Result<Command, EncodeError> {
    match frame {
        Frame::Text(text) => Ok(serde_json::from_str(text)?),
        Frame::Binary(_) => Err(EncodeError::UnexpectedFrame {
            encoder,
            kind: "binary",
        }),
    }
}

impl Encoder for JsonEncoder {
    fn id(&self) -> &'static str {
        "json"
    }

    fn encode(&self, reply: &Reply) -> Result<Option<Frame>, EncodeError> {
        let text = serde_json::to_string(&reply.clone().strip_extended())?;
        Ok(Some(Frame::Text(text)))
    }

    fn decode(&self, frame: &Frame) -> Result<Command, EncodeError> {
        decode_text(self.id(), frame)
    }
}

impl Encoder for ExtendedJsonEncoder {
    fn id(&self) -> &'static str {
        "extended_json"
    }

    fn encode(&self, reply: &Reply) -> Result<Option<Frame>, EncodeError> {
        Ok(Some(Frame::Text(serde_json::to_string(reply)?)))
    }

    fn decode(&self, frame: &Frame) -> Result<Command, EncodeError> {
        decode_text(self.id(), frame)
    }
}
