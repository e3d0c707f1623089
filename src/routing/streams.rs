//! Signed stream subscriptions served without the RPC backend.
//!
//! The subscription identifier carries `signed_stream_name`, a token whose
//! payload is the JSON-encoded stream name.

use async_trait::async_trait;
use serde::Deserialize;

use crate::identity::MessageVerifier;
use crate::node::{
    Command, CommandKind, CommandResult, ConnectResult, Controller, Reply, SessionEnv, Status,
};
use crate::BoxError;

#[derive(Deserialize)]
struct SignedIdentifier {
    signed_stream_name: String,
}

pub struct SignedStreamController {
    verifier: MessageVerifier,
}

impl SignedStreamController {
    pub fn new(secret: &str) -> Self {
        Self {
            verifier: MessageVerifier::new(secret),
        }
    }

    fn stream_name(&self, identifier: &str) -> Option<String> {
        let signed: SignedIdentifier = serde_json::from_str(identifier).ok()?;
        let payload = self.verifier.verify(&signed.signed_stream_name).ok()?;
        serde_json::from_slice::<String>(&payload).ok()
    }
}

#[async_trait]
impl Controller for SignedStreamController {
    async fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn authenticate(&self, _sid: &str, _env: &SessionEnv) -> Result<ConnectResult, BoxError> {
        Err("signed streams do not authenticate connections".into())
    }

    async fn command(
        &self,
        sid: &str,
        _env: &SessionEnv,
        _identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError> {
        match command.command {
            CommandKind::Subscribe => match self.stream_name(&command.identifier) {
                Some(stream) => {
                    tracing::debug!(sid, stream = %stream, "Signed stream verified");
                    let mut result = CommandResult::new(Status::Success);
                    result.streams.push(stream);
                    result.transmissions.push(Reply::confirm(&command.identifier));
                    Ok(result)
                }
                None => {
                    tracing::debug!(sid, identifier = %command.identifier, "Invalid signed stream");
                    let mut result = CommandResult::new(Status::Failure);
                    result.transmissions.push(Reply::reject(&command.identifier));
                    Ok(result)
                }
            },
            CommandKind::Unsubscribe => {
                let mut result = CommandResult::new(Status::Success);
                result.stop_all_streams = true;
                Ok(result)
            }
            CommandKind::Message | CommandKind::Unknown => Ok(CommandResult::new(Status::Failure)),
        }
    }

    async fn disconnect(
        &self,
        _sid: &str,
        _env: &SessionEnv,
        _identifiers: &str,
        _subscriptions: &[String],
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier(signed: &str) -> String {
        serde_json::json!({
            "channel": "Turbo::StreamsChannel",
            "signed_stream_name": signed,
        })
        .to_string()
    }

    #[tokio::test]
    async fn subscribes_to_verified_stream() {
        let controller = SignedStreamController::new("s3cr3t");
        let signed = MessageVerifier::new("s3cr3t").generate(br#""chat:1""#);
        let id = identifier(&signed);

        let result = controller
            .command("sid", &SessionEnv::default(), "", &Command::subscribe(&id))
            .await
            .unwrap();

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.streams, vec!["chat:1"]);
        assert_eq!(result.transmissions, vec![Reply::confirm(&id)]);
    }

    #[tokio::test]
    async fn rejects_forged_stream() {
        let controller = SignedStreamController::new("s3cr3t");
        let forged = MessageVerifier::new("other").generate(br#""admin""#);
        let id = identifier(&forged);

        let result = controller
            .command("sid", &SessionEnv::default(), "", &Command::subscribe(&id))
            .await
            .unwrap();

        assert_eq!(result.status, Status::Failure);
        assert!(result.streams.is_empty());
        assert_eq!(result.transmissions, vec![Reply::reject(&id)]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_all_streams() {
        let controller = SignedStreamController::new("s3cr3t");
        let result = controller
            .command("sid", &SessionEnv::default(), "", &Command::unsubscribe("{}"))
            .await
            .unwrap();
        assert!(result.stop_all_streams);
    }
}
