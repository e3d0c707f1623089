//! Token-based identification in front of another controller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::JwtConfig;
use crate::identity::token::TokenIdentifier;
use crate::node::{Command, CommandResult, ConnectResult, Controller, Reply, SessionEnv};
use crate::BoxError;

/// Authenticates sessions from a signed token; everything else is delegated.
///
/// - valid token: connected with the token's identifiers, no backend call
/// - invalid token: rejected
/// - no token: delegated, or rejected when `force` is set
pub struct IdentifiableController {
    inner: Arc<dyn Controller>,
    identifier: TokenIdentifier,
    param: String,
    header: String,
    force: bool,
}

impl IdentifiableController {
    pub fn new(inner: Arc<dyn Controller>, config: &JwtConfig) -> Self {
        Self {
            inner,
            identifier: TokenIdentifier::new(&config.secret),
            param: config.param.clone(),
            header: format!("x-{}", config.param.to_ascii_lowercase()),
            force: config.force,
        }
    }

    fn token(&self, env: &SessionEnv) -> Option<String> {
        env.query_param(&self.param)
            .or_else(|| env.headers.get(&self.header).cloned())
            .filter(|token| !token.is_empty())
    }
}

fn unauthorized() -> ConnectResult {
    ConnectResult::failure(vec![Reply::disconnect("unauthorized", false)])
}

#[async_trait]
impl Controller for IdentifiableController {
    async fn start(&self) -> Result<(), BoxError> {
        self.inner.start().await
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.inner.shutdown().await
    }

    async fn authenticate(&self, sid: &str, env: &SessionEnv) -> Result<ConnectResult, BoxError> {
        let Some(token) = self.token(env) else {
            if self.force {
                tracing::debug!(sid, "Missing identification token");
                return Ok(unauthorized());
            }
            return self.inner.authenticate(sid, env).await;
        };

        match self.identifier.identify(&token) {
            Ok(identifiers) => Ok(ConnectResult::success(identifiers, vec![Reply::welcome(sid)])),
            Err(e) => {
                tracing::debug!(sid, error = %e, "Invalid identification token");
                Ok(unauthorized())
            }
        }
    }

    async fn command(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError> {
        self.inner.command(sid, env, identifiers, command).await
    }

    async fn disconnect(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        subscriptions: &[String],
    ) -> Result<(), BoxError> {
        self.inner
            .disconnect(sid, env, identifiers, subscriptions)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Status;
    use std::time::Duration;

    struct Backend;

    #[async_trait]
    impl Controller for Backend {
        async fn start(&self) -> Result<(), BoxError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), BoxError> {
            Ok(())
        }

        async fn authenticate(&self, _: &str, _: &SessionEnv) -> Result<ConnectResult, BoxError> {
            Ok(ConnectResult::success("from-backend", Vec::new()))
        }

        async fn command(
            &self,
            _: &str,
            _: &SessionEnv,
            _: &str,
            _: &Command,
        ) -> Result<CommandResult, BoxError> {
            Ok(CommandResult::new(Status::Success))
        }

        async fn disconnect(&self, _: &str, _: &SessionEnv, _: &str, _: &[String]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn config(force: bool) -> JwtConfig {
        JwtConfig {
            secret: "secret".into(),
            param: "jid".into(),
            force,
        }
    }

    #[tokio::test]
    async fn valid_token_skips_backend() {
        let controller = IdentifiableController::new(Arc::new(Backend), &config(false));
        let token = TokenIdentifier::new("secret").issue("from-token", Duration::from_secs(60));

        let env = SessionEnv::new(format!("ws://localhost/cable?jid={}", token));
        let result = controller.authenticate("sid", &env).await.unwrap();
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.identifiers, "from-token");
    }

    #[tokio::test]
    async fn token_can_come_from_header() {
        let controller = IdentifiableController::new(Arc::new(Backend), &config(false));
        let token = TokenIdentifier::new("secret").issue("from-header", Duration::from_secs(60));

        let mut env = SessionEnv::new("ws://localhost/cable");
        env.headers.insert("x-jid".into(), token);
        let result = controller.authenticate("sid", &env).await.unwrap();
        assert_eq!(result.identifiers, "from-header");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let controller = IdentifiableController::new(Arc::new(Backend), &config(false));
        let env = SessionEnv::new("ws://localhost/cable?jid=deadbeef--00");
        let result = controller.authenticate("sid", &env).await.unwrap();
        assert_eq!(result.status, Status::Failure);
    }

    #[tokio::test]
    async fn missing_token_delegates_unless_forced() {
        let env = SessionEnv::new("ws://localhost/cable");

        let lenient = IdentifiableController::new(Arc::new(Backend), &config(false));
        assert_eq!(
            lenient.authenticate("sid", &env).await.unwrap().identifiers,
            "from-backend"
        );

        let strict = IdentifiableController::new(Arc::new(Backend), &config(true));
        assert_eq!(
            strict.authenticate("sid", &env).await.unwrap().status,
            Status::Failure
        );
    }
}
