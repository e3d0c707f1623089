//! Liveness endpoint.

use axum::routing::{get, MethodRouter};

/// Static liveness responder.
pub async fn health_handler() -> &'static str {
    "Success"
}

pub fn health_route() -> MethodRouter {
    get(health_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn responds_success() {
        let app = Router::new().route("/health", health_route());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Success");
    }
}
