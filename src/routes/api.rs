use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::handlers::{diagnostics, health_check, ready_check};
use crate::hub::AppState;
use crate::routes::auth_middleware::auth_middleware;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route_layer(middleware::from_fn(auth_middleware)) // Applies to all routes added above
        .route("/v1/health", get(health_check))
        .route("/v1/ready", get(ready_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::judge::{Judge, JudgeError, SubmissionStatus, SubmissionTicket};
    use crate::models::{ErrorResponse, HealthResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct NoJudge;

    #[async_trait]
    impl Judge for NoJudge {
        async fn submit(
            &self,
            _language_id: u32,
            _source: &str,
            _stdin: Option<&str>,
        ) -> Result<SubmissionTicket, JudgeError> {
            Err(JudgeError::Transport("unconfigured".to_string()))
        }

        async fn poll(&self, _token: &str) -> Result<SubmissionStatus, JudgeError> {
            Err(JudgeError::Transport("unconfigured".to_string()))
        }
    }

    fn app() -> Router {
        create_api_routes(AppState::new(Arc::new(NoJudge)))
    }

    #[tokio::test]
    async fn health_is_public() {
        let res = app()
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn diagnostics_without_token_gets_a_structured_401() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/v1/diagnostics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, 401);
        assert_eq!(body.status, "Unauthorized");
    }
}
