use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::users;

pub const HEALTH_MESSAGE: &str = "moneymind backend is up";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
}

/// Liveness only; never touches the database.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE,
    })
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/test", get(health))
        .merge(users::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = res.status();
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::users::repo::fake::{InMemoryUserRepository, UnavailableUserRepository};

    fn app_with(repo: Arc<InMemoryUserRepository>) -> Router {
        build_app(AppState::fake(repo))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://localhost:5500")
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(res: Response) -> Value {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    #[tokio::test]
    async fn health_returns_message() {
        let app = app_with(Arc::default());
        let res = app.oneshot(get_req("/api/test")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], HEALTH_MESSAGE);
    }

    #[tokio::test]
    async fn health_ignores_storage_outage() {
        let app = build_app(AppState::fake(Arc::new(UnavailableUserRepository)));
        let res = app.oneshot(get_req("/api/test")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let app = app_with(Arc::default());
        let res = app.oneshot(get_req("/verifyuserexist")).await.unwrap();
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert!(res
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[tokio::test]
    async fn empty_store_lists_empty_array() {
        let app = app_with(Arc::default());
        let res = app.oneshot(get_req("/verifyuserexist")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn add_user_returns_201_with_empty_body() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let app = app_with(repo.clone());

        let res = app
            .oneshot(post_json("/adduser", r#"{"name":"Ana"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(body_bytes(res).await.is_empty());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn added_users_are_listed_newest_first() {
        let app = app_with(Arc::default());

        for name in ["first", "second"] {
            let res = app
                .clone()
                .oneshot(post_json("/adduser", &format!(r#"{{"name":"{name}"}}"#)))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::CREATED);
        }

        let res = app.oneshot(get_req("/verifyuserexist")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["name"], "second");
        assert_eq!(users[1]["name"], "first");
        assert_ne!(users[0]["id"], users[1]["id"]);
        // RFC 3339 string, not the default tuple encoding
        assert!(users[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn blank_name_is_a_400_and_creates_nothing() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let app = app_with(repo.clone());

        for body in [r#"{"name":""}"#, r#"{"name":"   "}"#] {
            let res = app.clone().oneshot(post_json("/adduser", body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(res).await["error"], "name is required");
        }
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_are_json_400s() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let app = app_with(repo.clone());

        for body in ["{}", "not json", r#"{"name": 42}"#] {
            let res = app.clone().oneshot(post_json("/adduser", body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {body:?}");
            assert!(body_json(res).await["error"].is_string());
        }

        let no_content_type = Request::builder()
            .method(Method::POST)
            .uri("/adduser")
            .body(Body::from(r#"{"name":"Ana"}"#))
            .unwrap();
        let res = app.oneshot(no_content_type).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_a_413() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let app = app_with(repo.clone());

        // Past axum's default 2 MiB body limit.
        let name = "a".repeat(3 * 1024 * 1024);
        let body = serde_json::json!({ "name": name }).to_string();
        let res = app.oneshot(post_json("/adduser", &body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(res).await["error"], "request body too large");
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn storage_outage_is_a_503_without_detail() {
        let app = build_app(AppState::fake(Arc::new(UnavailableUserRepository)));

        let res = app.clone().oneshot(get_req("/verifyuserexist")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(res).await;
        assert_eq!(body["error"], "storage unavailable");
        assert!(!body.to_string().contains("os error"));

        let res = app
            .oneshot(post_json("/adduser", r#"{"name":"Ana"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn injection_attempt_round_trips_as_text() {
        let app = app_with(Arc::default());
        let payload = serde_json::json!({ "name": "Robert'); DROP TABLE users;--" });

        let res = app
            .clone()
            .oneshot(post_json("/adduser", &payload.to_string()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = app.oneshot(get_req("/verifyuserexist")).await.unwrap();
        let body = body_json(res).await;
        assert_eq!(body[0]["name"], "Robert'); DROP TABLE users;--");
    }
}
