#![allow(dead_code)]

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use hvac_api::auth::jwt::{Claims, JwtConfig};
use hvac_api::config::{PipelineConfig, ServerConfig};
use hvac_api::router::build_app_router;
use hvac_api::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Build a test `ServerConfig` around the given pipeline settings.
pub fn test_config(pipeline: PipelineConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
        pipeline,
    }
}

/// Write `body` as `script.sh` in `dir` and return pipeline settings that
/// run it with `sh`.
pub fn script_pipeline(dir: &Path, body: &str) -> PipelineConfig {
    let path = dir.join("script.sh");
    std::fs::write(&path, body).expect("write test script");
    PipelineConfig {
        runtime: "sh".into(),
        script_path: path.to_string_lossy().into_owned(),
        working_directory: None,
        max_concurrent: 4,
        job_timeout_secs: 60,
        auto_mark_complete: false,
    }
}

/// The router plus a handle on its state for assertions.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pipeline: PipelineConfig) -> TestApp {
    build_test_app_with(test_config(pipeline))
}

/// Like [`build_test_app`] but with a fully custom server config.
pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let state = AppState::new(config.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp { router, state }
}

/// Mint a valid access token for `user-1`, optionally carrying a uuid claim,
/// signed the way the login service signs them.
pub fn token(uuid: Option<&str>) -> String {
    let claims = Claims {
        user_id: "user-1".to_string(),
        uuid: uuid.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token generation")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Poll `check` every 20ms until it returns true. Panics after 10s.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 10s"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
