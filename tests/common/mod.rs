use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use inventorius_api::config::AppConfig;
use serde_json::Value;
use tower::ServiceExt;

/// Helper harness for driving the full router against an in-process store.
/// No database, no auth — the state is assembled exactly as `main` does it.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            id_probe_window: 1_000,
        };
        let state = inventorius_api::AppState::new(config);
        let router = inventorius_api::router().with_state(state);
        Self { router }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
