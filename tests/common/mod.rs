#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use content_generator::{
    Server,
    database::entities::{Plan, UserRecord},
    test_utils::TestServerBuilder,
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// App plus the server state behind it, for driving requests and inspecting the database
#[derive(Clone)]
pub struct TestHarness {
    pub server: Server,
    pub app: Router,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::from_builder(TestServerBuilder::new()).await
    }

    pub async fn from_builder(builder: TestServerBuilder) -> Self {
        let server = builder.build().await;
        let app = server.create_app();
        Self { server, app }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Account plus a valid access token
    pub async fn user(&self, email: &str, plan: Plan) -> (UserRecord, String) {
        let user = self.server.create_test_user(email, plan).await;
        let token = self.server.token_for(&user);
        (user, token)
    }

    pub async fn user_with_usage(&self, email: &str, plan: Plan, used: i32) -> (UserRecord, String) {
        let username = email.split('@').next().unwrap().to_string();
        let user = self
            .server
            .insert_user(
                UserRecord::new(email, username, "unused-hash")
                    .with_plan(plan)
                    .with_usage(used),
            )
            .await;
        let token = self.server.token_for(&user);
        (user, token)
    }

    pub async fn generate(&self, token: &str) -> (StatusCode, Value) {
        self.post("/api/v1/generate", Some(token), generation_body("post_social"))
            .await
    }

    pub async fn used(&self, user_id: i32) -> u32 {
        self.server.ledger.entitlement(user_id).await.unwrap().used
    }

    pub async fn stored_generations(&self, user_id: i32) -> u64 {
        self.server
            .database
            .generations()
            .count_by_user(user_id)
            .await
            .unwrap()
    }
}

pub fn generation_body(content_type: &str) -> Value {
    json!({
        "content_type": content_type,
        "topic": "lanzamiento de una cafetería",
        "tone": "amigable",
        "length": "corta"
    })
}
