#![allow(dead_code)]

use std::sync::Arc;

use agora_api::auth::codec::JwtConfig;
use agora_api::auth::mailer::{MailError, Mailer, OutgoingEmail};
use agora_api::auth::password::hash_password;
use agora_api::auth::store::{Stores, UserStore};
use agora_api::config::ServerConfig;
use agora_api::router::build_app_router;
use agora_api::state::AppState;
use agora_core::client::CLIENT_TYPE_HEADER;
use agora_db::models::user::{CreateUser, User};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
///
/// No database, Google or SMTP: the app runs on the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        app_env: "development".to_string(),
        app_url: "http://localhost:5173".to_string(),
        database_url: None,
        store_timeout_ms: 5000,
        session_cleanup_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_ttl: chrono::Duration::minutes(15),
            refresh_ttl: chrono::Duration::days(7),
        },
        google: None,
        smtp: None,
    }
}

/// Mailer that keeps every message so tests can read the links out of them.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl CapturingMailer {
    /// The `token=` value from the most recent email sent to `to`.
    pub async fn last_token_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().await;
        sent.iter()
            .rev()
            .find(|email| email.to == to)
            .and_then(|email| email.body.split("token=").nth(1))
            .map(|rest| {
                rest.chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect()
            })
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}

/// Router plus handles on the in-memory stores and captured mail.
pub struct TestApp {
    pub router: Router,
    pub stores: Stores,
    pub mailer: Arc<CapturingMailer>,
}

/// Build the full application router with all middleware layers over a
/// fresh in-memory store.
///
/// Uses the same [`build_app_router`] as `main.rs`, so the tests exercise
/// the production middleware stack.
pub fn build_test_app() -> TestApp {
    let stores = Stores::memory();
    let mailer = Arc::new(CapturingMailer::default());
    let state = AppState::new(test_config(), stores.clone(), mailer.clone());

    TestApp {
        router: build_app_router(state),
        stores,
        mailer,
    }
}

impl TestApp {
    /// Insert a user directly into the store, bypassing registration.
    pub async fn create_user(&self, username: &str, role: &str) -> User {
        let hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
        self.stores
            .users
            .create(&CreateUser {
                username: username.to_string(),
                email: format!("{username}@test.com"),
                password_hash: Some(hash),
                role: role.to_string(),
                email_verified: true,
            })
            .await
            .expect("user creation should succeed")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(request(Method::GET, uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            request(Method::GET, uri)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(json_request(Method::POST, uri, &body).body(body_of(&body)).unwrap())
            .await
    }

    pub async fn post_json_auth(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.send(
            json_request(Method::POST, uri, &body)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(body_of(&body))
                .unwrap(),
        )
        .await
    }

    pub async fn delete_auth(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            request(Method::DELETE, uri)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST as a web client, optionally carrying a `Cookie` header.
    pub async fn post_web(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        let mut builder = json_request(Method::POST, uri, &body).header(CLIENT_TYPE_HEADER, "web");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(body_of(&body)).unwrap()).await
    }

    /// GET as a web client with the given `Cookie` header.
    pub async fn get_web(&self, uri: &str, cookie: &str) -> Response<Body> {
        self.send(
            request(Method::GET, uri)
                .header(CLIENT_TYPE_HEADER, "web")
                .header(COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Log in with the JSON-body flow and return the response body.
    pub async fn login(&self, identifier: &str) -> serde_json::Value {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "identifier": identifier, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), 200, "login should succeed");
        body_json(response).await
    }
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn json_request(
    method: Method,
    uri: &str,
    body: &serde_json::Value,
) -> axum::http::request::Builder {
    let builder = request(method, uri);
    if body.is_null() {
        builder
    } else {
        builder.header(CONTENT_TYPE, "application/json")
    }
}

fn body_of(body: &serde_json::Value) -> Body {
    if body.is_null() {
        Body::empty()
    } else {
        Body::from(serde_json::to_vec(body).unwrap())
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies.iter().find_map(|c| {
        c.strip_prefix(&prefix)
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string)
    })
}
