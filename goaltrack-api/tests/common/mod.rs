#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// Every [`TestContext`] owns a fresh in-memory keyspace and a temporary
/// upload directory, so tests run in parallel without a database.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use goaltrack_api::app::{build_router, AppState};
use goaltrack_api::config::{
    ApiConfig, AuthConfig, Config, JwtConfig, StoreBackend, StoreConfig, UploadConfig,
};
use goaltrack_shared::auth::password::PasswordParams;
use goaltrack_shared::store::Store;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Secret#123";

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-characters-long";

/// Argon2id parameters small enough for fast tests
pub const CHEAP_PARAMS: PasswordParams = PasswordParams {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

pub fn test_config(upload_dir: PathBuf) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 1,
            call_timeout_ms: 5000,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_ttl_hours: 168,
            refresh_ttl_days: 30,
        },
        auth: AuthConfig {
            password: CHEAP_PARAMS,
            expose_one_time_tokens: true,
        },
        uploads: UploadConfig {
            dir: upload_dir,
            max_bytes: 64 * 1024,
            public_path: "/uploads".to_string(),
        },
    }
}

/// Parsed response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pairs from every `Set-Cookie` header
    pub fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(|pair| pair.trim().to_string())
            .collect()
    }

    /// Value of the named cookie, if set
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().into_iter().find_map(|pair| {
            pair.strip_prefix(&format!("{}=", name))
                .map(str::to_string)
        })
    }
}

/// A logged-in user
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    /// Ready-to-send `Cookie` header
    pub cookie: String,
}

pub struct TestContext {
    pub store: Store,
    pub config: Config,
    pub app: axum::Router,
    pub upload_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let upload_dir = std::env::temp_dir().join(format!("goaltrack-test-{}", Uuid::new_v4()));
        let mut config = test_config(upload_dir.clone());
        adjust(&mut config);

        let store = Store::in_memory();
        let app = build_router(AppState::new(store.clone(), config.clone()));

        Self {
            store,
            config,
            app,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// JSON request, optionally with a `Cookie` header
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.request(Method::PUT, uri, Some(body), cookie).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, None, cookie).await
    }

    /// Registers an account and returns the response
    pub async fn register(&self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post(
            "/api/users/create",
            json!({ "username": username, "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Registers, verifies and logs in a fresh user
    pub async fn signed_in_user(&self, username: &str) -> Session {
        let email = format!("{}@example.com", username);

        let created = self.register(username, &email, PASSWORD).await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        let token = created.body["data"]["verification_token"]
            .as_str()
            .expect("verification token exposed in tests")
            .to_string();

        let verified = self
            .post("/api/users/verify-email", json!({ "token": token }), None)
            .await;
        assert_eq!(verified.status, StatusCode::OK, "{}", verified.body);

        self.login(&email, PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let response = self
            .post(
                "/api/users/login",
                json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        let data = &response.body["data"];
        Session {
            user_id: data["user_id"].as_str().unwrap().parse().unwrap(),
            email: data["email"].as_str().unwrap().to_string(),
            username: data["username"].as_str().unwrap().to_string(),
            cookie: response.cookies().join("; "),
        }
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.upload_dir).ok();
    }
}
