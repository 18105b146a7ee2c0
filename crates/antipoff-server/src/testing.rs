//! Router-level test harness: an in-memory app, a request helper and a
//! login shortcut.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use antipoff_shared::constants::ADMIN_ROLE_ID;
use antipoff_store::{Filter, Repository, User};

use crate::api::{build_router, AppState};
use crate::config::{DatabaseLocation, ServerConfig};
use crate::db::DbPool;
use crate::pipeline::tests::FakeOracle;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub oracle: Arc<FakeOracle>,
}

impl TestApp {
    /// App whose oracle always answers `verdict`.
    pub fn new(verdict: bool) -> Self {
        Self::with(ServerConfig::default(), FakeOracle::answering(verdict))
    }

    pub fn with(config: ServerConfig, oracle: Arc<FakeOracle>) -> Self {
        let db = DbPool::open(&DatabaseLocation::Memory).unwrap();
        let state = AppState::new(config, db, oracle.clone()).unwrap();
        Self {
            router: build_router(state.clone()),
            state,
            oracle,
        }
    }

    /// Register a user (optionally promoted to admin), log in and return the
    /// `Cookie` header value carrying the session.
    pub async fn login_as(&self, username: &str, email: &str, admin: bool) -> String {
        let register = serde_json::json!({
            "username": username,
            "first_name": "Test",
            "last_name": "User",
            "email": email,
            "password": "password1",
            "confirm_password": "password1",
        });
        let response = send(&self.router, "POST", "/register/", None, Some(register)).await;
        assert!(response.status().is_success(), "register failed: {}", response.status());

        if admin {
            let email = email.to_string();
            self.state
                .db
                .transaction(move |conn| {
                    Repository::<User>::update(
                        conn,
                        &Filter::new().eq("email", email),
                        &[("role_id", ADMIN_ROLE_ID.into())],
                    )
                })
                .await
                .unwrap();
        }

        let login = serde_json::json!({ "email": email, "password": "password1" });
        let response = send(&self.router, "POST", "/login/", None, Some(login)).await;
        assert!(response.status().is_success(), "login failed: {}", response.status());
        cookie_header(&response)
    }
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    cookies: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collapse a response's `Set-Cookie` headers into a request `Cookie` header.
pub fn cookie_header(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}
