#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use staffroster::{
    auth::password::hash_password,
    build_app,
    config::AppConfig,
    users::{
        memory::MemoryUserRepo,
        repo::UserRepo,
        repo_types::{NewUser, Position, User},
    },
    AppState,
};
use time::macros::datetime;
use tower::ServiceExt;

pub const FIXTURE_PASSWORD: &str = "FixturePass2024";

/// Seeded store: two projects with users, one empty project, one user without a project.
pub struct Fixture {
    pub repo: Arc<MemoryUserRepo>,
    pub app: Router,
}

fn fixture_user(
    username: &str,
    first_name: &str,
    last_name: &str,
    position: Position,
    phone: Option<&str>,
    password_hash: &str,
    project_id: Option<i64>,
) -> NewUser {
    NewUser {
        username: username.into(),
        first_name: first_name.into(),
        last_name: last_name.into(),
        email: format!("{username}@example.com"),
        position,
        phone: phone.map(Into::into),
        password_hash: password_hash.into(),
        project_id,
    }
}

pub async fn seeded() -> Fixture {
    let repo = Arc::new(MemoryUserRepo::new());
    let apollo = repo.add_project("Apollo").await;
    let gemini = repo.add_project("Gemini").await;
    repo.add_project("Mercury").await;

    let hash = hash_password(FIXTURE_PASSWORD).expect("hash fixture password");
    let users = [
        fixture_user("alexsmith", "Alex", "Smith", Position::Programmer, Some("+15550100"), &hash, Some(apollo.id)),
        fixture_user("jdoe", "John", "Doe", Position::Manager, None, &hash, Some(gemini.id)),
        fixture_user("mpetrova", "Maria", "Petrova", Position::Designer, Some("+15550102"), &hash, Some(apollo.id)),
        fixture_user("kwong", "Kim", "Wong", Position::Tester, None, &hash, None),
    ];
    for user in users {
        repo.create(user).await.expect("seed user");
    }
    repo.touch_last_login(3, datetime!(2023-05-14 09:41:07.5 UTC))
        .await
        .expect("seed last_login");

    let state = AppState::from_parts(repo.clone(), Arc::new(AppConfig::for_tests()));
    Fixture {
        repo,
        app: build_app(state),
    }
}

/// Fixture with nothing in the store.
pub fn empty() -> Fixture {
    let repo = Arc::new(MemoryUserRepo::new());
    let state = AppState::from_parts(repo.clone(), Arc::new(AppConfig::for_tests()));
    Fixture {
        repo,
        app: build_app(state),
    }
}

impl Fixture {
    pub async fn all_users(&self) -> Vec<User> {
        self.repo.list(None).await.expect("list users")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("build request");
        send(&self.app, req).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("build request");
        send(&self.app, req).await
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("router is infallible");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
