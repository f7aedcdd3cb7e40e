//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use tremble_server::{create_router, AppState, Config};

/// A local repository with `master` and `remote_test` branches.
pub struct FixtureRepo {
    dir: TempDir,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();

        git(repo, &["init", "--quiet"]);
        git(repo, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        std::fs::write(repo.join("README"), "fixture\n").unwrap();
        git(repo, &["add", "README"]);
        git(repo, &["commit", "--quiet", "-m", "initial"]);
        git(repo, &["branch", "remote_test"]);

        Self { dir }
    }

    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Tremble Tests",
            "-c",
            "user.email=tests@tremble.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(repo)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Server state rooted in a fresh data directory.
pub struct TestServer {
    pub data_dir: TempDir,
    pub state: Arc<AppState>,
}

impl TestServer {
    pub fn new(command: &str, page_title: Option<&str>) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let config = Config {
            page_title: page_title.map(str::to_string),
            ..Config::new(data_dir.path(), command)
        };
        Self {
            state: AppState::new(config),
            data_dir,
        }
    }

    pub fn app(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn log_lines(&self, name: &str) -> Vec<Value> {
        let path = self.data_dir.path().join(name);
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// True if no run left a workspace behind.
    pub fn workspaces_empty(&self) -> bool {
        match std::fs::read_dir(self.data_dir.path().join("tmp")) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

pub fn push_payload(repository: &str, branch: &str) -> Value {
    json!({
        "object_kind": "push",
        "ref": format!("refs/heads/{branch}"),
        "after": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
        "project": { "git_http_url": repository },
        "commits": [{
            "id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
            "message": "fixed readme",
            "url": "http://example.com/mike/diaspora/commit/da156088",
            "author": { "name": "GitLab dev user", "email": "gitlabdev@example.com" }
        }]
    })
}

pub fn merge_payload(repository: &str, branch: &str) -> Value {
    json!({
        "object_kind": "merge_request",
        "object_attributes": {
            "id": 99,
            "source_branch": branch,
            "source": { "git_http_url": repository },
            "last_commit": {
                "id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
                "message": "fixed readme",
                "url": "http://example.com/awesome_space/awesome_project/commits/da156088",
                "author": { "name": "GitLab dev user", "email": "gitlabdev@example.com" }
            }
        }
    })
}

pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub fn assert_status(response: &Response, status: StatusCode) {
    assert_eq!(response.status(), status);
}
