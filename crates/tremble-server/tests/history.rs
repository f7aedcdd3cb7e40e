//! Integration tests for the history page and health check.

mod common;

use axum::http::StatusCode;
use common::{assert_status, body_json, body_text, get, merge_payload, post_json, FixtureRepo, TestServer};

#[tokio::test]
async fn history_page_lists_runs_in_log_order() {
    let repo = FixtureRepo::new();
    let failing = TestServer::new("echo failure reason; exit 1", Some("Configured page title"));

    let response = post_json(
        failing.app(),
        "/trigger/gitlab",
        &merge_payload(&repo.url(), "master"),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    // Same data dir, passing command.
    let passing = tremble_server::AppState::new(tremble_server::Config {
        page_title: Some("Configured page title".to_string()),
        ..tremble_server::Config::new(failing.data_dir.path(), "exit 0")
    });
    let response = post_json(
        tremble_server::create_router(passing),
        "/trigger/gitlab",
        &merge_payload(&repo.url(), "master"),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let response = get(failing.app(), "/").await;
    assert_status(&response, StatusCode::OK);
    let html = body_text(response).await;

    let failure = html.find("[FAILURE]").expect("failure entry");
    let success = html.find("[SUCCESS]").expect("success entry");
    assert!(failure < success);
    assert!(html.contains("failure reason"));
    assert!(html.contains("Configured page title"));
}

#[tokio::test]
async fn empty_history_uses_default_title() {
    let server = TestServer::new("exit 0", None);

    let response = get(server.app(), "/").await;
    assert_status(&response, StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains(&format!("Tremble v{}", env!("CARGO_PKG_VERSION"))));
    assert!(html.contains("No runs yet"));
}

#[tokio::test]
async fn health_check_returns_ok() {
    let server = TestServer::new("exit 0", None);

    let response = get(server.app(), "/health").await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
