use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use ledgerdesk_backend::models::user::UserRole;
use serde_json::json;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

mod support;

use support::{authed, body_bytes, body_json, create_test_token, TestApp};

fn admin_app() -> (TestApp, String) {
    let app = TestApp::new();
    let admin = app.seed_user("admin", UserRole::Admin);
    let token = create_test_token(&admin);
    (app, token)
}

#[tokio::test]
async fn backup_routes_require_a_token() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/backups")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn backup_routes_reject_garbage_tokens() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(authed("GET", "/api/backups", "not-a-jwt", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_users_are_forbidden() {
    let app = TestApp::new();
    let staff = app.seed_user("clerk", UserRole::Staff);
    let token = create_test_token(&staff);

    let response = app
        .router()
        .oneshot(authed("POST", "/api/backups", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");
    assert_eq!(app.dumper.dump_calls(), 0);
}

#[tokio::test]
async fn create_then_list_returns_the_new_backup() {
    let (app, token) = admin_app();
    let router = app.router();

    let response = router
        .clone()
        .oneshot(authed(
            "POST",
            "/api/backups",
            &token,
            Some(json!({ "description": "before month-end close" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["type"], "manual");
    assert_eq!(created["description"], "before month-end close");

    let response = router
        .oneshot(authed("GET", "/api/backups", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let backups = listed["backups"].as_array().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0]["filename"], created["filename"]);
    assert!(backups[0]["actual_size"].as_u64().unwrap() > 0);
    assert!(backups[0]["size"].is_string());
}

#[tokio::test]
async fn create_without_body_uses_default_description() {
    let (app, token) = admin_app();
    let response = app
        .router()
        .oneshot(authed("POST", "/api/backups", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["description"], "Manual backup");
}

#[tokio::test]
async fn dump_failure_maps_to_backup_failed() {
    let (app, token) = admin_app();
    app.dumper.fail_dump.store(true, Ordering::SeqCst);

    let response = app
        .router()
        .oneshot(authed("POST", "/api/backups", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BACKUP_FAILED");
}

#[tokio::test]
async fn download_streams_the_dump_as_attachment() {
    let (app, token) = admin_app();
    let record = app.state.backups.create_backup(None).await.unwrap();

    let response = app
        .router()
        .oneshot(authed(
            "GET",
            &format!("/api/backups/{}/download", record.filename),
            &token,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(&record.filename));

    let bytes = body_bytes(response).await;
    let on_disk = std::fs::read(app.dir.path().join(&record.filename)).unwrap();
    assert_eq!(bytes, on_disk);
}

#[tokio::test]
async fn download_of_unknown_backup_is_not_found() {
    let (app, token) = admin_app();
    let response = app
        .router()
        .oneshot(authed(
            "GET",
            "/api/backups/backup_20240101T000000000Z_manual_00000000.sql/download",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn invalid_filenames_are_rejected() {
    let (app, token) = admin_app();
    let response = app
        .router()
        .oneshot(authed("DELETE", "/api/backups/..passwd", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_FILENAME");
}

#[tokio::test]
async fn foreign_filenames_are_not_found() {
    let (app, token) = admin_app();
    let router = app.router();
    for (method, uri) in [
        ("DELETE", "/api/backups/nightly.sql"),
        ("GET", "/api/backups/nightly.sql/download"),
    ] {
        let response = router
            .clone()
            .oneshot(authed(method, uri, &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn delete_returns_no_content_then_not_found() {
    let (app, token) = admin_app();
    let record = app.state.backups.create_backup(None).await.unwrap();
    let uri = format!("/api/backups/{}", record.filename);
    let router = app.router();

    let response = router
        .clone()
        .oneshot(authed("DELETE", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(authed("DELETE", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restore_requires_confirmation() {
    let (app, token) = admin_app();
    let record = app.state.backups.create_backup(None).await.unwrap();
    let dumps_before = app.dumper.dump_calls();
    let uri = format!("/api/backups/{}/restore", record.filename);

    for body in [None, Some(json!({})), Some(json!({ "confirmRestore": false }))] {
        let response = app
            .router()
            .oneshot(authed("POST", &uri, &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "CONFIRMATION_REQUIRED");
    }

    assert_eq!(app.dumper.dump_calls(), dumps_before);
    assert!(app.dumper.restore_calls().is_empty());
}

#[tokio::test]
async fn confirmed_restore_reports_safety_backup() {
    let (app, token) = admin_app();
    let record = app.state.backups.create_backup(None).await.unwrap();

    let response = app
        .router()
        .oneshot(authed(
            "POST",
            &format!("/api/backups/{}/restore", record.filename),
            &token,
            Some(json!({ "confirmRestore": true })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["restored_from"], record.filename.as_str());
    assert_eq!(json["restart_required"], true);
    assert_eq!(json["pre_restore_backup"]["type"], "pre-restore");
}

#[tokio::test]
async fn failed_restore_names_the_pre_restore_backup() {
    let (app, token) = admin_app();
    let record = app.state.backups.create_backup(None).await.unwrap();
    app.dumper.fail_restore.store(true, Ordering::SeqCst);

    let response = app
        .router()
        .oneshot(authed(
            "POST",
            &format!("/api/backups/{}/restore", record.filename),
            &token,
            Some(json!({ "confirmRestore": true })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PARTIAL_RESTORE_FAILURE");
    let safety = json["details"]["pre_restore_backup"].as_str().unwrap();
    assert!(app.dir.path().join(safety).exists());
}

#[tokio::test]
async fn auto_status_reports_configuration() {
    let (app, token) = admin_app();
    let response = app
        .router()
        .oneshot(authed("GET", "/api/backups/auto-status", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["enabled"], false);
    assert_eq!(json["retention_days"], 30);
    assert!(json["next_backup_at"].is_null());
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, token) = admin_app();
    let mut request = authed("GET", "/api/backups", &token, None);
    request
        .headers_mut()
        .insert("x-request-id", "req-123".parse().unwrap());

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}
