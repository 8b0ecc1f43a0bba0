use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use softdesk::create_app;

async fn setup(db_name: &str) -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join(db_name);
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((app, pool, dir))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn register(app: &Router, username: &str) -> Result<String> {
    let (status, value) = send(
        app,
        "POST",
        "/users",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
            "age": 30,
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} - {value}");
    Ok(value["token"].as_str().context("missing token")?.to_string())
}

/// alice's project with bob enrolled, plus one issue authored by alice.
/// Returns the comments collection uri.
async fn issue_fixture(app: &Router, alice: &str) -> Result<String> {
    let (status, value) = send(
        app,
        "POST",
        "/projects",
        Some(alice),
        Some(json!({"name": "Alpha", "description": "x", "type": "Back-end"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create project failed: {status} - {value}");
    let project_id = value["id"].as_str().context("missing project id")?.to_string();

    let (status, value) = send(
        app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::OK, "enrolling bob failed: {status} - {value}");

    let (status, value) = send(
        app,
        "POST",
        &format!("/projects/{project_id}/issues"),
        Some(alice),
        Some(json!({"title": "Crash on save", "description": "x", "priority": "High", "tag": "Bug"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create issue failed: {status} - {value}");
    let issue_id = value["id"].as_str().context("missing issue id")?;

    Ok(format!("/projects/{project_id}/issues/{issue_id}/comments"))
}

#[tokio::test]
async fn only_contributors_may_comment() -> Result<()> {
    let (app, _pool, _dir) = setup("comment_create.db").await?;
    let alice = register(&app, "alice").await?;
    let bob = register(&app, "bob").await?;
    let carol = register(&app, "carol").await?;
    let comments_uri = issue_fixture(&app, &alice).await?;

    let (status, comment) = send(
        &app,
        "POST",
        &comments_uri,
        Some(&bob),
        Some(json!({"description": "I can reproduce this"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "comment create failed: {comment}");
    assert_eq!(comment["description"], "I can reproduce this");
    // The opaque uid is a detail-only field.
    assert!(comment.get("uid").is_none());

    let (status, _) = send(
        &app,
        "POST",
        &comments_uri,
        Some(&carol),
        Some(json!({"description": "drive-by"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &comments_uri, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, list) = send(&app, "GET", &comments_uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn comment_detail_includes_uid_and_issue_title() -> Result<()> {
    let (app, _pool, _dir) = setup("comment_detail.db").await?;
    let alice = register(&app, "alice").await?;
    let _bob = register(&app, "bob").await?;
    let comments_uri = issue_fixture(&app, &alice).await?;

    let (status, comment) = send(
        &app,
        "POST",
        &comments_uri,
        Some(&alice),
        Some(json!({"description": "first"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().context("missing comment id")?;

    let (status, detail) = send(&app, "GET", &format!("{comments_uri}/{comment_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["uid"].is_string(), "detail must expose the opaque uid: {detail}");
    assert_eq!(detail["issue_title"], "Crash on save");

    Ok(())
}

#[tokio::test]
async fn comments_are_mutable_by_their_author_alone() -> Result<()> {
    let (app, pool, _dir) = setup("comment_author.db").await?;
    let alice = register(&app, "alice").await?;
    let bob = register(&app, "bob").await?;
    let comments_uri = issue_fixture(&app, &alice).await?;

    let (status, comment) = send(
        &app,
        "POST",
        &comments_uri,
        Some(&bob),
        Some(json!({"description": "original"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let comment_uri = format!("{comments_uri}/{}", comment["id"].as_str().context("missing id")?);

    // The project author is not the comment author.
    let (status, _) = send(&app, "PATCH", &comment_uri, Some(&alice), Some(json!({"description": "edited"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &comment_uri, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Staff gets no override on comment mutation, only on reads.
    let carol = register(&app, "carol").await?;
    sqlx::query("UPDATE users SET is_staff = 1 WHERE username = 'carol'")
        .execute(&pool)
        .await?;
    let (status, _) = send(&app, "GET", &comment_uri, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "PATCH", &comment_uri, Some(&carol), Some(json!({"description": "edited"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &comment_uri, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The author edits the description and nothing else.
    let (status, value) = send(&app, "PATCH", &comment_uri, Some(&bob), Some(json!({"description": "edited"}))).await?;
    assert_eq!(status, StatusCode::OK, "author edit failed: {value}");
    assert_eq!(value["description"], "edited");

    let (status, _) = send(&app, "DELETE", &comment_uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &comment_uri, Some(&bob), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
