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

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    Ok(sqlx::query_scalar(sql).fetch_one(pool).await?)
}

/// alice's project carrying one issue and one comment.
async fn populated_project(app: &Router, alice: &str) -> Result<String> {
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
        "POST",
        &format!("/projects/{project_id}/issues"),
        Some(alice),
        Some(json!({"title": "T", "description": "x", "priority": "Low", "tag": "Task"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create issue failed: {status} - {value}");
    let issue_id = value["id"].as_str().context("missing issue id")?;

    let (status, value) = send(
        app,
        "POST",
        &format!("/projects/{project_id}/issues/{issue_id}/comments"),
        Some(alice),
        Some(json!({"description": "note"})),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create comment failed: {status} - {value}");

    Ok(project_id)
}

#[tokio::test]
async fn deleting_a_project_removes_its_subtree() -> Result<()> {
    let (app, pool, _dir) = setup("project_cascade.db").await?;
    let alice = register(&app, "alice").await?;
    let project_id = populated_project(&app, &alice).await?;

    assert_eq!(count(&pool, "SELECT COUNT(1) FROM issues").await?, 1);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM comments").await?, 1);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM contributors").await?, 1);

    let (status, _) = send(&app, "DELETE", &format!("/projects/{project_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(count(&pool, "SELECT COUNT(1) FROM projects").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM issues").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM comments").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM contributors").await?, 0);

    Ok(())
}

#[tokio::test]
async fn deleting_an_issue_removes_its_comments() -> Result<()> {
    let (app, pool, _dir) = setup("issue_cascade.db").await?;
    let alice = register(&app, "alice").await?;
    let project_id = populated_project(&app, &alice).await?;

    let issue_id: String = sqlx::query_scalar::<_, uuid::Uuid>("SELECT id FROM issues LIMIT 1")
        .fetch_one(&pool)
        .await?
        .to_string();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}/issues/{issue_id}"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(count(&pool, "SELECT COUNT(1) FROM comments").await?, 0);
    // The project itself is untouched.
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM projects").await?, 1);

    Ok(())
}

#[tokio::test]
async fn deleting_a_user_erases_their_footprint() -> Result<()> {
    let (app, pool, _dir) = setup("user_cascade.db").await?;
    let alice = register(&app, "alice").await?;
    let _project_id = populated_project(&app, &alice).await?;

    let alice_id: String = sqlx::query_scalar::<_, uuid::Uuid>("SELECT id FROM users WHERE username = 'alice'")
        .fetch_one(&pool)
        .await?
        .to_string();

    let (status, _) = send(&app, "DELETE", &format!("/users/{alice_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(count(&pool, "SELECT COUNT(1) FROM users").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM projects").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM issues").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM comments").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(1) FROM contributors").await?, 0);

    Ok(())
}
