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

async fn create_project(app: &Router, token: &str, name: &str) -> Result<(String, Value)> {
    let (status, value) = send(
        app,
        "POST",
        "/projects",
        Some(token),
        Some(json!({
            "name": name,
            "description": "a project",
            "type": "Back-end",
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create project failed: {status} - {value}");
    let id = value["id"].as_str().context("missing project id")?.to_string();
    Ok((id, value))
}

fn contributor_usernames(detail: &Value) -> Vec<String> {
    detail["contributors"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|c| c["username"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn project_author_is_enrolled_as_contributor() -> Result<()> {
    let (app, _pool, _dir) = setup("author_enroll.db").await?;
    let alice = register(&app, "alice").await?;

    let (project_id, detail) = create_project(&app, &alice, "Alpha").await?;
    assert_eq!(contributor_usernames(&detail), vec!["alice"]);
    assert_eq!(detail["type"], "Back-end");

    // The detail endpoint reports the same thing.
    let (status, detail) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contributor_usernames(&detail), vec!["alice"]);

    Ok(())
}

#[tokio::test]
async fn project_type_must_be_a_known_choice() -> Result<()> {
    let (app, _pool, _dir) = setup("bad_type.db").await?;
    let alice = register(&app, "alice").await?;

    let (status, _) = send(
        &app,
        "POST",
        "/projects",
        Some(&alice),
        Some(json!({"name": "Alpha", "description": "x", "type": "Middleware"})),
    )
    .await?;
    assert!(status.is_client_error(), "unknown project type must be rejected, got {status}");

    Ok(())
}

#[tokio::test]
async fn contributors_can_be_added_by_reference_and_adding_is_idempotent() -> Result<()> {
    let (app, _pool, _dir) = setup("add_contrib.db").await?;
    let alice = register(&app, "alice").await?;
    let _bob = register(&app, "bob").await?;

    let (project_id, _) = create_project(&app, &alice, "Alpha").await?;

    // Add by username through the update endpoint.
    let (status, detail) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "adding bob failed: {detail}");
    assert_eq!(contributor_usernames(&detail), vec!["alice", "bob"]);

    // Adding the same user again changes nothing.
    let (status, detail) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contributor_usernames(&detail), vec!["alice", "bob"]);

    // A reference to a user that does not exist is a bad request.
    let (status, value) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "nobody"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "referenced_entity_not_found");

    Ok(())
}

#[tokio::test]
async fn project_visibility_and_update_rights() -> Result<()> {
    let (app, pool, _dir) = setup("visibility.db").await?;
    let alice = register(&app, "alice").await?;
    let bob = register(&app, "bob").await?;
    let carol = register(&app, "carol").await?;

    let (project_id, _) = create_project(&app, &alice, "Alpha").await?;
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Contributor bob can read, outsider carol cannot.
    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&carol), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Listing only shows what the caller belongs to.
    let (status, list) = send(&app, "GET", "/projects", Some(&carol), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(0));

    // Contributor bob is not the author, so he cannot rename the project.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&bob),
        Some(json!({"name": "Hijacked"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The author can.
    let (status, detail) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"name": "Alpha 2", "description": "renamed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Alpha 2");

    // Staff carol can read and rename without being a contributor.
    sqlx::query("UPDATE users SET is_staff = 1 WHERE username = 'carol'")
        .execute(&pool)
        .await?;
    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&carol), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&carol),
        Some(json!({"name": "Alpha 3"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn delete_with_contributor_reference_removes_the_contributor_only() -> Result<()> {
    let (app, _pool, _dir) = setup("dual_delete.db").await?;
    let alice = register(&app, "alice").await?;
    let bob = register(&app, "bob").await?;

    let (project_id, _) = create_project(&app, &alice, "Alpha").await?;
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Non-author contributor cannot issue the destroy verb at all.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}"),
        Some(&bob),
        Some(json!({"contributors": "alice"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A body naming a contributor removes that contributor, not the project.
    let (status, detail) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "contributor removal failed: {detail}");
    assert_eq!(contributor_usernames(&detail), vec!["alice"]);

    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK);

    // A reference that matches nobody on the project is a bad request.
    let (status, value) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}"),
        Some(&alice),
        Some(json!({"contributors": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "referenced_entity_not_found");

    // An empty body destroys the project.
    let (status, _) = send(&app, "DELETE", &format!("/projects/{project_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&alice), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn contributor_subresource_follows_project_rules() -> Result<()> {
    let (app, _pool, _dir) = setup("contrib_routes.db").await?;
    let alice = register(&app, "alice").await?;
    let bob = register(&app, "bob").await?;

    let (project_id, _) = create_project(&app, &alice, "Alpha").await?;

    // Author adds bob through the sub-resource; repeating it is a no-op 200.
    let (status, value) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/contributors"),
        Some(&alice),
        Some(json!({"user": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "adding bob failed: {value}");
    let (status, _) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/contributors"),
        Some(&alice),
        Some(json!({"user": "bob"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Contributors can list, but only the author manages membership.
    let (status, list) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/contributors"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let rows = list.as_array().context("expected array")?;
    assert_eq!(rows.len(), 2);

    let bob_row_id = rows
        .iter()
        .find(|row| row["username"] == "bob")
        .and_then(|row| row["id"].as_str())
        .context("missing bob row")?
        .to_string();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}/contributors/{bob_row_id}"),
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/projects/{project_id}/contributors/{bob_row_id}"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, list) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/contributors"),
        Some(&alice),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    Ok(())
}
