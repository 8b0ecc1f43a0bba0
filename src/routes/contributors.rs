use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::policies::{self, Action};
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::contributor::{ContributorCreateRequest, ContributorDetail};

use super::projects::project_access;
use super::{fetch_project, resolve_user_ref, upsert_contributor};

#[utoipa::path(
    get,
    path = "/projects/{project_id}/contributors",
    tag = "Contributors",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "List contributors", body = [ContributorDetail]))
)]
pub async fn list_contributors(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ContributorDetail>>> {
    let principal = Principal::from(auth);
    policies::contributor::can_perform(Action::List, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, project_id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::contributor::can_perform_on(Action::List, &principal, &access).require(&principal)?;

    let rows = sqlx::query_as::<_, ContributorDetail>(
        "SELECT c.id, c.user_id, u.username, c.project_id, c.created_time \
         FROM contributors c JOIN users u ON u.id = c.user_id \
         WHERE c.project_id = ? ORDER BY c.created_time",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/contributors",
    tag = "Contributors",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = ContributorCreateRequest,
    responses(
        (status = 201, description = "Contributor enrolled", body = ContributorDetail),
        (status = 200, description = "Already a contributor (idempotent)", body = ContributorDetail)
    )
)]
pub async fn create_contributor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<ContributorCreateRequest>,
) -> AppResult<(StatusCode, Json<ContributorDetail>)> {
    let principal = Principal::from(auth);
    policies::contributor::can_perform(Action::Create, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, project_id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::contributor::can_perform_on(Action::Create, &principal, &access).require(&principal)?;

    let user = resolve_user_ref(&state.pool, &payload.user).await?;
    let inserted = upsert_contributor(&state.pool, user.id, project_id).await?;

    let row = fetch_contributor_by_user(&state.pool, project_id, user.id).await?;
    let status = if inserted > 0 { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(row)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/contributors/{id}",
    tag = "Contributors",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Contributor row id")
    ),
    responses((status = 200, description = "Contributor detail", body = ContributorDetail))
)]
pub async fn get_contributor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ContributorDetail>> {
    let principal = Principal::from(auth);
    policies::contributor::can_perform(Action::Retrieve, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, project_id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::contributor::can_perform_on(Action::Retrieve, &principal, &access).require(&principal)?;

    let row = sqlx::query_as::<_, ContributorDetail>(
        "SELECT c.id, c.user_id, u.username, c.project_id, c.created_time \
         FROM contributors c JOIN users u ON u.id = c.user_id \
         WHERE c.id = ? AND c.project_id = ?",
    )
    .bind(id)
    .bind(project_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("contributor not found"))?;

    Ok(Json(row))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/contributors/{id}",
    tag = "Contributors",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Contributor row id")
    ),
    responses((status = 204, description = "Contributor removed"))
)]
pub async fn delete_contributor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let principal = Principal::from(auth);
    policies::contributor::can_perform(Action::Destroy, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, project_id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::contributor::can_perform_on(Action::Destroy, &principal, &access).require(&principal)?;

    let affected = sqlx::query("DELETE FROM contributors WHERE id = ? AND project_id = ?")
        .bind(id)
        .bind(project_id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("contributor not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_contributor_by_user(
    pool: &SqlitePool,
    project_id: Uuid,
    user_id: Uuid,
) -> AppResult<ContributorDetail> {
    sqlx::query_as::<_, ContributorDetail>(
        "SELECT c.id, c.user_id, u.username, c.project_id, c.created_time \
         FROM contributors c JOIN users u ON u.id = c.user_id \
         WHERE c.project_id = ? AND c.user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("contributor not found"))
}
