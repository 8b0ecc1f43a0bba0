use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::policies::{self, Action};
use crate::authz::{MembershipIndex, Principal, ProjectAccess, SqlMembershipIndex};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::contributor::ContributorRef;
use crate::models::project::{
    DbProject, Project, ProjectCreateRequest, ProjectDestroyRequest, ProjectDetail,
    ProjectUpdateRequest,
};
use crate::utils::utc_now;

use super::{fetch_project, project_contributors, resolve_user_ref, upsert_contributor};

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let principal = Principal::from(auth);
    policies::project::can_perform(Action::List, &principal).require(&principal)?;

    // Visibility is contributor-gated; staff sees everything.
    let rows = if principal.is_staff() {
        sqlx::query_as::<_, DbProject>(
            "SELECT id, author_id, name, description, project_type, created_time FROM projects ORDER BY created_time DESC",
        )
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as::<_, DbProject>(
            "SELECT p.id, p.author_id, p.name, p.description, p.project_type, p.created_time \
             FROM projects p JOIN contributors c ON c.project_id = p.id \
             WHERE c.user_id = ? ORDER BY p.created_time DESC",
        )
        .bind(auth.user_id)
        .fetch_all(&state.pool)
        .await?
    };

    let projects = rows
        .into_iter()
        .map(Project::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses((status = 201, description = "Project created, author enrolled as contributor", body = ProjectDetail))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<ProjectDetail>)> {
    let principal = Principal::from(auth);
    policies::project::can_perform(Action::Create, &principal).require(&principal)?;

    let now = utc_now();
    let project_id = Uuid::new_v4();

    // Author enrollment happens in the same transaction as the insert so a
    // project can never exist without its author as contributor.
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, author_id, name, description, project_type, created_time) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(auth.user_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.project_type.as_str())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    upsert_contributor(&mut *tx, auth.user_id, project_id).await?;

    tx.commit().await?;

    let project = fetch_project(&state.pool, project_id).await?;
    let contributors = project_contributors(&state.pool, project_id).await?;

    Ok((StatusCode::CREATED, Json(ProjectDetail::new(project, contributors))))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project detail with contributor list", body = ProjectDetail))
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectDetail>> {
    let principal = Principal::from(auth);
    policies::project::can_perform(Action::Retrieve, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::project::can_perform_on(Action::Retrieve, &principal, &access, &[]).require(&principal)?;

    let contributors = project_contributors(&state.pool, id).await?;

    Ok(Json(ProjectDetail::new(project, contributors)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project updated", body = ProjectDetail))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<ProjectDetail>> {
    apply_project_update(Action::Update, &state, auth, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project updated", body = ProjectDetail))
)]
pub async fn partial_update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<ProjectDetail>> {
    apply_project_update(Action::PartialUpdate, &state, auth, id, payload).await
}

async fn apply_project_update(
    action: Action,
    state: &AppState,
    auth: AuthUser,
    id: Uuid,
    payload: ProjectUpdateRequest,
) -> AppResult<Json<ProjectDetail>> {
    let principal = Principal::from(auth);
    policies::project::can_perform(action, &principal).require(&principal)?;

    let mut project = fetch_project(&state.pool, id).await?;
    let access = project_access(state, &auth, &project).await?;

    let fields = payload.changed_fields();
    policies::project::can_perform_on(action, &principal, &access, &fields).require(&principal)?;

    // Resolve the referenced user before opening the transaction so a bad
    // reference leaves no partial state.
    let new_contributor = match payload.contributors.as_ref() {
        Some(reference) => Some(resolve_user_ref(&state.pool, reference).await?),
        None => None,
    };

    if let Some(name) = payload.name {
        project.name = name;
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    if let Some(project_type) = payload.project_type {
        project.project_type = project_type;
    }

    let mut tx = state.pool.begin().await?;

    if let Some(user) = &new_contributor {
        upsert_contributor(&mut *tx, user.id, project.id).await?;
    }

    sqlx::query("UPDATE projects SET name = ?, description = ?, project_type = ? WHERE id = ?")
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.project_type.as_str())
        .bind(project.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let contributors = project_contributors(&state.pool, project.id).await?;

    Ok(Json(ProjectDetail::new(project, contributors)))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectDestroyRequest,
    responses(
        (status = 204, description = "Project deleted (cascades to contributors, issues, comments)"),
        (status = 200, description = "Body carried a contributor reference: that contributor was removed instead", body = ProjectDetail)
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ProjectDestroyRequest>>,
) -> AppResult<Response> {
    let principal = Principal::from(auth);
    policies::project::can_perform(Action::Destroy, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::project::can_perform_on(Action::Destroy, &principal, &access, &[]).require(&principal)?;

    // Dual-purpose endpoint: a contributor reference in the body removes
    // that contributor and leaves the project standing.
    if let Some(reference) = payload.and_then(|Json(body)| body.contributors) {
        remove_contributor(&state, project.id, &reference).await?;
        let contributors = project_contributors(&state.pool, project.id).await?;
        return Ok((StatusCode::OK, Json(ProjectDetail::new(project, contributors))).into_response());
    }

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Resolve a contributor reference against this project's rows: contributor
/// row id, then user id, then username.
async fn remove_contributor(state: &AppState, project_id: Uuid, reference: &ContributorRef) -> AppResult<()> {
    let row_id: Option<Uuid> = match reference {
        ContributorRef::Id(id) => {
            sqlx::query_scalar(
                "SELECT id FROM contributors WHERE project_id = ? AND (id = ? OR user_id = ?)",
            )
            .bind(project_id)
            .bind(id)
            .bind(id)
            .fetch_optional(&state.pool)
            .await?
        }
        ContributorRef::Username(name) => {
            sqlx::query_scalar(
                "SELECT c.id FROM contributors c JOIN users u ON u.id = c.user_id \
                 WHERE c.project_id = ? AND u.username = ?",
            )
            .bind(project_id)
            .bind(name)
            .fetch_optional(&state.pool)
            .await?
        }
    };

    let row_id = row_id.ok_or_else(|| {
        AppError::referenced_entity_not_found("no matching contributor on this project")
    })?;

    sqlx::query("DELETE FROM contributors WHERE id = ?")
        .bind(row_id)
        .execute(&state.pool)
        .await?;

    Ok(())
}

pub(super) async fn project_access(
    state: &AppState,
    auth: &AuthUser,
    project: &Project,
) -> AppResult<ProjectAccess> {
    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, project.id).await?;

    Ok(ProjectAccess {
        author_id: project.author_id,
        is_contributor,
    })
}
