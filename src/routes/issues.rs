use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::policies::{self, Action};
use crate::authz::{IssueAccess, MembershipIndex, Principal, SqlMembershipIndex};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::issue::{
    DbIssue, Issue, IssueCreateRequest, IssueDetail, IssueStatus, IssueUpdateRequest,
};
use crate::utils::utc_now;

use super::projects::project_access;
use super::{fetch_issue, fetch_project, resolve_assignee};

#[utoipa::path(
    get,
    path = "/projects/{project_id}/issues",
    tag = "Issues",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "List issues", body = [Issue]))
)]
pub async fn list_issues(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<Issue>>> {
    let principal = Principal::from(auth);
    policies::issue::can_perform(Action::List, &principal).require(&principal)?;

    // Listing a project's issues is viewing the project.
    let project = fetch_project(&state.pool, project_id).await?;
    let access = project_access(&state, &auth, &project).await?;
    policies::project::can_perform_on(Action::Retrieve, &principal, &access, &[]).require(&principal)?;

    let rows = sqlx::query_as::<_, DbIssue>(
        "SELECT id, author_id, assign_to, project_id, title, description, status, priority, tag, created_time \
         FROM issues WHERE project_id = ? ORDER BY created_time DESC",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    let issues = rows
        .into_iter()
        .map(Issue::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(issues))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/issues",
    tag = "Issues",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = IssueCreateRequest,
    responses(
        (status = 201, description = "Issue created", body = Issue),
        (status = 400, description = "Assignee is not a contributor; message lists valid choices"),
        (status = 403, description = "Caller is not a contributor of the project")
    )
)]
pub async fn create_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<IssueCreateRequest>,
) -> AppResult<(StatusCode, Json<Issue>)> {
    let principal = Principal::from(auth);

    // Path context, fail closed: a missing parent project denies the create.
    let project = fetch_project(&state.pool, project_id).await?;

    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, project.id).await?;
    policies::issue::can_create(&principal, is_contributor).require(&principal)?;

    let assign_to = match payload.assign_to.as_ref() {
        Some(reference) => Some(resolve_assignee(&state.pool, project.id, reference).await?),
        None => None,
    };

    let now = utc_now();
    let issue_id = Uuid::new_v4();
    let status = payload.status.unwrap_or(IssueStatus::Todo);

    // Author and project come from the actor and the path, never the payload.
    sqlx::query(
        "INSERT INTO issues (id, author_id, assign_to, project_id, title, description, status, priority, tag, created_time) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(issue_id)
    .bind(auth.user_id)
    .bind(assign_to)
    .bind(project.id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(status.as_str())
    .bind(payload.priority.as_str())
    .bind(payload.tag.as_str())
    .bind(now)
    .execute(&state.pool)
    .await?;

    let issue = fetch_issue(&state.pool, project.id, issue_id).await?;

    Ok((StatusCode::CREATED, Json(issue)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/issues/{id}",
    tag = "Issues",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Issue id")
    ),
    responses((status = 200, description = "Issue detail with project name", body = IssueDetail))
)]
pub async fn get_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<IssueDetail>> {
    let principal = Principal::from(auth);
    policies::issue::can_perform(Action::Retrieve, &principal).require(&principal)?;

    let project = fetch_project(&state.pool, project_id).await?;
    let issue = fetch_issue(&state.pool, project_id, id).await?;

    let access = issue_access(&state, &auth, &issue).await?;
    policies::issue::can_perform_on(Action::Retrieve, &principal, &access, &[]).require(&principal)?;

    Ok(Json(IssueDetail::new(issue, project.name)))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/issues/{id}",
    tag = "Issues",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Issue id")
    ),
    request_body = IssueUpdateRequest,
    responses((status = 200, description = "Issue updated", body = Issue))
)]
pub async fn update_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<IssueUpdateRequest>,
) -> AppResult<Json<Issue>> {
    apply_issue_update(Action::Update, &state, auth, project_id, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/projects/{project_id}/issues/{id}",
    tag = "Issues",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Issue id")
    ),
    request_body = IssueUpdateRequest,
    responses((status = 200, description = "Issue updated", body = Issue))
)]
pub async fn partial_update_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<IssueUpdateRequest>,
) -> AppResult<Json<Issue>> {
    apply_issue_update(Action::PartialUpdate, &state, auth, project_id, id, payload).await
}

async fn apply_issue_update(
    action: Action,
    state: &AppState,
    auth: AuthUser,
    project_id: Uuid,
    id: Uuid,
    payload: IssueUpdateRequest,
) -> AppResult<Json<Issue>> {
    let principal = Principal::from(auth);
    policies::issue::can_perform(action, &principal).require(&principal)?;

    let mut issue = fetch_issue(&state.pool, project_id, id).await?;
    let access = issue_access(state, &auth, &issue).await?;

    let fields = payload.changed_fields();
    policies::issue::can_perform_on(action, &principal, &access, &fields).require(&principal)?;

    if let Some(reference) = payload.assign_to.as_ref() {
        issue.assign_to = Some(resolve_assignee(&state.pool, project_id, reference).await?);
    }
    if let Some(title) = payload.title {
        issue.title = title;
    }
    if let Some(description) = payload.description {
        issue.description = description;
    }
    if let Some(status) = payload.status {
        issue.status = status;
    }
    if let Some(priority) = payload.priority {
        issue.priority = priority;
    }
    if let Some(tag) = payload.tag {
        issue.tag = tag;
    }

    sqlx::query(
        "UPDATE issues SET assign_to = ?, title = ?, description = ?, status = ?, priority = ?, tag = ? WHERE id = ?",
    )
    .bind(issue.assign_to)
    .bind(&issue.title)
    .bind(&issue.description)
    .bind(issue.status.as_str())
    .bind(issue.priority.as_str())
    .bind(issue.tag.as_str())
    .bind(issue.id)
    .execute(&state.pool)
    .await?;

    Ok(Json(issue))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/issues/{id}",
    tag = "Issues",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Issue id")
    ),
    responses((status = 204, description = "Issue deleted (cascades to comments)"))
)]
pub async fn delete_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let principal = Principal::from(auth);
    policies::issue::can_perform(Action::Destroy, &principal).require(&principal)?;

    let issue = fetch_issue(&state.pool, project_id, id).await?;
    let access = issue_access(&state, &auth, &issue).await?;
    policies::issue::can_perform_on(Action::Destroy, &principal, &access, &[]).require(&principal)?;

    sqlx::query("DELETE FROM issues WHERE id = ?")
        .bind(issue.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn issue_access(state: &AppState, auth: &AuthUser, issue: &Issue) -> AppResult<IssueAccess> {
    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, issue.project_id).await?;

    Ok(IssueAccess {
        author_id: issue.author_id,
        assign_to: issue.assign_to,
        is_contributor,
    })
}
