use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::policies::{self, Action};
use crate::authz::{CommentAccess, MembershipIndex, Principal, SqlMembershipIndex};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::comment::{
    Comment, CommentCreateRequest, CommentDetail, CommentUpdateRequest, DbComment,
};
use crate::utils::utc_now;

use super::{fetch_comment, fetch_issue};

#[utoipa::path(
    get,
    path = "/projects/{project_id}/issues/{issue_id}/comments",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id")
    ),
    responses((status = 200, description = "List comments", body = [Comment]))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<Comment>>> {
    let principal = Principal::from(auth);
    policies::comment::can_perform(Action::List, &principal).require(&principal)?;

    // Fail closed on the path context: the issue must exist under the
    // project before anything is listed.
    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;

    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, issue.project_id).await?;
    let access = CommentAccess { author_id: issue.author_id, is_contributor };
    policies::comment::can_perform_on(Action::List, &principal, &access, &[]).require(&principal)?;

    let rows = sqlx::query_as::<_, DbComment>(
        "SELECT id, uid, author_id, issue_id, description, created_time FROM comments \
         WHERE issue_id = ? ORDER BY created_time",
    )
    .bind(issue_id)
    .fetch_all(&state.pool)
    .await?;

    let comments = rows
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/issues/{issue_id}/comments",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id")
    ),
    request_body = CommentCreateRequest,
    responses((status = 201, description = "Comment created", body = Comment))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let principal = Principal::from(auth);

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;

    // Membership in the grandparent project, through the path's issue.
    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, issue.project_id).await?;
    policies::comment::can_create(&principal, is_contributor).require(&principal)?;

    let now = utc_now();
    let comment_id = Uuid::new_v4();

    // Author and issue come from the actor and the path, never the payload.
    sqlx::query(
        "INSERT INTO comments (id, uid, author_id, issue_id, description, created_time) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(comment_id)
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(issue.id)
    .bind(&payload.description)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let comment: Comment = fetch_comment(&state.pool, issue.id, comment_id).await?.try_into()?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/issues/{issue_id}/comments/{id}",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    responses((status = 200, description = "Comment detail with issue title and opaque uid", body = CommentDetail))
)]
pub async fn get_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id, id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<CommentDetail>> {
    let principal = Principal::from(auth);
    policies::comment::can_perform(Action::Retrieve, &principal).require(&principal)?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    let comment = fetch_comment(&state.pool, issue.id, id).await?;

    let access = comment_access(&state, &auth, &comment, issue.project_id).await?;
    policies::comment::can_perform_on(Action::Retrieve, &principal, &access, &[]).require(&principal)?;

    Ok(Json(CommentDetail::new(comment, issue.title)))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/issues/{issue_id}/comments/{id}",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    request_body = CommentUpdateRequest,
    responses((status = 200, description = "Comment updated", body = Comment))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id, id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<CommentUpdateRequest>,
) -> AppResult<Json<Comment>> {
    apply_comment_update(Action::Update, &state, auth, project_id, issue_id, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/projects/{project_id}/issues/{issue_id}/comments/{id}",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    request_body = CommentUpdateRequest,
    responses((status = 200, description = "Comment updated", body = Comment))
)]
pub async fn partial_update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id, id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<CommentUpdateRequest>,
) -> AppResult<Json<Comment>> {
    apply_comment_update(Action::PartialUpdate, &state, auth, project_id, issue_id, id, payload).await
}

async fn apply_comment_update(
    action: Action,
    state: &AppState,
    auth: AuthUser,
    project_id: Uuid,
    issue_id: Uuid,
    id: Uuid,
    payload: CommentUpdateRequest,
) -> AppResult<Json<Comment>> {
    let principal = Principal::from(auth);
    policies::comment::can_perform(action, &principal).require(&principal)?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    let mut comment = fetch_comment(&state.pool, issue.id, id).await?;

    let access = comment_access(state, &auth, &comment, issue.project_id).await?;
    let fields = payload.changed_fields();
    policies::comment::can_perform_on(action, &principal, &access, &fields).require(&principal)?;

    if let Some(description) = payload.description {
        comment.description = description;
    }

    sqlx::query("UPDATE comments SET description = ? WHERE id = ?")
        .bind(&comment.description)
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(comment.try_into()?))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/issues/{issue_id}/comments/{id}",
    tag = "Comments",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("issue_id" = Uuid, Path, description = "Issue id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    responses((status = 204, description = "Comment deleted"))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, issue_id, id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let principal = Principal::from(auth);
    policies::comment::can_perform(Action::Destroy, &principal).require(&principal)?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    let comment = fetch_comment(&state.pool, issue.id, id).await?;

    let access = comment_access(&state, &auth, &comment, issue.project_id).await?;
    policies::comment::can_perform_on(Action::Destroy, &principal, &access, &[]).require(&principal)?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn comment_access(
    state: &AppState,
    auth: &AuthUser,
    comment: &DbComment,
    project_id: Uuid,
) -> AppResult<CommentAccess> {
    let index = SqlMembershipIndex::new(&state.pool);
    let is_contributor = index.is_contributor(auth.user_id, project_id).await?;

    Ok(CommentAccess {
        author_id: comment.author_id,
        is_contributor,
    })
}
