pub mod auth;
pub mod comments;
pub mod contributors;
pub mod health;
pub mod issues;
pub mod projects;
pub mod users;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::comment::DbComment;
use crate::models::contributor::ContributorRef;
use crate::models::issue::{DbIssue, Issue};
use crate::models::project::{ContributorBrief, DbProject, Project};
use crate::utils::utc_now;

pub(crate) async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Project> {
    let row = sqlx::query_as::<_, DbProject>(
        "SELECT id, author_id, name, description, project_type, created_time FROM projects WHERE id = ?",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))?;

    row.try_into()
}

/// Issue lookup scoped to its parent project; an issue id under the wrong
/// project path is treated as absent.
pub(crate) async fn fetch_issue(pool: &SqlitePool, project_id: Uuid, issue_id: Uuid) -> AppResult<Issue> {
    let row = sqlx::query_as::<_, DbIssue>(
        "SELECT id, author_id, assign_to, project_id, title, description, status, priority, tag, created_time \
         FROM issues WHERE id = ? AND project_id = ?",
    )
    .bind(issue_id)
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("issue not found"))?;

    row.try_into()
}

pub(crate) async fn fetch_comment(pool: &SqlitePool, issue_id: Uuid, comment_id: Uuid) -> AppResult<DbComment> {
    sqlx::query_as::<_, DbComment>(
        "SELECT id, uid, author_id, issue_id, description, created_time FROM comments WHERE id = ? AND issue_id = ?",
    )
    .bind(comment_id)
    .bind(issue_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("comment not found"))
}

/// Resolve a user reference: exact username (unique by schema) or user id.
pub(crate) async fn resolve_user_ref(pool: &SqlitePool, reference: &ContributorRef) -> AppResult<ContributorBrief> {
    let row = match reference {
        ContributorRef::Id(id) => {
            sqlx::query_as::<_, ContributorBrief>("SELECT id, username FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        ContributorRef::Username(name) => {
            sqlx::query_as::<_, ContributorBrief>("SELECT id, username FROM users WHERE username = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?
        }
    };

    row.ok_or_else(|| match reference {
        ContributorRef::Id(id) => AppError::referenced_entity_not_found(format!("no user with id {id}")),
        ContributorRef::Username(name) => {
            AppError::referenced_entity_not_found(format!("no user with username {name:?}"))
        }
    })
}

/// Transactional get-or-create; returns the number of rows inserted (0 when
/// the contributor already existed).
pub(crate) async fn upsert_contributor<'e, E>(executor: E, user_id: Uuid, project_id: Uuid) -> AppResult<u64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO contributors (id, user_id, project_id, created_time) VALUES (?, ?, ?, ?) \
         ON CONFLICT(user_id, project_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(project_id)
    .bind(utc_now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn project_contributors(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<ContributorBrief>> {
    let rows = sqlx::query_as::<_, ContributorBrief>(
        "SELECT u.id, u.username FROM contributors c JOIN users u ON u.id = c.user_id \
         WHERE c.project_id = ? ORDER BY u.username",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Resolve an assignee reference and require project membership; failures
/// enumerate the valid contributor choices for the project.
pub(crate) async fn resolve_assignee(
    pool: &SqlitePool,
    project_id: Uuid,
    reference: &ContributorRef,
) -> AppResult<Uuid> {
    let user = match resolve_user_ref(pool, reference).await {
        Ok(user) => user,
        Err(AppError::ReferencedEntityNotFound(message)) => {
            return Err(AppError::referenced_entity_not_found(format!(
                "{message}; valid contributors: {}",
                contributor_choice_listing(pool, project_id).await?
            )));
        }
        Err(err) => return Err(err),
    };

    let is_member: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM contributors WHERE user_id = ? AND project_id = ?")
            .bind(user.id)
            .bind(project_id)
            .fetch_one(pool)
            .await?;

    if is_member == 0 {
        return Err(AppError::referenced_entity_not_found(format!(
            "user {:?} is not a contributor of this project; valid contributors: {}",
            user.username,
            contributor_choice_listing(pool, project_id).await?
        )));
    }

    Ok(user.id)
}

/// "username (id)" pairs for error messages that enumerate valid assignees.
async fn contributor_choice_listing(pool: &SqlitePool, project_id: Uuid) -> AppResult<String> {
    let contributors = project_contributors(pool, project_id).await?;
    Ok(contributors
        .iter()
        .map(|c| format!("{} ({})", c.username, c.id))
        .collect::<Vec<_>>()
        .join(", "))
}
