use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppError;

/// Membership index seam: "is user U a contributor of project P".
///
/// Kept as a trait so the engine's callers depend on the single query rather
/// than on ad-hoc relation traversal.
#[async_trait]
pub trait MembershipIndex: Send + Sync {
    async fn is_contributor(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError>;
}

/// Contributor-table lookup, covered by the (user_id, project_id) unique
/// index so it is a point read regardless of contributor-set size.
pub struct SqlMembershipIndex<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SqlMembershipIndex<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl<'a> MembershipIndex for SqlMembershipIndex<'a> {
    async fn is_contributor(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM contributors WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }
}
