use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Join row tying a user to a project. The (user, project) pair is unique;
/// re-adding an existing contributor is an idempotent no-op.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Contributor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub created_time: DateTime<Utc>,
}

/// Detail form carries the username for display.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ContributorDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub project_id: Uuid,
    pub created_time: DateTime<Utc>,
}

/// Reference to a user (or, where noted, a contributor row) supplied by a
/// client: either an id or an exact username.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ContributorRef {
    Id(Uuid),
    Username(String),
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContributorCreateRequest {
    /// User to enroll, by id or username.
    pub user: ContributorRef,
}
