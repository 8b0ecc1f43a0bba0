use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// List/create representation. The opaque `uid` and the issue title only
/// appear in the detail form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub issue_id: Uuid,
    pub description: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbComment {
    pub id: Uuid,
    /// Opaque identifier handed out for external references, distinct from
    /// the primary id.
    pub uid: Uuid,
    pub author_id: Uuid,
    pub issue_id: Uuid,
    pub description: String,
    pub created_time: DateTime<Utc>,
}

impl TryFrom<DbComment> for Comment {
    type Error = AppError;

    fn try_from(value: DbComment) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: value.id,
            author_id: value.author_id,
            issue_id: value.issue_id,
            description: value.description,
            created_time: value.created_time,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentDetail {
    pub id: Uuid,
    pub uid: Uuid,
    pub author_id: Uuid,
    pub issue_id: Uuid,
    pub issue_title: String,
    pub description: String,
    pub created_time: DateTime<Utc>,
}

impl CommentDetail {
    pub fn new(comment: DbComment, issue_title: String) -> Self {
        Self {
            id: comment.id,
            uid: comment.uid,
            author_id: comment.author_id,
            issue_id: comment.issue_id,
            issue_title,
            description: comment.description,
            created_time: comment.created_time,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentCreateRequest {
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentUpdateRequest {
    pub description: Option<String>,
}

impl CommentUpdateRequest {
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.description.is_some() {
            fields.push("description");
        }
        fields
    }
}
