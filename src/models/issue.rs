use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

use super::contributor::ContributorRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssueStatus {
    Todo,
    InProgress,
    Finished,
}

impl IssueStatus {
    pub const CHOICES: &'static [&'static str] = &["Todo", "InProgress", "Finished"];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Todo => "Todo",
            IssueStatus::InProgress => "InProgress",
            IssueStatus::Finished => "Finished",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "Todo" => Ok(IssueStatus::Todo),
            "InProgress" => Ok(IssueStatus::InProgress),
            "Finished" => Ok(IssueStatus::Finished),
            other => Err(AppError::validation(format!(
                "invalid issue status {other:?}; valid choices: {}",
                Self::CHOICES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssuePriority {
    Low,
    Medium,
    High,
}

impl IssuePriority {
    pub const CHOICES: &'static [&'static str] = &["Low", "Medium", "High"];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::Low => "Low",
            IssuePriority::Medium => "Medium",
            IssuePriority::High => "High",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "Low" => Ok(IssuePriority::Low),
            "Medium" => Ok(IssuePriority::Medium),
            "High" => Ok(IssuePriority::High),
            other => Err(AppError::validation(format!(
                "invalid issue priority {other:?}; valid choices: {}",
                Self::CHOICES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssueTag {
    Bug,
    Feature,
    Task,
}

impl IssueTag {
    pub const CHOICES: &'static [&'static str] = &["Bug", "Feature", "Task"];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueTag::Bug => "Bug",
            IssueTag::Feature => "Feature",
            IssueTag::Task => "Task",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "Bug" => Ok(IssueTag::Bug),
            "Feature" => Ok(IssueTag::Feature),
            "Task" => Ok(IssueTag::Task),
            other => Err(AppError::validation(format!(
                "invalid issue tag {other:?}; valid choices: {}",
                Self::CHOICES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    pub id: Uuid,
    pub author_id: Uuid,
    pub assign_to: Option<Uuid>,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub tag: IssueTag,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbIssue {
    pub id: Uuid,
    pub author_id: Uuid,
    pub assign_to: Option<Uuid>,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub tag: String,
    pub created_time: DateTime<Utc>,
}

impl TryFrom<DbIssue> for Issue {
    type Error = AppError;

    fn try_from(value: DbIssue) -> Result<Self, Self::Error> {
        Ok(Issue {
            id: value.id,
            author_id: value.author_id,
            assign_to: value.assign_to,
            project_id: value.project_id,
            title: value.title,
            description: value.description,
            status: IssueStatus::parse(&value.status)?,
            priority: IssuePriority::parse(&value.priority)?,
            tag: IssueTag::parse(&value.tag)?,
            created_time: value.created_time,
        })
    }
}

/// Detail representation adds the owning project's name.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueDetail {
    pub id: Uuid,
    pub author_id: Uuid,
    pub assign_to: Option<Uuid>,
    pub project_id: Uuid,
    pub project_name: String,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub tag: IssueTag,
    pub created_time: DateTime<Utc>,
}

impl IssueDetail {
    pub fn new(issue: Issue, project_name: String) -> Self {
        Self {
            id: issue.id,
            author_id: issue.author_id,
            assign_to: issue.assign_to,
            project_id: issue.project_id,
            project_name,
            title: issue.title,
            description: issue.description,
            status: issue.status,
            priority: issue.priority,
            tag: issue.tag,
            created_time: issue.created_time,
        }
    }
}

/// `author` and `project` are never taken from the payload; they come from
/// the actor and the request path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueCreateRequest {
    #[schema(example = "Login page 500s on empty password")]
    pub title: String,
    pub description: String,
    /// Defaults to Todo.
    pub status: Option<IssueStatus>,
    pub priority: IssuePriority,
    pub tag: IssueTag,
    /// Assignee, by user id or exact username; must be a project contributor.
    pub assign_to: Option<ContributorRef>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueUpdateRequest {
    pub assign_to: Option<ContributorRef>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub tag: Option<IssueTag>,
}

impl IssueUpdateRequest {
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.assign_to.is_some() {
            fields.push("assign_to");
        }
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.tag.is_some() {
            fields.push("tag");
        }
        fields
    }
}
