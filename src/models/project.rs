use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

use super::contributor::ContributorRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ProjectType {
    #[serde(rename = "Back-end")]
    BackEnd,
    #[serde(rename = "Front-end")]
    FrontEnd,
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
}

impl ProjectType {
    pub const CHOICES: &'static [&'static str] = &["Back-end", "Front-end", "iOS", "Android"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::BackEnd => "Back-end",
            ProjectType::FrontEnd => "Front-end",
            ProjectType::Ios => "iOS",
            ProjectType::Android => "Android",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "Back-end" => Ok(ProjectType::BackEnd),
            "Front-end" => Ok(ProjectType::FrontEnd),
            "iOS" => Ok(ProjectType::Ios),
            "Android" => Ok(ProjectType::Android),
            other => Err(AppError::validation(format!(
                "invalid project type {other:?}; valid choices: {}",
                Self::CHOICES.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub description: String,
    pub project_type: String,
    pub created_time: DateTime<Utc>,
}

impl TryFrom<DbProject> for Project {
    type Error = AppError;

    fn try_from(value: DbProject) -> Result<Self, Self::Error> {
        Ok(Project {
            id: value.id,
            author_id: value.author_id,
            name: value.name,
            description: value.description,
            project_type: ProjectType::parse(&value.project_type)?,
            created_time: value.created_time,
        })
    }
}

/// Entry in a project detail's contributor list.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ContributorBrief {
    pub id: Uuid,
    pub username: String,
}

/// Detail representation; list responses omit the contributor set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectDetail {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub created_time: DateTime<Utc>,
    pub contributors: Vec<ContributorBrief>,
}

impl ProjectDetail {
    pub fn new(project: Project, contributors: Vec<ContributorBrief>) -> Self {
        Self {
            id: project.id,
            author_id: project.author_id,
            name: project.name,
            description: project.description,
            project_type: project.project_type,
            created_time: project.created_time,
            contributors,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "SoftDesk Support")]
    pub name: String,
    #[schema(example = "Customer-facing issue tracker")]
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    /// Contributor to enroll, by user id or exact username.
    pub contributors: Option<ContributorRef>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<ProjectType>,
}

impl ProjectUpdateRequest {
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.contributors.is_some() {
            fields.push("contributors");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.project_type.is_some() {
            fields.push("type");
        }
        fields
    }
}

/// DELETE body. When `contributors` is present the request removes that
/// contributor instead of destroying the project.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectDestroyRequest {
    pub contributors: Option<ContributorRef>,
}
