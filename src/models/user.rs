use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Principal;
use crate::errors::AppError;

/// Registration is rejected below this age; consent flags cannot make up
/// for it.
pub const MINIMUM_AGE: i64 = 16;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub age: i64,
    pub is_staff: bool,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub age: i64,
    pub is_staff: bool,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
    pub created_time: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: value.id,
            username: value.username,
            email: value.email,
            age: value.age,
            is_staff: value.is_staff,
            can_be_contacted: value.can_be_contacted,
            can_data_be_shared: value.can_data_be_shared,
            created_time: value.created_time,
        })
    }
}

/// Read representation. `age` and `email` are omitted entirely (not nulled)
/// unless the user shares their data, the viewer is the user themself, or
/// the viewer is staff.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserRepr {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    pub can_be_contacted: bool,
    pub can_data_be_shared: bool,
    pub created_time: DateTime<Utc>,
}

impl User {
    pub fn repr_for(&self, viewer: &Principal) -> UserRepr {
        let visible = self.can_data_be_shared || viewer.is_user(self.id) || viewer.is_staff();

        UserRepr {
            id: self.id,
            username: self.username.clone(),
            email: visible.then(|| self.email.clone()),
            age: visible.then_some(self.age),
            can_be_contacted: self.can_be_contacted,
            can_data_be_shared: self.can_data_be_shared,
            created_time: self.created_time,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    #[schema(example = 30)]
    pub age: i64,
    #[serde(default)]
    pub can_be_contacted: bool,
    #[serde(default)]
    pub can_data_be_shared: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub can_be_contacted: Option<bool>,
    pub can_data_be_shared: Option<bool>,
}

impl UserUpdateRequest {
    /// Names of the fields the caller is attempting to change, for the
    /// permission engine's allow-list check.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.username.is_some() {
            fields.push("username");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.age.is_some() {
            fields.push("age");
        }
        if self.can_be_contacted.is_some() {
            fields.push("can_be_contacted");
        }
        if self.can_data_be_shared.is_some() {
            fields.push("can_data_be_shared");
        }
        fields
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserRepr,
}
