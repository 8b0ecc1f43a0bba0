use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::policies::{self, Action};
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{
    AuthResponse, DbUser, RegisterRequest, User, UserRepr, UserUpdateRequest, MINIMUM_AGE,
};
use crate::utils::{hash_password, utc_now};

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation failed (under-age, weak password)"),
        (status = 409, description = "Username already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let principal = Principal::from(auth);
    policies::user::can_perform(Action::Create, &principal).require(&principal)?;

    ensure_minimum_age(payload.age)?;
    ensure_username_available(&state.pool, &payload.username).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, age, is_staff, can_be_contacted, can_data_be_shared, created_time) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(payload.age)
    .bind(false)
    .bind(payload.can_be_contacted)
    .bind(payload.can_data_be_shared)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let user = fetch_user(&state.pool, user_id).await?;
    let token = state.jwt.encode(user.id)?;
    // The new account views its own representation, so age/email stay.
    let viewer = Principal::Authenticated { id: user.id, staff: false };

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.repr_for(&viewer),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "List users (redacted per viewer)", body = [UserRepr]))
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<UserRepr>>> {
    let principal = Principal::from(auth);
    policies::user::can_perform(Action::List, &principal).require(&principal)?;

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, password_hash, age, is_staff, can_be_contacted, can_data_be_shared, created_time \
         FROM users ORDER BY username",
    )
    .fetch_all(&state.pool)
    .await?;

    let users = rows
        .into_iter()
        .map(|row| User::try_from(row).map(|user| user.repr_for(&principal)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail (redacted per viewer)", body = UserRepr))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserRepr>> {
    let principal = Principal::from(auth);
    policies::user::can_perform(Action::Retrieve, &principal).require(&principal)?;

    let user = fetch_user(&state.pool, id).await?;
    policies::user::can_perform_on(Action::Retrieve, &principal, user.id, &[]).require(&principal)?;

    Ok(Json(user.repr_for(&principal)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "User updated", body = UserRepr))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<UserRepr>> {
    apply_user_update(Action::Update, &state, auth, id, payload).await
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "User updated", body = UserRepr))
)]
pub async fn partial_update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<UserRepr>> {
    apply_user_update(Action::PartialUpdate, &state, auth, id, payload).await
}

async fn apply_user_update(
    action: Action,
    state: &AppState,
    auth: AuthUser,
    id: Uuid,
    payload: UserUpdateRequest,
) -> AppResult<Json<UserRepr>> {
    let principal = Principal::from(auth);
    policies::user::can_perform(action, &principal).require(&principal)?;

    let mut user = fetch_user(&state.pool, id).await?;

    let fields = payload.changed_fields();
    policies::user::can_perform_on(action, &principal, user.id, &fields).require(&principal)?;

    if let Some(age) = payload.age {
        ensure_minimum_age(age)?;
        user.age = age;
    }
    if let Some(username) = payload.username {
        if username != user.username {
            ensure_username_available(&state.pool, &username).await?;
        }
        user.username = username;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(can_be_contacted) = payload.can_be_contacted {
        user.can_be_contacted = can_be_contacted;
    }
    if let Some(can_data_be_shared) = payload.can_data_be_shared {
        user.can_data_be_shared = can_data_be_shared;
    }

    sqlx::query(
        "UPDATE users SET username = ?, email = ?, age = ?, can_be_contacted = ?, can_data_be_shared = ? WHERE id = ?",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(user.age)
    .bind(user.can_be_contacted)
    .bind(user.can_data_be_shared)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    Ok(Json(user.repr_for(&principal)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let principal = Principal::from(auth);
    policies::user::can_perform(Action::Destroy, &principal).require(&principal)?;

    let user = fetch_user(&state.pool, id).await?;
    policies::user::can_perform_on(Action::Destroy, &principal, user.id, &[]).require(&principal)?;

    // Cascades through authored projects, contributor rows, issues and
    // comments via the schema's foreign keys.
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_minimum_age(age: i64) -> AppResult<()> {
    if age < MINIMUM_AGE {
        return Err(AppError::validation(format!(
            "users must be at least {MINIMUM_AGE} years old"
        )));
    }
    Ok(())
}

async fn ensure_username_available(pool: &SqlitePool, username: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("username already in use"));
    }

    Ok(())
}

async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, password_hash, age, is_staff, can_be_contacted, can_data_be_shared, created_time \
         FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    row.try_into()
}
