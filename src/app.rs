use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, comments, contributors, health, issues, projects, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::partial_update_user)
                .delete(users::delete_user),
        );

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            // named :project_id so the nested contributor/issue routers
            // agree on the parameter
            "/:project_id",
            get(projects::get_project)
                .put(projects::update_project)
                .patch(projects::partial_update_project)
                .delete(projects::delete_project),
        );

    // Contributors are scoped to a project: /projects/:project_id/contributors
    let contributor_routes = Router::new()
        .route(
            "/",
            get(contributors::list_contributors).post(contributors::create_contributor),
        )
        .route(
            "/:id",
            get(contributors::get_contributor).delete(contributors::delete_contributor),
        );

    let issue_routes = Router::new()
        .route("/", get(issues::list_issues).post(issues::create_issue))
        .route(
            "/:issue_id",
            get(issues::get_issue)
                .put(issues::update_issue)
                .patch(issues::partial_update_issue)
                .delete(issues::delete_issue),
        );

    let comment_routes = Router::new()
        .route("/", get(comments::list_comments).post(comments::create_comment))
        .route(
            "/:id",
            get(comments::get_comment)
                .put(comments::update_comment)
                .patch(comments::partial_update_comment)
                .delete(comments::delete_comment),
        );

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/projects/:project_id/contributors", contributor_routes)
        .nest("/projects/:project_id/issues", issue_routes)
        // comments sit under issue scope
        .nest("/projects/:project_id/issues/:issue_id/comments", comment_routes)
        .route("/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
