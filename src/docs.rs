use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::login,
        routes::auth::me,
        routes::users::create_user,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::partial_update_user,
        routes::users::delete_user,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::projects::partial_update_project,
        routes::projects::delete_project,
        routes::contributors::list_contributors,
        routes::contributors::create_contributor,
        routes::contributors::get_contributor,
        routes::contributors::delete_contributor,
        routes::issues::list_issues,
        routes::issues::create_issue,
        routes::issues::get_issue,
        routes::issues::update_issue,
        routes::issues::partial_update_issue,
        routes::issues::delete_issue,
        routes::comments::list_comments,
        routes::comments::create_comment,
        routes::comments::get_comment,
        routes::comments::update_comment,
        routes::comments::partial_update_comment,
        routes::comments::delete_comment
    ),
    components(
        schemas(
            models::user::UserRepr,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::UserUpdateRequest,
            models::project::Project,
            models::project::ProjectDetail,
            models::project::ProjectType,
            models::project::ProjectCreateRequest,
            models::project::ProjectUpdateRequest,
            models::project::ProjectDestroyRequest,
            models::project::ContributorBrief,
            models::contributor::Contributor,
            models::contributor::ContributorDetail,
            models::contributor::ContributorCreateRequest,
            models::issue::Issue,
            models::issue::IssueDetail,
            models::issue::IssueStatus,
            models::issue::IssuePriority,
            models::issue::IssueTag,
            models::issue::IssueCreateRequest,
            models::issue::IssueUpdateRequest,
            models::comment::Comment,
            models::comment::CommentDetail,
            models::comment::CommentCreateRequest,
            models::comment::CommentUpdateRequest,
            routes::health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User directory and registration"),
        (name = "Projects", description = "Project management"),
        (name = "Contributors", description = "Project contributor management"),
        (name = "Issues", description = "Issue tracking"),
        (name = "Comments", description = "Issue comments"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
