use uuid::Uuid;

use crate::errors::AppError;

use super::principal::Principal;

/// Closed set of actions a request can attempt against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    List,
    Retrieve,
    Update,
    PartialUpdate,
    Destroy,
}

/// Outcome of a permission check. Pure data; converting a denial into an
/// HTTP error happens in [`Decision::require`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Map a denial to 401 for anonymous callers and 403 otherwise.
    pub fn require(self, principal: &Principal) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(reason, authenticated = principal.is_authenticated(), "permission denied");
                if principal.is_authenticated() {
                    Err(AppError::forbidden(reason))
                } else {
                    Err(AppError::unauthorized(reason))
                }
            }
        }
    }
}

fn allow_if(condition: bool, reason: &'static str) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(reason)
    }
}

/// An empty attempted set trivially satisfies the allow-list.
fn fields_allowed(attempted: &[&'static str], allowed: &[&str]) -> bool {
    attempted.iter().all(|field| allowed.contains(field))
}

/// Facts about a project instance relative to the acting principal.
#[derive(Debug, Clone, Copy)]
pub struct ProjectAccess {
    pub author_id: Uuid,
    pub is_contributor: bool,
}

/// Facts about an issue instance relative to the acting principal.
/// `is_contributor` refers to the issue's owning project.
#[derive(Debug, Clone, Copy)]
pub struct IssueAccess {
    pub author_id: Uuid,
    pub assign_to: Option<Uuid>,
    pub is_contributor: bool,
}

/// Facts about a comment instance; membership is transitive via the
/// comment's issue's project.
#[derive(Debug, Clone, Copy)]
pub struct CommentAccess {
    pub author_id: Uuid,
    pub is_contributor: bool,
}

pub mod user {
    use super::*;

    /// Fields a user may change on their own record. The staff flag is
    /// deliberately absent: it is not self-assignable.
    pub const UPDATE_FIELDS: &[&str] = &[
        "username",
        "email",
        "age",
        "can_be_contacted",
        "can_data_be_shared",
    ];

    pub fn can_perform(action: Action, principal: &Principal) -> Decision {
        match action {
            // Self-registration is the one action open to anonymous callers.
            Action::Create => Decision::Allow,
            Action::List | Action::Retrieve | Action::Update | Action::PartialUpdate | Action::Destroy => {
                allow_if(principal.is_authenticated(), "authentication required")
            }
        }
    }

    pub fn can_perform_on(
        action: Action,
        principal: &Principal,
        target_id: Uuid,
        fields: &[&'static str],
    ) -> Decision {
        match action {
            // Directory lookup: any authenticated principal may read any
            // user record (the representation layer redacts fields).
            Action::Retrieve | Action::List => {
                allow_if(principal.is_authenticated(), "authentication required")
            }
            Action::Update | Action::PartialUpdate => {
                if !(principal.is_user(target_id) || principal.is_staff()) {
                    return Decision::Deny("only the account owner or staff may update a user");
                }
                allow_if(
                    fields_allowed(fields, UPDATE_FIELDS),
                    "update touches fields outside the user allow-list",
                )
            }
            Action::Destroy => allow_if(
                principal.is_user(target_id) || principal.is_staff(),
                "only the account owner or staff may delete a user",
            ),
            Action::Create => Decision::Allow,
        }
    }
}

pub mod project {
    use super::*;

    pub const UPDATE_FIELDS: &[&str] = &["contributors", "name", "description", "type"];

    pub fn can_perform(action: Action, principal: &Principal) -> Decision {
        match action {
            // Any authenticated user may create a project; instance checks
            // narrow everything else.
            Action::Create
            | Action::List
            | Action::Retrieve
            | Action::Update
            | Action::PartialUpdate
            | Action::Destroy => allow_if(principal.is_authenticated(), "authentication required"),
        }
    }

    pub fn can_perform_on(
        action: Action,
        principal: &Principal,
        access: &ProjectAccess,
        fields: &[&'static str],
    ) -> Decision {
        let is_author = principal.is_user(access.author_id);
        match action {
            Action::Retrieve | Action::List => allow_if(
                access.is_contributor || is_author || principal.is_staff(),
                "only project contributors may view this project",
            ),
            Action::Update | Action::PartialUpdate => {
                if !(is_author || principal.is_staff()) {
                    return Decision::Deny("only the project author or staff may update a project");
                }
                allow_if(
                    fields_allowed(fields, UPDATE_FIELDS),
                    "update touches fields outside the project allow-list",
                )
            }
            Action::Destroy => allow_if(
                is_author || principal.is_staff(),
                "only the project author or staff may delete a project",
            ),
            Action::Create => allow_if(principal.is_authenticated(), "authentication required"),
        }
    }
}

pub mod contributor {
    use super::*;

    /// Contributor rows are managed under the project's authority: reading
    /// follows project visibility, adding/removing follows project update
    /// rights. Rows are immutable, so there is no update arm.
    pub fn can_perform(action: Action, principal: &Principal) -> Decision {
        match action {
            Action::Create
            | Action::List
            | Action::Retrieve
            | Action::Update
            | Action::PartialUpdate
            | Action::Destroy => allow_if(principal.is_authenticated(), "authentication required"),
        }
    }

    pub fn can_perform_on(action: Action, principal: &Principal, access: &ProjectAccess) -> Decision {
        let is_author = principal.is_user(access.author_id);
        match action {
            Action::Retrieve | Action::List => allow_if(
                access.is_contributor || is_author || principal.is_staff(),
                "only project contributors may view the contributor list",
            ),
            Action::Create | Action::Destroy => allow_if(
                is_author || principal.is_staff(),
                "only the project author or staff may manage contributors",
            ),
            Action::Update | Action::PartialUpdate => {
                Decision::Deny("contributor entries cannot be updated")
            }
        }
    }
}

pub mod issue {
    use super::*;

    /// Fields the issue author (or staff) may change.
    pub const AUTHOR_UPDATE_FIELDS: &[&str] =
        &["assign_to", "title", "description", "status", "priority", "tag"];

    /// The assignee path permits exactly this set.
    pub const ASSIGNEE_UPDATE_FIELDS: &[&str] = &["status"];

    pub fn can_perform(action: Action, principal: &Principal) -> Decision {
        match action {
            Action::Create
            | Action::List
            | Action::Retrieve
            | Action::Update
            | Action::PartialUpdate
            | Action::Destroy => allow_if(principal.is_authenticated(), "authentication required"),
        }
    }

    /// Create gate; `is_contributor` is membership in the project supplied
    /// by the request path, never by the payload.
    pub fn can_create(principal: &Principal, is_contributor: bool) -> Decision {
        allow_if(
            principal.is_staff() || is_contributor,
            "only project contributors may open issues",
        )
    }

    pub fn can_perform_on(
        action: Action,
        principal: &Principal,
        access: &IssueAccess,
        fields: &[&'static str],
    ) -> Decision {
        let is_author = principal.is_user(access.author_id);
        match action {
            Action::Retrieve | Action::List => allow_if(
                access.is_contributor || is_author || principal.is_staff(),
                "only project contributors may view this issue",
            ),
            // Author path first; the assignee path only applies when the
            // actor is not the author.
            Action::Update | Action::PartialUpdate => {
                if is_author || principal.is_staff() {
                    return allow_if(
                        fields_allowed(fields, AUTHOR_UPDATE_FIELDS),
                        "update touches fields outside the issue allow-list",
                    );
                }
                if access.assign_to.is_some() && principal.user_id() == access.assign_to {
                    return allow_if(
                        fields == ASSIGNEE_UPDATE_FIELDS,
                        "the assignee may change only the status field",
                    );
                }
                Decision::Deny("only the issue author, staff, or the assignee may update an issue")
            }
            Action::Destroy => allow_if(
                is_author || principal.is_staff(),
                "only the issue author or staff may delete an issue",
            ),
            Action::Create => allow_if(
                access.is_contributor || principal.is_staff(),
                "only project contributors may open issues",
            ),
        }
    }
}

pub mod comment {
    use super::*;

    pub const UPDATE_FIELDS: &[&str] = &["description"];

    pub fn can_perform(action: Action, principal: &Principal) -> Decision {
        match action {
            Action::Create
            | Action::List
            | Action::Retrieve
            | Action::Update
            | Action::PartialUpdate
            | Action::Destroy => allow_if(principal.is_authenticated(), "authentication required"),
        }
    }

    /// Create gate; `is_contributor` is membership in the grandparent
    /// project, resolved through the issue in the request path.
    pub fn can_create(principal: &Principal, is_contributor: bool) -> Decision {
        allow_if(
            principal.is_staff() || is_contributor,
            "only project contributors may comment on issues",
        )
    }

    pub fn can_perform_on(
        action: Action,
        principal: &Principal,
        access: &CommentAccess,
        fields: &[&'static str],
    ) -> Decision {
        let is_author = principal.is_user(access.author_id);
        match action {
            Action::Retrieve | Action::List => allow_if(
                access.is_contributor || is_author || principal.is_staff(),
                "only project contributors may view this comment",
            ),
            // No staff override here: comments are mutable by their author
            // alone.
            Action::Update | Action::PartialUpdate => {
                if !is_author {
                    return Decision::Deny("only the comment author may update a comment");
                }
                allow_if(
                    fields_allowed(fields, UPDATE_FIELDS),
                    "comments only permit updating the description",
                )
            }
            Action::Destroy => allow_if(is_author, "only the comment author may delete a comment"),
            Action::Create => allow_if(
                access.is_contributor || principal.is_staff(),
                "only project contributors may comment on issues",
            ),
        }
    }
}
