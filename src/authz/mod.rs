//! Authorization module - permission engine and membership index
//!
//! Decision functions live in [`policies`], one set per resource type, each
//! evaluating an explicit precedence list top-down:
//! - staff override (except comment update/destroy, which stay author-only)
//! - anonymous access (user registration only)
//! - contributor-gated visibility
//! - ownership-based mutation rights with field allow-lists
//!
//! The functions are pure: handlers gather the facts (principal, ownership
//! ids, membership bool, attempted field names) and the engine decides.

mod membership;
pub mod policies;
mod principal;

pub use membership::{MembershipIndex, SqlMembershipIndex};
pub use policies::{Action, CommentAccess, Decision, IssueAccess, ProjectAccess};
pub use principal::Principal;
