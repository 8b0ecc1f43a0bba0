use uuid::Uuid;

use crate::jwt::AuthUser;

/// Authenticated-or-anonymous identity consumed by the permission engine.
/// The engine never authenticates credentials itself; it only reads the
/// resolved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated { id: Uuid, staff: bool },
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::Authenticated { .. })
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Principal::Authenticated { staff: true, .. })
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated { id, .. } => Some(*id),
        }
    }

    /// True when the principal is exactly the given user.
    pub fn is_user(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }
}

impl From<AuthUser> for Principal {
    fn from(auth: AuthUser) -> Self {
        Principal::Authenticated {
            id: auth.user_id,
            staff: auth.is_staff,
        }
    }
}

impl From<Option<AuthUser>> for Principal {
    fn from(auth: Option<AuthUser>) -> Self {
        match auth {
            Some(auth) => auth.into(),
            None => Principal::Anonymous,
        }
    }
}
