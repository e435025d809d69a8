use common::{UserId, UserRole};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Result};

/// Who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// A walk-in guest without an account.
    Guest,
    User { id: UserId, role: UserRole },
}

impl Actor {
    pub fn customer(id: UserId) -> Self {
        Actor::User {
            id,
            role: UserRole::Customer,
        }
    }

    pub fn staff(id: UserId) -> Self {
        Actor::User {
            id,
            role: UserRole::Employee,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Actor::User {
            id,
            role: UserRole::Admin,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Guest => None,
            Actor::User { id, .. } => Some(*id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::User { role, .. } if role.is_staff())
    }

    pub fn ensure_staff(&self) -> Result<()> {
        match self {
            Actor::Guest => Err(DomainError::Unauthorized),
            _ if self.is_staff() => Ok(()),
            _ => Err(DomainError::forbidden("staff only")),
        }
    }

    /// Checks access to something owned by `owner`.
    ///
    /// Staff see everything. Unowned (walk-in) entities are open to anyone
    /// at the table; owned ones only to their owner.
    pub fn ensure_can_access(&self, owner: Option<UserId>) -> Result<()> {
        if self.is_staff() {
            return Ok(());
        }
        match (owner, self.user_id()) {
            (None, _) => Ok(()),
            (Some(_), None) => Err(DomainError::Unauthorized),
            (Some(owner), Some(me)) if owner == me => Ok(()),
            (Some(_), Some(_)) => Err(DomainError::forbidden("not the owner")),
        }
    }
}
