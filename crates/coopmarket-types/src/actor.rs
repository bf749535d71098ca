//! Who is calling.
//!
//! Authentication happens outside the core; the caller hands in an
//! already-authenticated [`Actor`].

use serde::{Deserialize, Serialize};

use crate::MemberId;

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A cooperative member: may list and negotiate.
    Member,
    /// May additionally remove any listing.
    Moderator,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub member: MemberId,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn member(member: MemberId) -> Self {
        Self {
            member,
            role: Role::Member,
        }
    }

    #[must_use]
    pub fn moderator(member: MemberId) -> Self {
        Self {
            member,
            role: Role::Moderator,
        }
    }

    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}
