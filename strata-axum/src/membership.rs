//! The storage contract the room routes depend on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Membership state of a user in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Currently joined.
    Join,
    /// Invited but not joined.
    Invite,
    /// Left or was kicked.
    Leave,
    /// Banned.
    Ban,
    /// Asked to join.
    Knock,
}

impl Membership {
    /// The membership string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
        }
    }
}

/// Errors reported by a membership backend.
#[derive(Error, Debug)]
pub enum MembershipError {
    /// The backend could not be reached.
    #[error("membership backend unavailable: {0}")]
    Unavailable(String),

    /// The query itself failed.
    #[error("membership query failed: {0}")]
    Query(String),
}

impl MembershipError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }
}

/// Room membership lookups.
///
/// On success the result is always a list, possibly empty.
#[async_trait::async_trait]
pub trait RoomMembershipStore: Send + Sync {
    /// Room IDs in which `user_id` has the given membership.
    async fn rooms_for_user(
        &self,
        user_id: &str,
        membership: Membership,
    ) -> Result<Vec<String>, MembershipError>;
}
