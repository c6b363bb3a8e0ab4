use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use courier_db::{Database, friendships, is_unique_violation};
use courier_types::models::{FriendshipDirection, FriendshipStatus};

use crate::authz::require_user;
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};

/// One friendship row as seen from the caller's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    pub user_id: i64,
    pub status: FriendshipStatus,
    pub direction: FriendshipDirection,
    pub since: DateTime<Utc>,
}

/// Friendship state machine: none → pending → accepted, and accepted → gone.
///
/// A pair of users shares at most one row no matter who asked first. There
/// is no way to decline a pending request.
#[derive(Clone)]
pub struct Friendships {
    db: Arc<Database>,
}

impl Friendships {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn initiate(&self, caller: &Caller, target_id: i64) -> CoreResult<()> {
        self.db.transaction(|tx| {
            require_user(tx, target_id)?;
            if caller.user_id == target_id {
                return Err(CoreError::bad_request("Cannot add to friends yourself"));
            }
            if friendships::between(tx, caller.user_id, target_id)?.is_some() {
                return Err(already_linked());
            }
            match friendships::insert_pending(tx, caller.user_id, target_id) {
                Ok(()) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(already_linked()),
                Err(e) => Err(e.into()),
            }
        })?;

        info!("User {} sent a friend request to {}", caller.user_id, target_id);
        Ok(())
    }

    /// Accept the pending request `requester_id` sent to the caller.
    pub fn accept(&self, caller: &Caller, requester_id: i64) -> CoreResult<()> {
        self.db.transaction(|tx| {
            require_user(tx, requester_id)?;
            if !friendships::accept(tx, requester_id, caller.user_id)? {
                return Err(CoreError::not_found("Request not found"));
            }
            Ok(())
        })?;

        info!("User {} accepted a friend request from {}", caller.user_id, requester_id);
        Ok(())
    }

    /// End an accepted friendship. Works from either side.
    pub fn remove(&self, caller: &Caller, other_id: i64) -> CoreResult<()> {
        let removed = self
            .db
            .transaction(|tx| friendships::delete_accepted(tx, caller.user_id, other_id))?;
        if !removed {
            return Err(CoreError::not_found("Friend not found"));
        }

        info!("Users {} and {} are no longer friends", caller.user_id, other_id);
        Ok(())
    }

    pub fn list(&self, caller: &Caller) -> CoreResult<Vec<Friend>> {
        let rows = self
            .db
            .with_conn(|conn| friendships::for_user(conn, caller.user_id))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let (user_id, direction) = if row.requester_id == caller.user_id {
                    (row.target_id, FriendshipDirection::Outgoing)
                } else {
                    (row.requester_id, FriendshipDirection::Incoming)
                };
                Friend {
                    user_id,
                    status: row.status,
                    direction,
                    since: row.created_at,
                }
            })
            .collect())
    }
}

fn already_linked() -> CoreError {
    CoreError::conflict("You are already a friend, or request is being processed")
}
