use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use courier_db::models::{ChatRow, MemberRow};
use courier_db::rusqlite::Connection;
use courier_db::{Database, attachments, chats};
use courier_types::models::{ChatStatus, Role};

use crate::authz::{Action, authorize, require_user};
use crate::blob::{self, BlobStore};
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};

/// Group chats hold between these many members, owner included.
pub const MIN_GROUP_MEMBERS: usize = 2;
pub const MAX_GROUP_MEMBERS: usize = 15;
pub const MAX_CHAT_NAME_CHARS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectChat {
    pub chat_id: i64,
    /// False when an existing private chat was reused.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub name: Option<String>,
    pub status: Option<ChatStatus>,
}

/// Chat creation, the member roster, and role-gated changes to both.
#[derive(Clone)]
pub struct Membership {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
}

impl Membership {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Create a named group chat owned by the caller. The caller counts
    /// towards the member limits whether or not they list themselves.
    pub fn create_group_chat(
        &self,
        caller: &Caller,
        member_ids: &[i64],
        name: Option<&str>,
    ) -> CoreResult<i64> {
        let others: BTreeSet<i64> = member_ids
            .iter()
            .copied()
            .filter(|id| *id != caller.user_id)
            .collect();
        let total = others.len() + 1;
        if !(MIN_GROUP_MEMBERS..=MAX_GROUP_MEMBERS).contains(&total) {
            return Err(CoreError::bad_request(format!(
                "A group chat needs {} to {} members, got {}",
                MIN_GROUP_MEMBERS, MAX_GROUP_MEMBERS, total
            )));
        }
        if let Some(name) = name {
            validate_name(name)?;
        }

        let chat_id = self.db.transaction(|tx| {
            for member in &others {
                if !courier_db::users::exists(tx, *member)? {
                    return Err(CoreError::not_found(format!("User {} does not exist", member)));
                }
            }
            let owner = require_user(tx, caller.user_id)?;
            let name = match name {
                Some(name) => name.trim().to_string(),
                None => format!("{} chat", owner.name),
            };

            let chat_id = chats::insert(tx, false, Some(&name))?;
            chats::insert_member(tx, chat_id, caller.user_id, Role::Owner)?;
            for member in &others {
                chats::insert_member(tx, chat_id, *member, Role::Member)?;
            }
            Ok(chat_id)
        })?;

        info!(
            "User {} created group chat {} with {} members",
            caller.user_id, chat_id, total
        );
        Ok(chat_id)
    }

    /// Return the caller's private chat with `other_id`, creating it on first use.
    pub fn create_or_reuse_direct_chat(&self, caller: &Caller, other_id: i64) -> CoreResult<DirectChat> {
        let direct = self
            .db
            .transaction(|tx| direct_chat_in(tx, caller, other_id))?;
        if direct.created {
            info!(
                "Opened private chat {} between {} and {}",
                direct.chat_id, caller.user_id, other_id
            );
        }
        Ok(direct)
    }

    pub fn set_role(
        &self,
        caller: &Caller,
        chat_id: i64,
        target_id: i64,
        is_admin: bool,
    ) -> CoreResult<()> {
        let role = if is_admin { Role::Admin } else { Role::Member };

        self.db.transaction(|tx| {
            authorize(tx, caller, Action::AssignRoles(chat_id))?;
            if target_id == caller.user_id {
                return Err(CoreError::bad_request("The owner cannot change their own role"));
            }
            if !chats::set_member_role(tx, chat_id, target_id, role)? {
                return Err(CoreError::not_found("User not in chat"));
            }
            Ok(())
        })?;

        info!("Chat {}: user {} is now {}", chat_id, target_id, role);
        Ok(())
    }

    /// Rename and/or open/close a chat.
    pub fn update_settings(
        &self,
        caller: &Caller,
        chat_id: i64,
        settings: &ChatSettings,
    ) -> CoreResult<()> {
        if let Some(name) = &settings.name {
            validate_name(name)?;
        }

        self.db.transaction(|tx| {
            authorize(tx, caller, Action::EditSettings(chat_id))?;
            if let Some(name) = &settings.name {
                chats::set_name(tx, chat_id, name.trim())?;
            }
            if let Some(status) = settings.status {
                chats::set_status(tx, chat_id, status)?;
            }
            Ok::<_, CoreError>(())
        })?;

        info!("Chat {} settings changed by user {}", chat_id, caller.user_id);
        Ok(())
    }

    /// Delete a chat with its members, messages and attachments.
    pub fn delete_chat(&self, caller: &Caller, chat_id: i64) -> CoreResult<()> {
        let orphaned = self.db.transaction(|tx| {
            authorize(tx, caller, Action::DeleteChat(chat_id))?;
            let paths = attachments::paths_for_chat(tx, chat_id)?;
            chats::delete(tx, chat_id)?;
            Ok::<_, CoreError>(paths)
        })?;

        blob::discard(self.blobs.as_ref(), &orphaned);
        info!("Chat {} deleted by user {}", chat_id, caller.user_id);
        Ok(())
    }

    pub fn list_chats(&self, caller: &Caller) -> CoreResult<Vec<ChatRow>> {
        Ok(self
            .db
            .with_conn(|conn| chats::for_user(conn, caller.user_id))?)
    }

    pub fn roster(&self, caller: &Caller, chat_id: i64) -> CoreResult<Vec<MemberRow>> {
        self.db.with_conn(|conn| {
            authorize(conn, caller, Action::ReadChat(chat_id))?;
            Ok(chats::members(conn, chat_id)?)
        })
    }

    pub fn add_member(&self, caller: &Caller, chat_id: i64, target_id: i64) -> CoreResult<()> {
        self.db.transaction(|tx| {
            authorize(tx, caller, Action::ManageMembers(chat_id))?;
            let chat = chat_row(tx, chat_id)?;
            if chat.is_private {
                return Err(CoreError::bad_request("Private chats have a fixed membership"));
            }
            require_user(tx, target_id)?;
            if chats::member_role(tx, chat_id, target_id)?.is_some() {
                return Err(CoreError::conflict("User is already in this chat"));
            }
            if chats::member_count(tx, chat_id)? >= MAX_GROUP_MEMBERS {
                return Err(CoreError::bad_request(format!(
                    "A group chat holds at most {} members",
                    MAX_GROUP_MEMBERS
                )));
            }
            chats::insert_member(tx, chat_id, target_id, Role::Member)?;
            Ok(())
        })?;

        info!("User {} added {} to chat {}", caller.user_id, target_id, chat_id);
        Ok(())
    }

    /// Remove `target_id` from a group chat. When the caller names themselves
    /// this is leaving the chat.
    pub fn remove_member(&self, caller: &Caller, chat_id: i64, target_id: i64) -> CoreResult<()> {
        self.db.transaction(|tx| {
            let leaving = target_id == caller.user_id;
            if leaving {
                let role = authorize(tx, caller, Action::ReadChat(chat_id))?;
                if chat_row(tx, chat_id)?.is_private {
                    return Err(CoreError::bad_request("Private chats cannot be left"));
                }
                if role == Role::Owner {
                    return Err(CoreError::bad_request(
                        "The owner cannot leave; delete the chat instead",
                    ));
                }
            } else {
                let role = authorize(tx, caller, Action::ManageMembers(chat_id))?;
                if chat_row(tx, chat_id)?.is_private {
                    return Err(CoreError::bad_request("Private chats have a fixed membership"));
                }
                match chats::member_role(tx, chat_id, target_id)? {
                    None => return Err(CoreError::not_found("User not in chat")),
                    Some(Role::Owner) => {
                        return Err(CoreError::forbidden("The owner cannot be removed"));
                    }
                    Some(Role::Admin) if role != Role::Owner => {
                        return Err(CoreError::forbidden("Only the owner can remove admins"));
                    }
                    Some(_) => {}
                }
            }

            if chats::member_count(tx, chat_id)? <= MIN_GROUP_MEMBERS {
                return Err(CoreError::bad_request(format!(
                    "A group chat needs at least {} members",
                    MIN_GROUP_MEMBERS
                )));
            }
            chats::delete_member(tx, chat_id, target_id)?;
            Ok(())
        })?;

        info!("User {} removed {} from chat {}", caller.user_id, target_id, chat_id);
        Ok(())
    }
}

/// Find or create the private chat between the caller and `other_id` on an
/// open transaction. Always reuses an existing one.
pub(crate) fn direct_chat_in(conn: &Connection, caller: &Caller, other_id: i64) -> CoreResult<DirectChat> {
    if other_id == caller.user_id {
        return Err(CoreError::bad_request("Can't create new chat with yourself"));
    }
    require_user(conn, other_id)?;

    if let Some(chat_id) = chats::private_between(conn, caller.user_id, other_id)? {
        return Ok(DirectChat {
            chat_id,
            created: false,
        });
    }

    let chat_id = chats::insert(conn, true, None)?;
    chats::insert_member(conn, chat_id, caller.user_id, Role::Member)?;
    chats::insert_member(conn, chat_id, other_id, Role::Member)?;
    Ok(DirectChat {
        chat_id,
        created: true,
    })
}

/// Prepare the group chats of a user whose account is about to be deleted.
/// Owned groups pass to the longest-standing admin, or failing that the
/// longest-standing member. Groups that would drop below the minimum size
/// are deleted outright; their attachment paths are returned for discard.
pub(crate) fn release_groups(conn: &Connection, user_id: i64) -> CoreResult<Vec<String>> {
    let mut orphaned = Vec::new();
    for chat in chats::for_user(conn, user_id)? {
        if chat.is_private {
            continue;
        }
        let (departing, remaining): (Vec<MemberRow>, Vec<MemberRow>) =
            chats::members(conn, chat.id)?
                .into_iter()
                .partition(|m| m.user_id == user_id);

        if remaining.len() < MIN_GROUP_MEMBERS {
            orphaned.extend(attachments::paths_for_chat(conn, chat.id)?);
            chats::delete(conn, chat.id)?;
            info!("Chat {} dissolved with the departure of user {}", chat.id, user_id);
            continue;
        }

        if departing.iter().any(|m| m.role == Role::Owner) {
            let heir = remaining
                .iter()
                .find(|m| m.role == Role::Admin)
                .unwrap_or(&remaining[0])
                .user_id;
            // The single-owner index requires the old row gone first.
            chats::delete_member(conn, chat.id, user_id)?;
            chats::set_member_role(conn, chat.id, heir, Role::Owner)?;
            info!("Ownership of chat {} passed from {} to {}", chat.id, user_id, heir);
        }
    }
    Ok(orphaned)
}

fn chat_row(conn: &Connection, chat_id: i64) -> CoreResult<ChatRow> {
    chats::by_id(conn, chat_id)?.ok_or_else(|| CoreError::not_found("Chat not found"))
}

fn validate_name(name: &str) -> CoreResult<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_CHAT_NAME_CHARS {
        return Err(CoreError::bad_request(format!(
            "Chat name must be 1-{} characters",
            MAX_CHAT_NAME_CHARS
        )));
    }
    Ok(())
}
