//! Who may do what. Every operation that reads or mutates chat state runs one
//! of these checks inside its own transaction before touching anything.
//!
//! Membership lookups that fail on a read are reported as `NotFound` so a
//! non-member learns nothing about whether the chat exists. Failed writes
//! report `Forbidden`, except message edits/deletes and attachment fetches,
//! which match on several keys jointly and always report `NotFound`.

use courier_db::models::{AttachmentRow, ChatRow, MessageRow, UserRow};
use courier_db::rusqlite::Connection;
use courier_db::{attachments, chats, messages, users};
use courier_types::models::{ChatStatus, Role};

use crate::context::Caller;
use crate::error::{CoreError, CoreResult};

/// A chat-scoped action the caller wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List messages, read the roster.
    ReadChat(i64),
    /// Append a message.
    PostMessage(i64),
    /// Rename, open or close the chat.
    EditSettings(i64),
    /// Add or remove other members.
    ManageMembers(i64),
    /// Promote or demote members.
    AssignRoles(i64),
    DeleteChat(i64),
}

impl Action {
    pub fn chat_id(&self) -> i64 {
        match *self {
            Self::ReadChat(id)
            | Self::PostMessage(id)
            | Self::EditSettings(id)
            | Self::ManageMembers(id)
            | Self::AssignRoles(id)
            | Self::DeleteChat(id) => id,
        }
    }

    fn allows(&self, role: Role) -> bool {
        match self {
            Self::ReadChat(_) | Self::PostMessage(_) => true,
            Self::EditSettings(_) | Self::ManageMembers(_) => role.manages_chat(),
            Self::AssignRoles(_) | Self::DeleteChat(_) => role == Role::Owner,
        }
    }

    fn denial(&self) -> CoreError {
        match self {
            Self::ReadChat(_) => CoreError::not_found("No chat found or you are not a member"),
            Self::PostMessage(_) => CoreError::forbidden("You are not in this chat"),
            _ => CoreError::forbidden("Permission denied"),
        }
    }
}

/// Check `action` against the caller's role in the chat. Returns that role.
pub fn authorize(conn: &Connection, caller: &Caller, action: Action) -> CoreResult<Role> {
    match chats::member_role(conn, action.chat_id(), caller.user_id)? {
        Some(role) if action.allows(role) => Ok(role),
        _ => Err(action.denial()),
    }
}

pub fn require_user(conn: &Connection, user_id: i64) -> CoreResult<UserRow> {
    users::by_id(conn, user_id)?
        .ok_or_else(|| CoreError::not_found(format!("User {} not found", user_id)))
}

/// The chat, provided it still accepts messages.
pub fn require_open(conn: &Connection, chat_id: i64) -> CoreResult<ChatRow> {
    match chats::by_id(conn, chat_id)? {
        Some(chat) if chat.status == ChatStatus::Opened => Ok(chat),
        _ => Err(CoreError::bad_request("Chat is closed")),
    }
}

/// A message the caller wrote in this chat. Wrong chat, wrong author and
/// missing id are indistinguishable.
pub fn authored_message(
    conn: &Connection,
    caller: &Caller,
    chat_id: i64,
    message_id: i64,
) -> CoreResult<MessageRow> {
    messages::authored(conn, chat_id, caller.user_id, message_id)?.ok_or_else(|| {
        CoreError::not_found("Message not found or you don't have permission")
    })
}

/// An attachment on a message in a chat the caller belongs to.
pub fn visible_attachment(
    conn: &Connection,
    caller: &Caller,
    message_id: i64,
    attachment_id: i64,
) -> CoreResult<AttachmentRow> {
    attachments::visible_to(conn, caller.user_id, message_id, attachment_id)?
        .ok_or_else(|| CoreError::not_found("Attachment not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    #[test]
    fn rule_table() {
        let fx = fixture();
        let owner = fx.user("owner");
        let admin = fx.user("admin");
        let member = fx.user("member");
        let outsider = fx.user("outsider");
        let chat = fx.group(owner, &[admin, member]);
        fx.set_role(chat, admin, Role::Admin);

        let check = |caller: Caller, action: Action| {
            fx.db.with_conn(|conn| authorize(conn, &caller, action))
        };

        for caller in [owner, admin, member] {
            assert!(check(caller, Action::ReadChat(chat)).is_ok());
            assert!(check(caller, Action::PostMessage(chat)).is_ok());
        }
        assert!(check(owner, Action::EditSettings(chat)).is_ok());
        assert!(check(admin, Action::EditSettings(chat)).is_ok());
        assert!(check(admin, Action::ManageMembers(chat)).is_ok());
        assert!(check(owner, Action::AssignRoles(chat)).is_ok());
        assert!(check(owner, Action::DeleteChat(chat)).is_ok());

        assert!(matches!(
            check(member, Action::EditSettings(chat)),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            check(admin, Action::AssignRoles(chat)),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            check(admin, Action::DeleteChat(chat)),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            check(outsider, Action::ReadChat(chat)),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            check(outsider, Action::PostMessage(chat)),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn missing_chat_reads_as_not_found() {
        let fx = fixture();
        let user = fx.user("ann");

        let result = fx
            .db
            .with_conn(|conn| authorize(conn, &user, Action::ReadChat(999)));
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
