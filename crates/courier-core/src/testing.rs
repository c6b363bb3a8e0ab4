//! Shared fixture for the unit tests: an in-memory database, a throwaway
//! blob directory and a fully wired `Core`.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use courier_db::{Database, chats, users};
use courier_types::models::Role;

use crate::attachments::{AttachmentLimits, IncomingFile};
use crate::blob::{FsBlobStore, Namespace};
use crate::context::Caller;
use crate::Core;

pub struct Fixture {
    pub core: Core,
    pub db: Arc<Database>,
    pub blob_dir: TempDir,
}

pub fn fixture() -> Fixture {
    let blob_dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let blobs = Arc::new(FsBlobStore::new(blob_dir.path()).unwrap());
    let core = Core::new(db.clone(), blobs, AttachmentLimits::default());
    Fixture { core, db, blob_dir }
}

/// A file of `size` filler bytes.
pub fn incoming(filename: &str, content_type: &str, size: usize) -> IncomingFile {
    IncomingFile {
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        data: vec![0x5a; size],
    }
}

impl Fixture {
    /// Insert a user directly, skipping password hashing.
    pub fn user(&self, name: &str) -> Caller {
        let email = format!("{name}@example.com");
        let id = self
            .db
            .with_conn(|conn| {
                users::insert(
                    conn,
                    &users::NewUser {
                        email: &email,
                        name,
                        lastname: "Test",
                        bio: None,
                        password_hash: "not-a-hash",
                    },
                )
            })
            .unwrap();
        Caller::new(id)
    }

    /// A group chat owned by `owner` with `members` as plain members.
    pub fn group(&self, owner: Caller, members: &[Caller]) -> i64 {
        let ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
        self.core
            .membership
            .create_group_chat(&owner, &ids, None)
            .unwrap()
    }

    pub fn set_role(&self, chat_id: i64, member: Caller, role: Role) {
        let changed = self
            .db
            .with_conn(|conn| chats::set_member_role(conn, chat_id, member.user_id, role))
            .unwrap();
        assert!(changed, "user {} is not in chat {}", member.user_id, chat_id);
    }

    /// Number of blobs currently on disk.
    pub fn blob_count(&self) -> usize {
        [Namespace::Attachments, Namespace::Pictures]
            .iter()
            .map(|ns| {
                fs::read_dir(self.blob_dir.path().join(ns.dir()))
                    .unwrap()
                    .count()
            })
            .sum()
    }
}
