use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use courier_db::models::MessageRow;
use courier_db::{Database, attachments, messages, now_micros};

use crate::attachments::{AttachmentStore, IncomingFile};
use crate::authz::{Action, authored_message, authorize, require_open};
use crate::blob::{self, BlobStore};
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};
use crate::membership::direct_chat_in;

pub const MAX_TEXT_CHARS: usize = 255;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Where a new message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    Chat(i64),
    /// The private chat with this user, created if needed.
    User(i64),
}

#[derive(Debug, Clone)]
pub struct Posted {
    pub message_id: i64,
    pub chat_id: i64,
    pub attachment_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageRequest {
    pub limit: Option<u32>,
    /// Only messages strictly older than this cursor.
    pub before: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub message: MessageRow,
    pub attachment_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub entries: Vec<LedgerEntry>,
    /// Cursor of the oldest entry, present when the page came back full.
    pub next_cursor: Option<i64>,
}

/// Append, edit, delete and page through chat messages.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    attachments: AttachmentStore,
}

impl Ledger {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, attachments: AttachmentStore) -> Self {
        Self {
            db,
            blobs,
            attachments,
        }
    }

    pub fn append(
        &self,
        caller: &Caller,
        target: SendTarget,
        text: &str,
        files: Vec<IncomingFile>,
    ) -> CoreResult<Posted> {
        validate_text(text)?;
        self.attachments.validate_incoming(&files)?;

        let mut written = Vec::new();
        let result: CoreResult<Posted> = self.db.transaction(|tx| {
            let chat_id = match target {
                SendTarget::Chat(id) => id,
                SendTarget::User(other) => direct_chat_in(tx, caller, other)?.chat_id,
            };
            authorize(tx, caller, Action::PostMessage(chat_id))?;
            require_open(tx, chat_id)?;

            let sent_at = messages::next_sent_at(tx, chat_id, now_micros())?;
            let message_id = messages::insert(tx, chat_id, caller.user_id, text, sent_at)?;

            let mut attachment_ids = Vec::with_capacity(files.len());
            for file in &files {
                attachment_ids.push(self.attachments.persist(tx, file, message_id, &mut written)?);
            }

            Ok(Posted {
                message_id,
                chat_id,
                attachment_ids,
            })
        });

        match result {
            Ok(posted) => {
                info!(
                    "User {} posted message {} to chat {} ({} attachments)",
                    caller.user_id,
                    posted.message_id,
                    posted.chat_id,
                    posted.attachment_ids.len()
                );
                Ok(posted)
            }
            Err(e) => {
                if !written.is_empty() {
                    warn!("Message rejected after {} blobs were written, removing them", written.len());
                    blob::discard(self.blobs.as_ref(), &written);
                }
                Err(e)
            }
        }
    }

    /// Replace the text of a message the caller wrote.
    pub fn edit(&self, caller: &Caller, chat_id: i64, message_id: i64, text: &str) -> CoreResult<()> {
        validate_text(text)?;

        self.db.transaction(|tx| {
            authored_message(tx, caller, chat_id, message_id)?;
            messages::set_text(tx, message_id, text)?;
            Ok::<_, CoreError>(())
        })?;

        info!("User {} edited message {}", caller.user_id, message_id);
        Ok(())
    }

    pub fn delete(&self, caller: &Caller, chat_id: i64, message_id: i64) -> CoreResult<()> {
        let orphaned = self.db.transaction(|tx| {
            authored_message(tx, caller, chat_id, message_id)?;
            let paths = attachments::paths_for_message(tx, message_id)?;
            messages::delete(tx, message_id)?;
            Ok::<_, CoreError>(paths)
        })?;

        blob::discard(self.blobs.as_ref(), &orphaned);
        info!("User {} deleted message {}", caller.user_id, message_id);
        Ok(())
    }

    /// Newest-first page of a chat the caller belongs to.
    pub fn list(&self, caller: &Caller, chat_id: i64, request: PageRequest) -> CoreResult<Page> {
        let limit = request
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        self.db.with_conn(|conn| {
            authorize(conn, caller, Action::ReadChat(chat_id))?;

            let rows = messages::page(conn, chat_id, limit, request.before)?;
            let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();

            let mut by_message: HashMap<i64, Vec<i64>> = HashMap::new();
            for (message_id, attachment_id) in attachments::ids_for_messages(conn, &ids)? {
                by_message.entry(message_id).or_default().push(attachment_id);
            }

            let next_cursor = match rows.last() {
                Some(oldest) if rows.len() == limit as usize => Some(oldest.sent_at),
                _ => None,
            };
            let entries = rows
                .into_iter()
                .map(|message| LedgerEntry {
                    attachment_ids: by_message.remove(&message.id).unwrap_or_default(),
                    message,
                })
                .collect();

            Ok(Page {
                entries,
                next_cursor,
            })
        })
    }
}

fn validate_text(text: &str) -> CoreResult<()> {
    if text.trim().is_empty() {
        return Err(CoreError::bad_request("Message text must not be empty"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(CoreError::bad_request(format!(
            "Message text must be at most {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::testing::{fixture, incoming};

    #[test]
    fn pages_have_no_overlap_or_gaps() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        for i in 0..23 {
            let author = if i % 2 == 0 { &ann } else { &bob };
            fx.core
                .ledger
                .append(author, SendTarget::Chat(chat), &format!("m{i}"), vec![])
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut before = None;
        loop {
            let page = fx
                .core
                .ledger
                .list(
                    &bob,
                    chat,
                    PageRequest {
                        limit: Some(5),
                        before,
                    },
                )
                .unwrap();
            assert!(page.entries.len() <= 5);
            seen.extend(page.entries.iter().map(|e| e.message.sent_at));
            match page.next_cursor {
                Some(cursor) => before = Some(cursor),
                None => break,
            }
        }

        assert_eq!(seen.len(), 23);
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), 23);
    }

    #[test]
    fn limit_is_clamped() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);
        for i in 0..3 {
            fx.core
                .ledger
                .append(&ann, SendTarget::Chat(chat), &format!("m{i}"), vec![])
                .unwrap();
        }

        let page = fx
            .core
            .ledger
            .list(
                &ann,
                chat,
                PageRequest {
                    limit: Some(0),
                    before: None,
                },
            )
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert!(page.next_cursor.is_some());

        let page = fx.core.ledger.list(&ann, chat, PageRequest::default()).unwrap();
        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn entries_carry_their_attachments() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        let with_files = fx
            .core
            .ledger
            .append(
                &ann,
                SendTarget::Chat(chat),
                "two files",
                vec![
                    incoming("a.png", "image/png", 4),
                    incoming("b.txt", "text/plain", 4),
                ],
            )
            .unwrap();
        fx.core
            .ledger
            .append(&bob, SendTarget::Chat(chat), "plain", vec![])
            .unwrap();

        let page = fx.core.ledger.list(&ann, chat, PageRequest::default()).unwrap();
        assert_eq!(page.entries[0].message.text, "plain");
        assert!(page.entries[0].attachment_ids.is_empty());
        assert_eq!(page.entries[1].attachment_ids, with_files.attachment_ids);
    }

    #[test]
    fn only_the_author_edits_or_deletes() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);
        let other_chat = fx.group(ann, &[bob]);

        let posted = fx
            .core
            .ledger
            .append(&ann, SendTarget::Chat(chat), "original", vec![])
            .unwrap();
        let ledger = &fx.core.ledger;

        assert!(matches!(
            ledger.edit(&bob, chat, posted.message_id, "hijack"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            ledger.delete(&bob, chat, posted.message_id),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            ledger.edit(&ann, other_chat, posted.message_id, "wrong chat"),
            Err(CoreError::NotFound(_))
        ));

        ledger.edit(&ann, chat, posted.message_id, "edited").unwrap();
        let page = ledger.list(&bob, chat, PageRequest::default()).unwrap();
        assert_eq!(page.entries[0].message.text, "edited");

        ledger.delete(&ann, chat, posted.message_id).unwrap();
        assert!(matches!(
            ledger.delete(&ann, chat, posted.message_id),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_message_removes_its_blobs() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        let posted = fx
            .core
            .ledger
            .append(
                &ann,
                SendTarget::Chat(chat),
                "file",
                vec![incoming("a.zip", "application/zip", 16)],
            )
            .unwrap();
        assert_eq!(fx.blob_count(), 1);

        fx.core.ledger.delete(&ann, chat, posted.message_id).unwrap();
        assert_eq!(fx.blob_count(), 0);
    }

    #[test]
    fn outsiders_cannot_post_or_read() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let eve = fx.user("eve");
        let chat = fx.group(ann, &[bob]);

        assert!(matches!(
            fx.core
                .ledger
                .append(&eve, SendTarget::Chat(chat), "hi", vec![]),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            fx.core.ledger.list(&eve, chat, PageRequest::default()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn text_bounds() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);
        let ledger = &fx.core.ledger;

        assert!(matches!(
            ledger.append(&ann, SendTarget::Chat(chat), "   ", vec![]),
            Err(CoreError::BadRequest(_))
        ));
        assert!(matches!(
            ledger.append(&ann, SendTarget::Chat(chat), &"x".repeat(256), vec![]),
            Err(CoreError::BadRequest(_))
        ));
        ledger
            .append(&ann, SendTarget::Chat(chat), &"é".repeat(255), vec![])
            .unwrap();
    }

    #[test]
    fn over_cap_batch_persists_nothing() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        let files = vec![
            incoming("a.pdf", "application/pdf", 9 * 1024 * 1024),
            incoming("b.pdf", "application/pdf", 9 * 1024 * 1024),
            incoming("c.pdf", "application/pdf", 9 * 1024 * 1024),
        ];
        assert!(matches!(
            fx.core
                .ledger
                .append(&ann, SendTarget::Chat(chat), "too much", files),
            Err(CoreError::PayloadTooLarge(_))
        ));

        assert_eq!(fx.blob_count(), 0);
        let page = fx.core.ledger.list(&ann, chat, PageRequest::default()).unwrap();
        assert!(page.entries.is_empty());
    }

    #[test]
    fn rejected_post_removes_written_blobs() {
        let fx = fixture();
        let ann = fx.user("ann");
        let eve = fx.user("eve");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        // Validation passes; membership fails inside the transaction.
        assert!(fx
            .core
            .ledger
            .append(
                &eve,
                SendTarget::Chat(chat),
                "sneaky",
                vec![incoming("a.png", "image/png", 4)],
            )
            .is_err());
        assert_eq!(fx.blob_count(), 0);
    }

    #[test]
    fn sending_to_a_user_opens_the_direct_chat() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");

        let first = fx
            .core
            .ledger
            .append(&ann, SendTarget::User(bob.user_id), "hello", vec![])
            .unwrap();
        let reply = fx
            .core
            .ledger
            .append(&bob, SendTarget::User(ann.user_id), "hi back", vec![])
            .unwrap();
        assert_eq!(first.chat_id, reply.chat_id);

        let direct = fx
            .core
            .membership
            .create_or_reuse_direct_chat(&ann, bob.user_id)
            .unwrap();
        assert_eq!(direct.chat_id, first.chat_id);
        assert!(!direct.created);

        assert!(matches!(
            fx.core
                .ledger
                .append(&ann, SendTarget::User(ann.user_id), "me", vec![]),
            Err(CoreError::BadRequest(_))
        ));
    }

    #[test]
    fn sent_at_is_strictly_increasing() {
        let fx = fixture();
        let ann = fx.user("ann");
        let bob = fx.user("bob");
        let chat = fx.group(ann, &[bob]);

        for i in 0..10 {
            fx.core
                .ledger
                .append(&ann, SendTarget::Chat(chat), &format!("{i}"), vec![])
                .unwrap();
        }
        let page = fx.core.ledger.list(&ann, chat, PageRequest::default()).unwrap();
        assert!(
            page.entries
                .windows(2)
                .all(|w| w[0].message.sent_at > w[1].message.sent_at)
        );
    }
}
