pub mod attachments;
pub mod authz;
pub mod blob;
pub mod context;
pub mod directory;
pub mod error;
pub mod friendship;
pub mod ledger;
pub mod membership;
pub mod pictures;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use courier_db::Database;

pub use attachments::{AttachmentLimits, AttachmentStore, IncomingFile};
pub use blob::{BlobStore, FsBlobStore, ServedFile};
pub use courier_db::models::{ChatRow, MemberRow, MessageRow, PictureRow};
pub use context::Caller;
pub use directory::Directory;
pub use error::{CoreError, CoreResult};
pub use friendship::Friendships;
pub use ledger::Ledger;
pub use membership::Membership;
pub use pictures::PictureSlots;

/// Every component wired against one store handle and one blob store.
#[derive(Clone)]
pub struct Core {
    pub directory: Directory,
    pub friendships: Friendships,
    pub membership: Membership,
    pub ledger: Ledger,
    pub attachments: AttachmentStore,
    pub pictures: PictureSlots,
}

impl Core {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, limits: AttachmentLimits) -> Self {
        let max_picture_bytes = limits.max_file_bytes;
        let attachments = AttachmentStore::new(db.clone(), blobs.clone(), limits);
        Self {
            directory: Directory::new(db.clone(), blobs.clone()),
            friendships: Friendships::new(db.clone()),
            membership: Membership::new(db.clone(), blobs.clone()),
            ledger: Ledger::new(db.clone(), blobs.clone(), attachments.clone()),
            pictures: PictureSlots::new(db, blobs, max_picture_bytes),
            attachments,
        }
    }
}
