use std::sync::Arc;

use tracing::{info, warn};

use courier_db::models::PictureRow;
use courier_db::{Database, pictures};
use courier_types::models::Placement;

use crate::attachments::{IncomingFile, content_type_for};
use crate::authz::require_user;
use crate::blob::{self, BlobStore, Namespace, ServedFile};
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

const DEFAULT_AVATAR_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="128" height="128" viewBox="0 0 128 128"><rect width="128" height="128" fill="#d5d9e0"/><circle cx="64" cy="50" r="24" fill="#9aa3b1"/><path d="M20 116c6-26 24-38 44-38s38 12 44 38z" fill="#9aa3b1"/></svg>"##;

/// A user's avatar and wall photos.
#[derive(Clone)]
pub struct PictureSlots {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl PictureSlots {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, max_bytes: usize) -> Self {
        Self {
            db,
            blobs,
            max_bytes,
        }
    }

    /// Make `file` the caller's avatar. The previous avatar stays as a wall photo.
    pub fn upload_avatar(&self, caller: &Caller, file: IncomingFile) -> CoreResult<PictureRow> {
        let picture = self.store(caller, file, Placement::Avatar)?;
        info!("User {} set avatar {}", caller.user_id, picture.id);
        Ok(picture)
    }

    pub fn upload_wall_photo(&self, caller: &Caller, file: IncomingFile) -> CoreResult<PictureRow> {
        let picture = self.store(caller, file, Placement::Wall)?;
        info!("User {} added wall photo {}", caller.user_id, picture.id);
        Ok(picture)
    }

    /// The user's avatar bytes, or the placeholder when they have none.
    pub fn get_avatar(&self, user_id: i64) -> CoreResult<ServedFile> {
        let avatar = self.db.with_conn(|conn| {
            require_user(conn, user_id)?;
            Ok::<_, CoreError>(pictures::avatar(conn, user_id)?)
        })?;

        let Some(avatar) = avatar else {
            return Ok(default_avatar());
        };
        match self.blobs.read(&avatar.stored_path)? {
            Some(bytes) => Ok(ServedFile {
                filename: avatar.filename,
                content_type: avatar.content_type,
                sha256: None,
                bytes,
            }),
            None => {
                warn!(
                    "Avatar {} of user {} has no blob, serving the placeholder",
                    avatar.id, user_id
                );
                Ok(default_avatar())
            }
        }
    }

    pub fn delete_avatar(&self, caller: &Caller) -> CoreResult<()> {
        let removed = self.db.transaction(|tx| {
            let Some(avatar) = pictures::avatar(tx, caller.user_id)? else {
                return Err(CoreError::not_found("No avatar found"));
            };
            pictures::delete(tx, avatar.id)?;
            Ok(avatar)
        })?;

        blob::discard(self.blobs.as_ref(), &[removed.stored_path]);
        info!("User {} removed avatar {}", caller.user_id, removed.id);
        Ok(())
    }

    /// Wall photos of any user, newest first.
    pub fn list_wall_photos(&self, user_id: i64) -> CoreResult<Vec<PictureRow>> {
        self.db.with_conn(|conn| {
            require_user(conn, user_id)?;
            Ok(pictures::wall(conn, user_id)?)
        })
    }

    pub fn fetch_picture(&self, picture_id: i64) -> CoreResult<ServedFile> {
        let picture = self
            .db
            .with_conn(|conn| pictures::by_id(conn, picture_id))?
            .ok_or_else(|| CoreError::not_found("Picture not found"))?;

        let bytes = self
            .blobs
            .read(&picture.stored_path)?
            .ok_or_else(|| CoreError::not_found("Picture not found"))?;

        Ok(ServedFile {
            filename: picture.filename,
            content_type: picture.content_type,
            sha256: None,
            bytes,
        })
    }

    fn check(&self, file: &IncomingFile) -> CoreResult<String> {
        if file.data.is_empty() {
            return Err(CoreError::bad_request("Picture is empty"));
        }
        if file.data.len() > self.max_bytes {
            return Err(CoreError::too_large(format!(
                "Picture exceeds {} bytes",
                self.max_bytes
            )));
        }
        let content_type = content_type_for(file);
        if !IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(CoreError::bad_request(format!(
                "Picture type '{}' is not allowed",
                content_type
            )));
        }
        Ok(content_type)
    }

    fn store(&self, caller: &Caller, file: IncomingFile, placement: Placement) -> CoreResult<PictureRow> {
        let content_type = self.check(&file)?;
        let stored = self
            .blobs
            .put(Namespace::Pictures, &file.filename, &file.data)?;

        let result = self.db.transaction(|tx| {
            require_user(tx, caller.user_id)?;
            if placement == Placement::Avatar {
                pictures::demote_avatar(tx, caller.user_id)?;
            }
            let id = pictures::insert(
                tx,
                &pictures::NewPicture {
                    owner_id: caller.user_id,
                    filename: &file.filename,
                    stored_path: &stored.stored_path,
                    content_type: &content_type,
                    size: stored.size as i64,
                    placement,
                },
            )?;
            pictures::by_id(tx, id)?
                .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("Picture {} vanished", id)))
        });

        if result.is_err() {
            blob::discard(self.blobs.as_ref(), &[stored.stored_path]);
        }
        result
    }
}

fn default_avatar() -> ServedFile {
    ServedFile {
        filename: "avatar.svg".to_string(),
        content_type: "image/svg+xml".to_string(),
        sha256: None,
        bytes: DEFAULT_AVATAR_SVG.as_bytes().to_vec(),
    }
}
