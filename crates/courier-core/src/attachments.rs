use std::sync::Arc;

use tracing::warn;

use courier_db::rusqlite::Connection;
use courier_db::{Database, attachments};

use crate::authz::visible_attachment;
use crate::blob::{BlobStore, Namespace, ServedFile};
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};

/// An uploaded file as received by the facade, not yet stored anywhere.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    /// Declared by the client. May be empty.
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AttachmentLimits {
    pub max_file_bytes: usize,
    pub max_batch_bytes: usize,
    pub max_files: usize,
    pub allowed_types: Vec<String>,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            max_batch_bytes: 25 * 1024 * 1024,
            max_files: 10,
            allowed_types: [
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "application/pdf",
                "text/plain",
                "video/mp4",
                "audio/mpeg",
                "application/zip",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Validation, storage and retrieval of message attachments.
#[derive(Clone)]
pub struct AttachmentStore {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    limits: Arc<AttachmentLimits>,
}

impl AttachmentStore {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, limits: AttachmentLimits) -> Self {
        Self {
            db,
            blobs,
            limits: Arc::new(limits),
        }
    }

    /// Check a batch before anything is written.
    pub fn validate_incoming(&self, files: &[IncomingFile]) -> CoreResult<()> {
        if files.len() > self.limits.max_files {
            return Err(CoreError::bad_request(format!(
                "At most {} files per message",
                self.limits.max_files
            )));
        }

        let mut total = 0usize;
        for file in files {
            if file.data.is_empty() {
                return Err(CoreError::bad_request(format!("File '{}' is empty", file.filename)));
            }
            if file.data.len() > self.limits.max_file_bytes {
                return Err(CoreError::too_large(format!(
                    "File '{}' exceeds {} bytes",
                    file.filename, self.limits.max_file_bytes
                )));
            }
            let content_type = content_type_for(file);
            if !self.limits.allowed_types.iter().any(|t| *t == content_type) {
                return Err(CoreError::bad_request(format!(
                    "File type '{}' is not allowed",
                    content_type
                )));
            }
            total += file.data.len();
        }

        if total > self.limits.max_batch_bytes {
            return Err(CoreError::too_large(format!(
                "Attachments exceed {} bytes in total",
                self.limits.max_batch_bytes
            )));
        }
        Ok(())
    }

    /// Write one validated file and record it against `message_id` on the
    /// caller's open transaction. The stored path is pushed to `written`
    /// before the row is inserted so the caller can clean up on rollback.
    pub(crate) fn persist(
        &self,
        conn: &Connection,
        file: &IncomingFile,
        message_id: i64,
        written: &mut Vec<String>,
    ) -> CoreResult<i64> {
        let stored = self
            .blobs
            .put(Namespace::Attachments, &file.filename, &file.data)?;
        written.push(stored.stored_path.clone());

        let id = attachments::insert(
            conn,
            &attachments::NewAttachment {
                message_id,
                filename: &file.filename,
                stored_path: &stored.stored_path,
                content_type: &content_type_for(file),
                size: stored.size as i64,
                sha256: &stored.sha256,
            },
        )?;
        Ok(id)
    }

    pub fn fetch(&self, caller: &Caller, message_id: i64, attachment_id: i64) -> CoreResult<ServedFile> {
        let row = self
            .db
            .with_conn(|conn| visible_attachment(conn, caller, message_id, attachment_id))?;

        let Some(bytes) = self.blobs.read(&row.stored_path)? else {
            warn!(
                "Attachment {} has no blob at {}",
                row.id, row.stored_path
            );
            return Err(CoreError::not_found("Attachment not found"));
        };

        Ok(ServedFile {
            filename: row.filename,
            content_type: row.content_type,
            sha256: Some(row.sha256),
            bytes,
        })
    }
}

/// The declared content type without parameters, or a guess from the file
/// name when the client sent nothing useful.
pub fn content_type_for(file: &IncomingFile) -> String {
    let declared = file
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if declared.is_empty() || declared == "application/octet-stream" {
        mime_guess::from_path(&file.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        declared
    }
}
