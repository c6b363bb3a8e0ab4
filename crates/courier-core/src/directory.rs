use std::sync::{Arc, LazyLock};

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use tracing::{info, warn};

use courier_db::models::UserRow;
use courier_db::{Database, attachments, is_unique_violation, pictures, users};

use crate::authz::require_user;
use crate::blob::{self, BlobStore};
use crate::context::Caller;
use crate::error::{CoreError, CoreResult};
use crate::membership::release_groups;

/// Verified against on unknown emails so a miss costs as much as a wrong
/// password.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"courier-dummy-password", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

pub struct Registration<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub lastname: &'a str,
    pub password: &'a str,
    pub bio: Option<&'a str>,
}

pub struct ProfileUpdate<'a> {
    pub name: &'a str,
    pub lastname: &'a str,
    pub bio: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    pub bio: Option<String>,
    pub email: String,
}

impl From<UserRow> for Profile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            lastname: row.lastname,
            bio: row.bio,
            email: row.email,
        }
    }
}

/// User accounts: registration, credential checks and profile upkeep.
#[derive(Clone)]
pub struct Directory {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
}

impl Directory {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    pub fn register(&self, reg: &Registration<'_>) -> CoreResult<i64> {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(reg.password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?
            .to_string();

        let user_id = self.db.transaction(|tx| {
            if users::by_email(tx, reg.email)?.is_some() {
                return Err(CoreError::conflict("Email already registered"));
            }
            let inserted = users::insert(
                tx,
                &users::NewUser {
                    email: reg.email,
                    name: reg.name,
                    lastname: reg.lastname,
                    bio: reg.bio,
                    password_hash: &password_hash,
                },
            );
            match inserted {
                Ok(id) => Ok(id),
                Err(e) if is_unique_violation(&e) => {
                    Err(CoreError::conflict("Email already registered"))
                }
                Err(e) => Err(e.into()),
            }
        })?;

        info!("Registered user {}", user_id);
        Ok(user_id)
    }

    /// Verify an email/password pair and return the user id.
    pub fn authenticate(&self, email: &str, password: &str) -> CoreResult<i64> {
        let Some(user) = self.db.with_conn(|conn| users::by_email(conn, email))? else {
            if let Some(dummy) = DUMMY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return Err(CoreError::Unauthorized);
        };

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow!("Stored hash for user {} is unreadable: {}", user.id, e))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| CoreError::Unauthorized)?;

        Ok(user.id)
    }

    pub fn exists(&self, user_id: i64) -> CoreResult<bool> {
        Ok(self.db.with_conn(|conn| users::exists(conn, user_id))?)
    }

    pub fn profile(&self, caller: &Caller) -> CoreResult<Profile> {
        self.db
            .with_conn(|conn| users::by_id(conn, caller.user_id))?
            .map(Profile::from)
            .ok_or_else(|| CoreError::not_found("No profile found"))
    }

    /// Any user's profile. The facade strips the email before returning it.
    pub fn public_profile(&self, user_id: i64) -> CoreResult<Profile> {
        let row = self.db.with_conn(|conn| require_user(conn, user_id))?;
        Ok(row.into())
    }

    pub fn update_profile(&self, caller: &Caller, update: &ProfileUpdate<'_>) -> CoreResult<()> {
        let changed = self.db.transaction(|tx| {
            users::update_profile(tx, caller.user_id, update.name, update.lastname, update.bio)
        })?;
        if !changed {
            return Err(CoreError::not_found("No profile found"));
        }
        Ok(())
    }

    /// Delete the account. Owned groups change hands and groups left too
    /// small are dissolved first. Memberships, messages, attachments,
    /// pictures and friendships then go through foreign-key cascades; their
    /// blobs are removed once the delete has committed.
    pub fn delete_profile(&self, caller: &Caller) -> CoreResult<()> {
        let orphaned = self.db.transaction(|tx| {
            if !users::exists(tx, caller.user_id)? {
                return Err(CoreError::not_found("No account found"));
            }
            let mut paths = release_groups(tx, caller.user_id)?;
            paths.extend(attachments::paths_for_author(tx, caller.user_id)?);
            paths.extend(pictures::paths_for_owner(tx, caller.user_id)?);
            users::delete(tx, caller.user_id)?;
            paths.sort();
            paths.dedup();
            Ok(paths)
        })?;

        if !orphaned.is_empty() {
            warn!(
                "Removing {} blobs left by deleted user {}",
                orphaned.len(),
                caller.user_id
            );
        }
        blob::discard(self.blobs.as_ref(), &orphaned);
        info!("Deleted user {}", caller.user_id);
        Ok(())
    }
}
