//! Field checks applied to request bodies before any core call.

use courier_core::{CoreError, CoreResult};

pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_NAME_CHARS: usize = 32;
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 64;
pub const MAX_BIO_CHARS: usize = 255;

pub fn email(value: &str) -> CoreResult<()> {
    let mut parts = value.split('@');
    let well_formed = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !value.chars().any(char::is_whitespace)
        }
        _ => false,
    };
    if !well_formed || value.chars().count() > MAX_EMAIL_CHARS {
        return Err(CoreError::bad_request("Invalid email address"));
    }
    Ok(())
}

pub fn person_name(field: &str, value: &str) -> CoreResult<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(CoreError::bad_request(format!(
            "{} must be 1-{} characters",
            field, MAX_NAME_CHARS
        )));
    }
    Ok(())
}

pub fn password(value: &str) -> CoreResult<()> {
    let len = value.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len) {
        return Err(CoreError::bad_request(format!(
            "password must be {}-{} characters",
            MIN_PASSWORD_CHARS, MAX_PASSWORD_CHARS
        )));
    }
    Ok(())
}

pub fn bio(value: Option<&str>) -> CoreResult<()> {
    match value {
        Some(bio) if bio.chars().count() > MAX_BIO_CHARS => Err(CoreError::bad_request(format!(
            "bio must be at most {} characters",
            MAX_BIO_CHARS
        ))),
        _ => Ok(()),
    }
}
