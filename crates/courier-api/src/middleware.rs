use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use courier_core::Caller;
use courier_types::api::Claims;

use crate::auth::AppState;
use crate::error::{AppError, blocking};

/// Resolve the bearer token into a `Caller` extension. The user must still
/// exist; a token for a deleted account is treated as invalid.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::TokenMissing)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::TokenMissing)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::TokenInvalid)?;

    let user_id = token_data.claims.sub;
    let directory = state.core.directory.clone();
    if !blocking(move || directory.exists(user_id)).await? {
        return Err(AppError::TokenInvalid);
    }

    req.extensions_mut().insert(Caller::new(user_id));
    Ok(next.run(req).await)
}
