use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use courier_core::Core;
use courier_core::directory::Registration;
use courier_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{AppError, blocking};
use crate::extract::AppJson;
use crate::validation;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub core: Core,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// Upper bound on a whole request body, multipart included.
    pub max_body_bytes: usize,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::email(&req.email)?;
    validation::person_name("name", &req.name)?;
    validation::person_name("lastname", &req.lastname)?;
    validation::password(&req.password)?;
    validation::bio(req.bio.as_deref())?;

    let directory = state.core.directory.clone();
    let user_id = blocking(move || {
        directory.register(&Registration {
            email: &req.email,
            name: req.name.trim(),
            lastname: req.lastname.trim(),
            password: &req.password,
            bio: req.bio.as_deref(),
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { ok: true, user_id }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let directory = state.core.directory.clone();
    let user_id = blocking(move || directory.authenticate(&req.email, &req.password)).await?;

    let access_token = create_token(&state.jwt_secret, user_id, state.token_ttl)
        .map_err(AppError::internal)?;
    info!("User {} logged in", user_id);

    Ok(Json(LoginResponse {
        ok: true,
        user_id,
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub fn create_token(secret: &str, user_id: i64, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
