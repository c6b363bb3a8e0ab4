use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::Response,
};

use courier_core::Caller;
use courier_core::directory::ProfileUpdate;
use courier_types::api::{OkResponse, ProfileResponse, PublicProfileResponse, UpdateProfileRequest};

use crate::auth::AppState;
use crate::error::{AppError, blocking};
use crate::extract::AppJson;
use crate::validation;

/// GET /users/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ProfileResponse>, AppError> {
    let directory = state.core.directory.clone();
    let profile = blocking(move || directory.profile(&caller)).await?;

    Ok(Json(ProfileResponse {
        ok: true,
        id: profile.id,
        name: profile.name,
        lastname: profile.lastname,
        bio: profile.bio,
        email: profile.email,
    }))
}

/// PATCH /users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<Json<OkResponse>, AppError> {
    validation::person_name("name", &req.name)?;
    validation::person_name("lastname", &req.lastname)?;
    validation::bio(req.bio.as_deref())?;

    let directory = state.core.directory.clone();
    blocking(move || {
        directory.update_profile(
            &caller,
            &ProfileUpdate {
                name: req.name.trim(),
                lastname: req.lastname.trim(),
                bio: req.bio.as_deref(),
            },
        )
    })
    .await?;

    Ok(Json(OkResponse::ok()))
}

/// DELETE /users/profile
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let directory = state.core.directory.clone();
    blocking(move || directory.delete_profile(&caller)).await?;
    Ok(Json(OkResponse::ok()))
}

/// GET /users/{user_id}
pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_caller): Extension<Caller>,
) -> Result<Json<PublicProfileResponse>, AppError> {
    let directory = state.core.directory.clone();
    let profile = blocking(move || directory.public_profile(user_id)).await?;

    Ok(Json(PublicProfileResponse {
        ok: true,
        id: profile.id,
        name: profile.name,
        lastname: profile.lastname,
        bio: profile.bio,
    }))
}

// -- Pictures --

/// PUT /users/profile/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let file = crate::pictures::single_file(multipart).await?;
    let slots = state.core.pictures.clone();
    let picture = blocking(move || slots.upload_avatar(&caller, file)).await?;
    Ok(crate::pictures::created(picture))
}

/// POST /users/profile/wall
pub async fn upload_wall_photo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let file = crate::pictures::single_file(multipart).await?;
    let slots = state.core.pictures.clone();
    let picture = blocking(move || slots.upload_wall_photo(&caller, file)).await?;
    Ok(crate::pictures::created(picture))
}

/// DELETE /users/profile/avatar
pub async fn delete_avatar(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<OkResponse>, AppError> {
    let slots = state.core.pictures.clone();
    blocking(move || slots.delete_avatar(&caller)).await?;
    Ok(Json(OkResponse::ok()))
}

/// GET /users/{user_id}/avatar
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_caller): Extension<Caller>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let slots = state.core.pictures.clone();
    let file = blocking(move || slots.get_avatar(user_id)).await?;
    Ok(crate::files::serve(file, crate::files::Disposition::Inline, &headers))
}

/// GET /users/{user_id}/wall
pub async fn list_wall(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(_caller): Extension<Caller>,
) -> Result<Response, AppError> {
    let slots = state.core.pictures.clone();
    let pictures = blocking(move || slots.list_wall_photos(user_id)).await?;
    Ok(crate::pictures::wall(pictures))
}
