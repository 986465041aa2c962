use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::accounts::domain::{check_delete_confirmation, validate_avatar, validate_password};
use crate::accounts::{AccountError, AvatarChange, Email, Identity, ProfileUpdate};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session;
use crate::config::AuthConfig;
use crate::db::RepositoryError;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, SessionToken};
use crate::routes::forms::MultipartForm;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct DeleteAccountRequest {
    pub confirmation: String,
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Open a session for `identity` and answer with it plus the cookie
fn signed_in(state: &AppState, status: StatusCode, identity: Identity) -> AppResult<Response> {
    let token = session::create_session(&state.db, &identity, state.config.auth.session_hours)?;
    Ok((
        status,
        [(header::SET_COOKIE, session_cookie(&state.config.auth, &token))],
        Json(identity),
    )
        .into_response())
}

/// Fresh copy of the signed-in account; the session snapshot may be stale
async fn reload(state: &AppState, identity: &Identity) -> AppResult<Identity> {
    state
        .accounts
        .get(&identity.id)
        .await?
        .ok_or_else(|| AccountError::UserNotFound.into())
}

// -- Handlers --

/// POST /auth/register: create a citizen account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let email = Email::parse(&req.email)?;
    validate_password(&req.password)?;
    let identity = Identity::register(email, &req.name, Utc::now())?;

    if state.accounts.find_by_email(&identity.email).await?.is_some() {
        return Err(AccountError::UserExists.into());
    }

    let hash = hash_password(&req.password, state.config.auth.bcrypt_cost).await?;
    match state.accounts.create(&identity, &hash).await {
        Ok(()) => {}
        // Lost a race with a concurrent registration of the same email
        Err(RepositoryError::Conflict(_)) => return Err(AccountError::UserExists.into()),
        Err(e) => return Err(e.into()),
    }

    tracing::info!("Registered {} ({})", identity.email, identity.id);
    signed_in(&state, StatusCode::CREATED, identity)
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = Email::parse(&req.email).map_err(|_| AccountError::InvalidCredentials)?;
    let (identity, hash) = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    if !verify_password(&req.password, &hash).await? {
        tracing::info!("Failed login for {}", email);
        return Err(AccountError::InvalidCredentials.into());
    }

    tracing::info!("{} signed in", identity.email);
    signed_in(&state, StatusCode::OK, identity)
}

/// POST /auth/logout: always clears the cookie
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if let Some(token) = token {
        if let Err(e) = session::delete_session(&state.db, &token) {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
    )
        .into_response())
}

/// POST /auth/reset-password: records that a reset link would be sent
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let email = Email::parse(&req.email).map_err(|_| AccountError::UserNotFound)?;
    if state.accounts.find_by_email(&email).await?.is_none() {
        return Err(AccountError::UserNotFound.into());
    }

    tracing::info!("Password reset link issued for {}", email);
    Ok(Json(serde_json::json!({
        "message": format!("Password reset link sent to {}", email)
    })))
}

/// GET /auth/me
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

/// PUT /profile: multipart with `name`, optional `email` echo, optional
/// `avatar` file, optional `removeAvatar=true`
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<Identity>> {
    let current = reload(&state, &identity).await?;
    let (fields, mut avatars) = MultipartForm::read(multipart).await?.take_files("avatar");

    let avatar = avatars.pop();
    if let Some(ref upload) = avatar {
        validate_avatar(&upload.content_type, upload.len())?;
    }

    let remove = fields
        .get("removeAvatar")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let update = ProfileUpdate {
        name: fields.get("name").cloned(),
        email: fields.get("email").cloned(),
        avatar: if remove {
            AvatarChange::Remove
        } else {
            AvatarChange::Keep
        },
    };
    let previous_avatar = current.avatar.clone();
    let mut updated = current.apply_profile(update)?;

    let new_avatar = match avatar {
        Some(upload) => Some(state.media.save(&upload).await?),
        None => None,
    };
    if let Some(url) = &new_avatar {
        updated.avatar = Some(url.clone());
    }
    store_profile(&state, &updated, new_avatar.as_deref()).await?;

    if let Some(old) = previous_avatar.filter(|old| updated.avatar.as_ref() != Some(old)) {
        if let Err(e) = state.media.remove(&old).await {
            tracing::warn!("Could not remove old avatar {}: {}", old, e);
        }
    }

    tracing::info!("Profile updated for {}", updated.email);
    Ok(Json(updated))
}

/// Persist a profile and rewrite live sessions. A just-uploaded avatar is
/// deleted again when the write fails.
async fn store_profile(
    state: &AppState,
    updated: &Identity,
    new_avatar: Option<&str>,
) -> AppResult<()> {
    let result: AppResult<()> = match state.accounts.update_profile(updated).await {
        Ok(true) => session::refresh_identity(&state.db, updated)
            .map(|_| ())
            .map_err(Into::into),
        Ok(false) => Err(AccountError::UserNotFound.into()),
        Err(e) => Err(e.into()),
    };

    if result.is_err() {
        if let Some(url) = new_avatar {
            if let Err(e) = state.media.remove(url).await {
                tracing::warn!("Could not remove orphaned avatar {}: {}", url, e);
            }
        }
    }
    result
}

/// POST /profile/password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let hash = state
        .accounts
        .password_hash(&identity.id)
        .await?
        .ok_or(AccountError::UserNotFound)?;

    if !verify_password(&req.current_password, &hash).await? {
        return Err(AccountError::WrongPassword.into());
    }
    validate_password(&req.new_password)?;

    let new_hash = hash_password(&req.new_password, state.config.auth.bcrypt_cost).await?;
    if !state
        .accounts
        .update_password(&identity.id, &new_hash)
        .await?
    {
        return Err(AccountError::UserNotFound.into());
    }

    tracing::info!("Password changed for {}", identity.email);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /profile: removes the account and every session; reports stay
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(req): Json<DeleteAccountRequest>,
) -> AppResult<Response> {
    check_delete_confirmation(&req.confirmation)?;
    let current = reload(&state, &identity).await?;

    if !state.accounts.delete(&current.id).await? {
        return Err(AccountError::UserNotFound.into());
    }
    if let Some(avatar) = current.avatar.as_deref() {
        if let Err(e) = state.media.remove(avatar).await {
            tracing::warn!("Could not remove avatar {}: {}", avatar, e);
        }
    }

    tracing::info!("Deleted account {} ({})", current.email, current.id);
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_state;
    use crate::config::Config;
    use crate::db;
    use crate::storage::{Upload, MEDIA_URL_PREFIX};

    #[test]
    fn session_cookie_uses_configured_name_and_lifetime() {
        let auth = AuthConfig {
            cookie_name: "sid".into(),
            session_hours: 2,
            bcrypt_cost: 4,
        };
        let cookie = session_cookie(&auth, "tok");
        assert!(cookie.starts_with("sid=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[test]
    fn clearing_cookie_expires_it() {
        let cookie = clear_session_cookie(&AuthConfig::default());
        assert!(cookie.starts_with("bhimdatta_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn failed_profile_write_removes_new_avatar() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::for_data_dir(tmp.path());
        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();
        let state = build_state(pool, config);

        let url = state
            .media
            .save(&Upload {
                file_name: Some("me.png".into()),
                content_type: "image/png".into(),
                bytes: b"png".to_vec(),
            })
            .await
            .unwrap();
        let name = url.strip_prefix(MEDIA_URL_PREFIX).unwrap();
        assert!(state.media.load(name).await.unwrap().is_some());

        // Never stored, so the update matches no row
        let mut ghost = Identity::register(
            Email::parse("ghost@example.com").unwrap(),
            "Ghost",
            Utc::now(),
        )
        .unwrap();
        ghost.avatar = Some(url.clone());

        let err = store_profile(&state, &ghost, Some(&url)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(state.media.load(name).await.unwrap().is_none());
    }
}
