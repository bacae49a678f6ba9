//! Profile read, update and delete

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{normalize_email, IdentityProfile, IdentityStore};

use super::account::MessageResponse;
use super::session::{clear_session_cookie, issue_session, CurrentUser};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: IdentityProfile,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: IdentityProfile,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub number: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub message: String,
    pub user: IdentityProfile,
}

/// Return the authenticated identity
pub async fn get_user(CurrentUser(identity): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: identity.into(),
    })
}

/// Return the profile and roll the session forward with a fresh token
pub async fn get_profile<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    cookies: Cookies,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let greeting = match &identity.name {
        Some(name) => format!("Welcome back {name}"),
        None => format!("Welcome back {}", identity.email),
    };

    let session = issue_session(
        &cookies,
        &state.signer,
        &state.cookie_domain,
        &identity,
        &greeting,
    )?;

    Ok(Json(ProfileResponse {
        success: true,
        message: session.message,
        user: identity.into(),
        token: session.token,
    }))
}

/// Apply partial updates to the profile fields
pub async fn update_profile<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    CurrentUser(mut identity): CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdateResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    if let Some(name) = req.name {
        identity.name = Some(name);
    }
    if let Some(number) = req.number {
        identity.number = Some(number);
    }
    if let Some(email) = req.email {
        let email = normalize_email(&email);
        if email.is_empty() {
            return Err(ApiError::Validation("Please provide an email".to_string()));
        }
        identity.email = email;
    }

    let identity = state.store.save(identity)?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        message: "Profile updated successfully".to_string(),
        user: identity.into(),
    }))
}

/// Delete the identity and end the session
pub async fn delete_profile<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    cookies: Cookies,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let deleted = state.store.delete_by_id(&identity.id)?;
    if !deleted {
        return Err(ApiError::UserNotFound);
    }

    clear_session_cookie(&cookies, &state.cookie_domain);

    Ok(Json(MessageResponse {
        success: true,
        message: "User profile deleted successfully".to_string(),
    }))
}
