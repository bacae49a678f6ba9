//! Registration, OTP delivery, login and logout

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::otp;
use crate::state::AppState;
use crate::store::{normalize_email, Identity, IdentityStore};

use super::session::{clear_session_cookie, issue_session, SessionResponse};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Missing and empty both read as "no email given"
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Create an unverified identity and send its first verification code
pub async fn register<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::Validation("Please provide an email".to_string()));
    }

    if state.store.find_by_email(&email)?.is_some() {
        return Err(ApiError::EmailExists);
    }

    otp::issue_otp(&state.store, &state.notifier, Identity::new(&email))?;

    Ok(Json(MessageResponse {
        success: true,
        message: "OTP sent to your email for verification".to_string(),
    }))
}

/// Send a fresh verification code to an existing identity
pub async fn send_otp<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::Validation("Please provide an email".to_string()));
    }

    let identity = state
        .store
        .find_by_email(&email)?
        .ok_or(ApiError::EmailNotFound)?;

    if identity.verified {
        tracing::debug!(email = %identity.email, "Reissuing OTP for an already verified identity");
    }

    otp::issue_otp(&state.store, &state.notifier, identity)?;

    Ok(Json(MessageResponse {
        success: true,
        message: "OTP sent successfully to your email.".to_string(),
    }))
}

/// Exchange a valid verification code for a session
pub async fn login<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let email = normalize_email(&req.email);
    if email.is_empty() || req.otp.is_empty() {
        return Err(ApiError::Validation(
            "Please provide both email and OTP".to_string(),
        ));
    }

    let identity = otp::verify_otp(&state.store, &email, &req.otp)?;

    let response = issue_session(
        &cookies,
        &state.signer,
        &state.cookie_domain,
        &identity,
        "Login Successful",
    )?;

    Ok(Json(response))
}

/// Clear the session cookie. Works with or without a live session.
pub async fn logout<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    cookies: Cookies,
) -> Json<MessageResponse>
where
    S: IdentityStore,
    N: Notifier,
{
    clear_session_cookie(&cookies, &state.cookie_domain);

    Json(MessageResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}
