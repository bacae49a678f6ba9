//! Session cookie handling and the authentication gate

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use serde::Serialize;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::{Cookie, Cookies};

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{Identity, IdentityStore, UserId};
use crate::token::TokenSigner;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// How long a session stays valid
pub const SESSION_LIFETIME_DAYS: i64 = 2;

/// Minimal identity view returned alongside a fresh session
#[derive(Debug, Serialize)]
pub struct IdentitySummary {
    pub id: UserId,
    pub email: String,
    pub verified: bool,
}

impl From<&Identity> for IdentitySummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            verified: identity.verified,
        }
    }
}

/// Response body for endpoints that establish a session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub user: IdentitySummary,
    pub token: String,
}

/// Sign a fresh session token and set it as an http-only cookie.
///
/// The token also goes in the body for clients that prefer headers over
/// cookies.
pub fn issue_session(
    cookies: &Cookies,
    signer: &TokenSigner,
    cookie_domain: &str,
    identity: &Identity,
    message: &str,
) -> Result<SessionResponse, ApiError> {
    let token = signer.sign(&identity.id, chrono::Duration::days(SESSION_LIFETIME_DAYS))?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .domain(cookie_domain.to_string())
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::days(SESSION_LIFETIME_DAYS))
        .build();
    cookies.add(cookie);

    Ok(SessionResponse {
        success: true,
        message: message.to_string(),
        user: IdentitySummary::from(identity),
        token,
    })
}

/// Expire the session cookie immediately
pub fn clear_session_cookie(cookies: &Cookies, cookie_domain: &str) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .domain(cookie_domain.to_string())
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(cookie);
}

/// Extractor that authenticates the request from its session cookie.
///
/// Handlers taking a `CurrentUser` only run for a verified identity with a
/// valid, unexpired token. Each failure mode reports its own message so
/// clients can tell a missing login from a stale one.
pub struct CurrentUser(pub Identity);

impl<S, N> FromRequestParts<Arc<AppState<S, N>>> for CurrentUser
where
    S: IdentityStore,
    N: Notifier,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S, N>>,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, e)| ApiError::Internal(e.to_string()))?;

        let token = cookies
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::MissingToken);
        }

        let claims = state.signer.verify(&token)?;

        // The signer leaves expiry to us
        if claims.exp <= Utc::now().timestamp() {
            return Err(ApiError::TokenExpired);
        }

        let user_id = UserId::parse(&claims.sub).map_err(|_| ApiError::InvalidToken)?;

        match state.store.find_by_id(&user_id)? {
            Some(identity) if identity.verified => Ok(CurrentUser(identity)),
            _ => Err(ApiError::NotVerified),
        }
    }
}
