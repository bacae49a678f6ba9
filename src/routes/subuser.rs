//! Sub-user endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{normalize_email, IdentityStore, SubUser, SubUserId};

use super::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct CreateSubUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubUserListResponse {
    pub success: bool,
    pub sub_users: Vec<SubUser>,
}

#[derive(Debug, Serialize)]
pub struct SubUserMutationResponse {
    pub success: bool,
    pub message: String,
    pub sub_users: Vec<SubUser>,
}

/// Add a sub-user to the profile
pub async fn create_sub_user<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    CurrentUser(mut identity): CurrentUser,
    Json(req): Json<CreateSubUserRequest>,
) -> Result<Json<SubUserMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    let number = req.number.trim().to_string();

    if name.is_empty() || email.is_empty() || number.is_empty() {
        return Err(ApiError::Validation(
            "Please provide name, email and number".to_string(),
        ));
    }

    // Email and number each identify a sub-user within the profile
    let conflict = identity
        .sub_users
        .iter()
        .any(|s| s.email == email || s.number == number);
    if conflict {
        return Err(ApiError::DuplicateSubUser);
    }

    identity.sub_users.push(SubUser {
        id: SubUserId::new(),
        name,
        email,
        number,
    });
    let identity = state.store.save(identity)?;

    Ok(Json(SubUserMutationResponse {
        success: true,
        message: "Sub-user added successfully".to_string(),
        sub_users: identity.sub_users,
    }))
}

/// List the profile's sub-users
pub async fn list_sub_users(CurrentUser(identity): CurrentUser) -> Json<SubUserListResponse> {
    Json(SubUserListResponse {
        success: true,
        sub_users: identity.sub_users,
    })
}

/// Apply partial updates to one sub-user
pub async fn update_sub_user<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(sub_user_id): Path<String>,
    CurrentUser(mut identity): CurrentUser,
    Json(req): Json<UpdateSubUserRequest>,
) -> Result<Json<SubUserMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let sub_user_id = SubUserId::parse(&sub_user_id).map_err(|_| ApiError::SubUserNotFound)?;

    let idx = identity
        .sub_users
        .iter()
        .position(|s| s.id == sub_user_id)
        .ok_or(ApiError::SubUserNotFound)?;

    let mut updated = identity.sub_users[idx].clone();
    if let Some(name) = req.name {
        updated.name = name;
    }
    if let Some(email) = req.email {
        updated.email = normalize_email(&email);
    }
    if let Some(number) = req.number {
        updated.number = number;
    }

    if updated.name.trim().is_empty()
        || updated.email.is_empty()
        || updated.number.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "Please provide name, email and number".to_string(),
        ));
    }

    let collides = identity
        .sub_users
        .iter()
        .enumerate()
        .any(|(i, s)| i != idx && (s.email == updated.email || s.number == updated.number));
    if collides {
        return Err(ApiError::DuplicateSubUser);
    }

    identity.sub_users[idx] = updated;
    let identity = state.store.save(identity)?;

    Ok(Json(SubUserMutationResponse {
        success: true,
        message: "Sub-user updated successfully".to_string(),
        sub_users: identity.sub_users,
    }))
}

/// Remove a sub-user. Deleting one that is already gone is not an error.
pub async fn delete_sub_user<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(sub_user_id): Path<String>,
    CurrentUser(mut identity): CurrentUser,
) -> Result<Json<SubUserMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    if let Ok(sub_user_id) = SubUserId::parse(&sub_user_id) {
        identity.sub_users.retain(|s| s.id != sub_user_id);
        identity = state.store.save(identity)?;
    }

    Ok(Json(SubUserMutationResponse {
        success: true,
        message: "Sub-user deleted successfully".to_string(),
        sub_users: identity.sub_users,
    }))
}
