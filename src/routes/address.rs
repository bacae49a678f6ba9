//! Address book endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{Address, AddressId, IdentityStore};

use super::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddressListResponse {
    pub success: bool,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct AddressMutationResponse {
    pub success: bool,
    pub message: String,
    pub addresses: Vec<Address>,
}

/// Two addresses are the same when every field matches
fn same_fields(a: &Address, b: &Address) -> bool {
    a.house_number == b.house_number
        && a.street == b.street
        && a.city == b.city
        && a.state == b.state
        && a.postal_code == b.postal_code
}

/// Add an address to the profile
pub async fn create_address<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    CurrentUser(mut identity): CurrentUser,
    Json(req): Json<AddressRequest>,
) -> Result<Json<AddressMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let new_address = Address {
        id: AddressId::new(),
        house_number: req.house_number,
        street: req.street,
        city: req.city,
        state: req.state,
        postal_code: req.postal_code,
    };

    if identity.addresses.iter().any(|a| same_fields(a, &new_address)) {
        return Err(ApiError::DuplicateAddress);
    }

    identity.addresses.push(new_address);
    let identity = state.store.save(identity)?;

    Ok(Json(AddressMutationResponse {
        success: true,
        message: "Address added successfully".to_string(),
        addresses: identity.addresses,
    }))
}

/// List the profile's addresses
pub async fn list_addresses(CurrentUser(identity): CurrentUser) -> Json<AddressListResponse> {
    Json(AddressListResponse {
        success: true,
        addresses: identity.addresses,
    })
}

/// Apply partial updates to one address
pub async fn update_address<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(address_id): Path<String>,
    CurrentUser(mut identity): CurrentUser,
    Json(req): Json<AddressRequest>,
) -> Result<Json<AddressMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let address_id = AddressId::parse(&address_id).map_err(|_| ApiError::AddressNotFound)?;

    let idx = identity
        .addresses
        .iter()
        .position(|a| a.id == address_id)
        .ok_or(ApiError::AddressNotFound)?;

    let mut updated = identity.addresses[idx].clone();
    if let Some(v) = req.house_number {
        updated.house_number = Some(v);
    }
    if let Some(v) = req.street {
        updated.street = Some(v);
    }
    if let Some(v) = req.city {
        updated.city = Some(v);
    }
    if let Some(v) = req.state {
        updated.state = Some(v);
    }
    if let Some(v) = req.postal_code {
        updated.postal_code = Some(v);
    }

    let collides = identity
        .addresses
        .iter()
        .enumerate()
        .any(|(i, a)| i != idx && same_fields(a, &updated));
    if collides {
        return Err(ApiError::DuplicateAddress);
    }

    identity.addresses[idx] = updated;
    let identity = state.store.save(identity)?;

    Ok(Json(AddressMutationResponse {
        success: true,
        message: "Address updated successfully".to_string(),
        addresses: identity.addresses,
    }))
}

/// Remove an address. Deleting one that is already gone is not an error.
pub async fn delete_address<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(address_id): Path<String>,
    CurrentUser(mut identity): CurrentUser,
) -> Result<Json<AddressMutationResponse>, ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    if let Ok(address_id) = AddressId::parse(&address_id) {
        identity.addresses.retain(|a| a.id != address_id);
        identity = state.store.save(identity)?;
    }

    Ok(Json(AddressMutationResponse {
        success: true,
        message: "Address deleted successfully".to_string(),
        addresses: identity.addresses,
    }))
}
