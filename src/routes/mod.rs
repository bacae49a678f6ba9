pub mod account;
pub mod address;
pub mod profile;
pub mod session;
pub mod subuser;

use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::IdentityStore;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Create the application router with the default CORS origin
pub fn create_router<S, N>(state: Arc<AppState<S, N>>) -> Router
where
    S: IdentityStore + 'static,
    N: Notifier + 'static,
{
    create_router_with_cors(state, DEFAULT_CORS_ORIGIN)
}

/// Create the application router, allowing the given origin to send
/// credentialed requests
pub fn create_router_with_cors<S, N>(state: Arc<AppState<S, N>>, cors_origin: &str) -> Router
where
    S: IdentityStore + 'static,
    N: Notifier + 'static,
{
    let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!(cors_origin, "Invalid CORS origin, falling back to default");
        HeaderValue::from_static(DEFAULT_CORS_ORIGIN)
    });

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/api/users/register", post(account::register))
        .route("/api/users/send-otp", post(account::send_otp))
        .route("/api/users/login", post(account::login))
        .route("/api/users/logout", post(account::logout))
        .route("/api/users/me", get(profile::get_user))
        .route(
            "/api/users/profile",
            get(profile::get_profile)
                .put(profile::update_profile)
                .delete(profile::delete_profile),
        )
        .route(
            "/api/users/address",
            get(address::list_addresses).post(address::create_address),
        )
        .route(
            "/api/users/address/{address_id}",
            put(address::update_address).delete(address::delete_address),
        )
        .route(
            "/api/users/subuser",
            get(subuser::list_sub_users).post(subuser::create_sub_user),
        )
        .route(
            "/api/users/subuser/{sub_user_id}",
            put(subuser::update_sub_user).delete(subuser::delete_sub_user),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
