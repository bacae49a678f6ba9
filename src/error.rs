use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by API handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("User not found")]
    UserNotFound,

    #[error("Email does not exist. Please use a different email.")]
    EmailNotFound,

    #[error("Email already exists. Please use a different email.")]
    EmailExists,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP has expired. Please request a new OTP.")]
    OtpExpired,

    #[error("Unauthorized. Please log in.")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("User is not verified")]
    NotVerified,

    #[error("Address not found")]
    AddressNotFound,

    #[error("This address already exists in your profile.")]
    DuplicateAddress,

    #[error("Sub-user not found")]
    SubUserNotFound,

    #[error("A sub-user with the same email or number already exists.")]
    DuplicateSubUser,

    #[error("Failed to deliver OTP email")]
    DeliveryFailed,

    #[error("Database operation timed out.")]
    Timeout,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UserNotFound
            | ApiError::EmailNotFound
            | ApiError::AddressNotFound
            | ApiError::SubUserNotFound => StatusCode::NOT_FOUND,

            ApiError::EmailExists
            | ApiError::DuplicateAddress
            | ApiError::DuplicateSubUser => StatusCode::CONFLICT,

            ApiError::InvalidOtp | ApiError::OtpExpired | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }

            ApiError::MissingToken
            | ApiError::InvalidToken
            | ApiError::TokenExpired
            | ApiError::NotVerified => StatusCode::UNAUTHORIZED,

            ApiError::DeliveryFailed => StatusCode::BAD_GATEWAY,

            ApiError::Timeout | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            // Internal details stay out of the response body
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {detail}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": message,
            })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::EmailExists,
            StoreError::Timeout => ApiError::Timeout,
            StoreError::Backend(detail) => ApiError::Internal(detail),
        }
    }
}
