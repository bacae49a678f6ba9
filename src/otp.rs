//! One-time password issuance and verification

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;

use crate::error::ApiError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{normalize_email, Identity, IdentityStore, OtpChallenge};

/// How long a verification code stays valid
pub const OTP_TTL_MINUTES: i64 = 5;

/// Subject line for verification emails
pub const OTP_SUBJECT: &str = "Your verification code";

/// How often the background sweep clears expired codes
const PURGE_INTERVAL_SECS: u64 = 60;

/// Generate a random 6-digit verification code
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100000..1000000);
    code.to_string()
}

fn otp_body(code: &str) -> String {
    format!(
        "Your verification code is: {code}\n\n\
         This code expires in {OTP_TTL_MINUTES} minutes. If you did not request it,\n\
         you can ignore this email."
    )
}

/// Attach a fresh verification code to the identity, persist it, then email it.
///
/// The challenge is stored before the email goes out, so a slow or failed
/// delivery never leaves a code the server does not know about. A previously
/// issued code is replaced and stops working.
pub fn issue_otp<S, N>(store: &S, notifier: &N, mut identity: Identity) -> Result<(), ApiError>
where
    S: IdentityStore,
    N: Notifier,
{
    let code = generate_code();
    identity.otp = Some(OtpChallenge {
        code: code.clone(),
        expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
    });

    let identity = store.save(identity)?;

    if let Err(e) = notifier.send(&identity.email, OTP_SUBJECT, &otp_body(&code)) {
        tracing::error!(email = %identity.email, "Failed to deliver OTP email: {e}");
        return Err(ApiError::DeliveryFailed);
    }

    tracing::debug!(email = %identity.email, "Verification code sent");
    Ok(())
}

/// Check a submitted code against the stored challenge.
///
/// A challenge is single-use: on success it is consumed and the identity
/// marked verified. An expired challenge is cleared when detected, so a
/// retry with the same code reports an invalid rather than expired code.
pub fn verify_otp<S>(store: &S, email: &str, code: &str) -> Result<Identity, ApiError>
where
    S: IdentityStore,
{
    let normalized = normalize_email(email);
    let mut identity = store
        .find_by_email(&normalized)?
        .ok_or(ApiError::EmailNotFound)?;

    let challenge = match identity.otp.take() {
        Some(challenge) => challenge,
        None => return Err(ApiError::InvalidOtp),
    };

    if challenge.is_expired(Utc::now()) {
        store.save(identity)?;
        return Err(ApiError::OtpExpired);
    }

    if challenge.code != code {
        return Err(ApiError::InvalidOtp);
    }

    identity.verified = true;
    let identity = store.save(identity)?;

    tracing::info!(email = %identity.email, "Identity verified");
    Ok(identity)
}

/// Spawn the background task that sweeps expired verification codes.
///
/// Unverified identities whose code lapsed are deleted outright; verified
/// ones only lose the stale challenge.
pub fn spawn_expiry_purge<S, N>(state: Arc<AppState<S, N>>) -> tokio::task::JoinHandle<()>
where
    S: IdentityStore + 'static,
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(PURGE_INTERVAL_SECS));

        loop {
            ticker.tick().await;

            match state.store.purge_expired_otps(Utc::now()) {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Cleared expired verification codes"),
                Err(e) => tracing::error!("Failed to purge expired verification codes: {e}"),
            }
        }
    })
}
