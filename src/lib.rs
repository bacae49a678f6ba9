//! Account service with OTP email verification and JWT cookie sessions.
//!
//! Identities register with an email address, prove ownership of it with a
//! short-lived one-time code, and then hold a session via a signed http-only
//! cookie. Verified identities manage a profile with owned addresses and
//! sub-users.

pub mod config;
pub mod error;
pub mod notify;
pub mod otp;
pub mod routes;
pub mod state;
pub mod store;
pub mod token;

pub use config::{load_or_generate_secret, Config};
pub use error::ApiError;
pub use notify::{ConsoleNotifier, Notifier, SmtpConfig, SmtpNotifier};
pub use state::AppState;
pub use store::{IdentityStore, InMemoryStore, SqliteStore};
pub use token::TokenSigner;
