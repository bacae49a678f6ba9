//! Common test utilities for account service integration tests

use std::sync::Arc;
use std::sync::RwLock;

use axum_test::TestServer;
use serde_json::json;

use accountd::{routes, AppState, InMemoryStore, Notifier, TokenSigner};

pub const TEST_SECRET: &str = "test-secret";

/// One message captured by the mock notifier
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mock notifier that captures messages instead of delivering them
#[derive(Default, Clone)]
pub struct MockNotifier {
    /// Captured messages, oldest first
    pub sent: Arc<RwLock<Vec<SentMessage>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the last verification code sent to an email
    pub fn get_code(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == email)
            .and_then(|m| extract_code(&m.body))
    }

    /// Number of messages sent to an email
    pub fn count_for(&self, email: &str) -> usize {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.to == email)
            .count()
    }
}

impl Notifier for MockNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        self.sent.write().unwrap().push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// First run of exactly six digits in the text
fn extract_code(body: &str) -> Option<String> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 6 {
                return Some(body[start..i].to_string());
            }
        } else {
            i += 1;
        }
    }
    None
}

pub type TestState = Arc<AppState<InMemoryStore, MockNotifier>>;

/// Create a test server over in-memory storage with a mock notifier
pub fn create_test_server() -> (TestServer, MockNotifier, TestState) {
    let notifier = MockNotifier::new();

    let state = Arc::new(AppState::new(
        TokenSigner::new(TEST_SECRET),
        "localhost",
        InMemoryStore::new(),
        notifier.clone(),
    ));

    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, notifier, state)
}

/// Helper to register an email, log in with the delivered code and return
/// the session token
pub async fn register_and_login(
    server: &TestServer,
    notifier: &MockNotifier,
    email: &str,
) -> String {
    // Register
    let response = server
        .post("/api/users/register")
        .json(&json!({ "email": email }))
        .await;
    assert_eq!(response.status_code(), 200);

    // Get verification code
    let code = notifier.get_code(email).expect("No verification code sent");

    // Log in with it
    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": email, "otp": code }))
        .await;
    assert_eq!(response.status_code(), 200);

    // Extract session cookie
    response
        .maybe_cookie("token")
        .expect("No session cookie")
        .value()
        .to_string()
}
