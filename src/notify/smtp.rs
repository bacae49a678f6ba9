use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::Notifier;

/// SMTP configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Load SMTP configuration from environment variables.
    ///
    /// Returns `None` unless SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and
    /// FROM_EMAIL are all present.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        let username = std::env::var("SMTP_USERNAME").ok()?;
        let password = std::env::var("SMTP_PASSWORD").ok()?;
        let from_email = std::env::var("FROM_EMAIL").ok()?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(465);
        let from_name = std::env::var("FROM_NAME").ok();

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            from_name,
        })
    }
}

/// Notifier that delivers messages over SMTP
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build a transport from the config and verify the connection
    pub fn new(config: SmtpConfig) -> Result<Self, String> {
        let from = match &config.from_name {
            Some(name) => format!("{name} <{}>", config.from_email),
            None => config.from_email.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| format!("invalid FROM_EMAIL: {e}"))?;

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| format!("failed to build SMTP transport: {e}"))?
            .port(config.port)
            .credentials(credentials)
            .build();

        match transport.test_connection() {
            Ok(true) => tracing::info!(host = %config.host, "SMTP connection verified"),
            Ok(false) => return Err("SMTP server rejected the connection".to_string()),
            Err(e) => return Err(format!("SMTP connection test failed: {e}")),
        }

        Ok(Self { transport, from })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| format!("invalid recipient address: {e}"))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| format!("failed to build email: {e}"))?;

        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| format!("failed to send email: {e}"))
    }
}
