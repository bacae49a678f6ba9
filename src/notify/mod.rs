pub mod console;
pub mod smtp;

pub use console::ConsoleNotifier;
pub use smtp::{SmtpConfig, SmtpNotifier};

/// Trait for delivering notification messages to users
pub trait Notifier: Send + Sync {
    /// Deliver a message. Errors are descriptive strings for logging.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String>;
}

impl Notifier for Box<dyn Notifier> {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        (**self).send(to, subject, body)
    }
}
