use super::Notifier;

/// Notifier that prints messages to the console.
///
/// Used in development when no SMTP configuration is present.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        println!("\n========================================");
        println!("EMAIL (console mode)");
        println!("To: {to}");
        println!("Subject: {subject}");
        println!("----------------------------------------");
        println!("{body}");
        println!("========================================\n");

        tracing::info!(to, subject, "Email printed to console");
        Ok(())
    }
}
