use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accountd::{
    load_or_generate_secret, otp, routes, AppState, Config, ConsoleNotifier, IdentityStore,
    InMemoryStore, Notifier, SmtpConfig, SmtpNotifier, SqliteStore, TokenSigner,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accountd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "Starting account service");

    let signer = TokenSigner::new(&load_or_generate_secret());

    let notifier: Box<dyn Notifier> = match SmtpConfig::from_env() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Using SMTP email delivery");
            Box::new(SmtpNotifier::new(smtp).map_err(anyhow::Error::msg)?)
        }
        None => {
            tracing::info!("No SMTP configuration found, printing emails to the console");
            Box::new(ConsoleNotifier)
        }
    };

    match config.database_path.clone() {
        Some(path) => {
            tracing::info!(%path, "Using SQLite storage");
            let store = SqliteStore::open(&path)?;
            serve(config, signer, store, notifier).await
        }
        None => {
            tracing::info!("Using in-memory storage");
            serve(config, signer, InMemoryStore::new(), notifier).await
        }
    }
}

async fn serve<S>(
    config: Config,
    signer: TokenSigner,
    store: S,
    notifier: Box<dyn Notifier>,
) -> Result<()>
where
    S: IdentityStore + 'static,
{
    let state = Arc::new(AppState::new(
        signer,
        config.cookie_domain.clone(),
        store,
        notifier,
    ));

    otp::spawn_expiry_purge(state.clone());

    let app = routes::create_router_with_cors(state, &config.cors_origin);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
