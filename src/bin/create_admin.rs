use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storefront_api::{
    auth::{AuthConfig, AuthService, UserRole},
    config, db,
    events::{Event, EventSender},
    services::accounts::{AccountService, LogResetNotifier, RegisterUserInput, UserResponse},
};
use tokio::sync::mpsc;
use tracing::debug;

/// Create an administrator account directly in the database
#[derive(Parser)]
#[command(name = "create-admin", about = "Create a storefront administrator", version)]
struct Cli {
    #[arg(long, help = "Email address for the account")]
    email: String,
    #[arg(long, env = "ADMIN_PASSWORD", help = "Password for the account")]
    password: String,
    #[arg(long, default_value = "Store", help = "First name")]
    firstname: String,
    #[arg(long, default_value = "Admin", help = "Last name")]
    lastname: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let db_pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&db_pool)
        .await
        .context("failed running migrations")?;
    let db = Arc::new(db_pool);

    let auth_service = Arc::new(AuthService::new(AuthConfig::new(
        config.jwt_secret.clone(),
        config.auth_issuer.clone(),
        config.auth_audience.clone(),
        config.jwt_ttl(),
    )));

    let (event_tx, mut event_rx) = mpsc::channel::<Event>(32);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(target: "create_admin", event = ?event, "received async event");
        }
    });

    let accounts = AccountService::new(
        db,
        auth_service,
        event_sender,
        Arc::new(LogResetNotifier),
        config.password_reset_ttl(),
    );

    let user = accounts
        .register(
            RegisterUserInput {
                firstname: cli.firstname,
                lastname: cli.lastname,
                email: cli.email,
                password: cli.password,
                avatar: None,
            },
            UserRole::Admin,
        )
        .await
        .context("failed to create administrator")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&UserResponse::from(user))?
    );
    Ok(())
}
