//! Oh! SanSi CLI - sign in to the olympiad platform and talk to its API
//! from the terminal.

mod cli;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use sansi_core::api::ApiError;
use sansi_core::config::StorageKind;
use sansi_core::{ApiClient, Config, RequestOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Command, USAGE};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Config file plus environment overrides
fn load_config() -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Ok(root) = std::env::var("SANSI_API_ROOT") {
        debug!(api_root = %root, "API root overridden from environment");
        config.api_root = root;
    }
    if let Ok(storage) = std::env::var("SANSI_STORAGE") {
        config.storage = storage.parse::<StorageKind>().context("Invalid SANSI_STORAGE")?;
    }

    Ok(config)
}

/// Load the configuration and open the session it points at.
fn connect() -> Result<(Config, ApiClient)> {
    let config = load_config()?;
    let store = Arc::new(config.open_store()?);
    let api = ApiClient::from_config(&config, store)?;
    info!(api_root = %config.api_root, "Oh! SanSi CLI starting");
    Ok((config, api))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    // Help never touches the config or the session store
    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Login { email } => {
            let (mut config, api) = connect()?;
            login(&api, &mut config, email).await
        }
        Command::Logout => {
            let (_, api) = connect()?;
            api.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::WhoAmI => {
            let (_, api) = connect()?;
            whoami(&api);
            Ok(())
        }
        Command::Request { method, path, body } => {
            let (_, api) = connect()?;
            let mut options = RequestOptions::new().method(method);
            if let Some(body) = body {
                options = options.json(body);
            }
            let reply = api.request(&path, options).await.map_err(explain)?;
            match reply {
                Some(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                None => eprintln!("(empty response)"),
            }
            Ok(())
        }
        Command::ResetPassword { reset_token } => {
            let (_, api) = connect()?;
            let password = prompt_new_password()?;
            match api.reset_password(&reset_token, &password).await.map_err(explain)? {
                Some(user) => println!("Password updated. Signed in as {}.", user.full_name),
                None => println!("Password updated. You can now sign in."),
            }
            Ok(())
        }
    }
}

async fn login(api: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

    eprintln!("Authenticating...");
    let user = api.login(&email, &password).await.map_err(explain)?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!(
        "Signed in as {} <{}> ({}).",
        user.full_name,
        user.email,
        user.role.display_name()
    );
    Ok(())
}

fn whoami(api: &ApiClient) {
    let store = api.store();
    match store.session() {
        Some(session) if store.is_logged_in() => {
            println!("{} <{}>", session.user.full_name, session.user.email);
            println!("Role:    {}", session.user.role.display_name());
            println!(
                "Expires: {} ({} min left)",
                session.expires_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                session.minutes_until_expiry()
            );
        }
        Some(_) => println!("Session expired. Run `sansi login` to sign in again."),
        None => println!("Not signed in."),
    }
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();
    if email.is_empty() {
        anyhow::bail!("Email required");
    }
    Ok(email)
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Attach a hint for errors the user can act on.
fn explain(err: ApiError) -> anyhow::Error {
    let hint = match err {
        ApiError::SessionExpired(_) => Some("run `sansi login` to sign in again"),
        ApiError::NetworkUnreachable(_) | ApiError::Timeout(_) => {
            Some("check SANSI_API_ROOT and your connection")
        }
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::anyhow!("{}\nHint: {}", err, hint),
        None => anyhow::Error::new(err),
    }
}
