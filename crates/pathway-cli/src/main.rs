//! Pathway CLI - sign in to the Pathway learning platform from a terminal.
//!
//! Commands:
//! - `pathway login [email]`: sign in and remember the session
//! - `pathway status`: show who is signed in and when the access token expires
//! - `pathway token`: print a fresh access token, refreshing it if due
//! - `pathway logout`: end the session

mod config;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use pathway_core::auth::SignInNotice;
use pathway_core::{
    AuthConfig, Credentials, Observation, SealedFileStore, SessionManager, SessionState,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::CliConfig;

const USAGE: &str = "usage: pathway <login [email] | status | token | logout>";

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

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::FAILURE);
    };

    let auth_config = AuthConfig::from_env().context("Invalid session configuration")?;
    let store = SealedFileStore::new(SealedFileStore::default_dir()?, &auth_config.session_secret)?;
    let manager = SessionManager::new(auth_config, Arc::new(store))?;
    let mut config = CliConfig::load()?;

    match command {
        "login" => login(&manager, &mut config, args.get(2).cloned()).await,
        "status" => status(&manager, &mut config).await,
        "token" => token(&manager, &mut config).await,
        "logout" => logout(&manager, &mut config),
        _ => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn login(
    manager: &SessionManager,
    config: &mut CliConfig,
    email: Option<String>,
) -> Result<ExitCode> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

    match manager.sign_in(&Credentials::new(email.clone(), password)).await {
        Ok(record) => {
            // Replace, not stack, an earlier session
            if let Some(previous) = config.session_id.replace(record.id().to_string()) {
                manager.sign_out(&previous)?;
            }
            config.last_email = Some(email);
            config.save()?;

            info!(user_id = %record.identity().id, "Login successful");
            println!("Signed in as {}", record.identity().display_name);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn status(manager: &SessionManager, config: &mut CliConfig) -> Result<ExitCode> {
    let Some(id) = config.session_id.clone() else {
        println!("Not signed in");
        return Ok(ExitCode::FAILURE);
    };

    match manager.read(&id).await {
        SessionState::Active(record) => {
            let identity = record.identity();
            println!("Signed in as {} <{}>", identity.display_name, identity.email);
            println!(
                "Access token expires in {}s",
                record.tokens().seconds_until_expiry()
            );
            Ok(ExitCode::SUCCESS)
        }
        // Errored sessions are torn down by observing them
        _ => forget_session(config, manager.observe(&id).await),
    }
}

async fn token(manager: &SessionManager, config: &mut CliConfig) -> Result<ExitCode> {
    let Some(id) = config.session_id.clone() else {
        eprintln!("Not signed in");
        return Ok(ExitCode::FAILURE);
    };

    match manager.observe(&id).await {
        Observation::Authenticated(view) => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{}", view.access_token)?;
            Ok(ExitCode::SUCCESS)
        }
        observation => forget_session(config, observation),
    }
}

fn logout(manager: &SessionManager, config: &mut CliConfig) -> Result<ExitCode> {
    if let Some(id) = config.session_id.take() {
        manager.sign_out(&id)?;
        config.save()?;
    }
    println!("Signed out");
    Ok(ExitCode::SUCCESS)
}

/// The stored session is gone; drop our pointer to it and explain why
fn forget_session(config: &mut CliConfig, observation: Observation) -> Result<ExitCode> {
    config.session_id = None;
    config.save()?;

    match observation {
        Observation::SignOut(redirect) => {
            let notice = SignInNotice::from_query(Some(redirect.reason.code()), None);
            match notice {
                Some(notice) => eprintln!("{}", notice.message()),
                None => eprintln!("Signed out ({})", redirect.reason.code()),
            }
            eprintln!("Run `pathway login` to sign in again.");
        }
        _ => eprintln!("Not signed in"),
    }
    Ok(ExitCode::FAILURE)
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}
