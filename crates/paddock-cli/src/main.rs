//! Paddock CLI - sign in to the Paddock service, inspect the session, and
//! recover account access from the terminal.
//!
//! This is a thin front-end over `paddock-core`; all session and recovery
//! behavior lives there.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paddock_core::api::ApiClient;
use paddock_core::auth::{
    mask_token, CredentialStore, FileStore, KeyringStore, SessionManager, SessionState, StoreKey,
};
use paddock_core::models::{NewAccount, Preferences, ProfileUpdate};
use paddock_core::recovery::{failure_message, OtpOutcome, RecoveryFlow};
use paddock_core::Config;

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=paddock_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    let config = Config::load()?;
    let store = build_store(&config)?;
    let api = ApiClient::new(&config.api_base_url(), store.clone())?;
    let session = SessionManager::new(api.clone(), store.clone());

    info!(version = env!("CARGO_PKG_VERSION"), "paddock starting");

    match command {
        "login" => cmd_login(&session, store.as_ref()).await,
        "logout" => cmd_logout(&session).await,
        "status" => cmd_status(&session, store.as_ref()).await,
        "register" => cmd_register(&session).await,
        "recover" => cmd_recover(&RecoveryFlow::new(api)).await,
        "profile" => cmd_profile(&session).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}\n");
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: paddock <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login     Sign in and store the session");
    eprintln!("  logout    Drop the stored session");
    eprintln!("  status    Show who is signed in");
    eprintln!("  register  Create an account and sign in");
    eprintln!("  recover   Reset a forgotten password");
    eprintln!("  profile   Update username or preferences");
}

fn build_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    if config.use_file_store() {
        let dir = FileStore::default_dir().context("Could not find a data directory")?;
        Ok(Arc::new(FileStore::new(dir)))
    } else {
        Ok(Arc::new(KeyringStore::new()))
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

async fn cmd_login(session: &SessionManager, store: &dyn CredentialStore) -> Result<()> {
    if let SessionState::Authenticated(identity) = session.bootstrap().await {
        println!("Already signed in as {}", identity.display_name());
        return Ok(());
    }

    let remembered = store.get(StoreKey::LastIdentifier);
    let prompt = match &remembered {
        Some(last) => format!("Email [{last}]: "),
        None => "Email: ".to_string(),
    };
    let mut email = prompt_line(&prompt)?;
    if email.is_empty() {
        if let Some(last) = remembered {
            email = last;
        }
    }
    let password = rpassword::prompt_password("Password: ")?;

    match session.login(&email, &password).await {
        Ok(identity) => {
            println!("Signed in as {}", identity.display_name());
            Ok(())
        }
        Err(e) => {
            eprintln!("Sign-in failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn cmd_logout(session: &SessionManager) -> Result<()> {
    session.logout().await;
    println!("Signed out");
    Ok(())
}

async fn cmd_status(session: &SessionManager, store: &dyn CredentialStore) -> Result<()> {
    match session.bootstrap().await {
        SessionState::Authenticated(identity) => {
            println!("Signed in as {} <{}>", identity.display_name(), identity.email);
            if let Some(team) = identity
                .preferences
                .as_ref()
                .and_then(|p| p.favorite_team.as_deref())
            {
                println!("Favorite team: {team}");
            }
            if let Some(token) = store.get(StoreKey::SessionToken) {
                println!("Session token: {}", mask_token(&token));
            }
        }
        _ => println!("Not signed in"),
    }
    Ok(())
}

async fn cmd_register(session: &SessionManager) -> Result<()> {
    let username = prompt_line("Username: ")?;
    let email = prompt_line("Email: ")?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        eprintln!("Passwords do not match");
        std::process::exit(1);
    }

    let account = NewAccount { username, email };
    match session.register(account, &password).await {
        Ok(identity) => {
            println!("Registered and signed in as {}", identity.display_name());
            Ok(())
        }
        Err(e) => {
            eprintln!("Registration failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn cmd_recover(flow: &RecoveryFlow) -> Result<()> {
    let email = prompt_line("Account email: ")?;
    match flow.request_otp(&email).await {
        Ok(message) => println!("{message}"),
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            std::process::exit(1);
        }
    }

    let code = prompt_line("Verification code: ")?;
    let reset_token = match flow.verify_otp(&code).await {
        Ok(OtpOutcome::Verified { reset_token }) => reset_token,
        Ok(OtpOutcome::RedirectToProvider { location }) => {
            println!("This account is managed by an external sign-in provider.");
            println!("Finish the reset there: {location}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            std::process::exit(1);
        }
    };

    let new_password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Repeat new password: ")?;
    if new_password != confirm {
        eprintln!("Passwords do not match");
        std::process::exit(1);
    }

    match flow.reset_password(&reset_token, &new_password).await {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            std::process::exit(1);
        }
    }
}

async fn cmd_profile(session: &SessionManager) -> Result<()> {
    if !session.bootstrap().await.is_authenticated() {
        eprintln!("Not signed in");
        std::process::exit(1);
    }

    let username = prompt_line("New username (blank to keep): ")?;
    let team = prompt_line("Favorite team (blank to keep): ")?;

    let mut update = ProfileUpdate::default();
    if !username.is_empty() {
        update.username = Some(username);
    }
    if !team.is_empty() {
        update.preferences = Some(Preferences {
            favorite_team: Some(team),
            notifications: None,
        });
    }
    if update.username.is_none() && update.preferences.is_none() {
        println!("Nothing to change");
        return Ok(());
    }

    match session.update_profile(update).await {
        Ok(identity) => {
            println!("Profile updated for {}", identity.display_name());
            Ok(())
        }
        Err(e) => {
            eprintln!("Update failed: {e}");
            std::process::exit(1);
        }
    }
}
