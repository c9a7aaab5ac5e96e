//! Outreach User Bot - Main Entry Point
//!
//! A Telegram userbot that collects group member IDs and performs throttled
//! bulk operations over them: direct messages, group adds, and invite links.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use outreach_user_bot::commands::CommandHandler;
use outreach_user_bot::config::{BotSettings, PacingPolicy, TelegramConfig};
use outreach_user_bot::telegram::{TelegramBot, TelegramError};

/// Telegram userbot for member collection and throttled bulk outreach.
#[derive(Parser, Debug)]
#[command(name = "outreach_bot")]
#[command(about = "Collect group member IDs and run throttled bulk operations")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Path to the persisted user-data JSON file (overrides the environment).
    #[arg(short, long)]
    store: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Execute a single command (e.g. "/collect_ids -100123") and exit.
    #[arg(short, long)]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let mut settings = BotSettings::from_env_with_defaults();
    if let Some(store) = &args.store {
        settings.store_path = store.into();
    }

    let pacing = PacingPolicy::default();
    pacing.validate().context("Invalid pacing policy")?;

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    // Handle authentication if needed
    if !bot.is_authorized().await.context("Failed to check authorization")? {
        authenticate(&bot, &tg_config).await?;
    }

    info!("Store path: {}", settings.store_path.display());
    if !settings.excluded_ids.is_empty() {
        info!("Excluding {} configured bot IDs", settings.excluded_ids.len());
    }

    let handler = CommandHandler::new(bot, settings, pacing);

    if let Some(command) = args.command {
        run_one(&handler, &command).await;
        handler.directory().disconnect();
        return Ok(());
    }

    println!("Outreach bot ready. Type /help for commands, quit to exit.");
    run_interactive(&handler).await;
    handler.directory().disconnect();

    Ok(())
}

/// Executes a single command line and prints the result.
async fn run_one(handler: &CommandHandler<TelegramBot>, line: &str) {
    match handler.try_handle(line).await {
        Some(result) => {
            if result.success {
                println!("{}", result.message);
            } else {
                eprintln!("Error: {}", result.message);
            }
        }
        None => warn!("Not a command: {}", line),
    }
}

/// Reads command lines until `quit`/`exit` or Ctrl+C.
async fn run_interactive(handler: &CommandHandler<TelegramBot>) {
    loop {
        let line: String = match Input::new().with_prompt(">").interact_text() {
            Ok(line) => line,
            Err(e) => {
                warn!("Input error: {}", e);
                break;
            }
        };

        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        tokio::select! {
            () = run_one(handler, &line) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, returning to prompt");
            }
        }
    }

    info!("Shutting down...");
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}
