//! CLI command implementations

pub mod account;
pub mod doctor;
pub mod logs;
pub mod register;
pub mod shell;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Input, Password};
use tally_core::services::{EntryPoint, LogEvent, LoggingService};
use tally_core::{Error, TallyContext, UserHandle};

/// Credentials shared by every command that acts on one account
#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Username to sign in as (prompted when omitted)
    #[arg(long, short = 'u', env = "TALLY_USERNAME")]
    pub username: Option<String>,
}

/// Get the logging service for an entry point
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(entry_point: EntryPoint) -> Option<LoggingService> {
    let tally_dir = get_tally_dir().ok()?;
    std::fs::create_dir_all(&tally_dir).ok()?;
    LoggingService::new(&tally_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Record how a command ended; core failures are logged by kind and code only
pub fn log_outcome<T>(logger: &Option<LoggingService>, command: &str, result: &Result<T>) {
    let event = match result {
        Ok(_) => LogEvent::outcome(command, Ok(())),
        Err(e) => match e.downcast_ref::<Error>() {
            Some(core) => LogEvent::outcome(command, Err(core)),
            None => LogEvent::new("command_failed")
                .with_command(command)
                .with_error("aborted before reaching the ledger"),
        },
    };
    log_event(logger, event);
}

/// Get the tally directory from environment or default
pub fn get_tally_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".tally"))
}

/// Open the ledger in the tally directory
pub fn get_context() -> Result<TallyContext> {
    let tally_dir = get_tally_dir()?;
    TallyContext::new(&tally_dir).context("Failed to initialize tally context")
}

/// Password from TALLY_PASSWORD or a hidden prompt
pub fn read_password(prompt: &str) -> Result<String> {
    if let Ok(p) = std::env::var("TALLY_PASSWORD") {
        return Ok(p);
    }
    let p = Password::new().with_prompt(prompt).interact()?;
    Ok(p)
}

/// Sign in with the given or prompted username
pub fn login(ctx: &TallyContext, args: &LoginArgs) -> Result<UserHandle> {
    let username = match &args.username {
        Some(u) => u.clone(),
        None => Input::new().with_prompt("Username").interact_text()?,
    };
    let password = read_password("Password")?;
    Ok(ctx.auth.authenticate(&username, &password)?)
}
