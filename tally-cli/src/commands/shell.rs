//! Shell command - interactive menu over the ledger

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Select};
use tally_core::services::{EntryPoint, LogEvent, LoggingService};
use tally_core::{TallyContext, UserHandle};

use super::account::{
    confirm_transfer, print_receipt, prompt_amount, prompt_recipient, show_balance, show_history,
};
use super::register::{collect_request, RegisterInput};
use super::{get_context, get_logger, log_event, log_outcome, read_password};
use crate::output;

const WELCOME_ITEMS: [&str; 3] = ["Log in", "Open an account", "Quit"];
const ACCOUNT_ITEMS: [&str; 6] = [
    "Balance",
    "Deposit",
    "Withdraw",
    "Transfer",
    "History",
    "Log out",
];

/// Entries shown per history request in the shell
const SHELL_HISTORY_LIMIT: usize = 20;

pub fn run() -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger(EntryPoint::Shell);
    log_event(&logger, LogEvent::new("shell_started"));

    println!("{}", "Welcome to Tally".bold());

    loop {
        let choice = Select::new()
            .with_prompt("What would you like to do?")
            .items(&WELCOME_ITEMS[..])
            .default(0)
            .interact()?;

        match choice {
            0 => {
                let result = sign_in(&ctx);
                log_outcome(&logger, "login", &result);
                match result {
                    Ok(user) => account_menu(&ctx, &logger, &user)?,
                    Err(e) => output::error(&format!("{:#}", e)),
                }
            }
            1 => {
                let result = open_account(&ctx);
                log_outcome(&logger, "register", &result);
                if let Err(e) = result {
                    output::error(&format!("{:#}", e));
                }
            }
            _ => break,
        }
    }

    if let Err(e) = ctx.repository.checkpoint() {
        output::warning(&format!("Could not flush the ledger: {}", e));
    }
    log_event(&logger, LogEvent::new("shell_ended"));
    println!("Goodbye.");
    Ok(())
}

fn sign_in(ctx: &TallyContext) -> Result<UserHandle> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password = read_password("Password")?;
    let user = ctx.auth.authenticate(&username, &password)?;
    output::success(&format!("Signed in as {}", user.username()));
    Ok(user)
}

fn open_account(ctx: &TallyContext) -> Result<()> {
    let request = collect_request(ctx, RegisterInput::default())?;
    let number = ctx.registry.register(&request)?;
    output::success("Account created successfully");
    println!("  Account number: {}", number.to_string().bold());
    output::info("You can now log in.");
    Ok(())
}

/// Menu for a signed-in user; returns on log out
fn account_menu(ctx: &TallyContext, logger: &Option<LoggingService>, user: &UserHandle) -> Result<()> {
    loop {
        println!();
        let choice = Select::new()
            .with_prompt(format!("Account {}", user.account_number()))
            .items(&ACCOUNT_ITEMS[..])
            .default(0)
            .interact()?;

        let (command, result) = match choice {
            0 => ("balance", show_balance(ctx, user, false)),
            1 => ("deposit", deposit(ctx, user)),
            2 => ("withdraw", withdraw(ctx, user)),
            3 => ("transfer", transfer(ctx, user)),
            4 => ("history", show_history(ctx, user, SHELL_HISTORY_LIMIT, false)),
            _ => {
                log_event(logger, LogEvent::new("logout").with_command("logout"));
                output::info("Signed out.");
                return Ok(());
            }
        };

        log_outcome(logger, command, &result);
        if let Err(e) = result {
            output::error(&format!("{:#}", e));
        }
    }
}

fn deposit(ctx: &TallyContext, user: &UserHandle) -> Result<()> {
    let amount = prompt_amount("Amount to deposit")?;
    let receipt = ctx.ledger.deposit(user, amount)?;
    print_receipt(ctx, &receipt, false)
}

fn withdraw(ctx: &TallyContext, user: &UserHandle) -> Result<()> {
    let amount = prompt_amount("Amount to withdraw")?;
    let receipt = ctx.ledger.withdraw(user, amount)?;
    print_receipt(ctx, &receipt, false)
}

fn transfer(ctx: &TallyContext, user: &UserHandle) -> Result<()> {
    let recipient = prompt_recipient()?;
    let amount = prompt_amount("Amount to transfer")?;
    if !confirm_transfer(ctx, &recipient, amount)? {
        println!("Cancelled.");
        return Ok(());
    }
    let receipt = ctx.ledger.transfer(user, &recipient, amount)?;
    print_receipt(ctx, &receipt, false)
}
