//! Tally CLI - a small banking ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_core::services::EntryPoint;

mod commands;
mod output;

use commands::register::RegisterInput;
use commands::{account, doctor, logs, register, shell, status, LoginArgs};

/// Tally - a small banking ledger in your terminal
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Register {
        /// Full name (letters and spaces)
        #[arg(long)]
        fullname: Option<String>,
        /// Username
        #[arg(long, short = 'u')]
        username: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Opening deposit
        #[arg(long)]
        deposit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current balance
    Balance {
        #[command(flatten)]
        login: LoginArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deposit money into your account
    Deposit {
        /// Amount to deposit
        amount: Option<String>,
        #[command(flatten)]
        login: LoginArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw money from your account
    Withdraw {
        /// Amount to withdraw
        amount: Option<String>,
        #[command(flatten)]
        login: LoginArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to another account
    Transfer {
        /// Recipient account number
        #[arg(long)]
        to: Option<String>,
        /// Amount to send
        #[arg(long)]
        amount: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        #[command(flatten)]
        login: LoginArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transaction history, newest first
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        #[command(flatten)]
        login: LoginArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the interactive menu
    Shell,

    /// Run ledger health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ledger totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Register { .. } => "register",
            Commands::Balance { .. } => "balance",
            Commands::Deposit { .. } => "deposit",
            Commands::Withdraw { .. } => "withdraw",
            Commands::Transfer { .. } => "transfer",
            Commands::History { .. } => "history",
            Commands::Shell => "shell",
            Commands::Doctor { .. } => "doctor",
            Commands::Status { .. } => "status",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let name = cli.command.name();

    let result = run(cli);

    let logger = commands::get_logger(EntryPoint::Cli);
    commands::log_outcome(&logger, name, &result);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register {
            fullname,
            username,
            email,
            deposit,
            json,
        } => register::run(
            RegisterInput {
                fullname,
                username,
                email,
                deposit,
            },
            json,
        ),
        Commands::Balance { login, json } => account::run_balance(login, json),
        Commands::Deposit { amount, login, json } => account::run_deposit(login, amount, json),
        Commands::Withdraw { amount, login, json } => account::run_withdraw(login, amount, json),
        Commands::Transfer {
            to,
            amount,
            yes,
            login,
            json,
        } => account::run_transfer(login, to, amount, yes, json),
        Commands::History { limit, login, json } => account::run_history(login, limit, json),
        Commands::Shell => shell::run(),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
