//! Register command - open a new account

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Password};
use tally_core::services::validation::{
    parse_amount, validate_email, validate_full_name, validate_password, validate_username,
};
use tally_core::{RegistrationRequest, TallyContext};

use super::get_context;
use crate::output;

/// Values given on the command line; anything missing is prompted for
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub fullname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub deposit: Option<String>,
}

pub fn run(input: RegisterInput, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let request = collect_request(&ctx, input)?;
    let registration = ctx.registry.register_account(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registration)?);
        return Ok(());
    }

    output::success("Account created successfully");
    println!(
        "  Account number: {}",
        registration.account_number.to_string().bold()
    );
    println!(
        "  Balance: {}",
        output::format_money(registration.balance, &ctx.config.ledger.currency_symbol)
    );
    Ok(())
}

/// Gather a registration request, re-prompting until each field is well formed
pub fn collect_request(ctx: &TallyContext, input: RegisterInput) -> Result<RegistrationRequest> {
    let fullname = match input.fullname {
        Some(f) => validate_full_name(&f)?,
        None => {
            let raw: String = Input::new()
                .with_prompt("Full name")
                .validate_with(|v: &String| validate_full_name(v).map(|_| ()))
                .interact_text()?;
            validate_full_name(&raw)?
        }
    };

    let username = match input.username {
        Some(u) => validate_username(&u)?,
        None => {
            let raw: String = Input::new()
                .with_prompt("Username")
                .validate_with(|v: &String| -> std::result::Result<(), String> {
                    let name = validate_username(v).map_err(|e| e.to_string())?;
                    match ctx.registry.username_available(&name) {
                        Ok(true) => Ok(()),
                        Ok(false) => Err("Username is already taken".to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                })
                .interact_text()?;
            validate_username(&raw)?
        }
    };

    let email = match input.email {
        Some(e) => validate_email(&e)?,
        None => {
            let raw: String = Input::new()
                .with_prompt("Email")
                .validate_with(|v: &String| -> std::result::Result<(), String> {
                    let email = validate_email(v).map_err(|e| e.to_string())?;
                    match ctx.registry.email_available(&email) {
                        Ok(true) => Ok(()),
                        Ok(false) => Err("Email is already registered".to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                })
                .interact_text()?;
            validate_email(&raw)?
        }
    };

    let password = read_new_password(ctx)?;

    let minimum = ctx.registry.minimum_opening_balance();
    let symbol = ctx.config.ledger.currency_symbol.clone();
    let initial_deposit = match input.deposit {
        Some(d) => parse_amount(&d)?,
        None => {
            let raw: String = Input::new()
                .with_prompt(format!(
                    "Opening deposit (minimum {})",
                    output::format_money(minimum, &symbol)
                ))
                .validate_with(|v: &String| -> std::result::Result<(), String> {
                    let amount = parse_amount(v).map_err(|e| e.to_string())?;
                    if amount < minimum {
                        return Err(format!(
                            "Opening deposit must be at least {}",
                            output::format_money(minimum, &symbol)
                        ));
                    }
                    Ok(())
                })
                .interact_text()?;
            parse_amount(&raw)?
        }
    };

    Ok(RegistrationRequest {
        fullname,
        username,
        email,
        password,
        initial_deposit,
    })
}

/// New password from TALLY_PASSWORD or a confirmed hidden prompt
fn read_new_password(ctx: &TallyContext) -> Result<String> {
    let policy = ctx.registry.password_policy();

    if let Ok(p) = std::env::var("TALLY_PASSWORD") {
        validate_password(&p, policy)?;
        return Ok(p);
    }

    loop {
        let p = Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?;
        match validate_password(&p, policy) {
            Ok(()) => return Ok(p),
            Err(e) => output::warning(&e.to_string()),
        }
    }
}
