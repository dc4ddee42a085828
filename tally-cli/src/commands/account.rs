//! Account commands - balance, deposit, withdraw, transfer and history

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};
use dialoguer::{Confirm, Input};
use rust_decimal::Decimal;
use tally_core::services::validation::parse_amount;
use tally_core::{AccountNumber, Receipt, TallyContext, Transaction, UserHandle};

use super::{get_context, login, LoginArgs};
use crate::output;

pub fn run_balance(args: LoginArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = login(&ctx, &args)?;
    show_balance(&ctx, &user, json)
}

pub fn run_deposit(args: LoginArgs, amount: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = login(&ctx, &args)?;
    let amount = amount_or_prompt(amount, "Amount to deposit")?;
    let receipt = ctx.ledger.deposit(&user, amount)?;
    print_receipt(&ctx, &receipt, json)
}

pub fn run_withdraw(args: LoginArgs, amount: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = login(&ctx, &args)?;
    let amount = amount_or_prompt(amount, "Amount to withdraw")?;
    let receipt = ctx.ledger.withdraw(&user, amount)?;
    print_receipt(&ctx, &receipt, json)
}

pub fn run_transfer(
    args: LoginArgs,
    to: Option<String>,
    amount: Option<String>,
    yes: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let user = login(&ctx, &args)?;
    let recipient = match to {
        Some(t) => AccountNumber::parse(&t)?,
        None => prompt_recipient()?,
    };
    let amount = amount_or_prompt(amount, "Amount to transfer")?;

    if !yes && !json && !confirm_transfer(&ctx, &recipient, amount)? {
        println!("Cancelled.");
        return Ok(());
    }

    let receipt = ctx.ledger.transfer(&user, &recipient, amount)?;
    print_receipt(&ctx, &receipt, json)
}

pub fn run_history(args: LoginArgs, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = login(&ctx, &args)?;
    show_history(&ctx, &user, limit, json)
}

pub fn show_balance(ctx: &TallyContext, user: &UserHandle, json: bool) -> Result<()> {
    let balance = ctx.ledger.get_balance(user)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "account_number": user.account_number(),
                "balance": balance,
            })
        );
        return Ok(());
    }

    println!(
        "Account {}: {}",
        user.account_number(),
        output::format_money(balance, &ctx.config.ledger.currency_symbol).bold()
    );
    Ok(())
}

pub fn show_history(ctx: &TallyContext, user: &UserHandle, limit: usize, json: bool) -> Result<()> {
    let entries = ctx
        .ledger
        .history(user)
        .take(limit)
        .collect::<std::result::Result<Vec<Transaction>, tally_core::Error>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    let symbol = &ctx.config.ledger.currency_symbol;
    let mut table = output::create_table();
    table.set_header(vec!["Date", "Type", "Amount", "Reference"]);

    for entry in &entries {
        let signed = entry.signed_amount();
        let amount = output::format_money(signed, symbol);
        let amount_cell = if signed.is_sign_negative() {
            Cell::new(amount).fg(Color::Red)
        } else {
            Cell::new(amount).fg(Color::Green)
        };
        let reference = entry
            .transfer_group_id
            .map(|g| g.to_string()[..8].to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(output::format_timestamp(&entry.timestamp)),
            Cell::new(output::kind_label(entry.kind)),
            amount_cell,
            Cell::new(reference),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn print_receipt(ctx: &TallyContext, receipt: &Receipt, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(receipt)?);
        return Ok(());
    }

    let symbol = &ctx.config.ledger.currency_symbol;
    output::success(&format!(
        "Done: {} {}",
        output::kind_label(receipt.kind),
        output::format_money(receipt.amount, symbol)
    ));
    println!(
        "  New balance: {}",
        output::format_money(receipt.balance, symbol).bold()
    );
    println!("  Reference: #{}", receipt.transaction_id);
    Ok(())
}

/// Show who will receive the money and ask before moving it
pub fn confirm_transfer(ctx: &TallyContext, recipient: &AccountNumber, amount: Decimal) -> Result<bool> {
    let name = ctx
        .registry
        .find_by_account_number(recipient)?
        .map(|summary| summary.fullname)
        .unwrap_or_else(|| "unknown account".to_string());

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Transfer {} to {} ({})?",
            output::format_money(amount, &ctx.config.ledger.currency_symbol),
            recipient,
            name
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

pub fn prompt_recipient() -> Result<AccountNumber> {
    let raw: String = Input::new()
        .with_prompt("Recipient account number")
        .validate_with(|v: &String| AccountNumber::parse(v).map(|_| ()))
        .interact_text()?;
    Ok(AccountNumber::parse(&raw)?)
}

pub fn prompt_amount(prompt: &str) -> Result<Decimal> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|v: &String| parse_amount(v).map(|_| ()))
        .interact_text()?;
    Ok(parse_amount(&raw)?)
}

fn amount_or_prompt(amount: Option<String>, prompt: &str) -> Result<Decimal> {
    match amount {
        Some(a) => Ok(parse_amount(&a)?),
        None => prompt_amount(prompt),
    }
}
