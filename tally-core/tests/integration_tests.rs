//! Integration tests for tally-core services
//!
//! These tests run the full context (registry, auth, ledger, doctor) against a
//! real DuckDB file in a temporary directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;
use tempfile::TempDir;

use rust_decimal::Decimal;

use tally_core::adapters::duckdb::DuckDbRepository;
use tally_core::config::{Config, SETTINGS_FILE};
use tally_core::domain::result::Result;
use tally_core::ports::AccountNumberSource;
use tally_core::services::MigrationService;
use tally_core::{
    AccountNumber, Error, ErrorKind, RegistrationRequest, TallyContext, TransactionKind,
    UserHandle,
};

// ============================================================================
// Test Helpers
// ============================================================================

const PASSWORD: &str = "Secret@123";

/// Cheap argon2 so tests stay fast
const TEST_SETTINGS: &str = r#"{
    "argon2": { "memoryCost": 8, "timeCost": 1, "parallelism": 1 }
}"#;

/// Create a context on a fresh database file
fn create_test_context(temp_dir: &TempDir) -> TallyContext {
    std::fs::write(temp_dir.path().join(SETTINGS_FILE), TEST_SETTINGS).unwrap();
    TallyContext::new(temp_dir.path()).expect("Failed to create context")
}

fn request(username: &str, deposit: i64) -> RegistrationRequest {
    RegistrationRequest {
        fullname: "Test Person".to_string(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: PASSWORD.to_string(),
        initial_deposit: Decimal::new(deposit, 0),
    }
}

/// Register and log in
fn register(ctx: &TallyContext, username: &str, deposit: i64) -> UserHandle {
    ctx.registry
        .register(&request(username, deposit))
        .expect("registration failed");
    ctx.auth
        .authenticate(username, PASSWORD)
        .expect("authentication failed")
}

fn dec(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

fn entry_count(ctx: &TallyContext, user: &UserHandle) -> usize {
    ctx.ledger.history(user).count()
}

/// Always proposes the same number
struct Fixed(&'static str);

impl AccountNumberSource for Fixed {
    fn propose(&self) -> Result<AccountNumber> {
        AccountNumber::parse(self.0)
    }
}

// ============================================================================
// Worked example
// ============================================================================

#[test]
fn test_register_deposit_withdraw_transfer_walkthrough() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let ada = register(&ctx, "ada_l", 2000);
    let bob = register(&ctx, "bobby", 2000);
    assert_eq!(ctx.ledger.get_balance(&ada).unwrap(), dec(2000));

    ctx.ledger.deposit(&ada, dec(500)).unwrap();
    assert_eq!(ctx.ledger.get_balance(&ada).unwrap(), dec(2500));

    let err = ctx.ledger.withdraw(&ada, dec(3000)).unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds));
    assert_eq!(ctx.ledger.get_balance(&ada).unwrap(), dec(2500));

    let receipt = ctx
        .ledger
        .transfer(&ada, bob.account_number(), dec(2500))
        .unwrap();
    assert_eq!(receipt.balance, Decimal::ZERO);
    assert_eq!(ctx.ledger.get_balance(&ada).unwrap(), Decimal::ZERO);
    assert_eq!(ctx.ledger.get_balance(&bob).unwrap(), dec(4500));

    let kinds: Vec<TransactionKind> = ctx
        .ledger
        .history(&ada)
        .map(|tx| tx.unwrap().kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::TransferSent,
            TransactionKind::Deposit,
            TransactionKind::Deposit,
        ]
    );
}

// ============================================================================
// Ledger properties
// ============================================================================

#[test]
fn test_deposit_adds_amount_and_one_entry() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let user = register(&ctx, "alice", 2000);

    let before = ctx.ledger.get_balance(&user).unwrap();
    let entries_before = entry_count(&ctx, &user);

    let amount = Decimal::new(12_345, 2);
    let receipt = ctx.ledger.deposit(&user, amount).unwrap();

    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), before + amount);
    assert_eq!(receipt.balance, before + amount);
    assert_eq!(entry_count(&ctx, &user), entries_before + 1);

    let newest = ctx.ledger.history(&user).next().unwrap().unwrap();
    assert_eq!(newest.id, receipt.transaction_id);
    assert_eq!(newest.kind, TransactionKind::Deposit);
    assert_eq!(newest.amount, amount);
}

#[test]
fn test_overdraw_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let user = register(&ctx, "alice", 2000);

    let err = ctx.ledger.withdraw(&user, Decimal::new(200_001, 2)).unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds));
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), dec(2000));
    assert_eq!(entry_count(&ctx, &user), 1);

    // Exactly the balance is fine
    ctx.ledger.withdraw(&user, dec(2000)).unwrap();
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), Decimal::ZERO);
}

#[test]
fn test_transfer_conserves_money_and_pairs_entries() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let alice = register(&ctx, "alice", 3000);
    let bob = register(&ctx, "bobby", 2000);

    let total_before =
        ctx.ledger.get_balance(&alice).unwrap() + ctx.ledger.get_balance(&bob).unwrap();

    let receipt = ctx
        .ledger
        .transfer(&alice, bob.account_number(), Decimal::new(75_050, 2))
        .unwrap();

    let total_after =
        ctx.ledger.get_balance(&alice).unwrap() + ctx.ledger.get_balance(&bob).unwrap();
    assert_eq!(total_before, total_after);

    let group = receipt.transfer_group_id.expect("transfer has a group id");
    let entries = ctx.repository.get_transfer_entries(group).unwrap();
    assert_eq!(entries.len(), 2);

    let sent = entries
        .iter()
        .find(|e| e.kind == TransactionKind::TransferSent)
        .unwrap();
    let received = entries
        .iter()
        .find(|e| e.kind == TransactionKind::TransferReceived)
        .unwrap();
    assert_eq!(sent.user_id, alice.id());
    assert_eq!(received.user_id, bob.id());
    assert_eq!(sent.amount, received.amount);
    assert_eq!(sent.timestamp, received.timestamp);
    assert_eq!(sent.amount, Decimal::new(75_050, 2));
}

#[test]
fn test_self_transfer_always_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let alice = register(&ctx, "alice", 2000);

    for amount in [Decimal::ONE, dec(2000), dec(1_000_000)] {
        let err = ctx
            .ledger
            .transfer(&alice, alice.account_number(), amount)
            .unwrap_err();
        assert!(matches!(err, Error::SelfTransferNotAllowed));
    }
    assert_eq!(ctx.ledger.get_balance(&alice).unwrap(), dec(2000));
    assert_eq!(entry_count(&ctx, &alice), 1);
}

#[test]
fn test_transfer_to_unknown_or_malformed_account() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let alice = register(&ctx, "alice", 2000);

    let unknown = AccountNumber::parse("10000000").unwrap();
    if *alice.account_number() != unknown {
        let err = ctx.ledger.transfer(&alice, &unknown, dec(10)).unwrap_err();
        assert!(matches!(err, Error::RecipientNotFound));
    }

    let err = AccountNumber::parse("12ab").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_colliding_account_numbers_exhaust_without_partial_user() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(SETTINGS_FILE), TEST_SETTINGS).unwrap();
    let config = Config::load(temp_dir.path()).unwrap();
    let attempts = config.registration.account_number_attempts;
    let repository = Arc::new(
        DuckDbRepository::open(&temp_dir.path().join("ledger.duckdb"), &config.store).unwrap(),
    );
    let ctx =
        TallyContext::with_repository(config, repository, Arc::new(Fixed("55555555"))).unwrap();

    assert_eq!(
        ctx.registry.register(&request("first", 2000)).unwrap().as_str(),
        "55555555"
    );

    let err = ctx.registry.register(&request("second", 2000)).unwrap_err();
    assert!(matches!(err, Error::AccountNumberExhausted { attempts: n } if n == attempts));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(ctx.registry.username_available("second").unwrap());
    assert_eq!(ctx.status.get_status().unwrap().total_users, 1);
}

#[test]
fn test_minimum_deposit_from_settings() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(SETTINGS_FILE),
        r#"{ "ledger": { "minimumOpeningBalance": "100" },
             "argon2": { "memoryCost": 8, "timeCost": 1, "parallelism": 1 } }"#,
    )
    .unwrap();
    let ctx = TallyContext::new(temp_dir.path()).unwrap();

    let user = register(&ctx, "alice", 100);
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), dec(100));

    let err = ctx.registry.register(&request("bobby", 99)).unwrap_err();
    assert!(matches!(err, Error::BelowMinimumDeposit { minimum } if minimum == dec(100)));
}

// ============================================================================
// Auth
// ============================================================================

#[test]
fn test_auth_failures_are_indistinguishable() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    register(&ctx, "alice", 2000);

    let wrong_password = ctx.auth.authenticate("alice", "Wrong@123").unwrap_err();
    let unknown_user = ctx.auth.authenticate("nobody", PASSWORD).unwrap_err();

    assert!(matches!(wrong_password, Error::AuthFailure));
    assert!(matches!(unknown_user, Error::AuthFailure));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert_eq!(wrong_password.code(), unknown_user.code());
}

// ============================================================================
// Diagnostics and persistence
// ============================================================================

#[test]
fn test_doctor_clean_after_mixed_operations() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let alice = register(&ctx, "alice", 5000);
    let bob = register(&ctx, "bobby", 2000);

    ctx.ledger.deposit(&alice, Decimal::new(1999, 2)).unwrap();
    ctx.ledger.withdraw(&bob, dec(150)).unwrap();
    ctx.ledger.transfer(&alice, bob.account_number(), dec(700)).unwrap();
    ctx.ledger.transfer(&bob, alice.account_number(), Decimal::new(5, 2)).unwrap();
    let _ = ctx.ledger.withdraw(&bob, dec(1_000_000));
    let _ = ctx.ledger.transfer(&bob, bob.account_number(), dec(1));

    let result = ctx.doctor.run_checks().unwrap();
    assert!(result.is_healthy(), "{:?}", result);

    let status = ctx.status.get_status().unwrap();
    assert_eq!(status.total_users, 2);
    assert_eq!(status.total_transactions, 8);
    // 7000 opened + 19.99 deposited - 150 withdrawn; transfers move money around
    assert_eq!(status.total_balance, Decimal::new(686_999, 2));
}

#[test]
fn test_data_survives_reopen_and_migrations_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let account_number = {
        let ctx = create_test_context(&temp_dir);
        let user = register(&ctx, "alice", 2000);
        ctx.ledger.deposit(&user, dec(1)).unwrap();
        ctx.repository.checkpoint().unwrap();
        user.account_number().clone()
    };

    let ctx = create_test_context(&temp_dir);
    let again = ctx.repository.run_migrations().unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(again.already_applied, tally_core::migrations::MIGRATIONS.len());

    let user = ctx.auth.authenticate("alice", PASSWORD).unwrap();
    assert_eq!(user.account_number(), &account_number);
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), dec(2001));
}

#[test]
fn test_fresh_database_has_no_pending_migrations() {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    let service = MigrationService::new(&conn);
    service.run_pending().unwrap();
    assert!(service.get_pending().unwrap().is_empty());
}
