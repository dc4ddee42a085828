//! Concurrent ledger access tests
//!
//! Several threads share one context and race on the same rows. Conflicting
//! store transactions are retried from a fresh snapshot, so business checks
//! always see committed state.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

use rust_decimal::Decimal;

use tally_core::config::SETTINGS_FILE;
use tally_core::{Error, ErrorKind, RegistrationRequest, TallyContext, UserHandle};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 6;

/// Iterations per thread in the transfer stress test
const TRANSFERS_PER_THREAD: usize = 10;

const PASSWORD: &str = "Secret@123";

/// Cheap argon2; the store keeps its shipped retry budget
const TEST_SETTINGS: &str = r#"{
    "argon2": { "memoryCost": 8, "timeCost": 1, "parallelism": 1 }
}"#;

fn create_shared_context(temp_dir: &TempDir) -> Arc<TallyContext> {
    std::fs::write(temp_dir.path().join(SETTINGS_FILE), TEST_SETTINGS).unwrap();
    Arc::new(TallyContext::new(temp_dir.path()).expect("Failed to create context"))
}

fn request(username: &str, email: &str, deposit: i64) -> RegistrationRequest {
    RegistrationRequest {
        fullname: "Test Person".to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        initial_deposit: Decimal::new(deposit, 0),
    }
}

fn register(ctx: &TallyContext, username: &str, deposit: i64) -> UserHandle {
    ctx.registry
        .register(&request(username, &format!("{}@example.com", username), deposit))
        .unwrap();
    ctx.auth.authenticate(username, PASSWORD).unwrap()
}

/// Test: balance 100, two concurrent withdraw(60). At most one succeeds and
/// the balance never goes negative.
#[test]
fn test_concurrent_withdrawals_cannot_overdraw() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);
    let user = register(&ctx, "alice", 2000);
    ctx.ledger.withdraw(&user, Decimal::new(1900, 0)).unwrap();
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), Decimal::new(100, 0));

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = vec![];

    for _ in 0..2 {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let user = user.clone();

        handles.push(thread::spawn(move || {
            barrier.wait();
            ctx.ledger.withdraw(&user, Decimal::new(60, 0))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();

    println!("withdraw results: {:?}", results);
    assert_eq!(successes, 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, Error::InsufficientFunds), "unexpected error: {:?}", e);
        }
    }
    assert_eq!(ctx.ledger.get_balance(&user).unwrap(), Decimal::new(40, 0));
    assert!(ctx.doctor.run_checks().unwrap().is_healthy());
}

/// Test: many threads register the same username at once. Exactly one wins.
#[test]
fn test_concurrent_registrations_same_username() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let duplicate_count = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let success_count = Arc::clone(&success_count);
        let duplicate_count = Arc::clone(&duplicate_count);

        handles.push(thread::spawn(move || {
            let req = request("racer", &format!("racer{}@example.com", thread_id), 2000);
            barrier.wait();
            match ctx.registry.register(&req) {
                Ok(_) => {
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(Error::DuplicateUsername) => {
                    duplicate_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("thread {}: unexpected error {:?}", thread_id, e),
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(success_count.load(Ordering::SeqCst), 1);
    assert_eq!(duplicate_count.load(Ordering::SeqCst), THREAD_COUNT - 1);

    let status = ctx.status.get_status().unwrap();
    assert_eq!(status.total_users, 1);
    assert_eq!(status.total_transactions, 1);
}

/// Test: transfers in opposite directions between the same two accounts
/// conserve money and keep every balance matching its ledger. None of them
/// runs out of conflict retries under the default store settings.
#[test]
fn test_opposite_direction_transfers_conserve_money() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);
    let alice = register(&ctx, "alice", 5000);
    let bob = register(&ctx, "bobby", 5000);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let storage_failures = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let success_count = Arc::clone(&success_count);
        let storage_failures = Arc::clone(&storage_failures);
        let (from, to) = if thread_id % 2 == 0 {
            (alice.clone(), bob.clone())
        } else {
            (bob.clone(), alice.clone())
        };

        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..TRANSFERS_PER_THREAD {
                match ctx
                    .ledger
                    .transfer(&from, to.account_number(), Decimal::new(25, 0))
                {
                    Ok(_) => {
                        success_count.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) if e.kind() == ErrorKind::Storage => {
                        eprintln!("thread {}: transfer gave up: {}", thread_id, e);
                        storage_failures.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => panic!("thread {}: transfer failed: {:?}", thread_id, e),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total = ctx.ledger.get_balance(&alice).unwrap() + ctx.ledger.get_balance(&bob).unwrap();
    assert_eq!(total, Decimal::new(10_000, 0));
    // The default retry budget absorbs this much contention
    assert_eq!(storage_failures.load(Ordering::SeqCst), 0);
    assert_eq!(
        success_count.load(Ordering::SeqCst),
        THREAD_COUNT * TRANSFERS_PER_THREAD
    );

    let result = ctx.doctor.run_checks().unwrap();
    assert!(result.is_healthy(), "{:?}", result);
}

/// Test: concurrent deposits to one account all land.
#[test]
fn test_concurrent_deposits_all_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_shared_context(&temp_dir);
    let user = register(&ctx, "alice", 2000);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];

    for _ in 0..THREAD_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        let user = user.clone();

        handles.push(thread::spawn(move || {
            barrier.wait();
            ctx.ledger.deposit(&user, Decimal::new(1, 0)).unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        ctx.ledger.get_balance(&user).unwrap(),
        Decimal::new(2000 + THREAD_COUNT as i64, 0)
    );
    assert_eq!(ctx.ledger.history(&user).count(), THREAD_COUNT + 1);
}
