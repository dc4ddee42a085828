//! DuckDB repository implementation
//!
//! All ledger writes go through [`DuckDbRepository::atomic`], which runs a
//! closure inside one DuckDB transaction taken from a small connection pool.
//! DuckDB uses snapshot isolation and aborts the second writer of a row, so a
//! conflicting transaction is rolled back and the closure re-run from a fresh
//! snapshot a bounded number of times.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{NaiveDateTime, SubsecRound};
use duckdb::{params, Connection};
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::StoreSettings;
use crate::domain::money;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AccountNumber, Credential, NewTransaction, NewUser, Transaction, TransactionKind, User, UserId,
};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when the database file is locked on open
const MAX_OPEN_RETRIES: u32 = 5;

/// Initial open retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_OPEN_RETRY_DELAY_MS: u64 = 50;

/// Cap on the exponential factor of the conflict backoff
const MAX_BACKOFF_SHIFT: u32 = 6;

const USER_COLUMNS: &str = "id, username, email, fullname, password_hash, account_number, \
                            balance::VARCHAR, created_at::VARCHAR";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, type, amount::VARCHAR, timestamp::VARCHAR, transfer_group_id";

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        classify_error(&err.to_string())
    }
}

/// Map a DuckDB error message onto the domain taxonomy.
///
/// Unique-constraint violations name the offending column, e.g.
/// `Duplicate key "username: alice" violates unique constraint`.
/// Anything mentioning a conflict is a concurrent-writer abort and retryable.
fn classify_error(msg: &str) -> Error {
    let lower = msg.to_lowercase();
    if lower.contains("conflict") {
        return Error::WriteConflict(msg.to_string());
    }
    if lower.contains("duplicate key") || lower.contains("unique constraint") {
        if lower.contains("\"account_number:") {
            return Error::AccountNumberTaken;
        }
        if lower.contains("\"email:") {
            return Error::DuplicateEmail;
        }
        if lower.contains("\"username:") {
            return Error::DuplicateUsername;
        }
        if lower.contains("account_number") {
            return Error::AccountNumberTaken;
        }
        if lower.contains("email") {
            return Error::DuplicateEmail;
        }
        if lower.contains("username") {
            return Error::DuplicateUsername;
        }
        // A racing insert won; re-running the scope lets the probes name the column
        return Error::WriteConflict(msg.to_string());
    }
    Error::Storage(msg.to_string())
}

/// Check if an error message indicates a file locking issue that should be retried
fn is_file_lock_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

// ============================================================================
// Connection pool
// ============================================================================

/// Pool of connections to one DuckDB database.
///
/// Every connection is a clone of the root connection, so they all share the
/// same database instance (including in-memory databases).
pub struct ConnectionPool {
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

impl ConnectionPool {
    fn new(root: Connection, max_idle: usize) -> Self {
        Self {
            root: Mutex::new(root),
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Take an idle connection or open a new one
    fn checkout(&self) -> Result<Connection> {
        let reused = self
            .idle
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))?
            .pop();

        match reused {
            Some(conn) => Ok(conn),
            None => Ok(self
                .root
                .lock()
                .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))?
                .try_clone()?),
        }
    }

    /// Run a closure on a pooled connection.
    ///
    /// The connection goes back to the pool afterwards unless the closure
    /// panicked, in which case it is dropped.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.checkout()?;
        let result = f(&mut conn);
        self.release(conn);
        result
    }

    /// Run a closure against the root connection (schema setup, maintenance)
    fn with_root<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .root
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))?;
        f(&*conn)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(conn);
            }
        }
    }

    /// Number of connections currently parked in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded exponential backoff with jitter for write-write conflicts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self {
            attempts: settings.conflict_retries.max(1),
            initial_delay: Duration::from_millis(settings.initial_retry_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        let base = self.initial_delay * (1u32 << shift);
        let base_ms = base.as_millis() as u64;
        if base_ms == 0 {
            return base;
        }
        // Jitter keeps two conflicting writers from retrying in lockstep
        let jitter = rand::thread_rng().gen_range(0..=base_ms);
        Duration::from_millis(base_ms + jitter)
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Aggregate figures for the status report
#[derive(Debug, Clone)]
pub struct StoreTotals {
    pub users: i64,
    pub transactions: i64,
    pub total_balance: Decimal,
    pub earliest_transaction: Option<NaiveDateTime>,
    pub latest_transaction: Option<NaiveDateTime>,
}

/// Stored balance next to the balance implied by the user's ledger entries
#[derive(Debug, Clone)]
pub struct LedgerTotals {
    pub user_id: UserId,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub ledger_sum: Decimal,
    pub entries: i64,
}

/// Position in a user's history; entries strictly older than this come next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    pub timestamp: NaiveDateTime,
    pub id: i64,
}

impl From<&Transaction> for HistoryCursor {
    fn from(tx: &Transaction) -> Self {
        Self {
            timestamp: tx.timestamp,
            id: tx.id,
        }
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    pool: ConnectionPool,
    db_path: Option<PathBuf>,
    retry: RetryPolicy,
}

impl DuckDbRepository {
    /// Open (or create) a database file.
    ///
    /// Opening retries with exponential backoff while another process holds
    /// the file lock.
    pub fn open(db_path: &Path, settings: &StoreSettings) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_OPEN_RETRIES {
            match Self::try_open_connection(Some(db_path)) {
                Ok(conn) => {
                    return Ok(Self {
                        pool: ConnectionPool::new(conn, settings.pool_size),
                        db_path: Some(db_path.to_path_buf()),
                        retry: RetryPolicy::from_settings(settings),
                    });
                }
                Err(e) => {
                    if is_file_lock_error(&e.to_string()) && attempt < MAX_OPEN_RETRIES - 1 {
                        let delay = Duration::from_millis(
                            INITIAL_OPEN_RETRY_DELAY_MS * 2u64.pow(attempt),
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::storage(format!(
                "Failed to open database after {} retries",
                MAX_OPEN_RETRIES
            ))
        }))
    }

    /// Open a private in-memory database (tests, demos)
    pub fn open_in_memory(settings: &StoreSettings) -> Result<Self> {
        let conn = Self::try_open_connection(None)?;
        Ok(Self {
            pool: ConnectionPool::new(conn, settings.pool_size),
            db_path: None,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    fn try_open_connection(db_path: Option<&Path>) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = match db_path {
            Some(path) => Connection::open_with_flags(path, config)?,
            None => Connection::open_in_memory_with_flags(config)?,
        };
        Ok(conn)
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        self.pool
            .with_root(|conn| MigrationService::new(conn).run_pending())
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // === Atomic scope ===

    /// Run `op` inside one store transaction.
    ///
    /// Commits when `op` returns `Ok`; rolls back on `Err` or panic. When the
    /// store reports a write-write conflict (from `op` or from the commit) the
    /// whole closure is re-run on a fresh transaction, up to the configured
    /// number of attempts; running out of attempts is a `Storage` error.
    /// Business errors are returned immediately.
    pub fn atomic<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&StoreTx<'_>) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match self.run_once(&mut op) {
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    thread::sleep(self.retry.delay_for(attempt));
                    attempt += 1;
                }
                Err(Error::WriteConflict(msg)) => {
                    return Err(Error::Storage(format!(
                        "gave up after {} conflicting attempts: {}",
                        attempt, msg
                    )));
                }
                other => return other,
            }
        }
    }

    fn run_once<T, F>(&self, op: &mut F) -> Result<T>
    where
        F: FnMut(&StoreTx<'_>) -> Result<T>,
    {
        self.pool.with_connection(|conn| {
            let tx = StoreTx {
                tx: conn.transaction()?,
            };
            let value = op(&tx)?;
            tx.tx.commit()?;
            Ok(value)
        })
    }

    // === Reads (autocommit, one statement each) ===

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.pool
            .with_connection(|conn| query_user(conn, "id = ?", [id.0]))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.pool
            .with_connection(|conn| query_user(conn, "username = ?", [username]))
    }

    pub fn get_user_by_account_number(&self, number: &AccountNumber) -> Result<Option<User>> {
        self.pool
            .with_connection(|conn| query_user(conn, "account_number = ?", [number.as_str()]))
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.pool.with_connection(|conn| {
            exists(conn, "SELECT COUNT(*) FROM users WHERE username = ?", [username])
        })
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.pool.with_connection(|conn| {
            exists(conn, "SELECT COUNT(*) FROM users WHERE email = ?", [email])
        })
    }

    pub fn get_balance(&self, id: UserId) -> Result<Option<Decimal>> {
        self.pool.with_connection(|conn| query_balance(conn, id))
    }

    /// One page of a user's ledger, newest first
    pub fn history_page(
        &self,
        user_id: UserId,
        limit: usize,
        before: Option<HistoryCursor>,
    ) -> Result<Vec<Transaction>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = self.pool.with_connection(|conn| {
            let rows = match before {
                None => {
                    let sql = format!(
                        "SELECT {} FROM transactions WHERE user_id = ?
                         ORDER BY timestamp DESC, id DESC LIMIT ?",
                        TRANSACTION_COLUMNS
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let page = stmt
                        .query_map(params![user_id.0, limit], TransactionRow::from_row)?
                        .collect::<duckdb::Result<Vec<_>>>()?;
                    page
                }
                Some(cursor) => {
                    let ts = format_timestamp(&cursor.timestamp);
                    let sql = format!(
                        "SELECT {} FROM transactions
                         WHERE user_id = ?
                           AND (timestamp < CAST(? AS TIMESTAMP)
                                OR (timestamp = CAST(? AS TIMESTAMP) AND id < ?))
                         ORDER BY timestamp DESC, id DESC LIMIT ?",
                        TRANSACTION_COLUMNS
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let page = stmt
                        .query_map(
                            params![user_id.0, ts, ts, cursor.id, limit],
                            TransactionRow::from_row,
                        )?
                        .collect::<duckdb::Result<Vec<_>>>()?;
                    page
                }
            };
            Ok(rows)
        })?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// All entries sharing a transfer group id, oldest id first
    pub fn get_transfer_entries(&self, group: Uuid) -> Result<Vec<Transaction>> {
        let rows = self.pool.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM transactions WHERE transfer_group_id = ? ORDER BY id",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([group.to_string()], TransactionRow::from_row)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    pub fn count_transactions_for_user(&self, user_id: UserId) -> Result<i64> {
        self.pool.with_connection(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
                [user_id.0],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // === Status ===

    pub fn get_totals(&self) -> Result<StoreTotals> {
        let (users, total_balance, transactions, earliest, latest) =
            self.pool.with_connection(|conn| {
                let (users, total_balance): (i64, Option<String>) = conn.query_row(
                    "SELECT COUNT(*), SUM(balance)::VARCHAR FROM users",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                let (transactions, earliest, latest): (i64, Option<String>, Option<String>) =
                    conn.query_row(
                        "SELECT COUNT(*), MIN(timestamp)::VARCHAR, MAX(timestamp)::VARCHAR
                         FROM transactions",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )?;
                Ok((users, total_balance, transactions, earliest, latest))
            })?;

        Ok(StoreTotals {
            users,
            transactions,
            total_balance: match total_balance {
                Some(s) => parse_decimal(&s)?,
                None => Decimal::ZERO,
            },
            earliest_transaction: earliest.as_deref().map(parse_naive_datetime).transpose()?,
            latest_transaction: latest.as_deref().map(parse_naive_datetime).transpose()?,
        })
    }

    // === Doctor checks ===

    /// Stored balance and signed ledger sum for every user, in one snapshot
    pub fn ledger_totals(&self) -> Result<Vec<LedgerTotals>> {
        let rows = self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.account_number, u.balance::VARCHAR,
                        COALESCE(SUM(CASE WHEN t.type IN ('deposit', 'transfer_received')
                                          THEN t.amount ELSE -t.amount END), 0)::VARCHAR,
                        COUNT(t.id)
                 FROM users u
                 LEFT JOIN transactions t ON t.user_id = u.id
                 GROUP BY u.id, u.account_number, u.balance
                 ORDER BY u.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, number, balance, sum, entries)| {
                Ok(LedgerTotals {
                    user_id: UserId(id),
                    account_number: parse_account_number(&number)?,
                    balance: parse_decimal(&balance)?,
                    ledger_sum: parse_decimal(&sum)?,
                    entries,
                })
            })
            .collect()
    }

    /// Ledger entries whose owner does not exist
    pub fn check_orphaned_transactions(&self) -> Result<Vec<i64>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id FROM transactions t
                 LEFT JOIN users u ON t.user_id = u.id
                 WHERE u.id IS NULL
                 ORDER BY t.id",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<duckdb::Result<Vec<i64>>>()?;
            Ok(ids)
        })
    }

    /// Transfer groups that are not exactly one sent + one received entry
    /// with equal amount and timestamp, plus transfer entries lacking a group
    pub fn check_unpaired_transfers(&self) -> Result<Vec<String>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT transfer_group_id FROM transactions
                 WHERE transfer_group_id IS NOT NULL
                 GROUP BY transfer_group_id
                 HAVING COUNT(*) <> 2
                     OR COUNT(DISTINCT type) <> 2
                     OR COUNT(DISTINCT amount) <> 1
                     OR COUNT(DISTINCT timestamp) <> 1
                     OR COUNT(DISTINCT user_id) <> 2
                     OR SUM(CASE WHEN type NOT IN ('transfer_sent', 'transfer_received')
                                 THEN 1 ELSE 0 END) > 0
                 ORDER BY transfer_group_id",
            )?;
            let mut problems = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<duckdb::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT id FROM transactions
                 WHERE transfer_group_id IS NULL
                   AND type IN ('transfer_sent', 'transfer_received')
                 ORDER BY id",
            )?;
            let ungrouped = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<duckdb::Result<Vec<_>>>()?;
            problems.extend(ungrouped.into_iter().map(|id| format!("transaction:{}", id)));

            Ok(problems)
        })
    }

    pub fn check_negative_balances(&self) -> Result<Vec<UserId>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE balance < 0 ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(ids.into_iter().map(UserId).collect())
        })
    }

    /// Flush the write-ahead log into the database file
    pub fn checkpoint(&self) -> Result<()> {
        self.pool.with_root(|conn| {
            conn.execute_batch("CHECKPOINT")?;
            Ok(())
        })
    }
}

// ============================================================================
// Transaction-scoped operations
// ============================================================================

/// Store primitives available inside [`DuckDbRepository::atomic`].
///
/// Every method runs on the same DuckDB transaction; nothing is visible to
/// other connections until the scope commits.
pub struct StoreTx<'a> {
    tx: duckdb::Transaction<'a>,
}

impl StoreTx<'_> {
    pub fn find_user(&self, id: UserId) -> Result<Option<User>> {
        query_user(&self.tx, "id = ?", [id.0])
    }

    pub fn find_user_by_account_number(&self, number: &AccountNumber) -> Result<Option<User>> {
        query_user(&self.tx, "account_number = ?", [number.as_str()])
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        exists(&self.tx, "SELECT COUNT(*) FROM users WHERE username = ?", [username])
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        exists(&self.tx, "SELECT COUNT(*) FROM users WHERE email = ?", [email])
    }

    pub fn account_number_exists(&self, number: &AccountNumber) -> Result<bool> {
        exists(
            &self.tx,
            "SELECT COUNT(*) FROM users WHERE account_number = ?",
            [number.as_str()],
        )
    }

    /// Current balance as seen by this transaction
    pub fn balance(&self, id: UserId) -> Result<Option<Decimal>> {
        query_balance(&self.tx, id)
    }

    /// Insert a user row. Unique violations surface as
    /// `DuplicateUsername`, `DuplicateEmail` or `AccountNumberTaken`.
    pub fn insert_user(&self, user: &NewUser) -> Result<UserId> {
        let id: i64 = self.tx.query_row(
            "INSERT INTO users (username, email, fullname, password_hash, account_number,
                                balance, created_at)
             VALUES (?, ?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS TIMESTAMP))
             RETURNING id",
            params![
                user.username,
                user.email,
                user.fullname,
                user.credential.as_str(),
                user.account_number.as_str(),
                user.balance.to_string(),
                format_timestamp(&user.created_at),
            ],
            |row| row.get(0),
        )?;
        Ok(UserId(id))
    }

    /// `balance += amount` while the result stays within [`money::max_amount`].
    ///
    /// Fails with `BalanceLimitExceeded` past the ceiling and with
    /// `AccountNotFound` if no row matched.
    pub fn credit(&self, id: UserId, amount: Decimal) -> Result<()> {
        let headroom = money::max_amount() - amount;
        let changed = self.tx.execute(
            "UPDATE users SET balance = balance + CAST(? AS DECIMAL(18, 2))
             WHERE id = ? AND balance <= CAST(? AS DECIMAL(18, 2))",
            params![amount.to_string(), id.0, headroom.to_string()],
        )?;
        if changed == 0 {
            return match self.balance(id)? {
                Some(_) => Err(Error::BalanceLimitExceeded {
                    maximum: money::max_amount(),
                }),
                None => Err(Error::AccountNotFound),
            };
        }
        Ok(())
    }

    /// `balance -= amount` only when `balance >= amount`.
    ///
    /// Returns `false` when the row is missing or the funds are short; the
    /// caller tells the two apart with [`StoreTx::balance`].
    pub fn debit_if_sufficient(&self, id: UserId, amount: Decimal) -> Result<bool> {
        let amount = amount.to_string();
        let changed = self.tx.execute(
            "UPDATE users SET balance = balance - CAST(? AS DECIMAL(18, 2))
             WHERE id = ? AND balance >= CAST(? AS DECIMAL(18, 2))",
            params![amount, id.0, amount],
        )?;
        Ok(changed == 1)
    }

    /// Append one ledger entry and return its id
    pub fn append_transaction(&self, entry: &NewTransaction) -> Result<i64> {
        let id: i64 = self.tx.query_row(
            "INSERT INTO transactions (user_id, type, amount, timestamp, transfer_group_id)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS TIMESTAMP), ?)
             RETURNING id",
            params![
                entry.user_id.0,
                entry.kind.as_str(),
                entry.amount.to_string(),
                format_timestamp(&entry.timestamp),
                entry.transfer_group_id.map(|g| g.to_string()),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

/// Raw user row; converted to the domain type outside the row callback so
/// parse failures become domain errors
struct UserRow {
    id: i64,
    username: String,
    email: String,
    fullname: String,
    password_hash: String,
    account_number: String,
    balance: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            fullname: row.get(3)?,
            password_hash: row.get(4)?,
            account_number: row.get(5)?,
            balance: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_domain(self) -> Result<User> {
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            email: self.email,
            fullname: self.fullname,
            credential: Credential::new(self.password_hash),
            account_number: parse_account_number(&self.account_number)?,
            balance: parse_decimal(&self.balance)?,
            created_at: parse_naive_datetime(&self.created_at)?,
        })
    }
}

struct TransactionRow {
    id: i64,
    user_id: i64,
    kind: String,
    amount: String,
    timestamp: String,
    transfer_group_id: Option<String>,
}

impl TransactionRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            amount: row.get(3)?,
            timestamp: row.get(4)?,
            transfer_group_id: row.get(5)?,
        })
    }

    fn into_domain(self) -> Result<Transaction> {
        let transfer_group_id = match self.transfer_group_id {
            Some(s) => Some(
                Uuid::parse_str(&s)
                    .map_err(|e| Error::storage(format!("invalid transfer group id {}: {}", s, e)))?,
            ),
            None => None,
        };
        Ok(Transaction {
            id: self.id,
            user_id: UserId(self.user_id),
            kind: TransactionKind::from_str(&self.kind)?,
            amount: parse_decimal(&self.amount)?,
            timestamp: parse_naive_datetime(&self.timestamp)?,
            transfer_group_id,
        })
    }
}

fn query_user<P: duckdb::Params>(conn: &Connection, filter: &str, params: P) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter);
    match conn.query_row(&sql, params, UserRow::from_row) {
        Ok(row) => row.into_domain().map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_balance(conn: &Connection, id: UserId) -> Result<Option<Decimal>> {
    match conn.query_row(
        "SELECT balance::VARCHAR FROM users WHERE id = ?",
        [id.0],
        |row| row.get::<_, String>(0),
    ) {
        Ok(s) => parse_decimal(&s).map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn exists<P: duckdb::Params>(conn: &Connection, sql: &str, params: P) -> Result<bool> {
    let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(count > 0)
}

// Helper functions

/// Timestamps are stored with microsecond precision
pub fn store_timestamp(ts: NaiveDateTime) -> NaiveDateTime {
    ts.trunc_subsecs(6)
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime> {
    // DuckDB prints TIMESTAMP as "2026-01-14 23:59:59.123456", dropping the
    // fraction when it is zero
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| Error::storage(format!("invalid timestamp {:?}: {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|e| Error::storage(format!("invalid amount {:?}: {}", s, e)))
}

fn parse_account_number(s: &str) -> Result<AccountNumber> {
    AccountNumber::parse(s).map_err(|e| Error::storage(format!("stored account number: {}", e)))
}
