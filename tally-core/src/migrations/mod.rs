//! Ledger database migrations - embedded SQL files
//!
//! Applied to the ledger database by `MigrationService::new`, in name order.
//! `000_migrations.sql` bootstraps the `sys_migrations` bookkeeping table.

/// Ledger migrations as (filename, sql_content).
///
/// New migrations get the next NNN_ prefix and an entry at the end.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
