//! Event log database migrations - embedded SQL files
//!
//! Applied to logs.duckdb by the logging service through the same
//! MigrationService as the ledger schema.

/// All log migrations, embedded at compile time.
/// Format: (filename, sql_content)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
