//! Doctor service - ledger health checks
//!
//! Read-only diagnostics. The reconciliation check compares each stored
//! balance with the signed sum of that user's ledger entries; the engine does
//! not require them to match, so a mismatch is reported as a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();

        // Ledger reconciliation
        let totals = self.repository.ledger_totals()?;
        let mismatched: Vec<_> = totals
            .iter()
            .filter(|t| t.balance != t.ledger_sum)
            .collect();
        let mismatch_details: Vec<serde_json::Value> = mismatched
            .iter()
            .map(|t| {
                json!({
                    "user_id": t.user_id,
                    "account_number": t.account_number,
                    "balance": t.balance.to_string(),
                    "ledger_sum": t.ledger_sum.to_string(),
                    "entries": t.entries,
                })
            })
            .collect();
        checks.insert(
            "ledger_reconciliation".to_string(),
            CheckResult::from_findings(
                CheckStatus::Warning,
                mismatch_details,
                format!("All {} balance(s) match their ledger entries", totals.len()),
                |n| format!("{} balance(s) differ from the sum of their ledger entries", n),
            ),
        );

        // Orphaned transactions
        let orphaned = self.repository.check_orphaned_transactions()?;
        checks.insert(
            "orphaned_transactions".to_string(),
            CheckResult::from_findings(
                CheckStatus::Error,
                orphaned
                    .iter()
                    .map(|id| json!({ "transaction_id": id }))
                    .collect(),
                "No orphaned transactions found".to_string(),
                |n| format!("{} transaction(s) reference missing users", n),
            ),
        );

        // Transfer pairing
        let unpaired = self.repository.check_unpaired_transfers()?;
        checks.insert(
            "transfer_pairing".to_string(),
            CheckResult::from_findings(
                CheckStatus::Error,
                unpaired
                    .iter()
                    .map(|group| json!({ "transfer_group_id": group }))
                    .collect(),
                "Every transfer has exactly one sent and one received entry".to_string(),
                |n| format!("{} transfer(s) are not correctly paired", n),
            ),
        );

        // Negative balances
        let negative = self.repository.check_negative_balances()?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                CheckStatus::Error,
                negative
                    .iter()
                    .map(|id| json!({ "user_id": id }))
                    .collect(),
                "No negative balances found".to_string(),
                |n| format!("{} account(s) have a negative balance", n),
            ),
        );

        let passed = checks.values().filter(|c| c.status == CheckStatus::Pass).count() as i64;
        let warnings = checks.values().filter(|c| c.status == CheckStatus::Warning).count() as i64;
        let errors = checks.values().filter(|c| c.status == CheckStatus::Error).count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.warnings == 0 && self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    /// Pass when there are no findings, otherwise `severity` with details
    fn from_findings(
        severity: CheckStatus,
        findings: Vec<serde_json::Value>,
        pass_message: String,
        fail_message: impl FnOnce(usize) -> String,
    ) -> Self {
        if findings.is_empty() {
            Self {
                status: CheckStatus::Pass,
                message: pass_message,
                details: None,
            }
        } else {
            Self {
                status: severity,
                message: fail_message(findings.len()),
                details: Some(findings),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreSettings;

    fn repo() -> Arc<DuckDbRepository> {
        let repo = Arc::new(DuckDbRepository::open_in_memory(&StoreSettings::default()).unwrap());
        repo.ensure_schema().unwrap();
        repo
    }

    fn execute(repo: &DuckDbRepository, sql: &str) {
        repo.pool()
            .with_connection(|conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_empty_store_is_healthy() {
        let result = DoctorService::new(repo()).run_checks().unwrap();
        assert!(result.is_healthy());
        assert_eq!(result.summary.passed, 4);
    }

    #[test]
    fn test_detects_tampering() {
        let repo = repo();
        execute(
            &repo,
            "INSERT INTO users (username, email, fullname, password_hash, account_number, balance, created_at)
             VALUES ('alice', 'a@example.com', 'Alice', 'x', '12345678', 10, TIMESTAMP '2026-01-01 00:00:00');
             INSERT INTO transactions (user_id, type, amount, timestamp)
             VALUES (1, 'deposit', 5, TIMESTAMP '2026-01-01 00:00:00');
             INSERT INTO transactions (user_id, type, amount, timestamp)
             VALUES (42, 'deposit', 5, TIMESTAMP '2026-01-01 00:00:00');
             INSERT INTO transactions (user_id, type, amount, timestamp, transfer_group_id)
             VALUES (1, 'transfer_sent', 1, TIMESTAMP '2026-01-01 00:00:00', 'g-1');",
        );

        let result = DoctorService::new(repo).run_checks().unwrap();
        assert_eq!(result.checks["ledger_reconciliation"].status, CheckStatus::Warning);
        assert_eq!(result.checks["orphaned_transactions"].status, CheckStatus::Error);
        assert_eq!(result.checks["transfer_pairing"].status, CheckStatus::Error);
        assert_eq!(result.checks["negative_balances"].status, CheckStatus::Pass);
        assert!(!result.is_healthy());
    }
}
