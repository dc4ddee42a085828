//! Status service - store-wide summaries

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;

/// Status service for store summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let totals = self.repository.get_totals()?;

        Ok(StatusSummary {
            total_users: totals.users,
            total_transactions: totals.transactions,
            total_balance: totals.total_balance,
            date_range: DateRange {
                earliest: totals.earliest_transaction.map(|ts| ts.to_string()),
                latest: totals.latest_transaction.map(|ts| ts.to_string()),
            },
            db_path: self
                .repository
                .db_path()
                .map(|p| p.display().to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_transactions: i64,
    /// Sum of all stored balances
    pub total_balance: Decimal,
    pub date_range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
