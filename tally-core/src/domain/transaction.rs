//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};
use super::UserId;

/// What a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferSent,
    TransferReceived,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Deposit,
        TransactionKind::Withdrawal,
        TransactionKind::TransferSent,
        TransactionKind::TransferReceived,
    ];

    /// Name stored in the `transactions.type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferSent => "transfer_sent",
            TransactionKind::TransferReceived => "transfer_received",
        }
    }

    /// +1 when the entry adds to the owner's balance, -1 when it takes from it
    pub fn sign(&self) -> Decimal {
        match self {
            TransactionKind::Deposit | TransactionKind::TransferReceived => Decimal::ONE,
            TransactionKind::Withdrawal | TransactionKind::TransferSent => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            TransactionKind::TransferSent | TransactionKind::TransferReceived
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TransactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::storage(format!("unknown transaction type: {}", s)))
    }
}

/// An immutable ledger entry owned by one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Always positive; direction comes from `kind`
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
    /// Shared by the two entries of one transfer
    pub transfer_group_id: Option<Uuid>,
}

impl Transaction {
    /// Amount with the sign applied to the owner's balance
    pub fn signed_amount(&self) -> Decimal {
        self.amount * self.kind.sign()
    }
}

/// Input for appending a ledger entry
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
    pub transfer_group_id: Option<Uuid>,
}

impl NewTransaction {
    pub fn new(
        user_id: UserId,
        kind: TransactionKind,
        amount: Decimal,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            user_id,
            kind,
            amount,
            timestamp,
            transfer_group_id: None,
        }
    }

    pub fn in_transfer(mut self, group: Uuid) -> Self {
        self.transfer_group_id = Some(group);
        self
    }
}

/// Outcome of a balance-affecting operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    /// Entry recorded for the acting user
    pub transaction_id: i64,
    /// Entry recorded for the counterparty (transfers only)
    pub counterpart_transaction_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Acting user's balance after the operation
    pub balance: Decimal,
    pub timestamp: NaiveDateTime,
    pub transfer_group_id: Option<Uuid>,
}
