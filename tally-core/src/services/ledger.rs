//! Ledger engine - balance mutations paired with ledger entries
//!
//! Every mutation runs in one store scope: the balance update and its
//! transaction row(s) commit together or not at all. Debits are conditional
//! updates, so a balance never goes below zero even under concurrent use.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::{store_timestamp, DuckDbRepository, HistoryCursor, StoreTx};
use crate::domain::money;
use crate::domain::result::{Error, Result};
use crate::domain::{AccountNumber, NewTransaction, Receipt, Transaction, TransactionKind, UserId};
use crate::services::auth::UserHandle;

/// Entries fetched per round trip by [`History`]
pub const HISTORY_PAGE_SIZE: usize = 50;

/// Upper bound for a single [`LedgerService::history_page`] request
pub const MAX_HISTORY_PAGE: usize = 1000;

pub struct LedgerService {
    repository: Arc<DuckDbRepository>,
}

impl LedgerService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn get_balance(&self, user: &UserHandle) -> Result<Decimal> {
        self.repository
            .get_balance(user.id())?
            .ok_or(Error::AccountNotFound)
    }

    pub fn deposit(&self, user: &UserHandle, amount: Decimal) -> Result<Receipt> {
        let amount = money::check_amount(amount)?;
        let user_id = user.id();

        self.repository.atomic(|tx| {
            let timestamp = now();
            tx.credit(user_id, amount)?;
            let transaction_id = tx.append_transaction(&NewTransaction::new(
                user_id,
                TransactionKind::Deposit,
                amount,
                timestamp,
            ))?;
            let balance = tx.balance(user_id)?.ok_or(Error::AccountNotFound)?;

            Ok(Receipt {
                transaction_id,
                counterpart_transaction_id: None,
                kind: TransactionKind::Deposit,
                amount,
                balance,
                timestamp,
                transfer_group_id: None,
            })
        })
    }

    pub fn withdraw(&self, user: &UserHandle, amount: Decimal) -> Result<Receipt> {
        let amount = money::check_amount(amount)?;
        let user_id = user.id();

        self.repository.atomic(|tx| {
            let timestamp = now();
            debit(tx, user_id, amount)?;
            let transaction_id = tx.append_transaction(&NewTransaction::new(
                user_id,
                TransactionKind::Withdrawal,
                amount,
                timestamp,
            ))?;
            let balance = tx.balance(user_id)?.ok_or(Error::AccountNotFound)?;

            Ok(Receipt {
                transaction_id,
                counterpart_transaction_id: None,
                kind: TransactionKind::Withdrawal,
                amount,
                balance,
                timestamp,
                transfer_group_id: None,
            })
        })
    }

    /// Move money to another account.
    ///
    /// Checked in order: the recipient exists, is not the sender, the amount
    /// is positive, the sender can cover it. Both balance updates and both
    /// entries share one scope; the entries share amount, timestamp and a
    /// fresh transfer group id.
    pub fn transfer(
        &self,
        sender: &UserHandle,
        recipient: &AccountNumber,
        amount: Decimal,
    ) -> Result<Receipt> {
        let sender_id = sender.id();

        self.repository.atomic(|tx| {
            let recipient_id = tx
                .find_user_by_account_number(recipient)?
                .ok_or(Error::RecipientNotFound)?
                .id;
            if recipient_id == sender_id {
                return Err(Error::SelfTransferNotAllowed);
            }
            let amount = money::check_amount(amount)?;

            // Lower id first so concurrent transfers touch rows in one order
            if sender_id < recipient_id {
                debit(tx, sender_id, amount)?;
                tx.credit(recipient_id, amount)?;
            } else {
                tx.credit(recipient_id, amount)?;
                debit(tx, sender_id, amount)?;
            }

            let timestamp = now();
            let group = Uuid::new_v4();
            let sent_id = tx.append_transaction(
                &NewTransaction::new(sender_id, TransactionKind::TransferSent, amount, timestamp)
                    .in_transfer(group),
            )?;
            let received_id = tx.append_transaction(
                &NewTransaction::new(
                    recipient_id,
                    TransactionKind::TransferReceived,
                    amount,
                    timestamp,
                )
                .in_transfer(group),
            )?;
            let balance = tx.balance(sender_id)?.ok_or(Error::AccountNotFound)?;

            Ok(Receipt {
                transaction_id: sent_id,
                counterpart_transaction_id: Some(received_id),
                kind: TransactionKind::TransferSent,
                amount,
                balance,
                timestamp,
                transfer_group_id: Some(group),
            })
        })
    }

    /// The user's entries, newest first, fetched lazily page by page.
    ///
    /// Each call starts from the newest entry again.
    pub fn history(&self, user: &UserHandle) -> History {
        History::new(Arc::clone(&self.repository), user.id(), HISTORY_PAGE_SIZE)
    }

    /// Up to `limit` entries strictly older than `before` (or the newest
    /// entries when `before` is `None`), newest first
    pub fn history_page(
        &self,
        user: &UserHandle,
        limit: usize,
        before: Option<HistoryCursor>,
    ) -> Result<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repository
            .history_page(user.id(), limit.min(MAX_HISTORY_PAGE), before)
    }
}

/// Conditional debit; tells a short balance apart from a missing account
fn debit(tx: &StoreTx<'_>, user_id: UserId, amount: Decimal) -> Result<()> {
    if tx.debit_if_sufficient(user_id, amount)? {
        return Ok(());
    }
    match tx.balance(user_id)? {
        Some(_) => Err(Error::InsufficientFunds),
        None => Err(Error::AccountNotFound),
    }
}

fn now() -> NaiveDateTime {
    store_timestamp(Utc::now().naive_utc())
}

/// Lazy iterator over a user's ledger using keyset pagination
pub struct History {
    repository: Arc<DuckDbRepository>,
    user_id: UserId,
    page_size: usize,
    cursor: Option<HistoryCursor>,
    buffer: VecDeque<Transaction>,
    done: bool,
}

impl History {
    fn new(repository: Arc<DuckDbRepository>, user_id: UserId, page_size: usize) -> Self {
        Self {
            repository,
            user_id,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch_page(&mut self) -> Result<()> {
        let page = self
            .repository
            .history_page(self.user_id, self.page_size, self.cursor)?;
        if page.len() < self.page_size {
            self.done = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(HistoryCursor::from(last));
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for History {
    type Item = Result<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
