use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dpg_common::{TokenAmount, WalletAddress};
use log::*;
use sqlx::SqlitePool;

use super::{accounts, cursor, db_url, intents, ledger, new_pool, transfers, SqliteDatabaseError};
use crate::{
    db::traits::{
        AccountManagement,
        ConfirmationUpdate,
        CreditResult,
        DepositGatewayDatabase,
        InsertTransferResult,
        TransferQueryFilter,
    },
    db_types::{
        deposit_ledger_key,
        DepositIntent,
        EntryType,
        IntentStatus,
        LedgerEntry,
        NewDepositIntent,
        NewLedgerEntry,
        NewTransfer,
        ObservedTransfer,
        TransferStatus,
        UserAccount,
    },
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the url from the environment.
    pub async fn new() -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str()).await
    }

    pub async fn new_with_url(url: &str) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, DEFAULT_MAX_CONNECTIONS).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl DepositGatewayDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<InsertTransferResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let result = transfers::idempotent_insert(transfer.clone(), &mut conn).await?;
        match &result {
            InsertTransferResult::Inserted(id) => {
                debug!(
                    "🗃️ Transfer {}:{} of {} from [{}] recorded with id {id}",
                    transfer.tx_hash, transfer.log_index, transfer.amount, transfer.sender
                );
            },
            InsertTransferResult::AlreadyExists(id) => {
                trace!("🗃️ Transfer {}:{} was already recorded as #{id}. Skipping.", transfer.tx_hash, transfer.log_index);
            },
        }
        Ok(result)
    }

    async fn match_transfer_to_intent(&self, transfer_id: i64) -> Result<Option<i64>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let transfer = transfers::fetch_transfer_by_id(transfer_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::TransferNotFound(transfer_id))?;
        if transfer.intent_id.is_some() {
            return Ok(transfer.intent_id);
        }
        let matched = intents::find_matchable_intent(&transfer.sender, Utc::now(), &mut tx).await?;
        if let Some(intent_id) = matched {
            transfers::set_intent(transfer.id, intent_id, &mut tx).await?;
            intents::update_status(intent_id, IntentStatus::Detected, &mut tx).await?;
            debug!(
                "🗃️ Transfer {}:{} bound to deposit intent #{intent_id}. The intent is now Detected.",
                transfer.tx_hash, transfer.log_index
            );
        }
        tx.commit().await?;
        Ok(matched)
    }

    async fn update_confirmations(&self, height: i64, threshold: i64) -> Result<ConfirmationUpdate, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::update_confirmations(height, threshold, &mut conn).await
    }

    async fn fetch_creditable_transfers(&self) -> Result<Vec<ObservedTransfer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_creditable(&mut conn).await
    }

    /// The atomic crediting unit. Everything between `begin` and `commit` either all happens or
    /// none of it does; dropping the transaction on any early return rolls back every step.
    ///
    /// The exactly-once guarantee hangs on the ledger insert: the idempotency key is derived from
    /// the transfer's natural key, so a concurrent or retried invocation collides on the unique
    /// constraint, observes `DuplicateKey`, and backs out without touching the balance.
    async fn credit_transfer(&self, transfer_id: i64) -> Result<CreditResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let transfer = transfers::fetch_transfer_by_id(transfer_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::TransferNotFound(transfer_id))?;
        if transfer.status == TransferStatus::Credited {
            debug!("🗃️ Transfer {}:{} is already credited. No action to take.", transfer.tx_hash, transfer.log_index);
            return Ok(CreditResult::AlreadyCredited);
        }
        if transfer.status != TransferStatus::Confirmed {
            return Err(SqliteDatabaseError::TransferNotCreditable(transfer.id, transfer.status.to_string()));
        }
        // Prefer the bound intent's owner; fall back to whichever account registered the sender
        // wallet directly.
        let account_id = match transfer.intent_id {
            Some(intent_id) => intents::account_for_intent(intent_id, &mut tx).await?,
            None => None,
        };
        let account_id = match account_id {
            Some(id) => Some(id),
            None => accounts::account_id_for_wallet(&transfer.sender, &mut tx).await?,
        };
        let Some(account_id) = account_id else {
            info!(
                "🗃️ Transfer {}:{} is confirmed but no account owns sender {}. It stays Confirmed and will be \
                 retried on the next pass.",
                transfer.tx_hash, transfer.log_index, transfer.sender
            );
            return Ok(CreditResult::NoAccount);
        };
        let account = accounts::account_by_id(account_id, &mut tx)
            .await?
            .ok_or(SqliteDatabaseError::AccountNotFound(account_id))?;
        let new_balance = account.current_balance + transfer.amount;
        let entry = NewLedgerEntry {
            user_account_id: account_id,
            entry_type: EntryType::Deposit,
            amount: transfer.amount,
            ref_type: Some("transfer".to_string()),
            ref_id: Some(transfer.id.to_string()),
            idempotency_key: deposit_ledger_key(&transfer.tx_hash, transfer.log_index),
        };
        match ledger::insert_entry(entry, new_balance, &mut tx).await? {
            ledger::InsertEntryResult::Inserted(_) => {},
            ledger::InsertEntryResult::DuplicateKey => {
                debug!(
                    "🗃️ Transfer {}:{} was credited by a concurrent invocation. Backing out.",
                    transfer.tx_hash, transfer.log_index
                );
                return Ok(CreditResult::AlreadyCredited);
            },
        }
        accounts::update_user_balance(account_id, new_balance, &mut tx).await?;
        transfers::mark_credited(transfer.id, &mut tx).await?;
        if let Some(intent_id) = transfer.intent_id {
            intents::update_status(intent_id, IntentStatus::Credited, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Transfer {}:{} credited. Account #{account_id} balance is now {new_balance}.",
            transfer.tx_hash, transfer.log_index
        );
        Ok(CreditResult::Applied { account_id, new_balance })
    }

    async fn insert_ledger_entry(&self, entry: NewLedgerEntry) -> Result<CreditResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let account_id = entry.user_account_id;
        let account =
            accounts::account_by_id(account_id, &mut tx).await?.ok_or(SqliteDatabaseError::AccountNotFound(account_id))?;
        let new_balance = account.current_balance + entry.amount;
        match ledger::insert_entry(entry, new_balance, &mut tx).await? {
            ledger::InsertEntryResult::Inserted(_) => {},
            ledger::InsertEntryResult::DuplicateKey => return Ok(CreditResult::AlreadyCredited),
        }
        accounts::update_user_balance(account_id, new_balance, &mut tx).await?;
        tx.commit().await?;
        Ok(CreditResult::Applied { account_id, new_balance })
    }

    async fn last_scanned_block(&self) -> Result<Option<i64>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cursor::last_scanned_block(&mut conn).await
    }

    async fn set_last_scanned_block(&self, block: i64) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cursor::set_last_scanned_block(block, &mut conn).await
    }

    async fn bootstrap_scan_block(&self, height: i64, lookback: i64) -> Result<i64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let base = match transfers::max_block_number(&mut conn).await? {
            Some(max) => max,
            None => height,
        };
        Ok((base - lookback).max(0))
    }

    async fn create_intent(&self, intent: NewDepositIntent) -> Result<i64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let account_id = intent.user_account_id;
        if accounts::account_by_id(account_id, &mut conn).await?.is_none() {
            return Err(SqliteDatabaseError::AccountNotFound(account_id));
        }
        intents::insert_intent(intent, &mut conn).await
    }

    async fn expire_stale_intents(&self, now: DateTime<Utc>) -> Result<Vec<i64>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        intents::expire_stale(now, &mut conn).await
    }

    async fn fetch_or_create_account_for_wallet(&self, wallet: &WalletAddress) -> Result<i64, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let id = accounts::fetch_or_create_account_for_wallet(wallet, &mut tx).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn mark_transfer_reorged(&self, tx_hash: &str, log_index: i64) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::mark_reorged(tx_hash, log_index, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_user_account(&self, account_id: i64) -> Result<Option<UserAccount>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_id(account_id, &mut conn).await
    }

    async fn fetch_user_account_for_wallet(&self, wallet: &WalletAddress) -> Result<Option<UserAccount>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_for_wallet(wallet, &mut conn).await
    }

    async fn fetch_intent(&self, intent_id: i64) -> Result<Option<DepositIntent>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        intents::fetch_intent(intent_id, &mut conn).await
    }

    async fn fetch_transfers_for_intent(&self, intent_id: i64) -> Result<Vec<ObservedTransfer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfers_for_intent(intent_id, &mut conn).await
    }

    async fn fetch_transfer(&self, tx_hash: &str, log_index: i64) -> Result<Option<ObservedTransfer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_transfer_by_key(tx_hash, log_index, &mut conn).await
    }

    async fn search_transfers(&self, filter: TransferQueryFilter) -> Result<Vec<ObservedTransfer>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::search_transfers(filter, &mut conn).await
    }

    async fn transfer_status_counts(&self) -> Result<Vec<(TransferStatus, i64, TokenAmount)>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        transfers::status_counts(&mut conn).await
    }

    async fn fetch_ledger_for_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries_for_account(account_id, &mut conn).await
    }
}
