use chrono::Utc;
use dpg_common::WalletAddress;
use log::*;

use crate::{
    db::traits::{AccountManagement, CreditResult, DepositGatewayDatabase, TransferQueryFilter},
    db_types::{DepositIntent, LedgerEntry, NewDepositIntent, NewLedgerEntry, ObservedTransfer, UserAccount},
    dge_api::{
        deposit_objects::{IntentStatusResult, StatusBreakdown, TransferSummary},
        errors::DepositApiError,
    },
};

/// The user- and operator-facing operations of the gateway. All methods are reads or single
/// store calls; the store supplies the atomicity.
pub struct DepositApi<B> {
    db: B,
}

impl<B> DepositApi<B>
where B: DepositGatewayDatabase + AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Links a wallet to an account, creating the account if the wallet is new. Returns the
    /// account id. Transfers from this wallet that were stuck in `Confirmed` for want of an owner
    /// become creditable on the next pass.
    pub async fn register_wallet(&self, wallet: &WalletAddress) -> Result<i64, DepositApiError> {
        let account_id = self.db.fetch_or_create_account_for_wallet(wallet).await.map_err(db_err)?;
        debug!("🧑️ Wallet {wallet} registered against account #{account_id}");
        Ok(account_id)
    }

    /// Declares a deposit intent. The expiry must be in the future and the amount positive.
    pub async fn create_intent(&self, intent: NewDepositIntent) -> Result<DepositIntent, DepositApiError> {
        if intent.expected_amount.value() <= 0 {
            return Err(DepositApiError::InvalidRequest(format!(
                "An intent's expected amount must be positive, not {}",
                intent.expected_amount
            )));
        }
        if intent.expires_at <= Utc::now() {
            return Err(DepositApiError::InvalidRequest(format!("Intent expiry {} is in the past", intent.expires_at)));
        }
        let account_id = intent.user_account_id;
        let id = self.db.create_intent(intent).await.map_err(db_err)?;
        debug!("📝️ Deposit intent #{id} created for account #{account_id}");
        self.db.fetch_intent(id).await.map_err(db_err)?.ok_or(DepositApiError::IntentNotFound(id))
    }

    /// The intent and every transfer bound to it.
    pub async fn intent_status(&self, intent_id: i64) -> Result<IntentStatusResult, DepositApiError> {
        let intent =
            self.db.fetch_intent(intent_id).await.map_err(db_err)?.ok_or(DepositApiError::IntentNotFound(intent_id))?;
        let transfers = self.db.fetch_transfers_for_intent(intent_id).await.map_err(db_err)?;
        Ok(IntentStatusResult { intent, transfers })
    }

    pub async fn fetch_user_account(&self, account_id: i64) -> Result<UserAccount, DepositApiError> {
        self.db.fetch_user_account(account_id).await.map_err(db_err)?.ok_or(DepositApiError::AccountNotFound(account_id))
    }

    pub async fn fetch_user_account_for_wallet(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<UserAccount>, DepositApiError> {
        self.db.fetch_user_account_for_wallet(wallet).await.map_err(db_err)
    }

    pub async fn fetch_transfer(&self, tx_hash: &str, log_index: i64) -> Result<ObservedTransfer, DepositApiError> {
        self.db
            .fetch_transfer(tx_hash, log_index)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DepositApiError::TransferNotFound(tx_hash.to_string(), log_index))
    }

    /// Operator listing of observed transfers, filtered and paged.
    pub async fn search_transfers(&self, filter: TransferQueryFilter) -> Result<Vec<ObservedTransfer>, DepositApiError> {
        self.db.search_transfers(filter).await.map_err(db_err)
    }

    /// Operator summary: transfer counts and total value per status.
    pub async fn transfer_summary(&self) -> Result<TransferSummary, DepositApiError> {
        let breakdown = self
            .db
            .transfer_status_counts()
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|(status, count, total_amount)| StatusBreakdown { status, count, total_amount })
            .collect();
        Ok(TransferSummary { breakdown })
    }

    pub async fn ledger_for_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, DepositApiError> {
        let _ = self.fetch_user_account(account_id).await?;
        self.db.fetch_ledger_for_account(account_id).await.map_err(db_err)
    }

    /// Appends a non-deposit ledger entry (purchase, refund, manual adjustment) under the caller's
    /// idempotency key.
    pub async fn record_ledger_entry(&self, entry: NewLedgerEntry) -> Result<CreditResult, DepositApiError> {
        if entry.idempotency_key.is_empty() {
            return Err(DepositApiError::InvalidRequest("A ledger entry needs an idempotency key".into()));
        }
        self.db.insert_ledger_entry(entry).await.map_err(db_err)
    }

    /// Operator action for a chain reorganisation: flags the transfer so it is never credited.
    pub async fn mark_transfer_reorged(&self, tx_hash: &str, log_index: i64) -> Result<(), DepositApiError> {
        warn!("📝️ Marking transfer {tx_hash}:{log_index} as reorged on operator request");
        self.db.mark_transfer_reorged(tx_hash, log_index).await.map_err(db_err)
    }
}

fn db_err<E: std::error::Error>(e: E) -> DepositApiError {
    DepositApiError::DatabaseError(e.to_string())
}
